//! # Account Recovery
//!
//! | Operasi | Siapa | Efek |
//! |---------|-------|------|
//! | `request_account_recovery` | recovery partner (atau top witness) | buka/ubah/batalkan request |
//! | `recover_account` | pemilik lama | owner diganti jika recent owner ada di history |
//! | `change_recovery_account` | owner | partner baru berlaku setelah `owner_auth_recovery_period` |
//!
//! Maksimum satu request terbuka per account. Threshold 0 membatalkan request.

use tracing::debug;

use super::{AccountRecoveryRequest, ChainState, ChangeRecoveryAccountRequest, LedgerContext};
use crate::error::{LedgerError, Result};
use crate::types::{AccountName, Authority};

#[derive(Debug, Clone)]
pub(crate) enum RecoveryRequestPlan {
    Create(AccountRecoveryRequest),
    Update(AccountRecoveryRequest),
    Cancel(AccountName),
}

#[derive(Debug, Clone)]
pub(crate) struct RecoverAccountPlan {
    pub account: AccountName,
    pub new_owner_authority: Authority,
}

#[derive(Debug, Clone)]
pub(crate) enum ChangeRecoveryPlan {
    Create(ChangeRecoveryAccountRequest),
    Update(ChangeRecoveryAccountRequest),
    Cancel(AccountName),
}

impl ChainState {
    pub(crate) fn validate_request_account_recovery(
        &self,
        ctx: &LedgerContext,
        recovery_account: &AccountName,
        account_to_recover: &AccountName,
        new_owner_authority: &Authority,
    ) -> Result<RecoveryRequestPlan> {
        let account = self.get_account(account_to_recover)?;
        self.check_account_existence(recovery_account)?;

        match &account.recovery_account {
            Some(partner) if partner != recovery_account => {
                return Err(LedgerError::NotRecoveryPartner(recovery_account.clone()));
            }
            Some(_) => {}
            // tanpa partner: top witness yang berhak
            None => {
                if &self.get_top_witness()?.owner != recovery_account {
                    return Err(LedgerError::NotRecoveryPartner(recovery_account.clone()));
                }
            }
        }
        self.check_authority_accounts(new_owner_authority)?;

        let expires = ctx.time.saturating_add(self.config.account_recovery_request_expiration_period);
        let request = AccountRecoveryRequest {
            account_to_recover: account_to_recover.clone(),
            new_owner_authority: new_owner_authority.clone(),
            expires,
        };

        match self.recovery_requests.get(account_to_recover) {
            None => {
                if new_owner_authority.is_impossible() {
                    return Err(LedgerError::ImpossibleAuthority);
                }
                if new_owner_authority.is_open() {
                    return Err(LedgerError::OpenAuthority);
                }
                Ok(RecoveryRequestPlan::Create(request))
            }
            Some(_) if new_owner_authority.is_open() => {
                Ok(RecoveryRequestPlan::Cancel(account_to_recover.clone()))
            }
            Some(_) => {
                if new_owner_authority.is_impossible() {
                    return Err(LedgerError::ImpossibleAuthority);
                }
                Ok(RecoveryRequestPlan::Update(request))
            }
        }
    }

    pub(crate) fn apply_request_account_recovery(&mut self, plan: RecoveryRequestPlan) {
        match plan {
            RecoveryRequestPlan::Create(req) | RecoveryRequestPlan::Update(req) => {
                debug!(account = %req.account_to_recover, expires = req.expires, "recovery request stored");
                self.recovery_requests.insert(req.account_to_recover.clone(), req);
            }
            RecoveryRequestPlan::Cancel(name) => {
                debug!(account = %name, "recovery request cancelled");
                self.recovery_requests.remove(&name);
            }
        }
    }

    /// # Langkah
    ///
    /// 1. Recovery terakhir harus lebih lama dari `owner_update_limit_seconds`
    /// 2. Request harus ada, belum kedaluwarsa, dan authority-nya sama
    /// 3. `recent_owner_authority` harus ada di owner history yang masih berlaku
    pub(crate) fn validate_recover_account(
        &self,
        ctx: &LedgerContext,
        account_to_recover: &AccountName,
        new_owner_authority: &Authority,
        recent_owner_authority: &Authority,
    ) -> Result<RecoverAccountPlan> {
        let account = self.get_account(account_to_recover)?;
        if ctx.time.saturating_sub(account.last_account_recovery) <= self.config.owner_update_limit_seconds {
            return Err(LedgerError::OwnerUpdateTooSoon(self.config.owner_update_limit_seconds));
        }

        let request = self
            .recovery_requests
            .get(account_to_recover)
            .filter(|r| r.expires > ctx.time)
            .ok_or(LedgerError::RecoveryRequestNotFound)?;
        if &request.new_owner_authority != new_owner_authority {
            return Err(LedgerError::RecoveryAuthorityMismatch);
        }

        let cutoff = ctx.time.saturating_sub(self.config.owner_auth_recovery_period);
        let found = self
            .owner_history
            .get(account_to_recover)
            .map(|history| {
                history
                    .iter()
                    .any(|h| h.last_valid_time >= cutoff && &h.previous_owner_authority == recent_owner_authority)
            })
            .unwrap_or(false);
        if !found {
            return Err(LedgerError::RecentAuthorityNotFound);
        }

        Ok(RecoverAccountPlan {
            account: account_to_recover.clone(),
            new_owner_authority: new_owner_authority.clone(),
        })
    }

    pub(crate) fn apply_recover_account(&mut self, ctx: &LedgerContext, plan: RecoverAccountPlan) {
        self.recovery_requests.remove(&plan.account);
        self.update_owner_authority(ctx, &plan.account, plan.new_owner_authority);
        if let Some(acc) = self.accounts.get_mut(&plan.account) {
            acc.last_account_recovery = ctx.time;
        }
        debug!(account = %plan.account, "account recovered");
    }

    pub(crate) fn validate_change_recovery_account(
        &self,
        ctx: &LedgerContext,
        account_to_recover: &AccountName,
        new_recovery_account: &AccountName,
    ) -> Result<ChangeRecoveryPlan> {
        let account = self.get_account(account_to_recover)?;
        self.check_account_existence(new_recovery_account)?;

        let request = ChangeRecoveryAccountRequest {
            account_to_recover: account_to_recover.clone(),
            recovery_account: new_recovery_account.clone(),
            effective_on: ctx.time.saturating_add(self.config.owner_auth_recovery_period),
        };
        let plan = match self.change_recovery_requests.get(account_to_recover) {
            None => ChangeRecoveryPlan::Create(request),
            Some(_) if account.recovery_account.as_ref() != Some(new_recovery_account) => {
                ChangeRecoveryPlan::Update(request)
            }
            // kembali ke partner saat ini: batalkan request
            Some(_) => ChangeRecoveryPlan::Cancel(account_to_recover.clone()),
        };
        Ok(plan)
    }

    pub(crate) fn apply_change_recovery_account(&mut self, plan: ChangeRecoveryPlan) {
        match plan {
            ChangeRecoveryPlan::Create(req) | ChangeRecoveryPlan::Update(req) => {
                debug!(
                    account = %req.account_to_recover,
                    recovery_account = %req.recovery_account,
                    effective_on = req.effective_on,
                    "change recovery account requested"
                );
                self.change_recovery_requests.insert(req.account_to_recover.clone(), req);
            }
            ChangeRecoveryPlan::Cancel(name) => {
                self.change_recovery_requests.remove(&name);
            }
        }
    }
}
