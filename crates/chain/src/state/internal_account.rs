//! Internal account management
//!
//! account_create, account_update, transfer, transfer_to_common_tokens.

use tracing::debug;

use super::internal_proxy::ProxyEffects;
use super::{Account, AccountAuthority, ChainState, LedgerContext, OwnerAuthorityHistory};
use crate::asset::{Asset, PRIMARY_SYMBOL};
use crate::error::{LedgerError, Result};
use crate::types::{AccountName, Authority, PublicKey, COMMON_DISCIPLINE_ID};

#[derive(Debug, Clone)]
pub(crate) struct AccountCreatePlan {
    pub creator: AccountName,
    pub fee: Asset,
    pub account: Account,
    pub authority: AccountAuthority,
}

#[derive(Debug, Clone)]
pub(crate) struct AccountUpdatePlan {
    pub account: AccountName,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub posting: Option<Authority>,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

#[derive(Debug, Clone)]
pub(crate) struct TransferPlan {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
}

#[derive(Debug, Clone)]
pub(crate) struct CommonTokensPlan {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    pub effects: ProxyEffects,
}

impl ChainState {
    /// Balance liquid `account` harus ≥ `amount` (simbol primary).
    pub(crate) fn check_balance(&self, account: &AccountName, amount: &Asset) -> Result<()> {
        let acc = self.get_account(account)?;
        if !acc.balance.try_ge(amount)? {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                required: amount.amount,
                available: acc.balance.amount,
            });
        }
        Ok(())
    }

    /// Semua account yang dirujuk authority harus ada.
    pub(crate) fn check_authority_accounts(&self, auth: &Authority) -> Result<()> {
        for name in auth.referenced_accounts() {
            self.check_account_existence(name)?;
        }
        Ok(())
    }

    pub(crate) fn credit_balance(&mut self, account: &AccountName, amount: i64) {
        if let Some(acc) = self.accounts.get_mut(account) {
            acc.balance.amount = acc.balance.amount.saturating_add(amount);
        }
    }

    pub(crate) fn debit_balance(&mut self, account: &AccountName, amount: i64) {
        if let Some(acc) = self.accounts.get_mut(account) {
            acc.balance.amount = acc.balance.amount.saturating_sub(amount);
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // account_create
    // ════════════════════════════════════════════════════════════════════

    /// # Langkah
    ///
    /// 1. Fee harus bersimbol primary (`InvalidSymbol`) dan ≥ fee minimum
    /// 2. Creator harus punya balance ≥ fee
    /// 3. Nama baru belum dipakai, semua account di authority ada
    ///
    /// Account baru mulai dengan balance dan common tokens nol; fee hanya
    /// menjadi expert token discipline 0.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn validate_account_create(
        &self,
        ctx: &LedgerContext,
        fee: &Asset,
        creator: &AccountName,
        new_account_name: &AccountName,
        owner: &Authority,
        active: &Authority,
        posting: &Authority,
        memo_key: &PublicKey,
        json_metadata: &str,
    ) -> Result<AccountCreatePlan> {
        fee.ensure_symbol(PRIMARY_SYMBOL)?;
        if fee.amount < self.config.min_account_creation_fee {
            return Err(LedgerError::InsufficientFee {
                required: self.config.min_account_creation_fee,
                provided: fee.amount,
            });
        }
        self.check_balance(creator, fee)?;
        if self.accounts.contains_key(new_account_name) {
            return Err(LedgerError::AccountAlreadyExists(new_account_name.clone()));
        }
        for auth in [owner, active, posting] {
            self.check_authority_accounts(auth)?;
        }

        let mut account = Account::new(new_account_name.clone(), memo_key.clone(), ctx.time);
        account.json_metadata = json_metadata.to_string();
        account.recovery_account = Some(creator.clone());
        account.mined = false;

        Ok(AccountCreatePlan {
            creator: creator.clone(),
            fee: *fee,
            account,
            authority: AccountAuthority {
                account: new_account_name.clone(),
                owner: owner.clone(),
                active: active.clone(),
                posting: posting.clone(),
                last_owner_update: 0,
            },
        })
    }

    pub(crate) fn apply_account_create(&mut self, ctx: &LedgerContext, plan: AccountCreatePlan) {
        let AccountCreatePlan { creator, fee, account, authority } = plan;
        let name = account.name.clone();
        self.debit_balance(&creator, fee.amount);
        self.accounts.insert(name.clone(), account);
        self.authorities.insert(name.clone(), authority);
        if fee.amount > 0 {
            self.credit_expertise(&name, COMMON_DISCIPLINE_ID, fee.amount, ctx.time);
        }
        debug!(account = %name, creator = %creator, fee = %fee, "account created");
    }

    // ════════════════════════════════════════════════════════════════════
    // account_update
    // ════════════════════════════════════════════════════════════════════

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn validate_account_update(
        &self,
        ctx: &LedgerContext,
        account: &AccountName,
        owner: Option<&Authority>,
        active: Option<&Authority>,
        posting: Option<&Authority>,
        memo_key: &PublicKey,
        json_metadata: &str,
    ) -> Result<AccountUpdatePlan> {
        let auth = self.get_authority(account)?;
        if let Some(owner) = owner {
            if ctx.time.saturating_sub(auth.last_owner_update) <= self.config.owner_update_limit_seconds {
                return Err(LedgerError::OwnerUpdateTooSoon(self.config.owner_update_limit_seconds));
            }
            if owner.is_impossible() {
                return Err(LedgerError::ImpossibleAuthority);
            }
            self.check_authority_accounts(owner)?;
        }
        for a in [active, posting].into_iter().flatten() {
            self.check_authority_accounts(a)?;
        }
        Ok(AccountUpdatePlan {
            account: account.clone(),
            owner: owner.cloned(),
            active: active.cloned(),
            posting: posting.cloned(),
            memo_key: memo_key.clone(),
            json_metadata: json_metadata.to_string(),
        })
    }

    pub(crate) fn apply_account_update(&mut self, ctx: &LedgerContext, plan: AccountUpdatePlan) {
        if let Some(owner) = plan.owner {
            self.update_owner_authority(ctx, &plan.account, owner);
        }
        if let Some(auth) = self.authorities.get_mut(&plan.account) {
            if let Some(active) = plan.active {
                auth.active = active;
            }
            if let Some(posting) = plan.posting {
                auth.posting = posting;
            }
        }
        if let Some(acc) = self.accounts.get_mut(&plan.account) {
            acc.memo_key = plan.memo_key;
            acc.json_metadata = plan.json_metadata;
        }
        debug!(account = %plan.account, "account updated");
    }

    /// Ganti owner authority dan simpan owner lama ke history.
    pub(crate) fn update_owner_authority(&mut self, ctx: &LedgerContext, account: &AccountName, owner: Authority) {
        if let Some(auth) = self.authorities.get_mut(account) {
            let previous = std::mem::replace(&mut auth.owner, owner);
            auth.last_owner_update = ctx.time;
            self.owner_history.entry(account.clone()).or_default().push(OwnerAuthorityHistory {
                account: account.clone(),
                previous_owner_authority: previous,
                last_valid_time: ctx.time,
            });
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // transfer
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_transfer(&self, from: &AccountName, to: &AccountName, amount: &Asset) -> Result<TransferPlan> {
        amount.ensure_symbol(PRIMARY_SYMBOL)?;
        if amount.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        self.check_account_existence(to)?;
        self.check_balance(from, amount)?;
        self.get_account(to)?
            .balance
            .checked_add(amount)?;
        Ok(TransferPlan { from: from.clone(), to: to.clone(), amount: *amount })
    }

    pub(crate) fn apply_transfer(&mut self, plan: TransferPlan) {
        self.debit_balance(&plan.from, plan.amount.amount);
        self.credit_balance(&plan.to, plan.amount.amount);
        debug!(from = %plan.from, to = %plan.to, amount = %plan.amount, "transfer");
    }

    // ════════════════════════════════════════════════════════════════════
    // transfer_to_common_tokens
    // ════════════════════════════════════════════════════════════════════

    /// Balance → common tokens + expert token discipline 0 milik `to`.
    /// Bobot witness-vote `to` ikut naik lewat rantai proxy.
    pub(crate) fn validate_transfer_to_common_tokens(
        &self,
        from: &AccountName,
        to: Option<&AccountName>,
        amount: &Asset,
    ) -> Result<CommonTokensPlan> {
        amount.ensure_symbol(PRIMARY_SYMBOL)?;
        if amount.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let to = to.unwrap_or(from);
        let target = self.get_account(to)?;
        self.check_balance(from, amount)?;
        target
            .common_tokens
            .checked_add(amount.amount)
            .ok_or(LedgerError::Overflow("common tokens"))?;

        let mut effects = ProxyEffects::default();
        self.collect_single_proxied_delta(to, amount.amount, &mut effects)?;
        Ok(CommonTokensPlan { from: from.clone(), to: to.clone(), amount: *amount, effects })
    }

    pub(crate) fn apply_transfer_to_common_tokens(&mut self, ctx: &LedgerContext, plan: CommonTokensPlan) {
        self.debit_balance(&plan.from, plan.amount.amount);
        if let Some(acc) = self.accounts.get_mut(&plan.to) {
            acc.common_tokens = acc.common_tokens.saturating_add(plan.amount.amount);
        }
        self.credit_expertise(&plan.to, COMMON_DISCIPLINE_ID, plan.amount.amount, ctx.time);
        self.apply_proxy_effects(&plan.effects);
        debug!(from = %plan.from, to = %plan.to, amount = %plan.amount, "transfer to common tokens");
    }
}
