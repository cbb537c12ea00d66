//! # Common Tokens: power-down, withdraw routes, delegation
//!
//! ```text
//! withdraw_common_tokens(total)
//!   rate = max(total / INTERVALS, 1)
//!   setiap INTERVAL: min(rate, sisa) keluar dari common tokens
//!                    → route (balance / common tokens milik akun lain)
//!                    → sisanya ke balance sendiri
//! ```
//!
//! Delegasi yang dikurangi tidak langsung kembali: masuk antrian expiring
//! dan dikembalikan setelah `delegation_return_period`.

use tracing::{debug, info};

use super::internal_proxy::ProxyEffects;
use super::{ChainState, Delegation, ExpiringDelegation, LedgerContext, WithdrawRoute};
use crate::error::{LedgerError, Result};
use crate::operation::VirtualOp;
use crate::reward_curve::percent_share;
use crate::types::{AccountName, ShareType, COMMON_DISCIPLINE_ID, PERCENT_100, TIME_NEVER};

#[derive(Debug, Clone)]
pub(crate) struct WithdrawPlan {
    pub account: AccountName,
    pub rate: ShareType,
    pub next_withdrawal: u64,
    pub to_withdraw: ShareType,
}

#[derive(Debug, Clone)]
pub(crate) struct WithdrawRoutePlan {
    pub from: AccountName,
    pub to: AccountName,
    /// `None` = route dihapus.
    pub route: Option<WithdrawRoute>,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct DelegationPlan {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    /// `None` = delegation dihapus.
    pub delegation: Option<Delegation>,
    pub delegated_delta: ShareType,
    pub received_delta: ShareType,
    pub expiring: Option<ExpiringDelegation>,
}

impl ChainState {
    // ════════════════════════════════════════════════════════════════════
    // withdraw_common_tokens
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_withdraw_common_tokens(
        &self,
        ctx: &LedgerContext,
        account: &AccountName,
        total: ShareType,
    ) -> Result<WithdrawPlan> {
        let acc = self.get_account(account)?;
        if total < 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let available = acc.common_tokens - acc.delegated_common_tokens;
        if available < total {
            return Err(LedgerError::InsufficientCommonTokens {
                account: account.clone(),
                required: total,
                available,
            });
        }

        // total == 0 menghentikan power-down dan selalu diizinkan.
        if !acc.mined && total != 0 {
            let floor = self
                .config
                .min_account_creation_fee
                .saturating_mul(self.config.power_down_floor_multiplier);
            if acc.common_tokens <= floor {
                return Err(LedgerError::PowerDownFloor(floor));
            }
        }

        if total == 0 {
            if acc.common_tokens_withdraw_rate == 0 {
                return Err(LedgerError::WithdrawRateUnchanged);
            }
            return Ok(WithdrawPlan { account: account.clone(), rate: 0, next_withdrawal: TIME_NEVER, to_withdraw: 0 });
        }

        let rate = (total / self.config.common_tokens_withdraw_intervals as i64).max(1);
        if rate == acc.common_tokens_withdraw_rate {
            return Err(LedgerError::WithdrawRateUnchanged);
        }
        Ok(WithdrawPlan {
            account: account.clone(),
            rate,
            next_withdrawal: ctx.time.saturating_add(self.config.common_tokens_withdraw_interval_seconds),
            to_withdraw: total,
        })
    }

    pub(crate) fn apply_withdraw_common_tokens(&mut self, plan: WithdrawPlan) {
        if let Some(acc) = self.accounts.get_mut(&plan.account) {
            acc.common_tokens_withdraw_rate = plan.rate;
            acc.next_common_tokens_withdrawal = plan.next_withdrawal;
            acc.to_withdraw = plan.to_withdraw;
            acc.withdrawn = 0;
        }
        debug!(account = %plan.account, rate = plan.rate, total = plan.to_withdraw, "power-down schedule updated");
    }

    // ════════════════════════════════════════════════════════════════════
    // set_withdraw_common_tokens_route
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_set_withdraw_route(
        &self,
        from: &AccountName,
        to: &AccountName,
        percent: u16,
        auto_common_token: bool,
    ) -> Result<WithdrawRoutePlan> {
        let from_acc = self.get_account(from)?;
        self.check_account_existence(to)?;
        if percent > PERCENT_100 {
            return Err(LedgerError::InvalidPercent(percent));
        }

        let routes = self.withdraw_routes.get(from);
        let existing = routes.and_then(|r| r.get(to));
        let route = WithdrawRoute {
            from_account: from.clone(),
            to_account: to.clone(),
            percent,
            auto_common_token,
        };

        let plan = match existing {
            None => {
                if percent == 0 {
                    return Err(LedgerError::ZeroPercentRoute);
                }
                if from_acc.withdraw_routes >= self.config.max_withdraw_routes {
                    return Err(LedgerError::TooManyWithdrawRoutes(self.config.max_withdraw_routes));
                }
                WithdrawRoutePlan { from: from.clone(), to: to.clone(), route: Some(route), created: true }
            }
            Some(_) if percent == 0 => WithdrawRoutePlan { from: from.clone(), to: to.clone(), route: None, created: false },
            Some(_) => WithdrawRoutePlan { from: from.clone(), to: to.clone(), route: Some(route), created: false },
        };

        let others: u32 = routes
            .map(|r| r.iter().filter(|(k, _)| *k != to).map(|(_, v)| v.percent as u32).sum())
            .unwrap_or(0);
        if others + percent as u32 > PERCENT_100 as u32 {
            return Err(LedgerError::WithdrawRoutesExceedLimit);
        }
        Ok(plan)
    }

    pub(crate) fn apply_set_withdraw_route(&mut self, plan: WithdrawRoutePlan) {
        match plan.route {
            Some(route) => {
                self.withdraw_routes.entry(plan.from.clone()).or_default().insert(plan.to.clone(), route);
                if plan.created {
                    if let Some(acc) = self.accounts.get_mut(&plan.from) {
                        acc.withdraw_routes += 1;
                    }
                }
            }
            None => {
                if let Some(routes) = self.withdraw_routes.get_mut(&plan.from) {
                    routes.remove(&plan.to);
                    if routes.is_empty() {
                        self.withdraw_routes.remove(&plan.from);
                    }
                }
                if let Some(acc) = self.accounts.get_mut(&plan.from) {
                    acc.withdraw_routes = acc.withdraw_routes.saturating_sub(1);
                }
            }
        }
        debug!(from = %plan.from, to = %plan.to, "withdraw route updated");
    }

    // ════════════════════════════════════════════════════════════════════
    // delegate_common_tokens
    // ════════════════════════════════════════════════════════════════════

    /// # Langkah
    ///
    /// - Baru / naik: delta harus tersedia (`common - delegated - sisa power-down`)
    /// - Turun: delta langsung dikurangi dari delegatee, delegator menunggu
    ///   `delegation_return_period` (expiring delegation)
    /// - Nilai 0 menghapus record delegation
    pub(crate) fn validate_delegate_common_tokens(
        &self,
        ctx: &LedgerContext,
        delegator: &AccountName,
        delegatee: &AccountName,
        amount: ShareType,
    ) -> Result<DelegationPlan> {
        if delegator == delegatee {
            return Err(LedgerError::SelfDelegation);
        }
        if amount < 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        let from = self.get_account(delegator)?;
        self.check_account_existence(delegatee)?;

        let pending_withdraw = (from.to_withdraw - from.withdrawn).max(0);
        let available = from.common_tokens - from.delegated_common_tokens - pending_withdraw;
        let current = self.find_delegation(delegator, delegatee).map(|d| d.common_tokens).unwrap_or(0);
        if amount == current {
            return Err(LedgerError::DelegationUnchanged);
        }

        if amount > current {
            let delta = amount - current;
            if available < delta {
                return Err(LedgerError::InsufficientCommonTokens {
                    account: delegator.clone(),
                    required: delta,
                    available,
                });
            }
            Ok(DelegationPlan {
                delegator: delegator.clone(),
                delegatee: delegatee.clone(),
                delegation: Some(Delegation {
                    delegator: delegator.clone(),
                    delegatee: delegatee.clone(),
                    common_tokens: amount,
                    min_delegation_time: ctx.time,
                }),
                delegated_delta: delta,
                received_delta: delta,
                expiring: None,
            })
        } else {
            let delta = current - amount;
            Ok(DelegationPlan {
                delegator: delegator.clone(),
                delegatee: delegatee.clone(),
                delegation: (amount > 0).then(|| Delegation {
                    delegator: delegator.clone(),
                    delegatee: delegatee.clone(),
                    common_tokens: amount,
                    min_delegation_time: ctx.time,
                }),
                delegated_delta: 0,
                received_delta: -delta,
                expiring: Some(ExpiringDelegation {
                    delegator: delegator.clone(),
                    common_tokens: delta,
                    expiration: ctx.time.saturating_add(self.config.delegation_return_period),
                }),
            })
        }
    }

    pub(crate) fn apply_delegate_common_tokens(&mut self, plan: DelegationPlan) {
        let key = (plan.delegator.clone(), plan.delegatee.clone());
        match plan.delegation {
            Some(d) => {
                self.delegations.insert(key, d);
            }
            None => {
                self.delegations.remove(&key);
            }
        }
        if let Some(acc) = self.accounts.get_mut(&plan.delegator) {
            acc.delegated_common_tokens += plan.delegated_delta;
        }
        if let Some(acc) = self.accounts.get_mut(&plan.delegatee) {
            acc.received_common_tokens += plan.received_delta;
        }
        if let Some(expiring) = plan.expiring {
            let seq = self.next_ids.expiring_delegation;
            self.next_ids.expiring_delegation += 1;
            self.expiring_delegations.insert((expiring.expiration, seq), expiring);
        }
        debug!(delegator = %plan.delegator, delegatee = %plan.delegatee, "delegation updated");
    }

    // ════════════════════════════════════════════════════════════════════
    // MAINTENANCE: delegation returns & power-down fills
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn process_delegation_returns(&mut self, ctx: &LedgerContext) -> Vec<VirtualOp> {
        let mut ops = Vec::new();
        let due: Vec<(u64, u64)> = self
            .expiring_delegations
            .range(..=(ctx.time, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in due {
            if let Some(expiring) = self.expiring_delegations.remove(&key) {
                if let Some(acc) = self.accounts.get_mut(&expiring.delegator) {
                    acc.delegated_common_tokens = (acc.delegated_common_tokens - expiring.common_tokens).max(0);
                }
                ops.push(VirtualOp::ReturnCommonTokensDelegation {
                    account: expiring.delegator,
                    common_tokens: expiring.common_tokens,
                });
            }
        }
        ops
    }

    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// Untuk setiap account dengan `next_common_tokens_withdrawal <= now`:
    /// 1. `amount = min(rate, to_withdraw - withdrawn, common - delegated)`
    /// 2. Setiap route: `percent` dari amount → balance atau common tokens tujuan
    /// 3. Sisanya → balance sendiri
    /// 4. Common tokens & expert token discipline 0 berkurang, proxy weight ikut turun
    /// 5. Jadwal selesai jika `withdrawn >= to_withdraw` atau common tokens habis
    pub(crate) fn process_common_tokens_withdrawals(&mut self, ctx: &LedgerContext) -> Result<Vec<VirtualOp>> {
        let due: Vec<AccountName> = self
            .accounts
            .values()
            .filter(|a| a.common_tokens_withdraw_rate > 0 && a.next_common_tokens_withdrawal <= ctx.time)
            .map(|a| a.name.clone())
            .collect();

        let mut ops = Vec::new();
        for name in due {
            let acc = self.get_account(&name)?;
            let remaining = (acc.to_withdraw - acc.withdrawn).max(0);
            let available = (acc.common_tokens - acc.delegated_common_tokens).max(0);
            let amount = acc.common_tokens_withdraw_rate.min(remaining).min(available);

            let routes: Vec<WithdrawRoute> = self
                .withdraw_routes
                .get(&name)
                .map(|r| r.values().cloned().collect())
                .unwrap_or_default();

            let mut routed = 0;
            for route in routes {
                let deposit = percent_share(amount, route.percent)?;
                if deposit <= 0 {
                    continue;
                }
                routed += deposit;
                if route.auto_common_token {
                    let mut effects = ProxyEffects::default();
                    self.collect_single_proxied_delta(&route.to_account, deposit, &mut effects)?;
                    if let Some(to) = self.accounts.get_mut(&route.to_account) {
                        to.common_tokens = to.common_tokens.saturating_add(deposit);
                    }
                    self.credit_expertise(&route.to_account, COMMON_DISCIPLINE_ID, deposit, ctx.time);
                    self.apply_proxy_effects(&effects);
                } else {
                    self.credit_balance(&route.to_account, deposit);
                }
                ops.push(VirtualOp::FillCommonTokensWithdraw {
                    from_account: name.clone(),
                    to_account: route.to_account.clone(),
                    withdrawn: deposit,
                    deposited: deposit,
                    to_common_tokens: route.auto_common_token,
                });
            }

            let to_self = amount - routed;
            let mut effects = ProxyEffects::default();
            self.collect_single_proxied_delta(&name, -amount, &mut effects)?;
            self.apply_proxy_effects(&effects);
            self.debit_expertise(&name, COMMON_DISCIPLINE_ID, amount);
            self.credit_balance(&name, to_self);

            let interval = self.config.common_tokens_withdraw_interval_seconds;
            if let Some(acc) = self.accounts.get_mut(&name) {
                acc.common_tokens -= amount;
                acc.withdrawn += amount;
                if acc.withdrawn >= acc.to_withdraw || acc.common_tokens <= acc.delegated_common_tokens {
                    acc.common_tokens_withdraw_rate = 0;
                    acc.next_common_tokens_withdrawal = TIME_NEVER;
                    info!(account = %name, withdrawn = acc.withdrawn, "power-down completed");
                } else {
                    acc.next_common_tokens_withdrawal = acc.next_common_tokens_withdrawal.saturating_add(interval);
                }
            }

            ops.push(VirtualOp::FillCommonTokensWithdraw {
                from_account: name.clone(),
                to_account: name.clone(),
                withdrawn: amount,
                deposited: to_self,
                to_common_tokens: false,
            });
        }
        Ok(ops)
    }
}
