//! Expert token: regenerasi voting power & registrar grants

use tracing::debug;

use super::{ChainState, ExpertToken};
use crate::error::{LedgerError, Result};
use crate::reward_curve::regenerated_voting_power;
use crate::types::{AccountName, DisciplineId, ShareType, TimePointSec};

/// Hasil perhitungan voting power untuk satu vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VotingPowerUse {
    /// Power setelah regenerasi, sebelum vote.
    pub current_power: u16,
    /// `current_power * |w| / 100%`
    pub used_power: u16,
    /// Power baru token: `current_power - used_power / divisor`
    pub new_power: u16,
    /// `floor(amount * used_power / 100%)`
    pub abs_used_tokens: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct AddExpertisePlan {
    pub account: AccountName,
    pub grants: Vec<(DisciplineId, ShareType)>,
}

impl ChainState {
    /// Voting power token saat `now`, dihitung lazily.
    pub fn current_voting_power(&self, token: &ExpertToken, now: TimePointSec) -> u16 {
        regenerated_voting_power(
            token.voting_power,
            token.last_vote_time,
            now,
            self.config.vote_regeneration_seconds,
        )
    }

    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. `current_power == 0` → `InsufficientVotingPower`
    /// 2. `weight == 0` atau `|weight| > 100%` → `InvalidVoteWeight`
    /// 3. `used = current * |w| / 100%`, `new = current - used / divisor`
    /// 4. `tokens = floor(amount * used / 100%)` (u128); 0 → `ZeroWeightVote`
    pub(crate) fn compute_voting_power_use(
        &self,
        token: &ExpertToken,
        weight: i16,
        now: TimePointSec,
    ) -> Result<VotingPowerUse> {
        let current_power = self.current_voting_power(token, now);
        if current_power == 0 {
            return Err(LedgerError::InsufficientVotingPower);
        }
        if weight == 0 || weight.unsigned_abs() > crate::types::PERCENT_100 {
            return Err(LedgerError::InvalidVoteWeight);
        }

        let abs_weight = weight.unsigned_abs() as u32;
        let used_power = ((current_power as u32 * abs_weight) / crate::types::PERCENT_100 as u32) as u16;
        let cost = used_power as i64 / self.config.vote_power_cost_divisor;
        let new_power = (current_power as i64 - cost).max(0) as u16;

        let amount = u128::try_from(token.amount.max(0)).map_err(|_| LedgerError::Overflow("expert token amount"))?;
        let abs_used_tokens = u64::try_from((amount * used_power as u128) / crate::types::PERCENT_100 as u128)
            .map_err(|_| LedgerError::Overflow("abs_used_tokens"))?;
        if abs_used_tokens == 0 {
            return Err(LedgerError::ZeroWeightVote);
        }

        Ok(VotingPowerUse { current_power, used_power, new_power, abs_used_tokens })
    }

    /// Catat pemakaian voting power ke token. Infallible.
    pub(crate) fn spend_voting_power(
        &mut self,
        account: &AccountName,
        discipline_id: DisciplineId,
        new_power: u16,
        now: TimePointSec,
    ) {
        if let Some(token) = self.expert_tokens.get_mut(account).and_then(|m| m.get_mut(&discipline_id)) {
            token.voting_power = new_power;
            token.last_vote_time = now;
        }
    }

    /// Tambah expert token; dibuat jika belum ada (voting power 100%).
    pub(crate) fn credit_expertise(
        &mut self,
        account: &AccountName,
        discipline_id: DisciplineId,
        amount: ShareType,
        now: TimePointSec,
    ) {
        let token = self
            .expert_tokens
            .entry(account.clone())
            .or_default()
            .entry(discipline_id)
            .or_insert_with(|| ExpertToken::new(account.clone(), discipline_id, 0, now));
        token.amount = token.amount.saturating_add(amount);
    }

    /// Kurangi expert token (power-down discipline 0). Tidak pernah di bawah nol.
    pub(crate) fn debit_expertise(&mut self, account: &AccountName, discipline_id: DisciplineId, amount: ShareType) {
        if let Some(token) = self.expert_tokens.get_mut(account).and_then(|m| m.get_mut(&discipline_id)) {
            token.amount = (token.amount - amount).max(0);
        }
    }

    // ════════════════════════════════════════════════════════════════════
    // add_expertise_tokens (registrar only)
    // ════════════════════════════════════════════════════════════════════

    pub(crate) fn validate_add_expertise_tokens(
        &self,
        owner: &AccountName,
        account_name: &AccountName,
        disciplines_to_add: &[(DisciplineId, ShareType)],
    ) -> Result<AddExpertisePlan> {
        self.check_account_existence(owner)?;
        if owner != &self.config.registrar {
            return Err(LedgerError::NotRegistrar);
        }
        self.check_account_existence(account_name)?;
        for (discipline_id, amount) in disciplines_to_add {
            self.get_discipline(*discipline_id)?;
            if *amount <= 0 {
                return Err(LedgerError::NonPositiveAmount);
            }
            let existing = self.find_expert_token(account_name, *discipline_id).map(|t| t.amount).unwrap_or(0);
            existing.checked_add(*amount).ok_or(LedgerError::Overflow("expert token amount"))?;
        }
        Ok(AddExpertisePlan { account: account_name.clone(), grants: disciplines_to_add.to_vec() })
    }

    pub(crate) fn apply_add_expertise_tokens(&mut self, now: TimePointSec, plan: AddExpertisePlan) {
        for (discipline_id, amount) in plan.grants {
            self.credit_expertise(&plan.account, discipline_id, amount, now);
            debug!(account = %plan.account, discipline_id, amount, "expertise tokens added");
        }
    }
}
