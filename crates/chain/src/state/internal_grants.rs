//! # Discipline Grants
//!
//! `create_grant` memindahkan `amount` dari balance owner ke escrow.
//! Setiap blok dalam `[start_block, end_block]`, `process_grants` membayar
//! `min(per_block, sisa)` ke research group pemilik content aktif di
//! discipline target, proporsional terhadap
//! `tvo.total_active_weight / discipline.total_active_reward_weight`,
//! sehingga jumlah bagian tidak pernah melebihi payout.
//!
//! Grant yang selesai (lewat `end_block` atau escrow habis) mengembalikan
//! sisanya ke owner dan dihapus.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::{ChainState, Grant, LedgerContext};
use crate::asset::{Asset, PRIMARY_SYMBOL};
use crate::error::{LedgerError, Result};
use crate::operation::VirtualOp;
use crate::reward_curve::calculate_share;
use crate::types::{AccountName, DisciplineId, GrantId, ResearchGroupId, ShareType};

impl ChainState {
    pub(crate) fn validate_create_grant(
        &self,
        ctx: &LedgerContext,
        owner: &AccountName,
        target_discipline: DisciplineId,
        amount: &Asset,
        start_block: u64,
        end_block: u64,
    ) -> Result<Grant> {
        amount.ensure_symbol(PRIMARY_SYMBOL)?;
        if amount.amount <= 0 {
            return Err(LedgerError::NonPositiveAmount);
        }
        self.get_discipline(target_discipline)?;
        if start_block > end_block || end_block < ctx.head_block_num {
            return Err(LedgerError::InvalidGrantRange { start: start_block, end: end_block });
        }
        self.check_balance(owner, amount)?;

        let blocks = (end_block - start_block).saturating_add(1);
        let per_block = (amount.amount / blocks.min(i64::MAX as u64) as i64).max(1);
        Ok(Grant {
            id: self.next_ids.grant,
            owner: owner.clone(),
            target_discipline,
            amount: amount.amount,
            per_block,
            start_block,
            end_block,
        })
    }

    pub(crate) fn apply_create_grant(&mut self, grant: Grant) {
        self.next_ids.grant += 1;
        self.debit_balance(&grant.owner, grant.amount);
        debug!(
            grant_id = grant.id,
            owner = %grant.owner,
            discipline = grant.target_discipline,
            amount = grant.amount,
            per_block = grant.per_block,
            "grant created"
        );
        self.grants.insert(grant.id, grant);
    }

    /// Payout grant untuk `ctx.head_block_num`.
    ///
    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. Grant belum mulai → dilewati
    /// 2. `payout = min(per_block, amount)` dibagi ke content aktif discipline target
    /// 3. Grant yang selesai → sisa kembali ke owner, `GrantFinished`
    pub fn process_grants(&mut self, ctx: &LedgerContext) -> Result<Vec<VirtualOp>> {
        let head = ctx.head_block_num;
        let ids: Vec<GrantId> = self.grants.keys().copied().collect();
        let mut ops = Vec::new();

        for id in ids {
            let grant = self.get_grant(id)?.clone();
            if head < grant.start_block {
                continue;
            }

            let mut remaining = grant.amount;
            if head <= grant.end_block && remaining > 0 {
                let payout = grant.per_block.min(remaining);
                let shares = self.plan_grant_payout(grant.target_discipline, payout)?;
                for (group_id, amount) in shares {
                    let amount = amount.min(remaining);
                    if amount <= 0 {
                        break;
                    }
                    if let Some(group) = self.research_groups.get_mut(&group_id) {
                        group.balance = group.balance.saturating_add(amount);
                    }
                    remaining -= amount;
                    ops.push(VirtualOp::GrantPayout { grant_id: id, research_group_id: group_id, amount });
                }
            }

            if head >= grant.end_block || remaining <= 0 {
                self.grants.remove(&id);
                if remaining > 0 {
                    self.credit_balance(&grant.owner, remaining);
                }
                info!(grant_id = id, owner = %grant.owner, refunded = remaining.max(0), "grant finished");
                ops.push(VirtualOp::GrantFinished { grant_id: id, owner: grant.owner.clone(), refunded: remaining.max(0) });
            } else if let Some(g) = self.grants.get_mut(&id) {
                g.amount = remaining;
            }
        }
        Ok(ops)
    }

    /// Bagian tiap research group dari satu payout. Sisa floor tetap di escrow.
    fn plan_grant_payout(&self, discipline_id: DisciplineId, payout: ShareType) -> Result<BTreeMap<ResearchGroupId, ShareType>> {
        let mut shares = BTreeMap::new();
        let discipline = self.get_discipline(discipline_id)?;
        if discipline.total_active_reward_weight == 0 || payout <= 0 {
            return Ok(shares);
        }
        for ((content_id, d), tvo) in &self.total_votes {
            if *d != discipline_id || tvo.total_active_weight == 0 {
                continue;
            }
            let content = self.get_research_content(*content_id)?;
            if !content.is_active() {
                continue;
            }
            let share = calculate_share(
                payout,
                tvo.total_active_weight as u128,
                discipline.total_active_reward_weight as u128,
            )?;
            if share == 0 {
                continue;
            }
            let group_id = self.get_research(content.research_id)?.research_group_id;
            *shares.entry(group_id).or_insert(0) += share;
        }
        Ok(shares)
    }
}
