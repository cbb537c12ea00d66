//! # Per-Block Maintenance
//!
//! `process_block` dijalankan sekali per blok setelah semua transaksi.
//!
//! ## Urutan (CONSENSUS-CRITICAL)
//!
//! | # | Langkah | Virtual op |
//! |---|---------|------------|
//! | 1 | hapus recovery request yang kedaluwarsa | - |
//! | 2 | terapkan change-recovery request yang jatuh tempo | - |
//! | 3 | pangkas owner history di luar `owner_auth_recovery_period` | - |
//! | 4 | kembalikan expiring delegation | `ReturnCommonTokensDelegation` |
//! | 5 | isi power-down yang jatuh tempo | `FillCommonTokensWithdraw` |
//! | 6 | nonaktifkan content di luar activity window | `ResearchContentDeactivated` |
//! | 7 | tandai proposal yang kedaluwarsa | `ProposalExpired` |
//!
//! Pass ini atomik: jika satu langkah gagal, state dan context dikembalikan
//! ke kondisi sebelum pass.

use tracing::{debug, info, warn};

use super::{ActivityState, ChainState, LedgerContext};
use crate::error::Result;
use crate::operation::VirtualOp;
use crate::types::{AccountName, ContentId};

impl ChainState {
    pub fn process_block(&mut self, ctx: &mut LedgerContext) -> Result<Vec<VirtualOp>> {
        let state_backup = self.clone();
        let ctx_backup = ctx.clone();
        match self.run_maintenance(ctx) {
            Ok(ops) => {
                debug!(block = ctx.head_block_num, virtual_ops = ops.len(), "maintenance pass completed");
                Ok(ops)
            }
            Err(e) => {
                warn!(block = ctx.head_block_num, error = %e, "maintenance pass failed, state restored");
                *self = state_backup;
                *ctx = ctx_backup;
                Err(e)
            }
        }
    }

    fn run_maintenance(&mut self, ctx: &mut LedgerContext) -> Result<Vec<VirtualOp>> {
        let mut ops = Vec::new();

        // 1.
        self.recovery_requests.retain(|_, r| r.expires > ctx.time);

        // 2.
        self.apply_due_recovery_account_changes(ctx);

        // 3.
        let retention = self.config.owner_auth_recovery_period;
        for history in self.owner_history.values_mut() {
            history.retain(|h| h.last_valid_time.saturating_add(retention) >= ctx.time);
        }
        self.owner_history.retain(|_, h| !h.is_empty());

        // 4.
        ops.extend(self.process_delegation_returns(ctx));

        // 5.
        ops.extend(self.process_common_tokens_withdrawals(ctx)?);

        // 6.
        ops.extend(self.expire_content_activity(ctx));

        // 7.
        ops.extend(self.expire_proposals(ctx));

        Ok(ops)
    }

    fn apply_due_recovery_account_changes(&mut self, ctx: &LedgerContext) {
        let due: Vec<AccountName> = self
            .change_recovery_requests
            .values()
            .filter(|r| r.effective_on <= ctx.time)
            .map(|r| r.account_to_recover.clone())
            .collect();
        for name in due {
            if let Some(request) = self.change_recovery_requests.remove(&name) {
                if let Some(acc) = self.accounts.get_mut(&name) {
                    acc.recovery_account = Some(request.recovery_account.clone());
                }
                info!(account = %name, recovery_account = %request.recovery_account, "recovery account changed");
            }
        }
    }

    /// Content yang keluar dari activity window berhenti menerima reward.
    /// Bobot aktif agregatnya dikurangkan dari discipline dan context.
    fn expire_content_activity(&mut self, ctx: &mut LedgerContext) -> Vec<VirtualOp> {
        let expired: Vec<ContentId> = self
            .research_contents
            .values()
            .filter(|c| c.is_active() && c.activity_window_end <= ctx.time)
            .map(|c| c.id)
            .collect();

        let mut ops = Vec::new();
        for content_id in expired {
            if let Some(content) = self.research_contents.get_mut(&content_id) {
                content.activity_state = ActivityState::Inactive;
            }
            for ((_, d), tvo) in self.total_votes.range_mut((content_id, 0)..=(content_id, u64::MAX)) {
                if let Some(discipline) = self.disciplines.get_mut(d) {
                    discipline.total_active_reward_weight =
                        discipline.total_active_reward_weight.saturating_sub(tvo.total_active_weight);
                    discipline.total_active_research_reward_weight = discipline
                        .total_active_research_reward_weight
                        .saturating_sub(tvo.total_active_research_reward_weight);
                }
                ctx.total_active_disciplines_reward_weight =
                    ctx.total_active_disciplines_reward_weight.saturating_sub(tvo.total_active_weight);
                tvo.total_active_weight = 0;
                tvo.total_active_research_reward_weight = 0;
                tvo.total_active_curators_reward_weight = 0;
            }
            info!(content_id, "research content deactivated");
            ops.push(VirtualOp::ResearchContentDeactivated { research_content_id: content_id });
        }
        ops
    }
}
