//! # Operation Dispatch
//!
//! `apply_operation` adalah satu-satunya pintu masuk evaluator. Setiap
//! cabang menjalankan `validate_*` (read-only) lalu `apply_*` (infallible),
//! sehingga operasi yang gagal tidak pernah meninggalkan mutasi parsial.
//!
//! `apply_transaction` memperluas jaminan itu ke daftar operasi:
//! all-or-nothing, state dan context dikembalikan saat error pertama.

use tracing::{debug, warn};

use super::{ChainState, LedgerContext};
use crate::error::Result;
use crate::operation::{Operation, VirtualOp};

impl ChainState {
    /// Jalankan satu operasi terhadap state.
    ///
    /// Mengembalikan virtual op yang dihasilkan (kosong untuk sebagian
    /// besar operasi).
    pub fn apply_operation(&mut self, ctx: &mut LedgerContext, op: &Operation) -> Result<Vec<VirtualOp>> {
        debug!(op = op.name(), time = ctx.time, block = ctx.head_block_num, "applying operation");
        let mut ops = Vec::new();

        match op {
            // ── accounts ───────────────────────────────────────────────
            Operation::AccountCreate { fee, creator, new_account_name, owner, active, posting, memo_key, json_metadata } => {
                let plan = self.validate_account_create(
                    ctx,
                    fee,
                    creator,
                    new_account_name,
                    owner,
                    active,
                    posting,
                    memo_key,
                    json_metadata,
                )?;
                self.apply_account_create(ctx, plan);
            }
            Operation::AccountUpdate { account, owner, active, posting, memo_key, json_metadata } => {
                let plan = self.validate_account_update(
                    ctx,
                    account,
                    owner.as_ref(),
                    active.as_ref(),
                    posting.as_ref(),
                    memo_key,
                    json_metadata,
                )?;
                self.apply_account_update(ctx, plan);
            }
            Operation::Transfer { from, to, amount, .. } => {
                let plan = self.validate_transfer(from, to, amount)?;
                self.apply_transfer(plan);
            }
            Operation::TransferToCommonTokens { from, to, amount } => {
                let plan = self.validate_transfer_to_common_tokens(from, to.as_ref(), amount)?;
                self.apply_transfer_to_common_tokens(ctx, plan);
            }
            Operation::WithdrawCommonTokens { account, total_common_tokens_amount } => {
                let plan = self.validate_withdraw_common_tokens(ctx, account, *total_common_tokens_amount)?;
                self.apply_withdraw_common_tokens(plan);
            }
            Operation::SetWithdrawCommonTokensRoute { from_account, to_account, percent, auto_common_token } => {
                let plan = self.validate_set_withdraw_route(from_account, to_account, *percent, *auto_common_token)?;
                self.apply_set_withdraw_route(plan);
            }
            Operation::DelegateCommonTokens { delegator, delegatee, common_tokens } => {
                let plan = self.validate_delegate_common_tokens(ctx, delegator, delegatee, *common_tokens)?;
                self.apply_delegate_common_tokens(plan);
            }

            // ── witness ────────────────────────────────────────────────
            Operation::AccountWitnessProxy { account, proxy } => {
                let plan = self.validate_account_witness_proxy(account, proxy.as_ref())?;
                self.apply_account_witness_proxy(plan);
            }
            Operation::WitnessUpdate { owner, url, block_signing_key, props } => {
                self.validate_witness_update(owner, url, props)?;
                self.apply_witness_update(ctx, owner, url, block_signing_key, props);
            }
            Operation::AccountWitnessVote { account, witness, approve } => {
                let plan = self.validate_account_witness_vote(account, witness, *approve)?;
                self.apply_account_witness_vote(plan);
            }

            // ── recovery ───────────────────────────────────────────────
            Operation::RequestAccountRecovery { recovery_account, account_to_recover, new_owner_authority } => {
                let plan = self.validate_request_account_recovery(
                    ctx,
                    recovery_account,
                    account_to_recover,
                    new_owner_authority,
                )?;
                self.apply_request_account_recovery(plan);
            }
            Operation::RecoverAccount { account_to_recover, new_owner_authority, recent_owner_authority } => {
                let plan = self.validate_recover_account(
                    ctx,
                    account_to_recover,
                    new_owner_authority,
                    recent_owner_authority,
                )?;
                self.apply_recover_account(ctx, plan);
            }
            Operation::ChangeRecoveryAccount { account_to_recover, new_recovery_account } => {
                let plan = self.validate_change_recovery_account(ctx, account_to_recover, new_recovery_account)?;
                self.apply_change_recovery_account(plan);
            }

            // ── voting engine ──────────────────────────────────────────
            Operation::Vote { voter, discipline_id, weight, research_id, research_content_id } => {
                let plan = self.validate_vote(ctx, voter, *discipline_id, *weight, *research_id, *research_content_id)?;
                self.apply_vote(ctx, plan);
            }
            Operation::VoteForReview { voter, discipline_id, weight, review_id } => {
                let plan = self.validate_vote_for_review(ctx, voter, *discipline_id, *weight, *review_id)?;
                self.apply_vote_for_review(ctx, plan);
            }
            Operation::MakeReview { author, research_content_id, content, is_positive, references, external_references } => {
                let plan = self.validate_make_review(
                    ctx,
                    author,
                    *research_content_id,
                    content,
                    *is_positive,
                    references,
                    external_references,
                )?;
                self.apply_make_review(ctx, plan);
            }

            // ── research hierarchy ─────────────────────────────────────
            Operation::CreateResearchGroup { creator, name, permlink, description, quorum_percent } => {
                let group = self.validate_create_research_group(creator, name, permlink, description, *quorum_percent)?;
                self.apply_create_research_group(creator, group);
            }
            Operation::CreateResearch {
                creator,
                research_group_id,
                title,
                abstract_text,
                permlink,
                review_share_in_percent,
                disciplines,
            } => {
                let research = self.validate_create_research(
                    ctx,
                    creator,
                    *research_group_id,
                    title,
                    abstract_text,
                    permlink,
                    *review_share_in_percent,
                    disciplines,
                )?;
                self.apply_create_research(research);
            }
            Operation::CreateResearchContent {
                creator,
                research_id,
                content_type,
                title,
                content,
                permlink,
                authors,
                references,
                external_references,
            } => {
                let record = self.validate_create_research_content(
                    ctx,
                    creator,
                    *research_id,
                    *content_type,
                    title,
                    content,
                    permlink,
                    authors,
                    references,
                    external_references,
                )?;
                self.apply_create_research_content(record);
            }
            Operation::TransferResearchTokens { research_id, sender, receiver, amount, from_research_owned } => {
                let plan = self.validate_transfer_research_tokens(
                    *research_id,
                    sender,
                    receiver,
                    *amount,
                    *from_research_owned,
                )?;
                self.apply_transfer_research_tokens(plan);
            }
            Operation::AddExpertiseTokens { owner, account_name, disciplines_to_add } => {
                let plan = self.validate_add_expertise_tokens(owner, account_name, disciplines_to_add)?;
                self.apply_add_expertise_tokens(ctx.time, plan);
            }

            // ── grants & proposals ─────────────────────────────────────
            Operation::CreateGrant { owner, target_discipline, amount, start_block, end_block } => {
                let grant = self.validate_create_grant(ctx, owner, *target_discipline, amount, *start_block, *end_block)?;
                self.apply_create_grant(grant);
            }
            Operation::CreateProposal { creator, research_group_id, data, expiration_time } => {
                let proposal = self.validate_create_proposal(ctx, creator, *research_group_id, data, *expiration_time)?;
                self.apply_create_proposal(proposal);
            }
            Operation::VoteProposal { voter, proposal_id, research_group_id } => {
                let plan = self.validate_vote_proposal(ctx, voter, *proposal_id, *research_group_id)?;
                ops.extend(self.apply_vote_proposal(plan));
            }
        }

        Ok(ops)
    }

    /// Terapkan `operations` secara berurutan, all-or-nothing.
    ///
    /// Error pertama mengembalikan state DAN context ke kondisi sebelum
    /// transaksi, lalu error tersebut diteruskan tanpa diubah.
    pub fn apply_transaction(&mut self, ctx: &mut LedgerContext, operations: &[Operation]) -> Result<Vec<VirtualOp>> {
        let state_backup = self.clone();
        let ctx_backup = ctx.clone();
        let mut virtual_ops = Vec::new();

        for (index, op) in operations.iter().enumerate() {
            match self.apply_operation(ctx, op) {
                Ok(produced) => virtual_ops.extend(produced),
                Err(e) => {
                    warn!(index, op = op.name(), error = %e, "transaction rolled back");
                    *self = state_backup;
                    *ctx = ctx_backup;
                    return Err(e);
                }
            }
        }
        Ok(virtual_ops)
    }
}
