//! # Research-Group Proposals
//!
//! Proposal hanya dihitung (tally), tidak dieksekusi. Bobot voter adalah
//! jumlah group token yang dipegangnya saat vote.
//!
//! ```text
//! Active ──(voted * 100% >= quorum * total_tokens)──▶ Approved
//!   │
//!   └──(now >= expiration_time, maintenance)─────────▶ Expired
//! ```

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{ChainState, LedgerContext, Proposal, ProposalStatus};
use crate::error::{LedgerError, Result};
use crate::operation::VirtualOp;
use crate::types::{AccountName, ProposalId, ResearchGroupId, TimePointSec, PERCENT_100};

#[derive(Debug, Clone)]
pub(crate) struct ProposalVotePlan {
    pub proposal_id: ProposalId,
    pub voter: AccountName,
    pub total_voted: u32,
    pub approved: bool,
}

impl ChainState {
    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. Group harus ada dan creator memegang group token
    /// 2. `expiration_time - now` dalam `[proposal_min_lifetime, proposal_max_lifetime]`
    /// 3. Quorum di-snapshot dari group saat proposal dibuat
    pub(crate) fn validate_create_proposal(
        &self,
        ctx: &LedgerContext,
        creator: &AccountName,
        research_group_id: ResearchGroupId,
        data: &str,
        expiration_time: TimePointSec,
    ) -> Result<Proposal> {
        // 1.
        let group = self.get_research_group(research_group_id)?;
        if self.group_token_amount(research_group_id, creator) == 0 {
            return Err(LedgerError::NotGroupMember { account: creator.clone(), group: research_group_id });
        }

        // 2.
        let lifetime = expiration_time.saturating_sub(ctx.time);
        let (min, max) = (self.config.proposal_min_lifetime, self.config.proposal_max_lifetime);
        if expiration_time <= ctx.time || lifetime < min || lifetime > max {
            return Err(LedgerError::ProposalLifetimeOutOfRange { min, max, actual: lifetime });
        }

        // 3.
        Ok(Proposal {
            id: self.next_ids.proposal,
            research_group_id,
            creator: creator.clone(),
            data: data.to_string(),
            quorum_percent: group.quorum_percent,
            status: ProposalStatus::Active,
            voted_accounts: BTreeSet::new(),
            total_voted: 0,
            creation_time: ctx.time,
            expiration_time,
        })
    }

    pub(crate) fn apply_create_proposal(&mut self, proposal: Proposal) {
        self.next_ids.proposal += 1;
        debug!(proposal_id = proposal.id, group_id = proposal.research_group_id, creator = %proposal.creator, "proposal created");
        self.proposals.insert(proposal.id, proposal);
    }

    /// # Langkah (URUT - CONSENSUS-CRITICAL)
    ///
    /// 1. Proposal ada, milik group yang disebut, status Active, belum expired
    /// 2. Voter anggota group dan belum pernah vote
    /// 3. `total_voted += group_tokens(voter)`
    /// 4. Approved jika `total_voted * 100% >= quorum_percent * total_tokens`
    pub(crate) fn validate_vote_proposal(
        &self,
        ctx: &LedgerContext,
        voter: &AccountName,
        proposal_id: ProposalId,
        research_group_id: ResearchGroupId,
    ) -> Result<ProposalVotePlan> {
        // 1.
        let proposal = self.get_proposal(proposal_id)?;
        if proposal.research_group_id != research_group_id {
            return Err(LedgerError::InvalidOperation(format!(
                "proposal {} does not belong to research group {}",
                proposal_id, research_group_id
            )));
        }
        if proposal.status != ProposalStatus::Active {
            return Err(LedgerError::ProposalNotActive(proposal_id));
        }
        if ctx.time >= proposal.expiration_time {
            return Err(LedgerError::ProposalExpired(proposal_id));
        }

        // 2.
        let weight = self.group_token_amount(research_group_id, voter);
        if weight == 0 {
            return Err(LedgerError::NotGroupMember { account: voter.clone(), group: research_group_id });
        }
        if proposal.voted_accounts.contains(voter) {
            return Err(LedgerError::AlreadyVotedProposal(voter.clone()));
        }

        // 3. & 4.
        let total_voted = proposal
            .total_voted
            .checked_add(weight)
            .ok_or(LedgerError::Overflow("proposal total_voted"))?;
        let group = self.get_research_group(research_group_id)?;
        let approved = total_voted as u64 * PERCENT_100 as u64 >= proposal.quorum_percent as u64 * group.total_tokens as u64;

        Ok(ProposalVotePlan { proposal_id, voter: voter.clone(), total_voted, approved })
    }

    pub(crate) fn apply_vote_proposal(&mut self, plan: ProposalVotePlan) -> Vec<VirtualOp> {
        let mut ops = Vec::new();
        if let Some(p) = self.proposals.get_mut(&plan.proposal_id) {
            p.voted_accounts.insert(plan.voter.clone());
            p.total_voted = plan.total_voted;
            debug!(proposal_id = p.id, voter = %plan.voter, total_voted = p.total_voted, "proposal vote");
            if plan.approved {
                p.status = ProposalStatus::Approved;
                info!(proposal_id = p.id, group_id = p.research_group_id, "proposal approved");
                ops.push(VirtualOp::ProposalApproved { proposal_id: p.id, research_group_id: p.research_group_id });
            }
        }
        ops
    }

    /// Tandai proposal Active yang sudah lewat `expiration_time`.
    pub(crate) fn expire_proposals(&mut self, ctx: &LedgerContext) -> Vec<VirtualOp> {
        let mut ops = Vec::new();
        for p in self.proposals.values_mut() {
            if p.status == ProposalStatus::Active && p.expiration_time <= ctx.time {
                p.status = ProposalStatus::Expired;
                info!(proposal_id = p.id, "proposal expired");
                ops.push(VirtualOp::ProposalExpired { proposal_id: p.id });
            }
        }
        ops
    }
}
