//! # Operations & Virtual Operations
//!
//! `Operation` adalah payload yang diterima dispatcher (`ChainState::apply_operation`).
//! Verifikasi signature dilakukan di luar core; core hanya melaporkan
//! authority mana yang dibutuhkan melalui `required_authorities()`.
//!
//! `VirtualOp` adalah record notifikasi yang dihasilkan oleh transisi
//! (fill power-down, reward, dll). Tidak pernah masuk dari luar.

use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::error::{LedgerError, Result};
use crate::state::{ChainProperties, ContentType};
use crate::types::{
    AccountName, Authority, ContentId, DisciplineId, GrantId, ProposalId, PublicKey,
    ResearchGroupId, ResearchId, ReviewId, ShareType, TimePointSec,
};

/// Payload variants untuk seluruh operasi yang dikenal ledger.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    // ── accounts ───────────────────────────────────────────────────────
    AccountCreate {
        fee: Asset,
        creator: AccountName,
        new_account_name: AccountName,
        owner: Authority,
        active: Authority,
        posting: Authority,
        memo_key: PublicKey,
        #[serde(default)]
        json_metadata: String,
    },

    AccountUpdate {
        account: AccountName,
        #[serde(default)]
        owner: Option<Authority>,
        #[serde(default)]
        active: Option<Authority>,
        #[serde(default)]
        posting: Option<Authority>,
        memo_key: PublicKey,
        #[serde(default)]
        json_metadata: String,
    },

    Transfer {
        from: AccountName,
        to: AccountName,
        amount: Asset,
        #[serde(default)]
        memo: String,
    },

    /// `to == None` berarti ke akun pengirim sendiri.
    TransferToCommonTokens {
        from: AccountName,
        #[serde(default)]
        to: Option<AccountName>,
        amount: Asset,
    },

    /// Total 0 menghentikan power-down yang sedang berjalan.
    WithdrawCommonTokens {
        account: AccountName,
        total_common_tokens_amount: ShareType,
    },

    SetWithdrawCommonTokensRoute {
        from_account: AccountName,
        to_account: AccountName,
        percent: u16,
        auto_common_token: bool,
    },

    DelegateCommonTokens {
        delegator: AccountName,
        delegatee: AccountName,
        common_tokens: ShareType,
    },

    // ── witness ────────────────────────────────────────────────────────
    /// `proxy == None` mengembalikan voting ke akun sendiri.
    AccountWitnessProxy {
        account: AccountName,
        #[serde(default)]
        proxy: Option<AccountName>,
    },

    WitnessUpdate {
        owner: AccountName,
        url: String,
        block_signing_key: PublicKey,
        #[serde(default)]
        props: ChainProperties,
    },

    AccountWitnessVote {
        account: AccountName,
        witness: AccountName,
        approve: bool,
    },

    // ── recovery ───────────────────────────────────────────────────────
    RequestAccountRecovery {
        recovery_account: AccountName,
        account_to_recover: AccountName,
        new_owner_authority: Authority,
    },

    RecoverAccount {
        account_to_recover: AccountName,
        new_owner_authority: Authority,
        recent_owner_authority: Authority,
    },

    ChangeRecoveryAccount {
        account_to_recover: AccountName,
        new_recovery_account: AccountName,
    },

    // ── voting engine ──────────────────────────────────────────────────
    Vote {
        voter: AccountName,
        discipline_id: DisciplineId,
        /// Basis point bertanda, -10000..=10000.
        weight: i16,
        research_id: ResearchId,
        research_content_id: ContentId,
    },

    VoteForReview {
        voter: AccountName,
        discipline_id: DisciplineId,
        weight: i16,
        review_id: ReviewId,
    },

    MakeReview {
        author: AccountName,
        research_content_id: ContentId,
        content: String,
        is_positive: bool,
        #[serde(default)]
        references: Vec<ContentId>,
        #[serde(default)]
        external_references: Vec<String>,
    },

    // ── research hierarchy ─────────────────────────────────────────────
    CreateResearchGroup {
        creator: AccountName,
        name: String,
        permlink: String,
        #[serde(default)]
        description: String,
        quorum_percent: u16,
    },

    CreateResearch {
        creator: AccountName,
        research_group_id: ResearchGroupId,
        title: String,
        #[serde(default)]
        abstract_text: String,
        permlink: String,
        review_share_in_percent: u16,
        disciplines: Vec<DisciplineId>,
    },

    CreateResearchContent {
        creator: AccountName,
        research_id: ResearchId,
        content_type: ContentType,
        title: String,
        content: String,
        permlink: String,
        authors: Vec<AccountName>,
        #[serde(default)]
        references: Vec<ContentId>,
        #[serde(default)]
        external_references: Vec<String>,
    },

    /// `from_research_owned == true`: anggota group mengalokasikan token dari
    /// `owned_tokens` research. Selain itu `sender` mentransfer miliknya sendiri.
    TransferResearchTokens {
        research_id: ResearchId,
        sender: AccountName,
        receiver: AccountName,
        amount: u16,
        #[serde(default)]
        from_research_owned: bool,
    },

    AddExpertiseTokens {
        owner: AccountName,
        account_name: AccountName,
        disciplines_to_add: Vec<(DisciplineId, ShareType)>,
    },

    // ── grants & proposals ─────────────────────────────────────────────
    CreateGrant {
        owner: AccountName,
        target_discipline: DisciplineId,
        amount: Asset,
        start_block: u64,
        end_block: u64,
    },

    CreateProposal {
        creator: AccountName,
        research_group_id: ResearchGroupId,
        #[serde(default)]
        data: String,
        expiration_time: TimePointSec,
    },

    VoteProposal {
        voter: AccountName,
        proposal_id: ProposalId,
        research_group_id: ResearchGroupId,
    },
}

/// Authority yang harus ditandatangani untuk satu operasi.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredAuthorities {
    pub owner: Vec<AccountName>,
    pub active: Vec<AccountName>,
    pub posting: Vec<AccountName>,
    /// Authority literal (recover_account membutuhkan new + recent owner).
    pub other: Vec<Authority>,
}

impl Operation {
    /// Decode satu operasi dari JSON (format `{"vote": {...}}`).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::InvalidOperation(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LedgerError::InvalidOperation(e.to_string()))
    }

    /// Nama operasi snake_case (untuk logging).
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AccountCreate { .. } => "account_create",
            Operation::AccountUpdate { .. } => "account_update",
            Operation::Transfer { .. } => "transfer",
            Operation::TransferToCommonTokens { .. } => "transfer_to_common_tokens",
            Operation::WithdrawCommonTokens { .. } => "withdraw_common_tokens",
            Operation::SetWithdrawCommonTokensRoute { .. } => "set_withdraw_common_tokens_route",
            Operation::DelegateCommonTokens { .. } => "delegate_common_tokens",
            Operation::AccountWitnessProxy { .. } => "account_witness_proxy",
            Operation::WitnessUpdate { .. } => "witness_update",
            Operation::AccountWitnessVote { .. } => "account_witness_vote",
            Operation::RequestAccountRecovery { .. } => "request_account_recovery",
            Operation::RecoverAccount { .. } => "recover_account",
            Operation::ChangeRecoveryAccount { .. } => "change_recovery_account",
            Operation::Vote { .. } => "vote",
            Operation::VoteForReview { .. } => "vote_for_review",
            Operation::MakeReview { .. } => "make_review",
            Operation::CreateResearchGroup { .. } => "create_research_group",
            Operation::CreateResearch { .. } => "create_research",
            Operation::CreateResearchContent { .. } => "create_research_content",
            Operation::TransferResearchTokens { .. } => "transfer_research_tokens",
            Operation::AddExpertiseTokens { .. } => "add_expertise_tokens",
            Operation::CreateGrant { .. } => "create_grant",
            Operation::CreateProposal { .. } => "create_proposal",
            Operation::VoteProposal { .. } => "vote_proposal",
        }
    }

    pub fn required_authorities(&self) -> RequiredAuthorities {
        let mut req = RequiredAuthorities::default();
        match self {
            Operation::AccountCreate { creator, .. } => req.active.push(creator.clone()),
            Operation::AccountUpdate { account, owner, .. } => {
                if owner.is_some() {
                    req.owner.push(account.clone());
                } else {
                    req.active.push(account.clone());
                }
            }
            Operation::Transfer { from, .. } => req.active.push(from.clone()),
            Operation::TransferToCommonTokens { from, .. } => req.active.push(from.clone()),
            Operation::WithdrawCommonTokens { account, .. } => req.active.push(account.clone()),
            Operation::SetWithdrawCommonTokensRoute { from_account, .. } => {
                req.active.push(from_account.clone())
            }
            Operation::DelegateCommonTokens { delegator, .. } => req.active.push(delegator.clone()),
            Operation::AccountWitnessProxy { account, .. } => req.active.push(account.clone()),
            Operation::WitnessUpdate { owner, .. } => req.active.push(owner.clone()),
            Operation::AccountWitnessVote { account, .. } => req.active.push(account.clone()),
            Operation::RequestAccountRecovery { recovery_account, .. } => {
                req.active.push(recovery_account.clone())
            }
            Operation::RecoverAccount { new_owner_authority, recent_owner_authority, .. } => {
                req.other.push(new_owner_authority.clone());
                req.other.push(recent_owner_authority.clone());
            }
            Operation::ChangeRecoveryAccount { account_to_recover, .. } => {
                req.owner.push(account_to_recover.clone())
            }
            Operation::Vote { voter, .. } => req.posting.push(voter.clone()),
            Operation::VoteForReview { voter, .. } => req.posting.push(voter.clone()),
            Operation::MakeReview { author, .. } => req.posting.push(author.clone()),
            Operation::CreateResearchGroup { creator, .. } => req.active.push(creator.clone()),
            Operation::CreateResearch { creator, .. } => req.active.push(creator.clone()),
            Operation::CreateResearchContent { creator, .. } => req.posting.push(creator.clone()),
            Operation::TransferResearchTokens { sender, .. } => req.active.push(sender.clone()),
            Operation::AddExpertiseTokens { owner, .. } => req.active.push(owner.clone()),
            Operation::CreateGrant { owner, .. } => req.active.push(owner.clone()),
            Operation::CreateProposal { creator, .. } => req.posting.push(creator.clone()),
            Operation::VoteProposal { voter, .. } => req.posting.push(voter.clone()),
        }
        req
    }
}

/// Notifikasi hasil transisi. Dikembalikan ke caller, tidak disimpan di state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VirtualOp {
    FillCommonTokensWithdraw {
        from_account: AccountName,
        to_account: AccountName,
        withdrawn: ShareType,
        deposited: ShareType,
        to_common_tokens: bool,
    },
    ReturnCommonTokensDelegation {
        account: AccountName,
        common_tokens: ShareType,
    },
    ResearchContentReward {
        research_content_id: ContentId,
        discipline_id: DisciplineId,
        reward: ShareType,
    },
    CurationReward {
        curator: AccountName,
        research_content_id: ContentId,
        reward: ShareType,
    },
    ReviewReward {
        author: AccountName,
        review_id: ReviewId,
        reward: ShareType,
    },
    ReviewVoterReward {
        voter: AccountName,
        review_id: ReviewId,
        reward: ShareType,
    },
    ResearchGroupReward {
        research_group_id: ResearchGroupId,
        research_id: ResearchId,
        reward: ShareType,
    },
    ResearchTokenHolderReward {
        account: AccountName,
        research_id: ResearchId,
        reward: ShareType,
    },
    ExpertiseReward {
        account: AccountName,
        discipline_id: DisciplineId,
        amount: ShareType,
    },
    GrantPayout {
        grant_id: GrantId,
        research_group_id: ResearchGroupId,
        amount: ShareType,
    },
    GrantFinished {
        grant_id: GrantId,
        owner: AccountName,
        refunded: ShareType,
    },
    ProposalApproved {
        proposal_id: ProposalId,
        research_group_id: ResearchGroupId,
    },
    ProposalExpired {
        proposal_id: ProposalId,
    },
    ResearchContentDeactivated {
        research_content_id: ContentId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    #[test]
    fn test_operation_from_json() {
        let json = r#"{"vote":{"voter":"alice","discipline_id":7,"weight":10000,"research_id":1,"research_content_id":2}}"#;
        let op = Operation::from_json(json).unwrap();
        assert_eq!(
            op,
            Operation::Vote {
                voter: name("alice"),
                discipline_id: 7,
                weight: 10_000,
                research_id: 1,
                research_content_id: 2,
            }
        );
        assert_eq!(op.name(), "vote");
    }

    #[test]
    fn test_operation_from_json_rejects_bad_account() {
        let json = r#"{"transfer":{"from":"A","to":"bob","amount":{"amount":1,"symbol":0}}}"#;
        assert!(matches!(Operation::from_json(json), Err(LedgerError::InvalidOperation(_))));
    }

    #[test]
    fn test_required_authorities() {
        let op = Operation::AccountUpdate {
            account: name("alice"),
            owner: Some(Authority::single_account(name("bob"))),
            active: None,
            posting: None,
            memo_key: PublicKey::default(),
            json_metadata: String::new(),
        };
        assert_eq!(op.required_authorities().owner, vec![name("alice")]);

        let vote = Operation::Vote {
            voter: name("carol"),
            discipline_id: 1,
            weight: 100,
            research_id: 0,
            research_content_id: 0,
        };
        let req = vote.required_authorities();
        assert_eq!(req.posting, vec![name("carol")]);
        assert!(req.active.is_empty());
    }
}
