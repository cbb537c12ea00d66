//! # Ledger State Management Module
//!
//! Module ini adalah **ENTRY POINT** dan **FACADE** untuk seluruh state
//! ledger: account, expert token, voting engine, research hierarchy, dan
//! reward distribution.
//!
//! ## Arsitektur
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         mod.rs (FACADE)                         │
//! │  - ChainState struct definition                                 │
//! │  - Constructor new() / from_genesis()                           │
//! │  - get_* / find_* accessors                                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │   Account    │         │ Expert Token │         │   Research   │
//!  │  + Recovery  │         │  + Voting    │         │  Hierarchy   │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!          │                         │                         │
//!          ▼                         ▼                         ▼
//!  ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!  │ Proxy/Witness│         │   Rewards    │         │  Proposals   │
//!  │   Withdraw   │         │   + Grants   │         │ (tally only) │
//!  └──────────────┘         └──────────────┘         └──────────────┘
//!                                    │
//!                                    ▼
//!                  ┌──────────────────────────────────┐
//!                  │ Payload dispatch / Maintenance / │
//!                  │     State Root / Snapshot        │
//!                  └──────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `internal_model` | Record types, `LedgerContext`, `Genesis` |
//! | `internal_account` | account_create, account_update, transfer, transfer_to_common_tokens |
//! | `internal_proxy` | update_voting_proxy, adjust_proxied_witness_votes |
//! | `internal_witness` | witness_update, account_witness_vote, top witness |
//! | `internal_recovery` | request/recover/change recovery account |
//! | `internal_withdraw` | power-down, withdraw routes, delegation |
//! | `internal_expert_token` | regenerasi voting power, add_expertise_tokens |
//! | `internal_vote` | vote, vote_for_review, make_review |
//! | `internal_research` | research group, research, content, research token |
//! | `internal_rewards` | distribute_reward (reward pass) |
//! | `internal_grants` | create_grant, process_grants |
//! | `internal_proposal` | create_proposal, vote_proposal, expiry |
//! | `internal_maintenance` | process_block |
//! | `internal_payload` | apply_operation, apply_transaction |
//! | `internal_state_root` | compute_state_root (bincode + SHA3-512) |
//! | `internal_snapshot` | export/import snapshot ke disk |
//!
//! ## Validate → Apply
//!
//! Setiap evaluator dipecah menjadi `validate_*` (read-only, mengembalikan
//! plan) dan `apply_*` (infallible). Semua error terdeteksi SEBELUM mutasi.
//!
//! ## Consensus Constants
//!
//! Konstanta protokol ada di `crate::config::ProtocolConfig` dan
//! `crate::types`. Nilai-nilai ini **consensus-critical**.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::asset::Asset;
use crate::config::ProtocolConfig;
use crate::error::{LedgerError, Result};
use crate::types::{
    AccountName, Authority, ContentId, DisciplineId, GrantId, ProposalId, ResearchGroupId,
    ResearchId, ReviewId, ShareType, TimePointSec, COMMON_DISCIPLINE_ID,
};

// ════════════════════════════════════════════════════════════════════════════
// INTERNAL MODULES
// ════════════════════════════════════════════════════════════════════════════
//
// Semua module bersifat private (tanpa `pub`) dan hanya diakses melalui
// ChainState methods.
//
// ════════════════════════════════════════════════════════════════════════════

/// Record types: Account, ExpertToken, Vote, TotalVotes, Discipline, Research, dll
mod internal_model;

/// Account lifecycle: create, update, transfer, transfer_to_common_tokens
mod internal_account;

/// Proxy graph: bounded propagation of witness-vote weight
mod internal_proxy;

/// Witness registry & approval votes
mod internal_witness;

/// Account recovery: request, recover, change recovery partner
mod internal_recovery;

/// Power-down schedule, withdraw routes, common-token delegation
mod internal_withdraw;

/// Expert token regeneration & registrar grants
mod internal_expert_token;

/// Voting engine: content votes, review votes, make_review
mod internal_vote;

/// Research group, research, research content, research tokens
mod internal_research;

/// Reward distribution pass
mod internal_rewards;

/// Grant escrow & per-block payouts
mod internal_grants;

/// Research-group proposals (tally only)
mod internal_proposal;

/// Per-block maintenance pass
mod internal_maintenance;

/// Operation dispatch: apply_operation, apply_transaction
mod internal_payload;

/// State root computation
mod internal_state_root;

/// Snapshot export/import
mod internal_snapshot;

// ════════════════════════════════════════════════════════════════════════════
// PUBLIC RE-EXPORTS
// ════════════════════════════════════════════════════════════════════════════

pub use internal_model::{
    Account, AccountAuthority, AccountRecoveryRequest, ActivityState, ChainProperties,
    ChangeRecoveryAccountRequest, ContentType, Delegation, Discipline, ExpertToken,
    ExpiringDelegation, Genesis, GenesisAccount, GenesisDiscipline, Grant, LedgerContext,
    OwnerAuthorityHistory, Proposal, ProposalStatus, Research, ResearchContent, ResearchGroup,
    Review, ReviewVote, TotalVotes, Vote, Witness, WithdrawRoute,
};
pub use internal_proxy::ProxyEffects;
pub use internal_rewards::RewardReport;
pub use internal_snapshot::SnapshotMetadata;

/// Counter untuk id auto-increment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub research_group: ResearchGroupId,
    pub research: ResearchId,
    pub research_content: ContentId,
    pub review: ReviewId,
    pub grant: GrantId,
    pub proposal: ProposalId,
    pub expiring_delegation: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// CHAIN STATE
// ════════════════════════════════════════════════════════════════════════════
//
// Semua store memakai BTreeMap agar iterasi (dan state root) deterministik
// tanpa sorting tambahan. Index sekunder adalah map ber-key tuple yang
// dipelihara bersama store primernya.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub config: ProtocolConfig,

    // ════════════════════════════════════════════════════════════════════
    // ACCOUNTS
    // ════════════════════════════════════════════════════════════════════
    pub accounts: BTreeMap<AccountName, Account>,
    pub authorities: BTreeMap<AccountName, AccountAuthority>,
    /// Owner authority lama per account, urut waktu.
    pub owner_history: BTreeMap<AccountName, Vec<OwnerAuthorityHistory>>,
    /// Maksimum satu request terbuka per account.
    pub recovery_requests: BTreeMap<AccountName, AccountRecoveryRequest>,
    pub change_recovery_requests: BTreeMap<AccountName, ChangeRecoveryAccountRequest>,

    // ════════════════════════════════════════════════════════════════════
    // COMMON TOKENS
    // ════════════════════════════════════════════════════════════════════
    /// from → (to → route)
    pub withdraw_routes: BTreeMap<AccountName, BTreeMap<AccountName, WithdrawRoute>>,
    /// (delegator, delegatee) → delegation
    pub delegations: BTreeMap<(AccountName, AccountName), Delegation>,
    /// (expiration, seq) → delegasi yang menunggu kembali
    pub expiring_delegations: BTreeMap<(TimePointSec, u64), ExpiringDelegation>,

    // ════════════════════════════════════════════════════════════════════
    // EXPERTISE & VOTING ENGINE
    // ════════════════════════════════════════════════════════════════════
    /// account → (discipline → token)
    pub expert_tokens: BTreeMap<AccountName, BTreeMap<DisciplineId, ExpertToken>>,
    /// (content, discipline) → (voter → vote)
    pub votes: BTreeMap<(ContentId, DisciplineId), BTreeMap<AccountName, Vote>>,
    /// (review, discipline) → (voter → vote)
    pub review_votes: BTreeMap<(ReviewId, DisciplineId), BTreeMap<AccountName, ReviewVote>>,
    pub total_votes: BTreeMap<(ContentId, DisciplineId), TotalVotes>,

    // ════════════════════════════════════════════════════════════════════
    // RESEARCH HIERARCHY
    // ════════════════════════════════════════════════════════════════════
    pub disciplines: BTreeMap<DisciplineId, Discipline>,
    pub research_groups: BTreeMap<ResearchGroupId, ResearchGroup>,
    /// group → (member → token amount)
    pub group_tokens: BTreeMap<ResearchGroupId, BTreeMap<AccountName, u32>>,
    pub researches: BTreeMap<ResearchId, Research>,
    pub research_contents: BTreeMap<ContentId, ResearchContent>,
    pub reviews: BTreeMap<ReviewId, Review>,
    /// research → (holder → amount)
    pub research_tokens: BTreeMap<ResearchId, BTreeMap<AccountName, u16>>,
    pub reviews_by_content: BTreeSet<(ContentId, ReviewId)>,
    pub group_permlinks: BTreeMap<String, ResearchGroupId>,
    pub research_permlinks: BTreeMap<(ResearchGroupId, String), ResearchId>,
    pub content_permlinks: BTreeMap<(ResearchId, String), ContentId>,

    // ════════════════════════════════════════════════════════════════════
    // WITNESS
    // ════════════════════════════════════════════════════════════════════
    pub witnesses: BTreeMap<AccountName, Witness>,
    /// voter → set witness yang di-approve
    pub witness_votes: BTreeMap<AccountName, BTreeSet<AccountName>>,

    // ════════════════════════════════════════════════════════════════════
    // GRANTS & PROPOSALS
    // ════════════════════════════════════════════════════════════════════
    pub grants: BTreeMap<GrantId, Grant>,
    pub proposals: BTreeMap<ProposalId, Proposal>,

    pub next_ids: IdCounters,
}

// ════════════════════════════════════════════════════════════════════════════
// CONSTRUCTOR
// ════════════════════════════════════════════════════════════════════════════

impl ChainState {
    /// ChainState kosong dengan discipline root (common) saja.
    ///
    /// Config divalidasi dulu: divisor atau periode nol akan membuat
    /// evaluator membagi dengan nol.
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate().map_err(|e| LedgerError::InvalidConfig(format!("{:#}", e)))?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: ProtocolConfig) -> Self {
        let mut disciplines = BTreeMap::new();
        disciplines.insert(
            COMMON_DISCIPLINE_ID,
            Discipline {
                id: COMMON_DISCIPLINE_ID,
                parent_id: None,
                name: "Common".to_string(),
                total_active_reward_weight: 0,
                total_active_research_reward_weight: 0,
                total_active_review_reward_weight: 0,
            },
        );

        Self {
            config,
            accounts: BTreeMap::new(),
            authorities: BTreeMap::new(),
            owner_history: BTreeMap::new(),
            recovery_requests: BTreeMap::new(),
            change_recovery_requests: BTreeMap::new(),
            withdraw_routes: BTreeMap::new(),
            delegations: BTreeMap::new(),
            expiring_delegations: BTreeMap::new(),
            expert_tokens: BTreeMap::new(),
            votes: BTreeMap::new(),
            review_votes: BTreeMap::new(),
            total_votes: BTreeMap::new(),
            disciplines,
            research_groups: BTreeMap::new(),
            group_tokens: BTreeMap::new(),
            researches: BTreeMap::new(),
            research_contents: BTreeMap::new(),
            reviews: BTreeMap::new(),
            research_tokens: BTreeMap::new(),
            reviews_by_content: BTreeSet::new(),
            group_permlinks: BTreeMap::new(),
            research_permlinks: BTreeMap::new(),
            content_permlinks: BTreeMap::new(),
            witnesses: BTreeMap::new(),
            witness_votes: BTreeMap::new(),
            grants: BTreeMap::new(),
            proposals: BTreeMap::new(),
            next_ids: IdCounters::default(),
        }
    }

    /// Bangun state awal dari `Genesis`.
    ///
    /// Langkah:
    /// 1. Discipline tree (parent harus sudah ada; urutan input dihormati)
    /// 2. Account genesis (mined = true), balance + common tokens + expert token discipline 0
    /// 3. Witness genesis
    pub fn from_genesis(config: ProtocolConfig, genesis: &Genesis) -> Result<(Self, LedgerContext)> {
        let mut state = Self::new(config)?;
        let ctx = LedgerContext::new(genesis.genesis_time, 0);

        for d in &genesis.disciplines {
            if let Some(parent) = d.parent_id {
                state.get_discipline(parent)?;
            }
            state.disciplines.insert(
                d.id,
                Discipline {
                    id: d.id,
                    parent_id: d.parent_id,
                    name: d.name.clone(),
                    total_active_reward_weight: 0,
                    total_active_research_reward_weight: 0,
                    total_active_review_reward_weight: 0,
                },
            );
        }

        for acc in &genesis.accounts {
            if state.accounts.contains_key(&acc.name) {
                return Err(LedgerError::AccountAlreadyExists(acc.name.clone()));
            }
            if acc.balance < 0 || acc.common_tokens < 0 {
                return Err(LedgerError::NonPositiveAmount);
            }
            let mut account = Account::new(acc.name.clone(), acc.key.clone(), ctx.time);
            account.balance = Asset::primary(acc.balance);
            account.common_tokens = acc.common_tokens;
            state.accounts.insert(acc.name.clone(), account);

            let key_auth = Authority::single_key(acc.key.clone());
            state.authorities.insert(
                acc.name.clone(),
                AccountAuthority {
                    account: acc.name.clone(),
                    owner: key_auth.clone(),
                    active: key_auth.clone(),
                    posting: key_auth,
                    last_owner_update: 0,
                },
            );
            if acc.common_tokens > 0 {
                state.credit_expertise(&acc.name, COMMON_DISCIPLINE_ID, acc.common_tokens, ctx.time);
            }
        }

        for owner in &genesis.witnesses {
            let account = state.get_account(owner)?;
            let signing_key = account.memo_key.clone();
            state.witnesses.insert(
                owner.clone(),
                Witness {
                    owner: owner.clone(),
                    url: String::new(),
                    signing_key,
                    props: ChainProperties::default(),
                    votes: 0,
                    created: ctx.time,
                },
            );
        }

        info!(
            accounts = genesis.accounts.len(),
            disciplines = genesis.disciplines.len(),
            witnesses = genesis.witnesses.len(),
            "genesis state initialised"
        );
        Ok((state, ctx))
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::with_config(ProtocolConfig::default())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ACCESSORS
// ════════════════════════════════════════════════════════════════════════════
//
// get_*  → Result, gagal dengan *NotFound
// find_* → Option
//
// ════════════════════════════════════════════════════════════════════════════

impl ChainState {
    pub fn find_account(&self, name: &AccountName) -> Option<&Account> {
        self.accounts.get(name)
    }

    pub fn get_account(&self, name: &AccountName) -> Result<&Account> {
        self.accounts.get(name).ok_or_else(|| LedgerError::AccountNotFound(name.clone()))
    }

    pub fn check_account_existence(&self, name: &AccountName) -> Result<()> {
        self.get_account(name).map(|_| ())
    }

    pub fn get_authority(&self, name: &AccountName) -> Result<&AccountAuthority> {
        self.authorities.get(name).ok_or_else(|| LedgerError::AccountNotFound(name.clone()))
    }

    pub fn find_expert_token(&self, account: &AccountName, discipline_id: DisciplineId) -> Option<&ExpertToken> {
        self.expert_tokens.get(account).and_then(|m| m.get(&discipline_id))
    }

    pub fn get_expert_token(&self, account: &AccountName, discipline_id: DisciplineId) -> Result<&ExpertToken> {
        self.find_expert_token(account, discipline_id).ok_or_else(|| LedgerError::ExpertTokenNotFound {
            account: account.clone(),
            discipline: discipline_id,
        })
    }

    /// Semua expert token milik satu account, urut discipline id.
    pub fn expert_tokens_of(&self, account: &AccountName) -> impl Iterator<Item = &ExpertToken> {
        self.expert_tokens.get(account).into_iter().flat_map(|m| m.values())
    }

    pub fn get_discipline(&self, id: DisciplineId) -> Result<&Discipline> {
        self.disciplines.get(&id).ok_or(LedgerError::DisciplineNotFound(id))
    }

    pub fn get_research_group(&self, id: ResearchGroupId) -> Result<&ResearchGroup> {
        self.research_groups.get(&id).ok_or(LedgerError::ResearchGroupNotFound(id))
    }

    pub fn get_research(&self, id: ResearchId) -> Result<&Research> {
        self.researches.get(&id).ok_or(LedgerError::ResearchNotFound(id))
    }

    pub fn get_research_content(&self, id: ContentId) -> Result<&ResearchContent> {
        self.research_contents.get(&id).ok_or(LedgerError::ContentNotFound(id))
    }

    pub fn get_review(&self, id: ReviewId) -> Result<&Review> {
        self.reviews.get(&id).ok_or(LedgerError::ReviewNotFound(id))
    }

    pub fn get_witness(&self, owner: &AccountName) -> Result<&Witness> {
        self.witnesses.get(owner).ok_or_else(|| LedgerError::WitnessNotFound(owner.clone()))
    }

    pub fn get_grant(&self, id: GrantId) -> Result<&Grant> {
        self.grants.get(&id).ok_or(LedgerError::GrantNotFound(id))
    }

    pub fn get_proposal(&self, id: ProposalId) -> Result<&Proposal> {
        self.proposals.get(&id).ok_or(LedgerError::ProposalNotFound(id))
    }

    pub fn find_vote(&self, voter: &AccountName, discipline_id: DisciplineId, content_id: ContentId) -> Option<&Vote> {
        self.votes.get(&(content_id, discipline_id)).and_then(|m| m.get(voter))
    }

    pub fn find_review_vote(&self, voter: &AccountName, discipline_id: DisciplineId, review_id: ReviewId) -> Option<&ReviewVote> {
        self.review_votes.get(&(review_id, discipline_id)).and_then(|m| m.get(voter))
    }

    pub fn find_total_votes(&self, content_id: ContentId, discipline_id: DisciplineId) -> Option<&TotalVotes> {
        self.total_votes.get(&(content_id, discipline_id))
    }

    pub fn find_delegation(&self, delegator: &AccountName, delegatee: &AccountName) -> Option<&Delegation> {
        self.delegations.get(&(delegator.clone(), delegatee.clone()))
    }

    pub fn group_token_amount(&self, group_id: ResearchGroupId, account: &AccountName) -> u32 {
        self.group_tokens
            .get(&group_id)
            .and_then(|m| m.get(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn research_token_amount(&self, research_id: ResearchId, account: &AccountName) -> u16 {
        self.research_tokens
            .get(&research_id)
            .and_then(|m| m.get(account))
            .copied()
            .unwrap_or(0)
    }

    /// Witness yang di-approve `voter`.
    pub fn witnesses_voted_by(&self, voter: &AccountName) -> impl Iterator<Item = &AccountName> {
        self.witness_votes.get(voter).into_iter().flat_map(|s| s.iter())
    }

    /// Review milik satu content.
    pub fn reviews_of_content(&self, content_id: ContentId) -> impl Iterator<Item = &Review> {
        self.reviews_by_content
            .range((content_id, ReviewId::MIN)..=(content_id, ReviewId::MAX))
            .filter_map(|(_, review_id)| self.reviews.get(review_id))
    }

    /// Balance liquid (amount primary).
    pub fn balance_of(&self, name: &AccountName) -> ShareType {
        self.accounts.get(name).map(|a| a.balance.amount).unwrap_or(0)
    }
}
