//! Internal models for state module
//!
//! Semua record yang disimpan ChainState. Record saling merujuk hanya lewat
//! key (id atau nama), tidak pernah lewat pointer.

use crate::asset::Asset;
use crate::types::{
    AccountName, Authority, ContentId, DisciplineId, GrantId, ProposalId, PublicKey,
    ResearchGroupId, ResearchId, ReviewId, ShareType, TimePointSec, MAX_PROXY_RECURSION_DEPTH,
    PERCENT_100, TIME_NEVER,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================
// LEDGER CONTEXT
// ============================================================

/// Pengganti singleton dynamic global properties.
/// Di-pass `&mut` ke setiap transisi; tidak ada global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerContext {
    /// Waktu head block (detik).
    pub time: TimePointSec,
    pub head_block_num: u64,
    /// Denominator level pertama reward pass (budget → discipline).
    pub total_active_disciplines_reward_weight: u64,
}

impl LedgerContext {
    pub fn new(time: TimePointSec, head_block_num: u64) -> Self {
        Self { time, head_block_num, total_active_disciplines_reward_weight: 0 }
    }

    /// Maju satu block.
    pub fn advance(&mut self, seconds: u64) {
        self.time = self.time.saturating_add(seconds);
        self.head_block_num = self.head_block_num.saturating_add(1);
    }
}

// ============================================================
// ACCOUNT
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub memo_key: PublicKey,
    pub json_metadata: String,

    /// Saldo liquid (simbol primary).
    pub balance: Asset,
    /// Staked power ("vesting shares"), unit primary.
    pub common_tokens: ShareType,
    pub delegated_common_tokens: ShareType,
    pub received_common_tokens: ShareType,

    // power-down schedule
    pub common_tokens_withdraw_rate: ShareType,
    pub next_common_tokens_withdrawal: TimePointSec,
    pub to_withdraw: ShareType,
    pub withdrawn: ShareType,
    pub withdraw_routes: u16,

    /// `None` = vote sendiri.
    pub proxy: Option<AccountName>,
    /// Bobot witness-vote yang masuk lewat proxy, satu slot per depth.
    pub proxied_vsf_votes: [ShareType; MAX_PROXY_RECURSION_DEPTH],
    pub witnesses_voted_for: u16,

    pub voting_power: u16,
    pub last_vote_time: TimePointSec,

    pub recovery_account: Option<AccountName>,
    pub last_account_recovery: TimePointSec,
    pub can_vote: bool,
    pub mined: bool,
    pub created: TimePointSec,
}

impl Account {
    pub fn new(name: AccountName, memo_key: PublicKey, created: TimePointSec) -> Self {
        Self {
            name,
            memo_key,
            json_metadata: String::new(),
            balance: Asset::primary(0),
            common_tokens: 0,
            delegated_common_tokens: 0,
            received_common_tokens: 0,
            common_tokens_withdraw_rate: 0,
            next_common_tokens_withdrawal: TIME_NEVER,
            to_withdraw: 0,
            withdrawn: 0,
            withdraw_routes: 0,
            proxy: None,
            proxied_vsf_votes: [0; MAX_PROXY_RECURSION_DEPTH],
            witnesses_voted_for: 0,
            voting_power: PERCENT_100,
            last_vote_time: created,
            recovery_account: None,
            last_account_recovery: 0,
            can_vote: true,
            mined: true,
            created,
        }
    }

    /// Total bobot yang diproxy ke akun ini dari semua depth.
    pub fn proxied_vsf_votes_total(&self) -> ShareType {
        self.proxied_vsf_votes.iter().sum()
    }

    /// Bobot witness vote: stake sendiri + semua yang diproxy.
    pub fn witness_vote_weight(&self) -> ShareType {
        self.common_tokens + self.proxied_vsf_votes_total()
    }

    /// Stake efektif setelah delegasi keluar/masuk.
    pub fn effective_common_tokens(&self) -> ShareType {
        self.common_tokens - self.delegated_common_tokens + self.received_common_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAuthority {
    pub account: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub last_owner_update: TimePointSec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAuthorityHistory {
    pub account: AccountName,
    pub previous_owner_authority: Authority,
    /// Sampai kapan authority lama ini masih sah sebagai "recent owner".
    pub last_valid_time: TimePointSec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecoveryRequest {
    pub account_to_recover: AccountName,
    pub new_owner_authority: Authority,
    pub expires: TimePointSec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountRequest {
    pub account_to_recover: AccountName,
    pub recovery_account: AccountName,
    pub effective_on: TimePointSec,
}

// ============================================================
// POWER-DOWN & DELEGATION
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRoute {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub percent: u16,
    /// true: deposit sebagai common tokens, false: sebagai balance.
    pub auto_common_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    pub common_tokens: ShareType,
    pub min_delegation_time: TimePointSec,
}

/// Delegasi yang sudah ditarik tetapi belum kembali ke delegator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringDelegation {
    pub delegator: AccountName,
    pub common_tokens: ShareType,
    pub expiration: TimePointSec,
}

// ============================================================
// EXPERTISE & VOTES
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertToken {
    pub account: AccountName,
    pub discipline_id: DisciplineId,
    pub amount: ShareType,
    pub voting_power: u16,
    pub last_vote_time: TimePointSec,
}

impl ExpertToken {
    pub fn new(account: AccountName, discipline_id: DisciplineId, amount: ShareType, now: TimePointSec) -> Self {
        Self { account, discipline_id, amount, voting_power: PERCENT_100, last_vote_time: now }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: AccountName,
    pub discipline_id: DisciplineId,
    pub research_id: ResearchId,
    pub research_content_id: ContentId,
    /// Persen vote dari operasi (basis point bertanda).
    pub vote_percent: i16,
    /// Curator weight setelah reverse-auction decay.
    pub weight: u64,
    /// Voting power yang dipakai.
    pub voting_power: u16,
    pub tokens_amount: u64,
    pub voting_time: TimePointSec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVote {
    pub voter: AccountName,
    pub discipline_id: DisciplineId,
    pub review_id: ReviewId,
    pub vote_percent: i16,
    pub weight: u64,
    pub voting_power: u16,
    pub tokens_amount: u64,
    pub voting_time: TimePointSec,
}

/// Agregat per (content, discipline). Dibuat lazily, hanya diubah lewat delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalVotes {
    pub research_content_id: ContentId,
    pub discipline_id: DisciplineId,
    pub research_id: ResearchId,
    pub total_weight: u64,
    pub total_active_weight: u64,
    pub total_research_reward_weight: u64,
    pub total_active_research_reward_weight: u64,
    pub total_curators_reward_weight: u64,
    pub total_active_curators_reward_weight: u64,
}

// ============================================================
// RESEARCH HIERARCHY
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: DisciplineId,
    pub parent_id: Option<DisciplineId>,
    pub name: String,
    pub total_active_reward_weight: u64,
    pub total_active_research_reward_weight: u64,
    pub total_active_review_reward_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchGroup {
    pub id: ResearchGroupId,
    pub name: String,
    pub permlink: String,
    pub description: String,
    pub quorum_percent: u16,
    /// Total group token yang beredar (selalu 100% saat dibuat).
    pub total_tokens: u32,
    /// Reward yang diterima group sebagai pemilik research.
    pub balance: ShareType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Research {
    pub id: ResearchId,
    pub research_group_id: ResearchGroupId,
    pub title: String,
    pub abstract_text: String,
    pub permlink: String,
    /// Bagian research token yang masih dimiliki group.
    pub owned_tokens: u16,
    pub review_share_in_percent: u16,
    pub disciplines: BTreeSet<DisciplineId>,
    pub created_at: TimePointSec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Announcement,
    Milestone,
    FinalResult,
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchContent {
    pub id: ContentId,
    pub research_id: ResearchId,
    pub content_type: ContentType,
    pub title: String,
    pub content: String,
    pub permlink: String,
    pub authors: Vec<AccountName>,
    pub references: Vec<ContentId>,
    pub external_references: Vec<String>,
    pub created_at: TimePointSec,
    pub activity_state: ActivityState,
    pub activity_window_end: TimePointSec,
}

impl ResearchContent {
    pub fn is_active(&self) -> bool {
        self.activity_state == ActivityState::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub research_content_id: ContentId,
    pub author: AccountName,
    pub content: String,
    pub is_positive: bool,
    pub disciplines: BTreeSet<DisciplineId>,
    pub references: Vec<ContentId>,
    pub external_references: Vec<String>,
    pub created_at: TimePointSec,
    pub reward_weights_per_discipline: BTreeMap<DisciplineId, u64>,
    pub curation_reward_weights_per_discipline: BTreeMap<DisciplineId, u64>,
    /// Basis point, 100% = bobot netral.
    pub weight_modifiers: BTreeMap<DisciplineId, u32>,
    pub expertise_amounts_used: BTreeMap<DisciplineId, ShareType>,
}

// ============================================================
// WITNESS
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
}

impl Default for ChainProperties {
    fn default() -> Self {
        Self {
            account_creation_fee: Asset::primary(crate::config::DEFAULT_MIN_ACCOUNT_CREATION_FEE),
            maximum_block_size: 131_072,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub owner: AccountName,
    pub url: String,
    pub signing_key: PublicKey,
    pub props: ChainProperties,
    /// Total bobot approval.
    pub votes: ShareType,
    pub created: TimePointSec,
}

// ============================================================
// GRANTS & PROPOSALS
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub owner: AccountName,
    pub target_discipline: DisciplineId,
    /// Sisa escrow.
    pub amount: ShareType,
    pub per_block: ShareType,
    pub start_block: u64,
    pub end_block: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Voting sedang berlangsung
    Active,
    /// Quorum group tercapai
    Approved,
    /// Lifetime habis sebelum quorum
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub research_group_id: ResearchGroupId,
    pub creator: AccountName,
    pub data: String,
    pub quorum_percent: u16,
    pub status: ProposalStatus,
    pub voted_accounts: BTreeSet<AccountName>,
    /// Jumlah group token dari semua voter.
    pub total_voted: u32,
    pub creation_time: TimePointSec,
    pub expiration_time: TimePointSec,
}

// ============================================================
// GENESIS
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub name: AccountName,
    pub key: PublicKey,
    #[serde(default)]
    pub balance: ShareType,
    #[serde(default)]
    pub common_tokens: ShareType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDiscipline {
    pub id: DisciplineId,
    #[serde(default)]
    pub parent_id: Option<DisciplineId>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub disciplines: Vec<GenesisDiscipline>,
    /// Akun genesis yang langsung terdaftar sebagai witness.
    #[serde(default)]
    pub witnesses: Vec<AccountName>,
    #[serde(default)]
    pub genesis_time: TimePointSec,
}
