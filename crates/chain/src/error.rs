//! Error taxonomy untuk state transition.
//!
//! Semua kegagalan bersifat terminal untuk operasi yang sedang diproses:
//! dideteksi SEBELUM mutasi dan diteruskan ke caller tanpa diubah.

use thiserror::Error;

use crate::types::{AccountName, ContentId, DisciplineId, GrantId, ProposalId, ResearchGroupId, ResearchId, ReviewId};

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ── primitives ─────────────────────────────────────────────────────
    #[error("invalid asset symbol: expected {expected}, got {actual}")]
    InvalidSymbol { expected: String, actual: String },
    #[error("invalid symbol name: {0}")]
    InvalidSymbolName(String),
    #[error("invalid asset string: {0}")]
    InvalidAssetString(String),
    #[error("invalid price: {0}")]
    InvalidPrice(&'static str),
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("invalid account name: {0}")]
    InvalidAccountName(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("percent {0} exceeds 100%")]
    InvalidPercent(u16),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid protocol config: {0}")]
    InvalidConfig(String),

    // ── accounts ───────────────────────────────────────────────────────
    #[error("account not found: {0}")]
    AccountNotFound(AccountName),
    #[error("account already exists: {0}")]
    AccountAlreadyExists(AccountName),
    #[error("insufficient balance on {account}: required {required}, available {available}")]
    InsufficientBalance { account: AccountName, required: i64, available: i64 },
    #[error("insufficient fee: required {required}, provided {provided}")]
    InsufficientFee { required: i64, provided: i64 },
    #[error("account {0} has declined its voting rights")]
    VotingDeclined(AccountName),
    #[error("owner authority can only be updated once per {0} seconds")]
    OwnerUpdateTooSoon(u64),

    // ── common tokens / power-down / delegation ────────────────────────
    #[error("insufficient common tokens on {account}: required {required}, available {available}")]
    InsufficientCommonTokens { account: AccountName, required: i64, available: i64 },
    #[error("this operation would not change the withdraw rate")]
    WithdrawRateUnchanged,
    #[error("account requires more than {0} common tokens before it can power down")]
    PowerDownFloor(i64),
    #[error("cannot create a 0% withdraw route")]
    ZeroPercentRoute,
    #[error("account already has the maximum of {0} withdraw routes")]
    TooManyWithdrawRoutes(u16),
    #[error("withdraw routes exceed 100%")]
    WithdrawRoutesExceedLimit,
    #[error("cannot delegate to self")]
    SelfDelegation,
    #[error("delegation does not change")]
    DelegationUnchanged,

    // ── proxy & witness ────────────────────────────────────────────────
    #[error("proxy must change")]
    ProxyUnchanged,
    #[error("this proxy would create a proxy loop")]
    ProxyLoop,
    #[error("proxy chain is too long")]
    ProxyChainTooLong,
    #[error("a proxy is currently set, clear the proxy before voting for a witness")]
    ProxyIsSet,
    #[error("witness not found: {0}")]
    WitnessNotFound(AccountName),
    #[error("account has voted for the maximum of {0} witnesses")]
    TooManyWitnessVotes(u16),
    #[error("witness vote does not exist")]
    WitnessVoteNotFound,
    #[error("witness vote already exists")]
    WitnessVoteExists,
    #[error("witness url is too long")]
    WitnessUrlTooLong,

    // ── recovery ───────────────────────────────────────────────────────
    #[error("cannot recover using an impossible authority")]
    ImpossibleAuthority,
    #[error("cannot recover using an open authority")]
    OpenAuthority,
    #[error("{0} is not the recovery partner of this account")]
    NotRecoveryPartner(AccountName),
    #[error("there are no active recovery requests for this account")]
    RecoveryRequestNotFound,
    #[error("new owner authority does not match recovery request")]
    RecoveryAuthorityMismatch,
    #[error("recent authority not found in authority history")]
    RecentAuthorityNotFound,
    #[error("no witness is available to act as recovery partner")]
    NoTopWitness,

    // ── expertise & votes ──────────────────────────────────────────────
    #[error("expert token not found for {account} in discipline {discipline}")]
    ExpertTokenNotFound { account: AccountName, discipline: DisciplineId },
    #[error("account currently does not have voting power")]
    InsufficientVotingPower,
    #[error("vote weight cannot be 0")]
    InvalidVoteWeight,
    #[error("cannot vote with 0 tokens")]
    ZeroWeightVote,
    #[error("already voted with this discipline for this target")]
    DuplicateVote,
    #[error("research is not in discipline {0}")]
    DisciplineNotInResearch(DisciplineId),
    #[error("reviewer does not have enough expertise to make review")]
    InsufficientExpertise,
    #[error("only the registrar may add expertise tokens")]
    NotRegistrar,

    // ── research hierarchy ─────────────────────────────────────────────
    #[error("discipline not found: {0}")]
    DisciplineNotFound(DisciplineId),
    #[error("research not found: {0}")]
    ResearchNotFound(ResearchId),
    #[error("research content not found: {0}")]
    ContentNotFound(ContentId),
    #[error("review not found: {0}")]
    ReviewNotFound(ReviewId),
    #[error("research group not found: {0}")]
    ResearchGroupNotFound(ResearchGroupId),
    #[error("{account} is not a member of research group {group}")]
    NotGroupMember { account: AccountName, group: ResearchGroupId },
    #[error("permlink already used: {0}")]
    DuplicatePermlink(String),
    #[error("invalid permlink: {0}")]
    InvalidPermlink(String),
    #[error("not enough research tokens: required {required}, available {available}")]
    InsufficientResearchTokens { required: u16, available: u16 },

    // ── grants & proposals ─────────────────────────────────────────────
    #[error("grant not found: {0}")]
    GrantNotFound(GrantId),
    #[error("invalid grant block range {start}..={end}")]
    InvalidGrantRange { start: u64, end: u64 },
    #[error("proposal lifetime {actual}s is not in range {min}..={max}")]
    ProposalLifetimeOutOfRange { min: u64, max: u64, actual: u64 },
    #[error("proposal not found: {0}")]
    ProposalNotFound(ProposalId),
    #[error("proposal {0} is not active")]
    ProposalNotActive(ProposalId),
    #[error("proposal {0} has expired")]
    ProposalExpired(ProposalId),
    #[error("{0} has already voted for this proposal")]
    AlreadyVotedProposal(AccountName),
}
