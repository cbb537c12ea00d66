//! Shared fixtures for integration tests.

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

use sciledger_chain::state::{ContentType, GenesisAccount, GenesisDiscipline};
use sciledger_chain::types::{ContentId, DisciplineId, ResearchGroupId, ResearchId};
use sciledger_chain::{AccountName, Genesis, Ledger, Operation, ProtocolConfig, PublicKey};

pub const GENESIS_TIME: u64 = 1_000_000;
pub const PHYSICS: DisciplineId = 7;
pub const BIOLOGY: DisciplineId = 8;
pub const START_BALANCE: i64 = 1_000_000;
pub const START_COMMON_TOKENS: i64 = 50_000;

pub fn name(s: &str) -> AccountName {
    AccountName::new(s).expect("valid test account name")
}

pub fn key(byte: u8) -> PublicKey {
    PublicKey(vec![byte; 33])
}

/// Genesis: registrar, alice, bob, carol, dave, witness `wit`; disciplines 7 & 8.
pub fn genesis() -> Genesis {
    let accounts = ["registrar", "alice", "bob", "carol", "dave", "wit"]
        .iter()
        .enumerate()
        .map(|(i, n)| GenesisAccount {
            name: name(n),
            key: key(i as u8 + 1),
            balance: START_BALANCE,
            common_tokens: START_COMMON_TOKENS,
        })
        .collect();
    Genesis {
        accounts,
        disciplines: vec![
            GenesisDiscipline { id: PHYSICS, parent_id: Some(0), name: "Physics".into() },
            GenesisDiscipline { id: BIOLOGY, parent_id: Some(0), name: "Biology".into() },
        ],
        witnesses: vec![name("wit")],
        genesis_time: GENESIS_TIME,
    }
}

/// Log ke test writer; `RUST_LOG=sciledger_chain=debug` untuk detail evaluator.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub fn setup() -> Ledger {
    init_tracing();
    Ledger::from_genesis(ProtocolConfig::default(), &genesis()).expect("genesis")
}

pub fn add_expertise(ledger: &mut Ledger, account: &str, discipline: DisciplineId, amount: i64) {
    ledger
        .apply_operation(&Operation::AddExpertiseTokens {
            owner: name("registrar"),
            account_name: name(account),
            disciplines_to_add: vec![(discipline, amount)],
        })
        .expect("add expertise");
}

pub fn create_group(ledger: &mut Ledger, creator: &str, permlink: &str) -> ResearchGroupId {
    let id = ledger.state.next_ids.research_group;
    ledger
        .apply_operation(&Operation::CreateResearchGroup {
            creator: name(creator),
            name: permlink.to_uppercase(),
            permlink: permlink.into(),
            description: String::new(),
            quorum_percent: 5_000,
        })
        .expect("create group");
    id
}

pub fn create_research(
    ledger: &mut Ledger,
    creator: &str,
    group: ResearchGroupId,
    permlink: &str,
    disciplines: Vec<DisciplineId>,
    review_share_in_percent: u16,
) -> ResearchId {
    let id = ledger.state.next_ids.research;
    ledger
        .apply_operation(&Operation::CreateResearch {
            creator: name(creator),
            research_group_id: group,
            title: permlink.into(),
            abstract_text: String::new(),
            permlink: permlink.into(),
            review_share_in_percent,
            disciplines,
        })
        .expect("create research");
    id
}

pub fn create_content(
    ledger: &mut Ledger,
    creator: &str,
    research: ResearchId,
    permlink: &str,
    authors: &[&str],
    references: Vec<ContentId>,
) -> ContentId {
    let id = ledger.state.next_ids.research_content;
    ledger
        .apply_operation(&Operation::CreateResearchContent {
            creator: name(creator),
            research_id: research,
            content_type: ContentType::Milestone,
            title: permlink.into(),
            content: "body".into(),
            permlink: permlink.into(),
            authors: authors.iter().map(|a| name(a)).collect(),
            references,
            external_references: vec![],
        })
        .expect("create content");
    id
}

/// Group + research (discipline 7) + satu content milik alice.
pub fn physics_content(ledger: &mut Ledger) -> (ResearchGroupId, ResearchId, ContentId) {
    let group = create_group(ledger, "alice", "alice-lab");
    let research = create_research(ledger, "alice", group, "quantum", vec![PHYSICS], 1_500);
    let content = create_content(ledger, "alice", research, "milestone-1", &["alice"], vec![]);
    (group, research, content)
}

pub fn vote(voter: &str, discipline_id: DisciplineId, weight: i16, research_id: ResearchId, content_id: ContentId) -> Operation {
    Operation::Vote {
        voter: name(voter),
        discipline_id,
        weight,
        research_id,
        research_content_id: content_id,
    }
}
