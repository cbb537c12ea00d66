//! # Reward Distribution & Grant Integration Tests
//!
//! Fokus: conservation (`distributed + unused == budget`), pembagian ke
//! token holder, reference, curator, review, serta payout grant per blok.

mod common;

use common::*;
use sciledger_chain::{Asset, Ledger, Operation, VirtualOp};

const FULL_WINDOW: u64 = 86_400;

fn group_balance(ledger: &Ledger, group: u64) -> i64 {
    ledger.state.get_research_group(group).unwrap().balance
}

fn expertise(ledger: &Ledger, account: &str, discipline: u64) -> i64 {
    ledger.state.find_expert_token(&name(account), discipline).map(|t| t.amount).unwrap_or(0)
}

// ════════════════════════════════════════════════════════════════════════════
// 1. SINGLE CONTENT
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn single_content_budget_split() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (group, research, content) = physics_content(&mut ledger);
    ledger.ctx.time += FULL_WINDOW;
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();
    let alice_before = ledger.state.balance_of(&name("alice"));

    let report = ledger.distribute_reward(&Asset::primary(10_000)).unwrap();

    // review pool 15% dan reference pool 10% tidak punya penerima
    assert_eq!(report.distributed, 7_500);
    assert_eq!(report.unused, 2_500);
    assert_eq!(report.distributed + report.unused, report.budget);

    assert_eq!(ledger.state.balance_of(&name("alice")) - alice_before, 500);
    assert_eq!(group_balance(&ledger, group), 7_000);
    assert_eq!(expertise(&ledger, "alice", PHYSICS), 1_000 + 7_000);

    assert!(report.ops.contains(&VirtualOp::ResearchContentReward {
        research_content_id: content,
        discipline_id: PHYSICS,
        reward: 10_000,
    }));
    assert!(report.ops.contains(&VirtualOp::CurationReward {
        curator: name("alice"),
        research_content_id: content,
        reward: 500,
    }));
}

#[test]
fn zero_budget_or_no_weight_is_all_unused() {
    let mut ledger = setup();
    physics_content(&mut ledger);
    let root = ledger.state_root().unwrap();

    let report = ledger.distribute_reward(&Asset::primary(5_000)).unwrap();
    assert_eq!(report.distributed, 0);
    assert_eq!(report.unused, 5_000);
    assert!(report.ops.is_empty());
    assert_eq!(ledger.state_root().unwrap(), root);

    let report = ledger.distribute_reward(&Asset::primary(0)).unwrap();
    assert_eq!(report, Default::default());
}

// ════════════════════════════════════════════════════════════════════════════
// 2. TOKEN HOLDERS
// ════════════════════════════════════════════════════════════════════════════

fn allocate(ledger: &mut Ledger, research: u64, receiver: &str, amount: u16) {
    ledger
        .apply_operation(&Operation::TransferResearchTokens {
            research_id: research,
            sender: name("alice"),
            receiver: name(receiver),
            amount,
            from_research_owned: true,
        })
        .unwrap();
}

#[test]
fn token_holders_share_by_research_tokens() {
    let mut ledger = setup();
    let (group, research, _) = physics_content(&mut ledger);
    allocate(&mut ledger, research, "bob", 2_000);
    allocate(&mut ledger, research, "carol", 3_000);
    assert_eq!(ledger.state.get_research(research).unwrap().owned_tokens, 5_000);

    let bob_before = ledger.state.balance_of(&name("bob"));
    let carol_before = ledger.state.balance_of(&name("carol"));
    let report = ledger.state.reward_research_token_holders(research, &Asset::primary(1_000)).unwrap();

    assert_eq!(group_balance(&ledger, group), 500);
    assert_eq!(ledger.state.balance_of(&name("bob")) - bob_before, 200);
    assert_eq!(ledger.state.balance_of(&name("carol")) - carol_before, 300);
    assert_eq!(report.distributed, 1_000);
    assert_eq!(report.unused, 0);
}

#[test]
fn holder_to_holder_transfer_moves_future_rewards() {
    let mut ledger = setup();
    let (_, research, _) = physics_content(&mut ledger);
    allocate(&mut ledger, research, "bob", 2_000);

    ledger
        .apply_operation(&Operation::TransferResearchTokens {
            research_id: research,
            sender: name("bob"),
            receiver: name("dave"),
            amount: 2_000,
            from_research_owned: false,
        })
        .unwrap();
    assert_eq!(ledger.state.research_token_amount(research, &name("bob")), 0);
    assert_eq!(ledger.state.research_token_amount(research, &name("dave")), 2_000);

    let dave_before = ledger.state.balance_of(&name("dave"));
    ledger.state.reward_research_token_holders(research, &Asset::primary(1_000)).unwrap();
    assert_eq!(ledger.state.balance_of(&name("dave")) - dave_before, 200);
}

// ════════════════════════════════════════════════════════════════════════════
// 3. REFERENCES & REVIEWS
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn referenced_research_receives_reference_pool() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "carol", PHYSICS, 1_000);
    let (alice_group, _, cited) = physics_content(&mut ledger);
    let bob_group = create_group(&mut ledger, "bob", "bob-lab");
    let optics = create_research(&mut ledger, "bob", bob_group, "optics", vec![PHYSICS], 1_500);
    let citing = create_content(&mut ledger, "bob", optics, "lens-1", &["bob"], vec![cited]);
    ledger.ctx.time += FULL_WINDOW;
    ledger.apply_operation(&vote("carol", PHYSICS, 10_000, optics, citing)).unwrap();

    let report = ledger.distribute_reward(&Asset::primary(10_000)).unwrap();

    assert_eq!(group_balance(&ledger, alice_group), 1_000);
    assert_eq!(expertise(&ledger, "alice", PHYSICS), 1_000);
    assert_eq!(group_balance(&ledger, bob_group), 7_000);
    assert_eq!(expertise(&ledger, "bob", PHYSICS), 7_000);
    assert_eq!(report.distributed, 8_500);
    assert_eq!(report.unused, 1_500);
}

#[test]
fn positive_review_and_its_voters_are_paid() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    add_expertise(&mut ledger, "carol", PHYSICS, 1_000);
    let (_, _, content) = physics_content(&mut ledger);
    let review_id = ledger.state.next_ids.review;
    ledger
        .apply_operation(&Operation::MakeReview {
            author: name("bob"),
            research_content_id: content,
            content: "convincing".into(),
            is_positive: true,
            references: vec![],
            external_references: vec![],
        })
        .unwrap();
    ledger.ctx.time += FULL_WINDOW;
    ledger
        .apply_operation(&Operation::VoteForReview {
            voter: name("carol"),
            discipline_id: PHYSICS,
            weight: 10_000,
            review_id,
        })
        .unwrap();

    let report = ledger.distribute_reward(&Asset::primary(100_000)).unwrap();
    assert_eq!(report.distributed + report.unused, report.budget);

    // content reward 100000 → review pool 15% → satu-satunya review
    assert!(report.ops.contains(&VirtualOp::ReviewVoterReward {
        voter: name("carol"),
        review_id,
        reward: 1_500,
    }));
    assert!(report.ops.contains(&VirtualOp::ReviewReward {
        author: name("bob"),
        review_id,
        reward: 13_500,
    }));
    assert_eq!(expertise(&ledger, "bob", PHYSICS), 2_000 + 13_500);
}

/// Dua content di dua discipline: review berbayar, reference, curator,
/// dan research token yang terbagi tidak rata. Sisa floor muncul di setiap
/// tingkat dan harus berakhir sebagai `unused`.
#[test]
fn multi_discipline_pass_conserves_budget() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    add_expertise(&mut ledger, "carol", PHYSICS, 1_000);
    add_expertise(&mut ledger, "carol", BIOLOGY, 1_000);
    add_expertise(&mut ledger, "dave", PHYSICS, 1_000);

    let (alice_group, quantum, cited) = physics_content(&mut ledger);
    allocate(&mut ledger, quantum, "carol", 3_333);
    let bob_group = create_group(&mut ledger, "bob", "bob-lab");
    let genome = create_research(&mut ledger, "bob", bob_group, "genome", vec![BIOLOGY], 1_000);
    let citing = create_content(&mut ledger, "bob", genome, "genome-1", &["bob"], vec![cited]);

    ledger.ctx.time += FULL_WINDOW;
    let review_id = ledger.state.next_ids.review;
    ledger
        .apply_operation(&Operation::MakeReview {
            author: name("bob"),
            research_content_id: cited,
            content: "convincing".into(),
            is_positive: true,
            references: vec![],
            external_references: vec![],
        })
        .unwrap();
    ledger.apply_operation(&vote("dave", PHYSICS, 10_000, quantum, cited)).unwrap();

    ledger.ctx.time += FULL_WINDOW;
    ledger
        .apply_operation(&Operation::VoteForReview {
            voter: name("carol"),
            discipline_id: PHYSICS,
            weight: 10_000,
            review_id,
        })
        .unwrap();
    ledger.apply_operation(&vote("carol", BIOLOGY, 10_000, genome, citing)).unwrap();
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 4_000);

    let accounts = ["alice", "bob", "carol", "dave"];
    let balances_before: Vec<i64> = accounts.iter().map(|a| ledger.state.balance_of(&name(a))).collect();
    let groups_before = group_balance(&ledger, alice_group) + group_balance(&ledger, bob_group);

    let report = ledger.distribute_reward(&Asset::primary(100_001)).unwrap();

    // physics 75000 (sisa 1), biology 25000
    assert!(report.ops.contains(&VirtualOp::ResearchContentReward {
        research_content_id: cited,
        discipline_id: PHYSICS,
        reward: 75_000,
    }));
    assert!(report.ops.contains(&VirtualOp::ResearchContentReward {
        research_content_id: citing,
        discipline_id: BIOLOGY,
        reward: 25_000,
    }));

    // physics: review 11250 (voter 1125), curator 3750 dibagi 89442 : 74874
    assert!(report.ops.contains(&VirtualOp::ReviewVoterReward { voter: name("carol"), review_id, reward: 1_125 }));
    assert!(report.ops.contains(&VirtualOp::ReviewReward { author: name("bob"), review_id, reward: 10_125 }));
    assert!(report.ops.contains(&VirtualOp::CurationReward {
        curator: name("bob"),
        research_content_id: cited,
        reward: 2_041,
    }));
    assert!(report.ops.contains(&VirtualOp::CurationReward {
        curator: name("dave"),
        research_content_id: cited,
        reward: 1_708,
    }));

    let delta = |ledger: &Ledger, i: usize| ledger.state.balance_of(&name(accounts[i])) - balances_before[i];
    assert_eq!(delta(&ledger, 0), 0);
    assert_eq!(delta(&ledger, 1), 10_125 + 2_041);
    // carol: review voter, 3333 token holder (physics + reference), biology curator
    assert_eq!(delta(&ledger, 2), 1_125 + 17_498 + 833 + 1_250);
    assert_eq!(delta(&ledger, 3), 1_708);
    // alice-lab: holders physics 35001 + reference dari genome-1 1666
    assert_eq!(group_balance(&ledger, alice_group), 35_001 + 1_666);
    assert_eq!(group_balance(&ledger, bob_group), 18_750);

    assert_eq!(expertise(&ledger, "alice", PHYSICS), 52_500);
    assert_eq!(expertise(&ledger, "alice", BIOLOGY), 2_500);
    assert_eq!(expertise(&ledger, "bob", PHYSICS), 2_000 + 10_125);
    assert_eq!(expertise(&ledger, "bob", BIOLOGY), 18_750);

    let credited: i64 = (0..accounts.len()).map(|i| delta(&ledger, i)).sum::<i64>()
        + group_balance(&ledger, alice_group)
        + group_balance(&ledger, bob_group)
        - groups_before;
    assert_eq!(credited, report.distributed);
    assert_eq!(report.distributed, 89_997);
    // reference pool physics 7500, review pool biology 2500, sisa floor 4
    assert_eq!(report.unused, 10_004);
    assert!(report.distributed <= report.budget);
}

#[test]
fn inactive_content_gets_nothing() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (group, research, content) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();
    ledger.end_block(ledger.state.config.content_activity_window_seconds).unwrap();

    let report = ledger.distribute_reward(&Asset::primary(10_000)).unwrap();
    assert_eq!(report.distributed, 0);
    assert_eq!(report.unused, 10_000);
    assert_eq!(group_balance(&ledger, group), 0);
}

// ════════════════════════════════════════════════════════════════════════════
// 4. GRANTS
// ════════════════════════════════════════════════════════════════════════════

fn create_grant(ledger: &mut Ledger, amount: i64, start_block: u64, end_block: u64) -> u64 {
    let id = ledger.state.next_ids.grant;
    ledger
        .apply_operation(&Operation::CreateGrant {
            owner: name("dave"),
            target_discipline: PHYSICS,
            amount: Asset::primary(amount),
            start_block,
            end_block,
        })
        .unwrap();
    id
}

#[test]
fn grant_pays_active_content_groups_each_block() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (group, research, content) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();

    let grant_id = create_grant(&mut ledger, 1_000, 1, 10);
    assert_eq!(ledger.state.get_grant(grant_id).unwrap().per_block, 100);
    assert_eq!(ledger.state.balance_of(&name("dave")), START_BALANCE - 1_000);

    let ops = ledger.end_block(3).unwrap();
    assert!(ops.contains(&VirtualOp::GrantPayout { grant_id, research_group_id: group, amount: 100 }));
    assert_eq!(group_balance(&ledger, group), 100);
    assert_eq!(ledger.state.get_grant(grant_id).unwrap().amount, 900);

    let mut finished = false;
    for _ in 0..9 {
        let ops = ledger.end_block(3).unwrap();
        finished |= ops.iter().any(|op| matches!(op, VirtualOp::GrantFinished { refunded: 0, .. }));
    }
    assert!(finished);
    assert_eq!(group_balance(&ledger, group), 1_000);
    assert!(ledger.state.grants.is_empty());
}

#[test]
fn grant_payouts_follow_active_weight_and_stay_within_escrow() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "dave", PHYSICS, 1_000);
    add_expertise(&mut ledger, "carol", PHYSICS, 1_000);
    let window = ledger.state.config.content_activity_window_seconds;

    let (alice_group, quantum, early) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("dave", PHYSICS, 10_000, quantum, early)).unwrap();
    ledger.ctx.time += window / 2;
    let bob_group = create_group(&mut ledger, "bob", "bob-lab");
    let optics = create_research(&mut ledger, "bob", bob_group, "optics", vec![PHYSICS], 1_500);
    let late = create_content(&mut ledger, "bob", optics, "lens-1", &["bob"], vec![]);
    ledger.apply_operation(&vote("carol", PHYSICS, 10_000, optics, late)).unwrap();

    let start = ledger.ctx.head_block_num + 1;
    let grant_id = create_grant(&mut ledger, 1_000, start, start + 9);
    let mut ops = ledger.end_block(3).unwrap();
    assert!(ops.contains(&VirtualOp::GrantPayout { grant_id, research_group_id: alice_group, amount: 50 }));
    assert!(ops.contains(&VirtualOp::GrantPayout { grant_id, research_group_id: bob_group, amount: 50 }));

    // blok kedua masih membayar keduanya, lalu content pertama kedaluwarsa
    ops.extend(ledger.end_block(window / 2).unwrap());
    assert!(!ledger.state.get_research_content(early).unwrap().is_active());
    for _ in 0..8 {
        ops.extend(ledger.end_block(3).unwrap());
    }

    let paid: i64 = ops
        .iter()
        .map(|op| match op {
            VirtualOp::GrantPayout { amount, .. } => *amount,
            _ => 0,
        })
        .sum();
    assert_eq!(paid, 1_000);
    assert!(ops.contains(&VirtualOp::GrantFinished { grant_id, owner: name("dave"), refunded: 0 }));
    assert_eq!(group_balance(&ledger, alice_group), 100);
    assert_eq!(group_balance(&ledger, bob_group), 900);
    assert_eq!(ledger.state.balance_of(&name("dave")), START_BALANCE - 1_000);
}

#[test]
fn grant_without_recipients_refunds_owner_at_end() {
    let mut ledger = setup();
    let grant_id = create_grant(&mut ledger, 1_000, 1, 2);

    ledger.end_block(3).unwrap();
    assert_eq!(ledger.state.get_grant(grant_id).unwrap().amount, 1_000);

    let ops = ledger.end_block(3).unwrap();
    assert!(ops.contains(&VirtualOp::GrantFinished { grant_id, owner: name("dave"), refunded: 1_000 }));
    assert_eq!(ledger.state.balance_of(&name("dave")), START_BALANCE);
}

#[test]
fn grant_with_invalid_range_is_rejected() {
    let mut ledger = setup();
    let err = ledger
        .apply_operation(&Operation::CreateGrant {
            owner: name("dave"),
            target_discipline: PHYSICS,
            amount: Asset::primary(1_000),
            start_block: 10,
            end_block: 5,
        })
        .unwrap_err();
    assert_eq!(err, sciledger_chain::LedgerError::InvalidGrantRange { start: 10, end: 5 });
    assert_eq!(ledger.state.balance_of(&name("dave")), START_BALANCE);
}
