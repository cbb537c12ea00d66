//! # Voting / Reward-Weight Engine Integration Tests
//!
//! - Skenario alice (1000 token, content berumur setengah auction window)
//! - Telescoping curator weight
//! - DuplicateVote tanpa mutasi
//! - Regenerasi voting power
//! - Review & vote_for_review

mod common;

use common::*;
use sciledger_chain::reward_curve::{evaluate_reward_curve, CurveId};
use sciledger_chain::{LedgerError, Operation};

const HALF_WINDOW: u64 = 43_200;
const FULL_WINDOW: u64 = 86_400;

// ════════════════════════════════════════════════════════════════════════════
// 1. SINGLE VOTE
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn alice_full_weight_vote_scenario() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.ctx.time += HALF_WINDOW;

    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();

    let v = ledger.state.find_vote(&name("alice"), PHYSICS, content).unwrap();
    assert_eq!(v.tokens_amount, 1_000);
    assert_eq!(v.weight, 15_811);
    assert_eq!(v.voting_power, 10_000);

    let tvo = ledger.state.find_total_votes(content, PHYSICS).unwrap();
    assert_eq!(tvo.total_weight, 1_000);
    assert_eq!(tvo.total_active_weight, 1_000);
    assert_eq!(tvo.total_research_reward_weight, 31_622);
    assert_eq!(tvo.total_curators_reward_weight, 15_811);

    let token = ledger.state.find_expert_token(&name("alice"), PHYSICS).unwrap();
    assert_eq!(token.voting_power, 9_000);
    assert_eq!(token.last_vote_time, ledger.ctx.time);

    let discipline = ledger.state.get_discipline(PHYSICS).unwrap();
    assert_eq!(discipline.total_active_reward_weight, 1_000);
    assert_eq!(discipline.total_active_research_reward_weight, 31_622);
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 1_000);
}

#[test]
fn half_weight_vote_uses_half_the_tokens() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.ctx.time += FULL_WINDOW;

    ledger.apply_operation(&vote("alice", PHYSICS, -5_000, research, content)).unwrap();

    let v = ledger.state.find_vote(&name("alice"), PHYSICS, content).unwrap();
    assert_eq!(v.vote_percent, -5_000);
    assert_eq!(v.tokens_amount, 500);
    let token = ledger.state.find_expert_token(&name("alice"), PHYSICS).unwrap();
    assert_eq!(token.voting_power, 9_500);
}

// ════════════════════════════════════════════════════════════════════════════
// 2. TELESCOPING
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn curator_weights_telescope_to_final_curve() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    add_expertise(&mut ledger, "bob", PHYSICS, 500);
    let (_, research, content) = physics_content(&mut ledger);
    // di luar auction window, decay = 1
    ledger.ctx.time += FULL_WINDOW;

    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();
    ledger.apply_operation(&vote("bob", PHYSICS, 10_000, research, content)).unwrap();

    let w1 = ledger.state.find_vote(&name("alice"), PHYSICS, content).unwrap().weight;
    let w2 = ledger.state.find_vote(&name("bob"), PHYSICS, content).unwrap().weight;
    let expected = evaluate_reward_curve(1_500, CurveId::Power1Dot5).unwrap();
    assert_eq!(w1, 31_622);
    assert_eq!(w1 + w2, expected);

    let tvo = ledger.state.find_total_votes(content, PHYSICS).unwrap();
    assert_eq!(tvo.total_weight, 1_500);
    assert_eq!(tvo.total_curators_reward_weight, expected);
}

// ════════════════════════════════════════════════════════════════════════════
// 3. FAILURES DO NOT MUTATE
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn duplicate_vote_is_rejected_without_mutation() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.ctx.time += HALF_WINDOW;
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();

    let root_before = ledger.state_root().unwrap();
    let ctx_before = ledger.ctx.clone();
    ledger.ctx.time += 10;
    let ctx_time = ledger.ctx.time;

    let err = ledger.apply_operation(&vote("alice", PHYSICS, 5_000, research, content)).unwrap_err();
    assert_eq!(err, LedgerError::DuplicateVote);
    assert_eq!(ledger.state_root().unwrap(), root_before);
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, ctx_before.total_active_disciplines_reward_weight);
    assert_eq!(ledger.ctx.time, ctx_time);
}

#[test]
fn out_of_range_weight_is_rejected_without_mutation() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    let (_, research, content) = physics_content(&mut ledger);
    let review_id = ledger.state.next_ids.review;
    ledger.apply_operation(&make_review("bob", content, true)).unwrap();
    let root_before = ledger.state_root().unwrap();

    for weight in [10_001, -10_001, 20_000, i16::MIN] {
        assert_eq!(
            ledger.apply_operation(&vote("alice", PHYSICS, weight, research, content)).unwrap_err(),
            LedgerError::InvalidVoteWeight
        );
        let err = ledger
            .apply_operation(&Operation::VoteForReview {
                voter: name("alice"),
                discipline_id: PHYSICS,
                weight,
                review_id,
            })
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidVoteWeight);
    }
    assert!(ledger.state.find_vote(&name("alice"), PHYSICS, content).is_none());
    assert_eq!(ledger.state_root().unwrap(), root_before);

    ledger.apply_operation(&vote("alice", PHYSICS, -10_000, research, content)).unwrap();
    let v = ledger.state.find_vote(&name("alice"), PHYSICS, content).unwrap();
    assert_eq!(v.vote_percent, -10_000);
    assert_eq!(v.tokens_amount, 1_000);
}

#[test]
fn vote_validation_errors() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    add_expertise(&mut ledger, "alice", BIOLOGY, 1_000);
    add_expertise(&mut ledger, "carol", PHYSICS, 1);
    let (_, research, content) = physics_content(&mut ledger);

    assert_eq!(
        ledger.apply_operation(&vote("alice", PHYSICS, 0, research, content)).unwrap_err(),
        LedgerError::InvalidVoteWeight
    );
    assert_eq!(
        ledger.apply_operation(&vote("carol", PHYSICS, 1, research, content)).unwrap_err(),
        LedgerError::ZeroWeightVote
    );
    assert_eq!(
        ledger.apply_operation(&vote("alice", BIOLOGY, 10_000, research, content)).unwrap_err(),
        LedgerError::DisciplineNotInResearch(BIOLOGY)
    );
    assert!(matches!(
        ledger.apply_operation(&vote("bob", PHYSICS, 10_000, research, content)).unwrap_err(),
        LedgerError::ExpertTokenNotFound { .. }
    ));
    assert_eq!(
        ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, 99)).unwrap_err(),
        LedgerError::ContentNotFound(99)
    );
    assert!(ledger.state.votes.is_empty());
}

// ════════════════════════════════════════════════════════════════════════════
// 4. REGENERATION
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn voting_power_regenerates_monotonically_up_to_full() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();

    let token = ledger.state.find_expert_token(&name("alice"), PHYSICS).unwrap().clone();
    let regen = ledger.state.config.vote_regeneration_seconds;
    let start = token.last_vote_time;

    assert_eq!(ledger.state.current_voting_power(&token, start), 9_000);
    assert_eq!(ledger.state.current_voting_power(&token, start + regen / 20), 9_500);
    assert_eq!(ledger.state.current_voting_power(&token, start + regen), 10_000);

    let mut previous = 0;
    for step in 0..=40 {
        let power = ledger.state.current_voting_power(&token, start + step * regen / 20);
        assert!(power >= previous);
        assert!(power <= 10_000);
        previous = power;
    }
}

#[test]
fn second_vote_spends_regenerated_power() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, c1) = physics_content(&mut ledger);
    let c2 = create_content(&mut ledger, "alice", research, "milestone-2", &["alice"], vec![]);

    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, c1)).unwrap();
    ledger.ctx.time += ledger.state.config.vote_regeneration_seconds / 20;
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, c2)).unwrap();

    let v2 = ledger.state.find_vote(&name("alice"), PHYSICS, c2).unwrap();
    assert_eq!(v2.voting_power, 9_500);
    assert_eq!(v2.tokens_amount, 950);
    let token = ledger.state.find_expert_token(&name("alice"), PHYSICS).unwrap();
    assert_eq!(token.voting_power, 9_500 - 950);
}

// ════════════════════════════════════════════════════════════════════════════
// 5. REVIEWS
// ════════════════════════════════════════════════════════════════════════════

fn make_review(author: &str, content: u64, positive: bool) -> Operation {
    Operation::MakeReview {
        author: name(author),
        research_content_id: content,
        content: "solid work".into(),
        is_positive: positive,
        references: vec![],
        external_references: vec![],
    }
}

#[test]
fn positive_review_casts_full_weight_content_vote() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    let (_, _, content) = physics_content(&mut ledger);

    let review_id = ledger.state.next_ids.review;
    ledger.apply_operation(&make_review("bob", content, true)).unwrap();

    let review = ledger.state.get_review(review_id).unwrap();
    assert!(review.disciplines.contains(&PHYSICS));
    assert_eq!(review.expertise_amounts_used.get(&PHYSICS), Some(&2_000));
    assert_eq!(ledger.state.reviews_of_content(content).count(), 1);

    let v = ledger.state.find_vote(&name("bob"), PHYSICS, content).unwrap();
    assert_eq!(v.vote_percent, 10_000);
    assert_eq!(v.tokens_amount, 2_000);
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 2_000);
}

#[test]
fn negative_review_does_not_vote() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    let (_, _, content) = physics_content(&mut ledger);

    ledger.apply_operation(&make_review("bob", content, false)).unwrap();
    assert!(ledger.state.find_vote(&name("bob"), PHYSICS, content).is_none());
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 0);
}

#[test]
fn review_requires_expertise_in_research_discipline() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "dave", BIOLOGY, 2_000);
    let (_, _, content) = physics_content(&mut ledger);

    let err = ledger.apply_operation(&make_review("dave", content, true)).unwrap_err();
    assert_eq!(err, LedgerError::InsufficientExpertise);
    assert!(ledger.state.reviews.is_empty());
}

#[test]
fn vote_for_review_updates_review_weights() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "bob", PHYSICS, 2_000);
    add_expertise(&mut ledger, "carol", PHYSICS, 1_000);
    let (_, _, content) = physics_content(&mut ledger);
    let review_id = ledger.state.next_ids.review;
    ledger.apply_operation(&make_review("bob", content, true)).unwrap();
    ledger.ctx.time += FULL_WINDOW;

    ledger
        .apply_operation(&Operation::VoteForReview {
            voter: name("carol"),
            discipline_id: PHYSICS,
            weight: 10_000,
            review_id,
        })
        .unwrap();

    let review = ledger.state.get_review(review_id).unwrap();
    assert_eq!(review.reward_weights_per_discipline.get(&PHYSICS), Some(&31_622));
    // running total discipline naik 0 → 31622; di luar window tanpa decay
    let curation = evaluate_reward_curve(31_622, CurveId::Power1Dot5).unwrap();
    assert_eq!(review.curation_reward_weights_per_discipline.get(&PHYSICS), Some(&curation));
    // satu-satunya review di discipline: modifier maksimum 200%
    assert_eq!(review.weight_modifiers.get(&PHYSICS), Some(&20_000));
    assert_eq!(ledger.state.get_discipline(PHYSICS).unwrap().total_active_review_reward_weight, 31_622);

    let again = ledger.apply_operation(&Operation::VoteForReview {
        voter: name("carol"),
        discipline_id: PHYSICS,
        weight: 10_000,
        review_id,
    });
    assert_eq!(again.unwrap_err(), LedgerError::DuplicateVote);
}

// ════════════════════════════════════════════════════════════════════════════
// 6. CONTENT ACTIVITY
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn expired_content_leaves_active_denominators() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 1_000);

    let window = ledger.state.config.content_activity_window_seconds;
    let vops = ledger.end_block(window).unwrap();
    assert!(vops.iter().any(|op| matches!(
        op,
        sciledger_chain::VirtualOp::ResearchContentDeactivated { research_content_id } if *research_content_id == content
    )));

    assert!(!ledger.state.get_research_content(content).unwrap().is_active());
    assert_eq!(ledger.ctx.total_active_disciplines_reward_weight, 0);
    let discipline = ledger.state.get_discipline(PHYSICS).unwrap();
    assert_eq!(discipline.total_active_reward_weight, 0);
    assert_eq!(discipline.total_active_research_reward_weight, 0);
    let tvo = ledger.state.find_total_votes(content, PHYSICS).unwrap();
    assert_eq!(tvo.total_active_weight, 0);
    assert_eq!(tvo.total_weight, 1_000);
}
