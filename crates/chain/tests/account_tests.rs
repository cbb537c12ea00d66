//! Accounts, common tokens, recovery, transaction atomicity, snapshot.

mod common;

use common::*;
use sciledger_chain::types::{Authority, COMMON_DISCIPLINE_ID, TIME_NEVER};
use sciledger_chain::{Asset, ChainState, Ledger, LedgerContext, LedgerError, Operation, ProtocolConfig, VirtualOp};

const WEEK: u64 = 7 * 24 * 60 * 60;
const DAY: u64 = 24 * 60 * 60;

fn create_erin(ledger: &mut Ledger) {
    ledger
        .apply_operation(&Operation::AccountCreate {
            fee: Asset::primary(1_000),
            creator: name("alice"),
            new_account_name: name("erin"),
            owner: Authority::single_key(key(50)),
            active: Authority::single_key(key(51)),
            posting: Authority::single_key(key(52)),
            memo_key: key(53),
            json_metadata: String::new(),
        })
        .unwrap();
}

fn transfer(from: &str, to: &str, amount: i64) -> Operation {
    Operation::Transfer { from: name(from), to: name(to), amount: Asset::primary(amount), memo: String::new() }
}

fn common_tokens(ledger: &Ledger, account: &str) -> i64 {
    ledger.state.find_account(&name(account)).unwrap().common_tokens
}

// ════════════════════════════════════════════════════════════════════════════
// ACCOUNT CREATE / TRANSFER
// ════════════════════════════════════════════════════════════════════════════

fn stake_erin(ledger: &mut Ledger, amount: i64) {
    ledger
        .apply_operation(&Operation::TransferToCommonTokens {
            from: name("alice"),
            to: Some(name("erin")),
            amount: Asset::primary(amount),
        })
        .unwrap();
}

#[test]
fn account_create_stakes_fee_as_common_expertise() {
    let mut ledger = setup();
    create_erin(&mut ledger);

    let erin = ledger.state.find_account(&name("erin")).unwrap();
    assert_eq!(erin.common_tokens, 0);
    assert_eq!(ledger.state.balance_of(&name("erin")), 0);
    assert_eq!(erin.recovery_account, Some(name("alice")));
    assert!(!erin.mined);
    assert_eq!(ledger.state.balance_of(&name("alice")), START_BALANCE - 1_000);
    assert_eq!(ledger.state.find_expert_token(&name("erin"), COMMON_DISCIPLINE_ID).unwrap().amount, 1_000);
    assert_eq!(ledger.state.get_authority(&name("erin")).unwrap().owner, Authority::single_key(key(50)));
}

#[test]
fn account_create_rejections() {
    let mut ledger = setup();
    let mut op = Operation::AccountCreate {
        fee: Asset::primary(999),
        creator: name("alice"),
        new_account_name: name("erin"),
        owner: Authority::single_key(key(50)),
        active: Authority::single_key(key(50)),
        posting: Authority::single_key(key(50)),
        memo_key: key(50),
        json_metadata: String::new(),
    };
    assert_eq!(
        ledger.apply_operation(&op).unwrap_err(),
        LedgerError::InsufficientFee { required: 1_000, provided: 999 }
    );

    if let Operation::AccountCreate { fee, new_account_name, .. } = &mut op {
        *fee = Asset::primary(1_000);
        *new_account_name = name("bob");
    }
    assert_eq!(ledger.apply_operation(&op).unwrap_err(), LedgerError::AccountAlreadyExists(name("bob")));
    assert!(ledger.state.find_account(&name("erin")).is_none());
}

#[test]
fn transfer_moves_balance() {
    let mut ledger = setup();
    ledger.apply_operation(&transfer("alice", "bob", 500)).unwrap();
    assert_eq!(ledger.state.balance_of(&name("alice")), START_BALANCE - 500);
    assert_eq!(ledger.state.balance_of(&name("bob")), START_BALANCE + 500);

    assert_eq!(ledger.apply_operation(&transfer("alice", "bob", 0)).unwrap_err(), LedgerError::NonPositiveAmount);
    assert!(matches!(
        ledger.apply_operation(&transfer("alice", "bob", START_BALANCE)).unwrap_err(),
        LedgerError::InsufficientBalance { .. }
    ));
    assert!(matches!(
        ledger.apply_operation(&transfer("alice", "nobody", 1)).unwrap_err(),
        LedgerError::AccountNotFound(_)
    ));
}

#[test]
fn transfer_to_common_tokens_credits_target_expertise() {
    let mut ledger = setup();
    ledger
        .apply_operation(&Operation::TransferToCommonTokens {
            from: name("alice"),
            to: Some(name("bob")),
            amount: Asset::primary(1_000),
        })
        .unwrap();
    assert_eq!(common_tokens(&ledger, "bob"), START_COMMON_TOKENS + 1_000);
    assert_eq!(
        ledger.state.find_expert_token(&name("bob"), COMMON_DISCIPLINE_ID).unwrap().amount,
        START_COMMON_TOKENS + 1_000
    );
    assert_eq!(ledger.state.balance_of(&name("alice")), START_BALANCE - 1_000);
}

// ════════════════════════════════════════════════════════════════════════════
// POWER-DOWN & DELEGATION
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn power_down_fills_weekly_with_route() {
    let mut ledger = setup();
    ledger
        .apply_operation(&Operation::WithdrawCommonTokens {
            account: name("alice"),
            total_common_tokens_amount: 13_000,
        })
        .unwrap();
    ledger
        .apply_operation(&Operation::SetWithdrawCommonTokensRoute {
            from_account: name("alice"),
            to_account: name("bob"),
            percent: 5_000,
            auto_common_token: false,
        })
        .unwrap();
    let alice = ledger.state.find_account(&name("alice")).unwrap();
    assert_eq!(alice.common_tokens_withdraw_rate, 1_000);
    assert_eq!(alice.withdraw_routes, 1);

    let ops = ledger.end_block(WEEK).unwrap();

    assert!(ops.contains(&VirtualOp::FillCommonTokensWithdraw {
        from_account: name("alice"),
        to_account: name("bob"),
        withdrawn: 500,
        deposited: 500,
        to_common_tokens: false,
    }));
    assert_eq!(common_tokens(&ledger, "alice"), START_COMMON_TOKENS - 1_000);
    assert_eq!(ledger.state.balance_of(&name("alice")), START_BALANCE + 500);
    assert_eq!(ledger.state.balance_of(&name("bob")), START_BALANCE + 500);
    assert_eq!(
        ledger.state.find_expert_token(&name("alice"), COMMON_DISCIPLINE_ID).unwrap().amount,
        START_COMMON_TOKENS - 1_000
    );
    let alice = ledger.state.find_account(&name("alice")).unwrap();
    assert_eq!(alice.withdrawn, 1_000);
    assert_eq!(alice.next_common_tokens_withdrawal, GENESIS_TIME + 2 * WEEK);

    // berhenti
    ledger
        .apply_operation(&Operation::WithdrawCommonTokens { account: name("alice"), total_common_tokens_amount: 0 })
        .unwrap();
    assert_eq!(ledger.state.find_account(&name("alice")).unwrap().next_common_tokens_withdrawal, TIME_NEVER);
    assert_eq!(
        ledger
            .apply_operation(&Operation::WithdrawCommonTokens { account: name("alice"), total_common_tokens_amount: 0 })
            .unwrap_err(),
        LedgerError::WithdrawRateUnchanged
    );
}

#[test]
fn unmined_account_cannot_power_down_below_floor() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    stake_erin(&mut ledger, 5_000);
    let err = ledger
        .apply_operation(&Operation::WithdrawCommonTokens { account: name("erin"), total_common_tokens_amount: 500 })
        .unwrap_err();
    assert_eq!(err, LedgerError::PowerDownFloor(10_000));
}

#[test]
fn unmined_account_can_stop_power_down_below_floor() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    stake_erin(&mut ledger, 11_000);
    ledger
        .apply_operation(&Operation::WithdrawCommonTokens { account: name("erin"), total_common_tokens_amount: 11_000 })
        .unwrap();
    assert_eq!(ledger.state.find_account(&name("erin")).unwrap().common_tokens_withdraw_rate, 846);

    ledger.end_block(WEEK).unwrap();
    ledger.end_block(WEEK).unwrap();
    assert_eq!(common_tokens(&ledger, "erin"), 9_308);

    // restart is blocked by the floor, stopping is not
    let err = ledger
        .apply_operation(&Operation::WithdrawCommonTokens { account: name("erin"), total_common_tokens_amount: 1_000 })
        .unwrap_err();
    assert_eq!(err, LedgerError::PowerDownFloor(10_000));
    ledger
        .apply_operation(&Operation::WithdrawCommonTokens { account: name("erin"), total_common_tokens_amount: 0 })
        .unwrap();

    let erin = ledger.state.find_account(&name("erin")).unwrap();
    assert_eq!(erin.common_tokens_withdraw_rate, 0);
    assert_eq!(erin.next_common_tokens_withdrawal, TIME_NEVER);

    ledger.end_block(WEEK).unwrap();
    assert_eq!(common_tokens(&ledger, "erin"), 9_308);
    assert_eq!(ledger.state.balance_of(&name("erin")), 2 * 846);
}

#[test]
fn withdraw_routes_cannot_exceed_full_amount() {
    let mut ledger = setup();
    let route = |to: &str, percent: u16| Operation::SetWithdrawCommonTokensRoute {
        from_account: name("alice"),
        to_account: name(to),
        percent,
        auto_common_token: true,
    };
    ledger.apply_operation(&route("bob", 6_000)).unwrap();
    assert_eq!(ledger.apply_operation(&route("carol", 5_000)).unwrap_err(), LedgerError::WithdrawRoutesExceedLimit);
    assert_eq!(ledger.apply_operation(&route("carol", 0)).unwrap_err(), LedgerError::ZeroPercentRoute);

    // percent 0 menghapus route yang ada
    ledger.apply_operation(&route("bob", 0)).unwrap();
    assert_eq!(ledger.state.find_account(&name("alice")).unwrap().withdraw_routes, 0);
}

#[test]
fn delegation_decrease_returns_after_period() {
    let mut ledger = setup();
    let delegate = |amount: i64| Operation::DelegateCommonTokens {
        delegator: name("alice"),
        delegatee: name("bob"),
        common_tokens: amount,
    };
    ledger.apply_operation(&delegate(10_000)).unwrap();
    let alice = ledger.state.find_account(&name("alice")).unwrap();
    assert_eq!(alice.delegated_common_tokens, 10_000);
    assert_eq!(ledger.state.find_account(&name("bob")).unwrap().received_common_tokens, 10_000);

    ledger.apply_operation(&delegate(4_000)).unwrap();
    assert_eq!(ledger.state.find_account(&name("bob")).unwrap().received_common_tokens, 4_000);
    // delegator menunggu return period
    assert_eq!(ledger.state.find_account(&name("alice")).unwrap().delegated_common_tokens, 10_000);
    assert_eq!(ledger.state.find_delegation(&name("alice"), &name("bob")).unwrap().common_tokens, 4_000);

    let ops = ledger.end_block(ledger.state.config.delegation_return_period).unwrap();
    assert!(ops.contains(&VirtualOp::ReturnCommonTokensDelegation { account: name("alice"), common_tokens: 6_000 }));
    assert_eq!(ledger.state.find_account(&name("alice")).unwrap().delegated_common_tokens, 4_000);
    assert!(ledger.state.expiring_delegations.is_empty());

    assert_eq!(ledger.apply_operation(&delegate(4_000)).unwrap_err(), LedgerError::DelegationUnchanged);
    assert!(matches!(
        ledger.apply_operation(&delegate(START_COMMON_TOKENS + 1)).unwrap_err(),
        LedgerError::InsufficientCommonTokens { .. }
    ));
    let self_delegate = Operation::DelegateCommonTokens {
        delegator: name("alice"),
        delegatee: name("alice"),
        common_tokens: 1,
    };
    assert_eq!(ledger.apply_operation(&self_delegate).unwrap_err(), LedgerError::SelfDelegation);
}

// ════════════════════════════════════════════════════════════════════════════
// RECOVERY
// ════════════════════════════════════════════════════════════════════════════

fn compromise_erin(ledger: &mut Ledger) {
    ledger
        .apply_operation(&Operation::AccountUpdate {
            account: name("erin"),
            owner: Some(Authority::single_key(key(99))),
            active: None,
            posting: None,
            memo_key: key(53),
            json_metadata: String::new(),
        })
        .unwrap();
}

fn request_recovery(ledger: &mut Ledger, partner: &str) -> sciledger_chain::Result<Vec<VirtualOp>> {
    ledger.apply_operation(&Operation::RequestAccountRecovery {
        recovery_account: name(partner),
        account_to_recover: name("erin"),
        new_owner_authority: Authority::single_key(key(77)),
    })
}

fn recover() -> Operation {
    Operation::RecoverAccount {
        account_to_recover: name("erin"),
        new_owner_authority: Authority::single_key(key(77)),
        recent_owner_authority: Authority::single_key(key(50)),
    }
}

#[test]
fn recovery_partner_restores_owner() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    compromise_erin(&mut ledger);

    assert_eq!(request_recovery(&mut ledger, "bob").unwrap_err(), LedgerError::NotRecoveryPartner(name("bob")));
    request_recovery(&mut ledger, "alice").unwrap();
    ledger.apply_operation(&recover()).unwrap();

    assert_eq!(ledger.state.get_authority(&name("erin")).unwrap().owner, Authority::single_key(key(77)));
    assert!(ledger.state.recovery_requests.is_empty());
}

#[test]
fn expired_recovery_request_is_pruned() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    compromise_erin(&mut ledger);
    request_recovery(&mut ledger, "alice").unwrap();

    ledger.end_block(DAY).unwrap();
    assert!(ledger.state.recovery_requests.is_empty());
    assert_eq!(ledger.apply_operation(&recover()).unwrap_err(), LedgerError::RecoveryRequestNotFound);
}

#[test]
fn recovery_with_unknown_recent_owner_fails() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    request_recovery(&mut ledger, "alice").unwrap();
    // owner belum pernah diganti: tidak ada history
    assert_eq!(ledger.apply_operation(&recover()).unwrap_err(), LedgerError::RecentAuthorityNotFound);
}

#[test]
fn change_recovery_account_takes_effect_after_period() {
    let mut ledger = setup();
    create_erin(&mut ledger);
    ledger
        .apply_operation(&Operation::ChangeRecoveryAccount {
            account_to_recover: name("erin"),
            new_recovery_account: name("bob"),
        })
        .unwrap();
    assert_eq!(ledger.state.find_account(&name("erin")).unwrap().recovery_account, Some(name("alice")));

    ledger.end_block(ledger.state.config.owner_auth_recovery_period).unwrap();
    assert_eq!(ledger.state.find_account(&name("erin")).unwrap().recovery_account, Some(name("bob")));
    assert!(ledger.state.change_recovery_requests.is_empty());
}

// ════════════════════════════════════════════════════════════════════════════
// TRANSACTION & SNAPSHOT
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn failing_transaction_rolls_back_every_operation() {
    let mut ledger = setup();
    let root = ledger.state_root().unwrap();
    let ctx = ledger.ctx.clone();

    let err = ledger
        .apply_transaction(&[transfer("alice", "bob", 100), transfer("alice", "carol", START_BALANCE)])
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert_eq!(ledger.state_root().unwrap(), root);
    assert_eq!(ledger.ctx, ctx);
    assert_eq!(ledger.state.balance_of(&name("bob")), START_BALANCE);

    ledger.apply_transaction(&[transfer("alice", "bob", 100), transfer("alice", "carol", 100)]).unwrap();
    assert_eq!(ledger.state.balance_of(&name("alice")), START_BALANCE - 200);
}

#[test]
fn ledger_rejects_config_that_would_divide_by_zero() {
    let mut config = ProtocolConfig::default();
    config.vote_power_cost_divisor = 0;
    assert!(matches!(Ledger::from_genesis(config.clone(), &genesis()), Err(LedgerError::InvalidConfig(_))));
    assert!(matches!(ChainState::new(config), Err(LedgerError::InvalidConfig(_))));

    let mut config = ProtocolConfig::default();
    config.vote_regeneration_seconds = 0;
    assert!(matches!(
        Ledger::new(config, LedgerContext::new(GENESIS_TIME, 0)),
        Err(LedgerError::InvalidConfig(_))
    ));

    assert!(Ledger::new(ProtocolConfig::default(), LedgerContext::new(GENESIS_TIME, 0)).is_ok());
}

#[test]
fn snapshot_restores_ledger_with_context() {
    let mut ledger = setup();
    add_expertise(&mut ledger, "alice", PHYSICS, 1_000);
    let (_, research, content) = physics_content(&mut ledger);
    ledger.apply_operation(&vote("alice", PHYSICS, 10_000, research, content)).unwrap();
    ledger.end_block(3).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let meta = ledger.state.export_snapshot(&ledger.ctx, dir.path()).unwrap();
    let (state, ctx, loaded_meta) = ChainState::import_snapshot(dir.path()).unwrap();

    assert_eq!(loaded_meta, meta);
    assert_eq!(ctx, ledger.ctx);
    assert_eq!(state.compute_state_root().unwrap(), ledger.state_root().unwrap());
    assert_eq!(ctx.total_active_disciplines_reward_weight, 1_000);
}

#[test]
fn operation_json_roundtrip_uses_snake_case_tags() {
    let op = transfer("alice", "bob", 5);
    let json = op.to_json().unwrap();
    assert!(json.starts_with("{\"transfer\""));
    assert_eq!(Operation::from_json(&json).unwrap(), op);
    assert!(Operation::from_json("{\"no_such_op\":{}}").is_err());
}
