//! Session Scenario Test Suite
//!
//! End-to-end behaviour of a dice session through its public API:
//! - Cycle aggregation and payout modes
//! - Roll budget and the single-flight guard
//! - Unlock and upgrade cost curves
//! - Soft reset and config loading

use approx::assert_relative_eq;
use rf_dice_lab::{
    CostCurve, DiceConfig, DiceError, DiceSession, DieId, EventRecorder, PayoutMode,
    SettleOutcome,
};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

fn session_with(config: DiceConfig) -> DiceSession {
    DiceSession::with_seed(config, 2024).unwrap()
}

fn with_active(active: usize) -> DiceConfig {
    DiceConfig {
        starting_active: active,
        ..DiceConfig::classic()
    }
}

fn complete(session: &mut DiceSession, faces: &[u8]) -> rf_dice_lab::CycleOutcome {
    session.roll_all().unwrap();
    let mut last = None;
    for (i, &face) in faces.iter().enumerate() {
        last = Some(session.report_settle(DieId(i), face));
    }
    match last {
        Some(SettleOutcome::Completed(outcome)) => outcome,
        other => panic!("cycle did not complete: {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_two_dice_sum_and_payout() {
    let mut session = session_with(with_active(2));
    let outcome = complete(&mut session, &[4, 6]);

    assert_eq!(outcome.sum, 10);
    assert_eq!(outcome.payout, 10);
    assert_eq!(session.last_sum(), 10);
    assert_eq!(session.last_payout(), 10);
    assert_eq!(session.last_faces(), vec![4, 6, 0, 0, 0]);
}

#[test]
fn test_unupgraded_sum_is_face_total() {
    let mut session = session_with(DiceConfig::studio());
    session.deposit(1_000);
    for _ in 0..2 {
        session.try_unlock_next_die().unwrap();
    }

    for _ in 0..3 {
        session.roll_all().unwrap();
        let outcome = session.settle_pending().unwrap();
        let total: i64 = outcome.faces().iter().map(|&f| i64::from(f)).sum();
        assert_eq!(outcome.sum, total);
        assert_eq!(outcome.active_count(), 3);
    }
}

#[test]
fn test_upgraded_die_doubles_table_payout() {
    let mut config = DiceConfig::classic();
    config.payout.mode = PayoutMode::PerFace {
        table: vec![0, 1, 3, 5, 7, 9, 11],
    };
    let mut session = session_with(config);
    session.deposit(20);
    let receipt = session.try_upgrade_die(0).unwrap();
    assert_relative_eq!(receipt.multiplier, 2.0);

    let outcome = complete(&mut session, &[3]);
    assert_eq!(outcome.sum, 6);
    assert_eq!(outcome.payout, 10);
    assert_eq!(outcome.to_string(), "Sum: 6  (3x2)  Payout: 10");
}

#[test]
fn test_sum_multiplier_mode() {
    let mut session = session_with(DiceConfig {
        starting_active: 2,
        ..DiceConfig::sum_multiplier(3)
    });
    let outcome = complete(&mut session, &[2, 5]);
    assert_eq!(outcome.sum, 7);
    assert_eq!(outcome.payout, 21);
}

#[test]
fn test_events_follow_cycle_order() {
    let mut session = session_with(with_active(2));
    let recorder = EventRecorder::new();
    session.subscribe(recorder.clone());

    complete(&mut session, &[1, 2]);
    let names: Vec<&str> = recorder.events().iter().map(|e| e.type_name()).collect();
    assert_eq!(
        names,
        vec![
            "rolls_changed",
            "cycle_started",
            "die_settled",
            "die_settled",
            "payout_computed"
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROLL BUDGET
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_roll_while_busy_keeps_budget() {
    let mut session = session_with(DiceConfig::classic());
    session.roll_all().unwrap();
    let rolls = session.rolls_left();
    assert_eq!(session.roll_all(), Err(DiceError::Busy));
    assert_eq!(session.rolls_left(), rolls);
}

#[test]
fn test_no_rolls_left() {
    let mut session = session_with(DiceConfig::classic());
    for _ in 0..3 {
        complete(&mut session, &[1]);
    }
    assert_eq!(session.rolls_left(), 0);
    assert!(!session.can_roll());
    assert_eq!(session.roll_all(), Err(DiceError::NoRollsLeft));
    assert_eq!(session.rolls_left(), 0);
}

#[test]
fn test_soft_reset_mid_cycle_allows_roll() {
    let mut session = session_with(with_active(2));
    session.roll_all().unwrap();
    session.report_settle(DieId(0), 5);

    session.soft_reset();
    assert!(!session.is_rolling());
    assert_eq!(session.rolls_left(), 3);
    assert!(session.roll_all().is_ok());
    // the report from before the reset is gone
    assert_eq!(
        session.report_settle(DieId(1), 2),
        SettleOutcome::Recorded { pending: 1 }
    );
}

#[test]
fn test_payout_refills_rolls_when_configured() {
    let mut config = DiceConfig::classic();
    config.reset_rolls_on_payout = true;
    let mut session = session_with(config);
    complete(&mut session, &[6]);
    assert_eq!(session.rolls_left(), 2);
    assert_eq!(session.apply_last_payout(), 6);
    assert_eq!(session.rolls_left(), 3);
}

#[test]
fn test_repeat_apply_credits_once() {
    let mut session = session_with(DiceConfig::classic());
    complete(&mut session, &[4]);
    assert_eq!(session.apply_last_payout(), 4);
    assert_eq!(session.apply_last_payout(), 0);
    assert_eq!(session.balance(), 4);
    assert_eq!(session.last_payout(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRESSION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_unlock_cost_with_two_active() {
    let session = session_with(with_active(2));
    assert_eq!(session.next_unlock_cost(), 23);
    assert_eq!(CostCurve::new(10, 1.5).cost_at(2), 23);
}

#[test]
fn test_unlock_cost_strictly_increases() {
    let mut session = session_with(DiceConfig::classic());
    session.deposit(10_000);
    let mut previous = 0;
    while session.has_inactive_slot() {
        let receipt = session.try_unlock_next_die().unwrap();
        assert!(receipt.cost > previous);
        previous = receipt.cost;
    }
    assert_eq!(session.active_dice_count(), 5);
}

#[test]
fn test_exact_balance_unlock() {
    let mut session = session_with(DiceConfig::classic());
    session.deposit(session.next_unlock_cost());
    let receipt = session.try_unlock_next_die().unwrap();
    assert_eq!(receipt.balance, 0);
    assert_eq!(session.balance(), 0);
}

#[test]
fn test_unlock_without_funds_changes_nothing() {
    let mut session = session_with(DiceConfig::classic());
    session.deposit(14);
    assert_eq!(
        session.try_unlock_next_die(),
        Err(DiceError::InsufficientFunds {
            cost: 15,
            balance: 14
        })
    );
    assert_eq!(session.active_dice_count(), 1);
    assert_eq!(session.balance(), 14);
}

#[test]
fn test_upgrade_cost_independent_of_index() {
    let session = session_with(DiceConfig::classic());
    let costs: Vec<i64> = (0..5).map(|i| session.upgrade_cost(i).unwrap()).collect();
    assert!(costs.iter().all(|&c| c == costs[0]));
}

#[test]
fn test_double_upgrade_keeps_balance() {
    let mut session = session_with(DiceConfig::classic());
    session.deposit(100);
    session.try_upgrade_die(0).unwrap();
    let balance = session.balance();
    assert_eq!(
        session.try_upgrade_die(0),
        Err(DiceError::AlreadyUpgraded(DieId(0)))
    );
    assert_eq!(session.balance(), balance);
}

#[test]
fn test_upgrade_inactive_die_applies_after_unlock() {
    let mut session = session_with(DiceConfig::classic());
    session.deposit(100);
    session.try_upgrade_die(1).unwrap();
    session.try_unlock_next_die().unwrap();

    let outcome = complete(&mut session, &[2, 3]);
    assert_eq!(outcome.sum, 8);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_session_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.yaml");
    std::fs::write(&path, DiceConfig::high_roller().to_yaml().unwrap()).unwrap();

    let config = DiceConfig::load(&path).unwrap();
    let session = session_with(config);
    assert_eq!(session.active_dice_count(), 2);
    assert_eq!(session.balance(), 50);
    assert_eq!(session.rolls_left(), 5);
}

#[test]
fn test_stats_track_payouts() {
    let mut session = session_with(DiceConfig::classic());
    complete(&mut session, &[2]);
    complete(&mut session, &[5]);
    let stats = session.stats();
    assert_eq!(stats.cycles_completed, 2);
    assert_eq!(stats.best_payout, 5);
    assert_relative_eq!(stats.mean_payout(), 3.5);
}
