//! Stake Ledger Tests
//!
//! Precondition ordering, single-vote replacement, multi-vote splitting, and
//! serialization of concurrent writes for one participant.

use crate::config::SettlementConfig;
use crate::wager::collaborators::WagerStore;
use crate::wager::error::{AuthorizationError, StateError, ValidationError, WagerError};
use crate::wager::ledger::StakeLedger;
use crate::wager::locks::LockRegistry;
use crate::wager::memory::{GroupRoster, InMemoryWagerStore};
use crate::wager::types::{
    GroupId, OptionId, ParticipantId, SettlementMode, VotingMode, Wager, WagerId, WagerOption,
    WagerStatus,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct Fixture {
    store: Arc<InMemoryWagerStore>,
    ledger: StakeLedger,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap()
}

fn wager(id: &str, mode: VotingMode, min: Decimal, max: Decimal) -> Wager {
    Wager {
        id: WagerId::from(id),
        group_id: GroupId::from("g1"),
        title: "Derby".to_string(),
        description: String::new(),
        voting_mode: mode,
        options: vec![
            WagerOption::new("home", "Home"),
            WagerOption::new("draw", "Draw"),
            WagerOption::new("away", "Away"),
        ],
        outcome: None,
        status: WagerStatus::Open,
        deadline: t0() + Duration::hours(2),
        min_stake: min,
        max_stake: max,
        created_by: ParticipantId::from("owner"),
        created_at: t0(),
        closed_at: None,
        settled_at: None,
    }
}

fn fixture(wagers: Vec<Wager>) -> Fixture {
    let store = Arc::new(InMemoryWagerStore::new());
    for w in &wagers {
        store.insert_wager(w).unwrap();
    }
    let roster = Arc::new(
        GroupRoster::new()
            .with_owner("g1", "owner")
            .with_member("g1", "alice")
            .with_member("g1", "bob"),
    );
    let ledger = StakeLedger::new(
        store.clone(),
        roster,
        Arc::new(LockRegistry::new()),
        &SettlementConfig::default(),
    );
    Fixture { store, ledger }
}

fn p(id: &str) -> ParticipantId {
    ParticipantId::from(id)
}

fn o(id: &str) -> OptionId {
    OptionId::from(id)
}

fn w(id: &str) -> WagerId {
    WagerId::from(id)
}

fn multi_partial() -> VotingMode {
    VotingMode::Multi { settlement: SettlementMode::PartialMatch }
}

// =============================================================================
// SINGLE VOTE
// =============================================================================

#[test]
fn test_single_vote_restake_replaces_record() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(100))]);

    f.ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(10), t0())
        .unwrap();
    let later = t0() + Duration::minutes(10);
    f.ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("away"), dec!(25), later)
        .unwrap();

    let stakes = f.ledger.stakes_for_wager(&w("w1")).unwrap();
    assert_eq!(stakes.len(), 1);
    assert_eq!(stakes[0].option_id, o("away"));
    assert_eq!(stakes[0].amount, dec!(25));
    assert_eq!(stakes[0].placed_at, later);
}

#[test]
fn test_multi_vote_place_stake_adds_per_option() {
    let f = fixture(vec![wager("w1", multi_partial(), dec!(1), dec!(100))]);

    f.ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(10), t0())
        .unwrap();
    f.ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("draw"), dec!(5), t0())
        .unwrap();
    f.ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(12), t0())
        .unwrap();

    let stakes = f.ledger.stakes_for_wager(&w("w1")).unwrap();
    assert_eq!(stakes.len(), 2);
    let home = stakes.iter().find(|s| s.option_id == o("home")).unwrap();
    assert_eq!(home.amount, dec!(12));
}

// =============================================================================
// MULTI VOTE SPLIT
// =============================================================================

#[test]
fn test_multi_stake_splits_total_evenly() {
    let f = fixture(vec![wager("w1", multi_partial(), dec!(1), dec!(100))]);

    let records = f
        .ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[o("home"), o("away")], dec!(30), t0())
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.amount == dec!(15)));
}

#[test]
fn test_multi_stake_remainder_keeps_total_exact() {
    let f = fixture(vec![wager("w1", multi_partial(), dec!(1), dec!(100))]);

    let records = f
        .ledger
        .place_multi_stake(
            &p("bob"),
            "Bob",
            &w("w1"),
            &[o("home"), o("draw"), o("away")],
            dec!(10),
            t0(),
        )
        .unwrap();

    let total: Decimal = records.iter().map(|r| r.amount).sum();
    assert_eq!(total, dec!(10));
}

#[test]
fn test_multi_stake_replaces_previous_selection() {
    let f = fixture(vec![wager("w1", multi_partial(), dec!(1), dec!(100))]);

    f.ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[o("home"), o("draw")], dec!(20), t0())
        .unwrap();
    f.ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[o("away")], dec!(7), t0())
        .unwrap();

    let stakes = f.ledger.stakes_for_wager(&w("w1")).unwrap();
    assert_eq!(stakes.len(), 1);
    assert_eq!(stakes[0].option_id, o("away"));
}

#[test]
fn test_multi_stake_rejects_bad_selection() {
    let f = fixture(vec![
        wager("w1", multi_partial(), dec!(1), dec!(100)),
        wager("single", VotingMode::Single, dec!(1), dec!(100)),
    ]);

    let err = f
        .ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[], dec!(10), t0())
        .unwrap_err();
    assert_eq!(err, WagerError::Validation(ValidationError::EmptySelection));

    let err = f
        .ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[o("home"), o("home")], dec!(10), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::DuplicateOption { .. })
    ));

    let err = f
        .ledger
        .place_multi_stake(&p("bob"), "Bob", &w("single"), &[o("home")], dec!(10), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::WrongVotingMode { .. })
    ));
}

#[test]
fn test_multi_stake_checks_each_split_amount() {
    let f = fixture(vec![wager("w1", multi_partial(), dec!(5), dec!(100))]);

    // 8 over two options is 4 each, under the minimum of 5.
    let err = f
        .ledger
        .place_multi_stake(&p("bob"), "Bob", &w("w1"), &[o("home"), o("away")], dec!(8), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::StakeOutOfBounds { .. })
    ));
    assert_eq!(f.store.stake_count(), 0);
}

// =============================================================================
// PRECONDITIONS
// =============================================================================

#[test]
fn test_floor_applies_when_minimum_is_zero() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(0), dec!(0))]);

    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(0.50), t0())
        .unwrap_err();
    assert_eq!(
        err,
        WagerError::Validation(ValidationError::StakeOutOfBounds {
            amount: dec!(0.50),
            min: dec!(1),
            max: dec!(1),
        })
    );

    assert!(f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(1), t0())
        .is_ok());
}

#[test]
fn test_amount_above_maximum_rejected() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(50))]);
    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(50.01), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        WagerError::Validation(ValidationError::StakeOutOfBounds { .. })
    ));
}

#[test]
fn test_unknown_option_rejected() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(50))]);
    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("extra_time"), dec!(5), t0())
        .unwrap_err();
    assert_eq!(
        err,
        WagerError::Validation(ValidationError::UnknownOption { option_id: o("extra_time") })
    );
}

#[test]
fn test_non_member_rejected() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(50))]);
    let err = f
        .ledger
        .place_stake(&p("mallory"), "Mallory", &w("w1"), &o("home"), dec!(5), t0())
        .unwrap_err();
    assert!(matches!(
        err,
        WagerError::Authorization(AuthorizationError::NotGroupMember { .. })
    ));
    assert_eq!(f.store.stake_count(), 0);
}

#[test]
fn test_deadline_passed_rejected() {
    let f = fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(50))]);
    let at_deadline = t0() + Duration::hours(2);
    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("home"), dec!(5), at_deadline)
        .unwrap_err();
    assert!(matches!(err, WagerError::State(StateError::DeadlinePassed { .. })));
}

#[test]
fn test_closed_wager_rejected_before_other_checks() {
    let mut closed = wager("w1", VotingMode::Single, dec!(1), dec!(50));
    closed.status = WagerStatus::Closed;
    let f = fixture(vec![closed]);

    // Bad option and bad amount too, but the state error wins.
    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("w1"), &o("nope"), dec!(0), t0())
        .unwrap_err();
    assert_eq!(
        err,
        WagerError::State(StateError::NotOpen {
            wager_id: w("w1"),
            status: WagerStatus::Closed,
        })
    );
}

#[test]
fn test_missing_wager_surfaces_store_error() {
    let f = fixture(vec![]);
    let err = f
        .ledger
        .place_stake(&p("alice"), "Alice", &w("ghost"), &o("home"), dec!(5), t0())
        .unwrap_err();
    assert!(err.is_user_facing());
    assert_eq!(err.kind(), "store");
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn test_concurrent_single_vote_writes_leave_one_record() {
    let f = Arc::new(fixture(vec![wager("w1", VotingMode::Single, dec!(1), dec!(100))]));

    let handles: Vec<_> = (1..=16)
        .map(|i| {
            let f = Arc::clone(&f);
            thread::spawn(move || {
                let option = if i % 2 == 0 { "home" } else { "away" };
                f.ledger
                    .place_stake(
                        &p("alice"),
                        "Alice",
                        &w("w1"),
                        &o(option),
                        Decimal::from(i),
                        t0(),
                    )
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stakes = f.ledger.stakes_for_wager(&w("w1")).unwrap();
    assert_eq!(stakes.len(), 1);
    assert!(stakes[0].amount >= dec!(1) && stakes[0].amount <= dec!(16));
}
