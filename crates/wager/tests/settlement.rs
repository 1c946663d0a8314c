//! End-to-end settlement flows against the in-memory store.

use chrono::{TimeZone, Utc};

use wager::testing::{StoreOp, TestLedger};
use wager::{Account, MatchError, MatchId, MatchTable, Reconciled};

fn alice() -> Account {
    Account::new(1, "alice", 100)
}

fn bob() -> Account {
    Account::new(2, "bob", 100)
}

fn carol() -> Account {
    Account::new(3, "carol", 100)
}

fn ledger() -> TestLedger {
    TestLedger::new([alice(), bob(), carol()])
}

// =============================================================================
// Full lifecycle
// =============================================================================

#[tokio::test]
async fn challenge_accept_settle_archive() {
    let t = ledger();
    let time = Utc.with_ymd_and_hms(2024, 5, 17, 20, 30, 0).unwrap();

    let mut m = t.lifecycle.create_match(50, &alice(), &bob()).await.unwrap();
    m.set_accepted(true).await.unwrap();
    m.set_active(false).await.unwrap();

    let live = t.lifecycle.get_match(m.id(), MatchTable::Live).await.unwrap();
    assert!(live.accepted());
    assert!(!live.active());

    assert!(m.set_winner(&alice()));
    m.set_match_time(time);
    m.archive().await.unwrap();
    assert!(m.is_history());

    let archived = t
        .lifecycle
        .get_match(m.id(), MatchTable::History)
        .await
        .unwrap();
    assert_eq!(archived.amount(), 50);
    assert_eq!(archived.challenger(), &alice());
    assert_eq!(archived.recipient(), &bob());
    assert_eq!(archived.winner(), Some(&alice()));
    assert_eq!(archived.match_time(), Some(time));

    let err = t
        .lifecycle
        .get_match(m.id(), MatchTable::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::NotFound { .. }), "got: {err:?}");
}

#[tokio::test]
async fn created_match_round_trips() {
    let t = ledger();

    let created = t.lifecycle.create_match(100, &alice(), &bob()).await.unwrap();
    let reread = t
        .lifecycle
        .get_match(created.id(), MatchTable::Live)
        .await
        .unwrap();

    assert_eq!(created.amount(), 100);
    assert!(!created.active());
    assert!(!created.accepted());
    assert!(!created.is_history());
    assert_eq!(created, reread);
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn outsider_never_becomes_winner() {
    let t = ledger();
    let mut m = t.lifecycle.create_match(10, &alice(), &bob()).await.unwrap();

    assert!(!m.set_winner(&carol()));
    assert!(m.winner().is_none());

    m.set_winner(&bob());
    assert!(!m.set_winner(&carol()));
    assert_eq!(m.winner(), Some(&bob()));
}

#[tokio::test]
async fn setting_history_twice_is_harmless() {
    let t = ledger();
    let mut once = t.lifecycle.create_match(10, &alice(), &bob()).await.unwrap();
    let mut twice = once.clone();

    once.set_is_history(true);
    twice.set_is_history(true);
    twice.set_is_history(true);

    assert_eq!(once, twice);
}

// =============================================================================
// Archive failure modes
// =============================================================================

#[tokio::test]
async fn archive_write_failure_leaves_live_row() {
    let t = ledger();
    let mut m = t.lifecycle.create_match(30, &alice(), &bob()).await.unwrap();
    m.set_accepted(true).await.unwrap();
    m.set_winner(&bob());
    let before = t.lifecycle.get_match(m.id(), MatchTable::Live).await.unwrap();

    t.storage.fail(StoreOp::CreateHistory);
    let err = m.archive().await.unwrap_err();

    assert!(matches!(err, MatchError::WriteFailure { .. }), "got: {err:?}");
    assert!(!m.is_history());
    let after = t.lifecycle.get_match(m.id(), MatchTable::Live).await.unwrap();
    assert_eq!(before, after);

    // Nothing was written, so a retry settles it.
    m.archive().await.unwrap();
    assert!(t
        .lifecycle
        .get_match(m.id(), MatchTable::History)
        .await
        .is_ok());
}

#[tokio::test]
async fn archive_delete_failure_is_distinct_and_reconcilable() {
    let t = ledger();
    let mut m = t.lifecycle.create_match(30, &alice(), &bob()).await.unwrap();
    m.set_winner(&alice());

    t.storage.fail(StoreOp::DeleteLive);
    let err = m.archive().await.unwrap_err();

    assert!(matches!(err, MatchError::DeleteFailure { .. }), "got: {err:?}");
    assert!(err.is_inconsistent());
    assert!(t.lifecycle.get_match(m.id(), MatchTable::Live).await.is_ok());
    assert!(t
        .lifecycle
        .get_match(m.id(), MatchTable::History)
        .await
        .is_ok());
    assert_eq!(t.lifecycle.metrics().archive_delete_failures.get(), 1);

    // Retrying the archive collides with the history row already written.
    let retry = m.archive().await.unwrap_err();
    assert!(matches!(retry, MatchError::WriteFailure { .. }), "got: {retry:?}");

    assert_eq!(
        t.lifecycle.reconcile(m.id()).await.unwrap(),
        Reconciled::RemovedLiveRow
    );
    assert!(t
        .lifecycle
        .get_match(m.id(), MatchTable::Live)
        .await
        .is_err());
    assert_eq!(t.lifecycle.reconcile(m.id()).await.unwrap(), Reconciled::Clean);
}

#[tokio::test]
async fn stale_copies_archive_only_once() {
    let t = ledger();
    let created = t.lifecycle.create_match(40, &alice(), &bob()).await.unwrap();
    let mut first = t
        .lifecycle
        .get_match(created.id(), MatchTable::Live)
        .await
        .unwrap();
    let mut second = t
        .lifecycle
        .get_match(created.id(), MatchTable::Live)
        .await
        .unwrap();
    first.set_winner(&alice());
    second.set_winner(&bob());

    first.archive().await.unwrap();
    let err = second.archive().await.unwrap_err();

    assert!(matches!(err, MatchError::WriteFailure { .. }), "got: {err:?}");
    let archived = t
        .lifecycle
        .get_match(created.id(), MatchTable::History)
        .await
        .unwrap();
    assert_eq!(archived.winner(), Some(&alice()));
    assert_eq!(t.storage.inner().history_len(), 1);
}

#[tokio::test]
async fn mutating_a_settled_match_fails_without_store_calls() {
    let t = ledger();
    let mut m = t.lifecycle.create_match(30, &alice(), &bob()).await.unwrap();
    m.set_winner(&alice());
    m.archive().await.unwrap();

    // Any store call would fail; the guard must answer first.
    t.storage.fail_always(StoreOp::UpdateField);
    let err = m.set_accepted(false).await.unwrap_err();

    assert!(matches!(err, MatchError::Archived { .. }), "got: {err:?}");
    assert!(!m.accepted());
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn listing_returns_only_participating_matches() {
    let t = ledger();
    let a = t.lifecycle.create_match(1, &bob(), &alice()).await.unwrap();
    t.lifecycle.create_match(2, &bob(), &carol()).await.unwrap();
    let c = t.lifecycle.create_match(3, &alice(), &carol()).await.unwrap();

    let matches = t.lifecycle.matches_for_account(&alice()).await.unwrap();

    let mut ids: Vec<MatchId> = matches.iter().map(|m| m.id()).collect();
    ids.sort();
    assert_eq!(ids, vec![a.id(), c.id()]);
    assert!(matches.iter().all(|m| m.record().involves(&alice())));
}

#[tokio::test]
async fn listing_ignores_creation_order() {
    let t = ledger();
    t.lifecycle.create_match(2, &bob(), &carol()).await.unwrap();
    let c = t.lifecycle.create_match(3, &carol(), &alice()).await.unwrap();
    let a = t.lifecycle.create_match(1, &alice(), &bob()).await.unwrap();

    let matches = t.lifecycle.matches_for_account(&alice()).await.unwrap();

    let mut ids: Vec<MatchId> = matches.iter().map(|m| m.id()).collect();
    ids.sort();
    let mut expected = vec![a.id(), c.id()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(matches.iter().all(|m| m.record().involves(&alice())));
}

#[tokio::test]
async fn listing_excludes_settled_matches() {
    let t = ledger();
    let mut settled = t.lifecycle.create_match(1, &alice(), &bob()).await.unwrap();
    let open = t.lifecycle.create_match(2, &alice(), &bob()).await.unwrap();
    settled.set_winner(&bob());
    settled.archive().await.unwrap();

    let matches = t.lifecycle.matches_for_account(&alice()).await.unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id(), open.id());
}

#[tokio::test]
async fn listing_read_failure_is_reported() {
    let t = ledger();
    t.lifecycle.create_match(1, &alice(), &bob()).await.unwrap();
    t.storage.fail(StoreOp::ListLive);

    let err = t.lifecycle.matches_for_account(&alice()).await.unwrap_err();

    assert!(matches!(err, MatchError::ReadFailure { .. }), "got: {err:?}");
}
