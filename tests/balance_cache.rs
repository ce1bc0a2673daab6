//! Balance cache, polling, and projection tests against a mock ledger.

use std::sync::atomic::Ordering;
use std::time::Duration;

use alloy::primitives::U256;
use staking_engine::config::PollingConfig;
use staking_engine::engine::ReadError;
use staking_engine::ledger::LedgerError;
use staking_engine::{
    BalancePoller, EngineEvent, OperationError, OperationRequest, Shutdown,
};

mod common;
use common::{alice, bob, disconnected_engine, engine_for, units, wait_until, Balances};

fn balances(native: u64, staked: u64, rewards: u64) -> Balances {
    Balances {
        native: units(native),
        staked: units(staked),
        rewards: units(rewards),
    }
}

#[tokio::test]
async fn test_disconnected_has_no_snapshot() {
    let (engine, ledger) = disconnected_engine();

    assert!(matches!(engine.refresh().await, Err(ReadError::NotConnected)));
    assert!(engine.snapshot().is_none());
    assert!(engine.max_unstake_input().is_none());
    assert!(engine.staked_projection().is_none());
    assert_eq!(ledger.staked_reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_read() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.reads.close();

    let a = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    wait_until(|| ledger.reads.waiting() == 3).await;
    let b = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ledger.staked_reads.load(Ordering::SeqCst), 1);

    ledger.reads.open();
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert_eq!(a.sequence, b.sequence);
    assert_eq!(ledger.staked_reads.load(Ordering::SeqCst), 1);
    assert_eq!(engine.snapshot().unwrap().staked_balance, units(2));
}

#[tokio::test]
async fn test_partial_failure_keeps_previous_snapshot() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    let first = engine.refresh().await.unwrap();

    let mut events = engine.subscribe();
    ledger.set_balances(alice(), balances(9, 9, 9));
    ledger.fail_staked_reads(Some(LedgerError::Rpc("connection reset".into())));

    let err = engine.refresh().await.unwrap_err();
    assert!(matches!(err, ReadError::Ledger { what: "staked balance", .. }));

    let held = engine.snapshot().unwrap();
    assert_eq!(held.sequence, first.sequence);
    assert_eq!(held.native_balance, units(5));
    assert!(matches!(events.try_recv(), Ok(EngineEvent::RefreshFailed(_))));
}

#[tokio::test]
async fn test_later_reads_are_fresher() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));

    let first = engine.refresh().await.unwrap();
    ledger.set_balances(alice(), balances(5, 2, 3));
    let second = engine.refresh().await.unwrap();

    assert!(second.sequence > first.sequence);
    assert!(second.fetched_at > first.fetched_at);
    assert_eq!(engine.snapshot().unwrap().pending_rewards, units(3));
}

#[tokio::test]
async fn test_session_change_discards_old_account() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.set_balances(bob(), balances(7, 0, 0));
    engine.refresh().await.unwrap();

    engine.session().connect(bob());
    assert!(engine.snapshot().is_none());

    let snapshot = engine.refresh().await.unwrap();
    assert_eq!(snapshot.address, bob());
    assert_eq!(snapshot.native_balance, units(7));
}

#[tokio::test]
async fn test_reconnecting_same_account_forgets_balances() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    engine.refresh().await.unwrap();
    let mut events = engine.subscribe();

    engine.session().disconnect();
    ledger.set_balances(alice(), balances(5, 0, 1));
    engine.session().connect(alice());

    assert!(engine.snapshot().is_none());
    assert!(engine.max_unstake_input().is_none());
    assert!(matches!(events.try_recv(), Ok(EngineEvent::SnapshotUpdated(None))));

    let record = engine
        .submit(OperationRequest::unstake("1"))
        .finish()
        .await
        .unwrap();
    assert!(matches!(
        record.error,
        Some(OperationError::InsufficientBalance { .. })
    ));
    assert_eq!(ledger.unstake_calls.load(Ordering::SeqCst), 0);

    assert_eq!(engine.refresh().await.unwrap().staked_balance, U256::ZERO);
}

#[tokio::test]
async fn test_read_started_before_session_change_is_dropped() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.reads.close();

    let old = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    wait_until(|| ledger.reads.waiting() == 3).await;

    engine.session().disconnect();
    engine.session().connect(alice());
    ledger.set_balances(alice(), balances(5, 0, 1));

    let fresh = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    wait_until(|| ledger.reads.waiting() == 6).await;

    ledger.reads.open();
    old.await.unwrap().unwrap();
    fresh.await.unwrap().unwrap();
    assert_eq!(engine.snapshot().unwrap().staked_balance, U256::ZERO);
}

#[tokio::test]
async fn test_stale_in_flight_read_is_dropped() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.set_balances(bob(), balances(7, 0, 0));
    ledger.reads.close();

    let old = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    wait_until(|| ledger.reads.waiting() == 3).await;

    engine.session().connect(bob());
    engine.invalidate();
    let fresh = tokio::spawn({
        let engine = engine.clone();
        async move { engine.refresh().await }
    });
    wait_until(|| ledger.reads.waiting() == 6).await;

    ledger.reads.open();
    fresh.await.unwrap().unwrap();
    old.await.unwrap().unwrap();

    let held = engine.snapshot().unwrap();
    assert_eq!(held.address, bob());
    assert_eq!(held.native_balance, units(7));
}

#[tokio::test]
async fn test_projection_for_typed_principal() {
    let (engine, _ledger) = disconnected_engine();

    let formatted = engine.projection("1").unwrap().formatted();
    assert_eq!(formatted.hourly, "3.600");
    assert_eq!(formatted.daily, "86.400");
    assert_eq!(formatted.weekly, "604.800");
    assert_eq!(formatted.monthly, "2592.000");

    assert!(engine.projection("").is_none());
    assert!(engine.projection("abc").is_none());
    assert!(engine.projection("-2").is_none());
}

#[tokio::test]
async fn test_staked_projection_follows_snapshot() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 0));
    engine.refresh().await.unwrap();

    let formatted = engine.staked_projection().unwrap().formatted();
    assert_eq!(formatted.daily, "172.800");
}

#[tokio::test]
async fn test_poller_refreshes_and_follows_session() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.set_balances(bob(), balances(7, 0, 0));

    let shutdown = Shutdown::new();
    let config = PollingConfig {
        interval_ms: 20,
        backoff_base_ms: 10,
        backoff_max_ms: 50,
    };
    let task = tokio::spawn(BalancePoller::new(engine.clone(), config).run(shutdown.subscribe()));

    wait_until(|| ledger.staked_reads.load(Ordering::SeqCst) >= 2).await;
    assert_eq!(engine.snapshot().unwrap().address, alice());

    engine.session().connect(bob());
    wait_until(|| engine.snapshot().is_some_and(|s| s.address == bob())).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_poller_keeps_going_after_failures() {
    let (engine, ledger) = engine_for(alice());
    ledger.set_balances(alice(), balances(5, 2, 1));
    ledger.fail_staked_reads(Some(LedgerError::Timeout(10)));

    let shutdown = Shutdown::new();
    let config = PollingConfig {
        interval_ms: 20,
        backoff_base_ms: 5,
        backoff_max_ms: 20,
    };
    let task = tokio::spawn(BalancePoller::new(engine.clone(), config).run(shutdown.subscribe()));

    wait_until(|| ledger.staked_reads.load(Ordering::SeqCst) >= 3).await;
    assert!(engine.snapshot().is_none());

    ledger.fail_staked_reads(None);
    wait_until(|| engine.snapshot().is_some()).await;

    shutdown.trigger();
    task.await.unwrap();
}
