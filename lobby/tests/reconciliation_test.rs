//! Integration tests for the reconciliation registry and loop.
//!
//! Passes are driven by hand with `run_pass` where the assertion is about a
//! single scan, and through the spawned loop (on a paused tokio clock) where
//! it is about pacing and shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use arena_core::ArenaError;
use arena_core::environment::Clock;
use arena_core::types::RecordTag;
use arena_lobby::reconciliation::{LoopConfig, PassOutcome};
use arena_runtime::BackoffConfig;
use arena_testing::MockRenewal;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::{Harness, snake};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// Test Fixtures
// ============================================================================

fn pacing(initial_ms: u64, max_ms: u64, reset_on_progress: bool) -> LoopConfig {
    LoopConfig {
        backoff: BackoffConfig {
            initial: Duration::from_millis(initial_ms),
            multiplier: 2.0,
            max: Duration::from_millis(max_ms),
        },
        reset_on_progress,
    }
}

/// Harness with a training endpoint that renews one hour past the clock.
fn with_training(config: LoopConfig) -> (Harness, Arc<MockRenewal>) {
    let h = Harness::with_loop_config(config);
    let renewal = Arc::new(MockRenewal::returning(
        h.clock.now() + ChronoDuration::hours(1),
    ));
    h.registry()
        .register_endpoint(RecordTag::Training, renewal.clone());
    (h, renewal)
}

// ============================================================================
// Single passes
// ============================================================================

#[tokio::test]
async fn expired_record_is_renewed_once() {
    let (h, renewal) = with_training(LoopConfig::default());
    let now = h.clock.now();
    let record = h
        .registry()
        .track(RecordTag::Training, "snake", now)
        .await
        .unwrap();

    let first = h.arena.worker.run_pass().await;
    assert_eq!(first.outcome, PassOutcome::Progress);
    assert_eq!((first.scanned, first.renewed, first.failed), (1, 1, 0));

    let second = h.arena.worker.run_pass().await;
    assert_eq!(second.outcome, PassOutcome::Idle);

    assert_eq!(renewal.calls(), vec!["snake".to_string()]);
    let stored = h.registry().get(record.id).await.unwrap();
    assert_eq!(stored.expiration, now + ChronoDuration::hours(1));
}

#[tokio::test]
async fn failed_renewal_stays_registered_and_is_retried() {
    let (h, renewal) = with_training(LoopConfig::default());
    let now = h.clock.now();
    let record = h
        .registry()
        .track(RecordTag::Training, "snake", now)
        .await
        .unwrap();
    renewal.fail_next(ArenaError::unavailable("training renewal", "502"));

    let first = h.arena.worker.run_pass().await;
    assert_eq!(first.outcome, PassOutcome::Failed);
    assert_eq!(first.failed, 1);
    assert_eq!(h.registry().get(record.id).await.unwrap().expiration, now);

    let second = h.arena.worker.run_pass().await;
    assert_eq!(second.outcome, PassOutcome::Progress);
    assert_eq!(renewal.calls().len(), 2);
}

#[tokio::test]
async fn one_failure_does_not_abort_the_pass() {
    let (h, _training) = with_training(LoopConfig::default());
    let now = h.clock.now();
    // No endpoint serves qualification records.
    h.registry()
        .track(RecordTag::Qualification, "quiz", now)
        .await
        .unwrap();
    h.registry()
        .track(RecordTag::Training, "snake", now)
        .await
        .unwrap();

    let report = h.arena.worker.run_pass().await;

    assert_eq!(report.outcome, PassOutcome::Progress);
    assert_eq!((report.scanned, report.renewed, report.failed), (2, 1, 1));
}

#[tokio::test]
async fn expired_lobby_moves_to_next_slot() {
    let h = Harness::new();
    let id = h.engine().create(snake(4)).await.unwrap();
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap();

    assert_eq!(h.arena.worker.run_pass().await.outcome, PassOutcome::Idle);

    h.clock.set(start);
    let report = h.arena.worker.run_pass().await;
    assert_eq!(report.outcome, PassOutcome::Progress);

    let next = start + ChronoDuration::hours(1);
    let lobby = h.engine().get(id).await.unwrap();
    assert_eq!(lobby.start_time, next);
    assert_eq!(lobby.end_time, next + ChronoDuration::hours(2));

    let records = h.registry().list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].expiration, next);
}

#[tokio::test]
async fn renewal_of_deleted_lobby_fails_without_stopping() {
    let h = Harness::new();
    let id = h.engine().create(snake(4)).await.unwrap();
    // Track the lobby again after the engine stopped tracking it.
    h.engine().delete(id).await.unwrap();
    h.registry()
        .track(RecordTag::Lobby, &id.to_string(), h.clock.now())
        .await
        .unwrap();

    let report = h.arena.worker.run_pass().await;
    assert_eq!(report.outcome, PassOutcome::Failed);
    assert_eq!(h.registry().list().await.unwrap().len(), 1);
}

// ============================================================================
// Running loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn loop_stops_on_shutdown_and_reports_status() {
    let h = Harness::with_loop_config(pacing(100, 1_000, true));
    let mut status = h.arena.worker.status();
    let worker = h.arena.worker;
    let (stop_tx, stop_rx) = watch::channel(false);

    let handle = tokio::spawn(worker.run(stop_rx));
    {
        let snapshot = status.wait_for(|s| s.passes >= 3).await.unwrap();
        assert!(snapshot.running);
        assert_eq!(snapshot.last_pass_at, Some(h.clock.now()));
        assert_eq!(
            snapshot.last_report.map(|r| r.outcome),
            Some(PassOutcome::Idle)
        );
    }

    stop_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();

    assert!(!status.borrow().running);
}

#[tokio::test(start_paused = true)]
async fn loop_stops_when_shutdown_sender_is_dropped() {
    let h = Harness::with_loop_config(pacing(100, 1_000, true));
    let worker = h.arena.worker;
    let (stop_tx, stop_rx) = watch::channel(false);

    let handle = tokio::spawn(worker.run(stop_rx));
    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(stop_tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn idle_delays_grow_to_the_ceiling() {
    let h = Harness::with_loop_config(pacing(10, 80, true));
    let mut status = h.arena.worker.status();
    let worker = h.arena.worker;
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(stop_rx));

    let mut delays = Vec::new();
    loop {
        status.changed().await.unwrap();
        let snapshot = status.borrow_and_update().clone();
        if snapshot.passes == 0 {
            continue;
        }
        delays.push(snapshot.current_delay_ms);
        if snapshot.passes >= 6 {
            break;
        }
    }

    stop_tx.send(true).unwrap();
    handle.await.unwrap();

    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]), "{delays:?}");
    assert!(delays.iter().all(|delay| *delay <= 80));
    assert_eq!(delays.last(), Some(&80));
}

async fn delay_after_progress(reset_on_progress: bool) -> u64 {
    let (h, _renewal) = with_training(pacing(10, 1_000, reset_on_progress));
    h.registry()
        .track(
            RecordTag::Training,
            "snake",
            h.clock.now() - ChronoDuration::minutes(1),
        )
        .await
        .unwrap();

    let mut status = h.arena.worker.status();
    let worker = h.arena.worker;
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(stop_rx));

    let delay = {
        let snapshot = status.wait_for(|s| s.passes >= 1).await.unwrap();
        assert_eq!(snapshot.passes, 1);
        assert_eq!(
            snapshot.last_report.map(|r| r.outcome),
            Some(PassOutcome::Progress)
        );
        snapshot.current_delay_ms
    };

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
    delay
}

#[tokio::test(start_paused = true)]
async fn progress_resets_backoff_when_configured() {
    assert_eq!(delay_after_progress(true).await, 10);
}

#[tokio::test(start_paused = true)]
async fn progress_keeps_growing_backoff_when_not_configured() {
    assert_eq!(delay_after_progress(false).await, 20);
}
