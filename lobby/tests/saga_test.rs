//! Integration tests for the ticket consumption saga.
//!
//! Exercises the mark-then-update ordering against failing and hanging
//! collaborators and checks that retries never spend a second ticket.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use arena_core::collaborators::AccountCollaborator;
use arena_core::types::{Account, TicketId, UserId};
use arena_core::{ArenaError, Result};
use arena_lobby::saga::{Consumption, TicketConsumptionSaga};
use arena_runtime::RetryPolicy;
use arena_testing::{MockAccounts, MockTickets};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Fixture {
    accounts: Arc<MockAccounts>,
    tickets: Arc<MockTickets>,
}

impl Fixture {
    fn new(tickets: &[&str]) -> Self {
        Self {
            accounts: Arc::new(
                MockAccounts::new().with_account(common::account("u1", "snake", tickets)),
            ),
            tickets: Arc::new(MockTickets::new()),
        }
    }

    fn saga(&self, retry: RetryPolicy) -> TicketConsumptionSaga {
        TicketConsumptionSaga::new(self.accounts.clone(), self.tickets.clone())
            .with_call_timeout(Duration::from_millis(200))
            .with_retry(retry)
    }

    fn remaining(&self) -> Vec<TicketId> {
        self.accounts
            .account(&UserId::new("u1"))
            .and_then(|a| a.inventory("snake").map(|e| e.ticket_ids.clone()))
            .unwrap_or_default()
    }

    fn amount(&self) -> u32 {
        self.accounts
            .account(&UserId::new("u1"))
            .and_then(|a| a.inventory("snake").map(|e| e.amount))
            .unwrap_or_default()
    }
}

/// Accounts whose first read stalls after loading, so a concurrent read of
/// the same user sees the same inventory unless the saga serializes them.
struct StallFirstRead {
    inner: Arc<MockAccounts>,
    stalled: AtomicBool,
}

#[async_trait]
impl AccountCollaborator for StallFirstRead {
    async fn get_user(&self, user_id: &UserId) -> Result<Account> {
        let account = self.inner.get_user(user_id).await?;
        if !self.stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(account)
    }

    async fn update_user(&self, account: &Account) -> Result<()> {
        self.inner.update_user(account).await
    }
}

fn quick_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(10))
        .max_delay(Duration::from_millis(100))
        .build()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn consume_marks_ticket_then_shrinks_inventory() {
    let f = Fixture::new(&["t1", "t2"]);

    let outcome = f
        .saga(RetryPolicy::none())
        .consume(&UserId::new("u1"), "snake", &TicketId::new("t1"))
        .await
        .unwrap();

    assert_eq!(outcome, Consumption::Consumed);
    assert!(f.tickets.is_used(&TicketId::new("t1")));
    assert_eq!(f.remaining(), vec![TicketId::new("t2")]);
    assert_eq!(f.amount(), 1);
    assert_eq!(f.accounts.update_calls(), 1);
}

// ============================================================================
// Partial failure and resume
// ============================================================================

#[tokio::test]
async fn retry_after_failed_update_resumes_without_second_spend() {
    let f = Fixture::new(&["t1", "t2"]);
    let saga = f.saga(RetryPolicy::none());
    let user = UserId::new("u1");
    let ticket = TicketId::new("t1");

    f.accounts
        .fail_next_update(ArenaError::unavailable("accounts", "connection reset"));
    let first = saga.consume(&user, "snake", &ticket).await;
    assert!(matches!(first, Err(ArenaError::UpstreamUnavailable { .. })));
    assert!(f.tickets.is_used(&ticket));
    assert_eq!(f.remaining().len(), 2);

    let second = saga.consume(&user, "snake", &ticket).await.unwrap();
    assert_eq!(second, Consumption::Resumed);
    assert_eq!(f.tickets.used_count(), 1);
    assert_eq!(f.remaining(), vec![TicketId::new("t2")]);
    assert_eq!(f.amount(), 1);
}

// ============================================================================
// One user, concurrent spends
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_spends_by_one_user_each_cost_a_ticket() {
    let f = Fixture::new(&["t1", "t2"]);
    let accounts = Arc::new(StallFirstRead {
        inner: f.accounts.clone(),
        stalled: AtomicBool::new(false),
    });
    let saga = TicketConsumptionSaga::new(accounts, f.tickets.clone())
        .with_call_timeout(Duration::from_millis(200))
        .with_retry(RetryPolicy::none());
    let user = UserId::new("u1");

    let t1 = TicketId::new("t1");
    let t2 = TicketId::new("t2");
    let (first, second) = tokio::join!(
        saga.consume(&user, "snake", &t1),
        saga.consume(&user, "snake", &t2),
    );
    assert_eq!(first.unwrap(), Consumption::Consumed);
    assert_eq!(second.unwrap(), Consumption::Consumed);
    assert!(f.remaining().is_empty());
    assert_eq!(f.amount(), 0);

    // Nothing is left listed, so a spent ticket cannot be replayed.
    let replay = saga.consume(&user, "snake", &TicketId::new("t2")).await;
    assert!(matches!(replay, Err(ArenaError::NoTicketsRemaining { .. })));
    assert_eq!(f.tickets.used_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let f = Fixture::new(&["t1"]);
    f.accounts
        .fail_next_get(ArenaError::unavailable("accounts", "503"));
    f.tickets
        .fail_next(ArenaError::unavailable("tickets", "connection refused"));

    let outcome = f
        .saga(quick_retries(3))
        .consume(&UserId::new("u1"), "snake", &TicketId::new("t1"))
        .await
        .unwrap();

    assert_eq!(outcome, Consumption::Consumed);
    assert_eq!(f.accounts.get_calls(), 2);
    assert_eq!(f.tickets.calls(), 2);
    assert!(f.remaining().is_empty());
}

#[tokio::test(start_paused = true)]
async fn business_errors_are_not_retried() {
    let f = Fixture::new(&["t1"]);

    let result = f
        .saga(quick_retries(3))
        .consume(&UserId::new("u1"), "quiz", &TicketId::new("t1"))
        .await;

    assert!(matches!(result, Err(ArenaError::NoTicketsOfType { .. })));
    assert_eq!(f.accounts.get_calls(), 1);
    assert_eq!(f.tickets.calls(), 0);
    assert_eq!(f.accounts.update_calls(), 0);
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let f = Fixture::new(&["t1"]);

    let result = f
        .saga(RetryPolicy::none())
        .consume(&UserId::new("ghost"), "snake", &TicketId::new("t1"))
        .await;

    assert!(matches!(result, Err(ArenaError::NotFound { .. })));
    assert_eq!(f.tickets.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hung_update_times_out_as_unavailable() {
    let f = Fixture::new(&["t1"]);
    f.accounts.hang_next_update();

    let result = f
        .saga(RetryPolicy::none())
        .consume(&UserId::new("u1"), "snake", &TicketId::new("t1"))
        .await;

    match result {
        Err(ArenaError::UpstreamUnavailable { service, .. }) => assert_eq!(service, "accounts"),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(f.tickets.is_used(&TicketId::new("t1")));
    assert_eq!(f.remaining(), vec![TicketId::new("t1")]);
}

#[tokio::test(start_paused = true)]
async fn hung_ticket_call_is_retried_within_budget() {
    let f = Fixture::new(&["t1"]);
    f.tickets.hang_next();

    let outcome = f
        .saga(quick_retries(1))
        .consume(&UserId::new("u1"), "snake", &TicketId::new("t1"))
        .await
        .unwrap();

    assert_eq!(outcome, Consumption::Consumed);
    assert_eq!(f.tickets.calls(), 2);
}
