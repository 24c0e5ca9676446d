//! # Arena Testing
//!
//! Testing utilities for the arena services.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - In-memory collaborator mocks with call recording and failure injection
//!
//! ## Example
//!
//! ```
//! use arena_core::types::{Account, TicketInventory, TicketId, UserId};
//! use arena_testing::{MockAccounts, MockTickets};
//!
//! let accounts = MockAccounts::new().with_account(Account {
//!     id: UserId::new("u1"),
//!     username: "neo".into(),
//!     has_free_ticket: false,
//!     tickets: vec![TicketInventory {
//!         game_type: "snake".into(),
//!         amount: 1,
//!         ticket_ids: vec![TicketId::new("t1")],
//!     }],
//! });
//! let tickets = MockTickets::new();
//! assert_eq!(accounts.get_calls(), 0);
//! assert!(!tickets.is_used(&TicketId::new("t1")));
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod clock;
pub mod collaborators;

pub use clock::{FixedClock, ManualClock, test_clock};
pub use collaborators::{
    MockAccounts, MockLauncher, MockNotifier, MockRenewal, MockTickets, RecordedLaunch,
};

/// Lock a mock's state, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
