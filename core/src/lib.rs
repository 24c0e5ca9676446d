//! # Arena Core
//!
//! Domain model and service contracts for the arena lobby coordinator.
//!
//! ## Core Concepts
//!
//! - **Lobby**: a capacity-bounded pending match that players join
//! - **Ticket inventory**: per-game-type entry rights held by the account service
//! - **Reconciliation record**: a (domain, reference, expiration) triple that
//!   triggers renewal work with no caller waiting
//! - **Collaborators**: the account, ticket and launcher services, abstracted
//!   behind traits and injected into the lobby engine
//!
//! Nothing in this crate performs I/O. Implementations of the traits live in
//! the lobby service (HTTP clients, in-memory stores) and in `arena-testing`
//! (mocks).

pub mod collaborators;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use error::{ArenaError, Result};

/// Environment traits shared by every component.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use arena_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
