//! # Arena Lobby
//!
//! Matchmaking lobbies with a pay-to-enter ticket saga and an expiration
//! reconciliation loop.
//!
//! ```text
//!   HTTP (api/, server/)
//!        │
//!        ▼
//!   LobbyEngine ──► TicketConsumptionSaga ──► accounts, tickets
//!        │    └───► GameServerLauncher (on rollover)
//!        ▼
//!   ReconciliationRegistry ◄── ReconciliationLoop
//!        │
//!        └──► renewal endpoints (lobby in-process, others over HTTP)
//! ```
//!
//! [`bootstrap::Arena`] wires the pieces together; `main` serves them.

#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod engine;
pub mod reconciliation;
pub mod saga;
pub mod server;
pub mod store;

pub use bootstrap::Arena;
pub use config::Config;
pub use engine::{
    CreateLobby, JoinKind, JoinLobby, JoinOutcome, LobbyEngine, LobbyEnvironment, RolloverReport,
};
pub use saga::{Consumption, TicketConsumptionSaga};
