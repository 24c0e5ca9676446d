//! Expiration tracking and renewal.

mod lobby;
mod registry;
mod worker;

pub use lobby::LobbyRenewal;
pub use registry::ReconciliationRegistry;
pub use worker::{LoopConfig, LoopStatus, PassOutcome, PassReport, ReconciliationLoop};
