use crate::engine::LobbyEngine;
use arena_core::collaborators::RenewalEndpoint;
use arena_core::types::LobbyId;
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Weak;

/// Renews lobby records by moving the lobby to its next slot in-process.
///
/// Holds the engine weakly: the engine already points at the registry that
/// owns this endpoint.
pub struct LobbyRenewal {
    engine: Weak<LobbyEngine>,
}

impl LobbyRenewal {
    /// Renewal through `engine`.
    #[must_use]
    pub const fn new(engine: Weak<LobbyEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RenewalEndpoint for LobbyRenewal {
    async fn renew(&self, reference_key: &str) -> Result<DateTime<Utc>> {
        let engine = self
            .engine
            .upgrade()
            .ok_or_else(|| ArenaError::unavailable("lobby", "engine shut down"))?;
        let id: LobbyId = reference_key.parse()?;
        engine.extend_schedule(id).await
    }
}
