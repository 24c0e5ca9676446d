//! Persistence contracts for lobbies and reconciliation records.

use crate::error::Result;
use crate::types::{Lobby, LobbyId, ReconciliationRecord, RecordId, RecordTag};
use async_trait::async_trait;

/// Lookup criteria for "find me an open lobby like this".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyCriteria {
    /// Game type tag
    pub game_type: String,
    /// Seat count
    pub max_players: u32,
    /// Prize amount
    pub prize_sum: u64,
}

impl LobbyCriteria {
    /// Whether `lobby` matches.
    #[must_use]
    pub fn matches(&self, lobby: &Lobby) -> bool {
        lobby.game_type == self.game_type
            && lobby.max_players == self.max_players
            && lobby.prize.prize_sum == self.prize_sum
    }
}

/// Lobby persistence.
///
/// `update` is a compare-and-swap on [`Lobby::version`]: the write only lands
/// if the stored version still equals the one the caller read.
#[async_trait]
pub trait LobbyStore: Send + Sync {
    /// Insert a new lobby.
    ///
    /// # Errors
    ///
    /// `Conflict` if the id is taken.
    async fn create(&self, lobby: Lobby) -> Result<()>;

    /// Load one lobby.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    async fn find_by_id(&self, id: LobbyId) -> Result<Lobby>;

    /// Load every lobby.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the store cannot be read.
    async fn find_all(&self) -> Result<Vec<Lobby>>;

    /// First lobby matching `criteria`.
    ///
    /// # Errors
    ///
    /// `NotFound` if none match.
    async fn find_by_params(&self, criteria: &LobbyCriteria) -> Result<Lobby>;

    /// Persist `lobby` if nobody wrote since it was read. Returns the new version.
    ///
    /// # Errors
    ///
    /// `NotFound` if the lobby vanished, `Conflict` if the version moved.
    async fn update(&self, lobby: &Lobby) -> Result<u64>;

    /// Remove one lobby.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    async fn delete(&self, id: LobbyId) -> Result<()>;

    /// Remove every lobby, returning how many were removed.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the store cannot be written.
    async fn delete_all(&self) -> Result<usize>;
}

/// Reconciliation record persistence.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record.
    ///
    /// # Errors
    ///
    /// `Conflict` if the id is taken.
    async fn insert(&self, record: ReconciliationRecord) -> Result<()>;

    /// Load one record.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    async fn get(&self, id: RecordId) -> Result<ReconciliationRecord>;

    /// Load every record.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the store cannot be read.
    async fn list(&self) -> Result<Vec<ReconciliationRecord>>;

    /// Record tracking `(tag, reference_key)`, if any.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the store cannot be read.
    async fn find_by_reference(
        &self,
        tag: RecordTag,
        reference_key: &str,
    ) -> Result<Option<ReconciliationRecord>>;

    /// Overwrite an existing record.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    async fn update(&self, record: &ReconciliationRecord) -> Result<()>;

    /// Remove one record.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    async fn delete(&self, id: RecordId) -> Result<()>;

    /// Remove every record, returning how many were removed.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the store cannot be written.
    async fn delete_all(&self) -> Result<usize>;
}
