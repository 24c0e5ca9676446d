//! Error taxonomy shared by the lobby engine, the ticket saga and the
//! reconciliation loop.

use thiserror::Error;

/// Result type for arena operations.
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Errors surfaced by lobby lifecycle, ticket consumption and reconciliation.
///
/// Business-rule violations (`LobbyFull`, `AlreadyReady`, the ticket
/// variants) are returned to callers unchanged. Collaborator failures are
/// split by whether the transport worked: `UpstreamUnavailable` when a call
/// failed, timed out or answered with an unexpected status, and
/// `UpstreamProtocolError` when the call succeeded but the body made no sense.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// Entity absent.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity ("lobby", "user", "record").
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Malformed input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The lobby has no free seat.
    #[error("lobby {lobby_id} is full")]
    LobbyFull {
        /// Lobby that rejected the join.
        lobby_id: String,
    },

    /// The user already joined and confirmed readiness.
    #[error("user {user_id} is already ready")]
    AlreadyReady {
        /// User that tried to join twice.
        user_id: String,
    },

    /// The user's inventory has no entry for this game type.
    #[error("user {user_id} has no tickets for game type {game_type}")]
    NoTicketsOfType {
        /// Owner of the inventory.
        user_id: String,
        /// Requested game type.
        game_type: String,
    },

    /// The inventory entry exists but its count is zero.
    #[error("user {user_id} has no {game_type} tickets remaining")]
    NoTicketsRemaining {
        /// Owner of the inventory.
        user_id: String,
        /// Requested game type.
        game_type: String,
    },

    /// The presented ticket is not part of the user's inventory entry.
    #[error("ticket {ticket_id} does not belong to user {user_id}")]
    TicketNotOwned {
        /// Owner of the inventory.
        user_id: String,
        /// Ticket that was presented.
        ticket_id: String,
    },

    /// A stale write lost a compare-and-swap.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator call failed, timed out or returned an unexpected status.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        /// Collaborator name.
        service: String,
        /// Failure description.
        reason: String,
    },

    /// A collaborator answered successfully with an unusable body.
    #[error("{service} protocol error: {reason}")]
    UpstreamProtocolError {
        /// Collaborator name.
        service: String,
        /// Failure description.
        reason: String,
    },
}

impl ArenaError {
    /// Shorthand for [`ArenaError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`ArenaError::UpstreamUnavailable`].
    #[must_use]
    pub fn unavailable(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`ArenaError::UpstreamProtocolError`].
    #[must_use]
    pub fn protocol(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamProtocolError {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only transport-level failures qualify; business-rule violations and
    /// protocol errors answer the same way every time.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }
}
