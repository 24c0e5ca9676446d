//! Interfaces to the services a lobby depends on.
//!
//! Every trait here is implemented twice: by an HTTP client in the lobby
//! service and by an in-memory mock in `arena-testing`.

use crate::error::Result;
use crate::types::{Account, LaunchRequest, RecordId, RecordTag, TicketId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Account service: owns users and their ticket inventories.
#[async_trait]
pub trait AccountCollaborator: Send + Sync {
    /// Fetch a user with their ticket inventory.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown users, `UpstreamUnavailable` on transport failure.
    async fn get_user(&self, user_id: &UserId) -> Result<Account>;

    /// Replace a user's stored inventory.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` on transport failure or unexpected status.
    async fn update_user(&self, account: &Account) -> Result<()>;
}

/// Result of asking the ticket service to consume a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The ticket was active and is now used.
    Marked,
    /// The ticket had been used before this call.
    AlreadyUsed,
}

/// Ticket service: owns the used/unused state of individual tickets.
#[async_trait]
pub trait TicketCollaborator: Send + Sync {
    /// Mark a ticket used.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown tickets, `UpstreamUnavailable` on transport failure.
    async fn mark_used(&self, ticket_id: &TicketId) -> Result<MarkOutcome>;
}

/// Result of a launch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The game server acknowledged with "created".
    Created,
    /// No game server is configured for this game type.
    Skipped,
}

/// Game server launcher: starts the actual match once a lobby fills.
#[async_trait]
pub trait GameServerLauncher: Send + Sync {
    /// Request a game server for `request`.
    ///
    /// `bearer` is the caller's token, forwarded as-is.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the launcher does not answer "created".
    async fn launch(
        &self,
        game_type: &str,
        request: &LaunchRequest,
        bearer: Option<&str>,
    ) -> Result<LaunchOutcome>;
}

/// Receiver of "this entity expires at" notifications.
#[async_trait]
pub trait ExpirationNotifier: Send + Sync {
    /// Track a time-bounded entity.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the registry cannot persist the record.
    async fn register(
        &self,
        tag: RecordTag,
        reference_key: &str,
        expiration: DateTime<Utc>,
    ) -> Result<RecordId>;

    /// Stop tracking an entity. Unknown entities are ignored.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the registry cannot be updated.
    async fn deregister(&self, tag: RecordTag, reference_key: &str) -> Result<()>;
}

/// A domain's "move this entity to its next deadline" operation.
#[async_trait]
pub trait RenewalEndpoint: Send + Sync {
    /// Renew the entity behind `reference_key` and return its new deadline.
    ///
    /// # Errors
    ///
    /// Any error leaves the caller's record untouched.
    async fn renew(&self, reference_key: &str) -> Result<DateTime<Utc>>;
}
