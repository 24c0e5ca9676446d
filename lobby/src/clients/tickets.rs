use super::{join, transport, unexpected};
use arena_core::collaborators::{MarkOutcome, TicketCollaborator};
use arena_core::types::TicketId;
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

const SERVICE: &str = "tickets";

/// Ticket service over HTTP.
#[derive(Clone)]
pub struct HttpTickets {
    client: Client,
    base_url: String,
}

impl HttpTickets {
    /// Client for the ticket service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TicketCollaborator for HttpTickets {
    async fn mark_used(&self, ticket_id: &TicketId) -> Result<MarkOutcome> {
        let url = join(&self.base_url, &format!("api/tickets/use/{ticket_id}"));
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| transport(SERVICE, &e))?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(MarkOutcome::Marked),
            StatusCode::CONFLICT => Ok(MarkOutcome::AlreadyUsed),
            StatusCode::NOT_FOUND => Err(ArenaError::not_found("ticket", ticket_id)),
            _ => Err(unexpected(SERVICE, response).await),
        }
    }
}
