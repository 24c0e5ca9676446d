//! HTTP clients for the services a lobby depends on.
//!
//! Failure mapping is shared: a request that cannot be sent or comes back
//! with an unexpected status is `UpstreamUnavailable`; a success whose body
//! cannot be decoded is `UpstreamProtocolError`.

mod accounts;
mod launcher;
mod renewal;
mod tickets;

pub use accounts::HttpAccounts;
pub use launcher::HttpLauncher;
pub use renewal::HttpRenewalEndpoint;
pub use tickets::HttpTickets;

use arena_core::{ArenaError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Shared client with a per-request timeout.
///
/// # Errors
///
/// `UpstreamUnavailable` if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ArenaError::unavailable("http", e))
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn transport(service: &str, err: &reqwest::Error) -> ArenaError {
    tracing::warn!(service, error = %err, "Collaborator request failed");
    ArenaError::unavailable(service, err)
}

async fn unexpected(service: &str, response: Response) -> ArenaError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(service, status = status.as_u16(), "Unexpected collaborator status");
    ArenaError::unavailable(service, format!("unexpected status {status}: {body}"))
}

async fn decode<T: DeserializeOwned>(service: &str, response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ArenaError::protocol(service, e))
}
