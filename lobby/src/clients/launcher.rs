use super::{transport, unexpected};
use arena_core::collaborators::{GameServerLauncher, LaunchOutcome};
use arena_core::types::LaunchRequest;
use arena_core::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;

const SERVICE: &str = "launcher";

/// Game server launcher over HTTP, one endpoint per game type.
///
/// The caller's bearer token is forwarded when present; otherwise the
/// service token, if configured, is sent instead.
#[derive(Clone)]
pub struct HttpLauncher {
    client: Client,
    endpoints: HashMap<String, String>,
    service_token: Option<String>,
}

impl HttpLauncher {
    /// Launcher posting to `endpoints[game_type]`.
    #[must_use]
    pub fn new(client: Client, endpoints: HashMap<String, String>) -> Self {
        Self {
            client,
            endpoints,
            service_token: None,
        }
    }

    /// Fallback token when the caller sent none.
    #[must_use]
    pub fn with_service_token(mut self, token: Option<String>) -> Self {
        self.service_token = token;
        self
    }
}

#[async_trait]
impl GameServerLauncher for HttpLauncher {
    async fn launch(
        &self,
        game_type: &str,
        request: &LaunchRequest,
        bearer: Option<&str>,
    ) -> Result<LaunchOutcome> {
        let Some(url) = self.endpoints.get(game_type) else {
            return Ok(LaunchOutcome::Skipped);
        };

        let mut call = self.client.post(url).json(request);
        if let Some(token) = bearer.or(self.service_token.as_deref()) {
            call = call.bearer_auth(token);
        }

        let response = call.send().await.map_err(|e| transport(SERVICE, &e))?;

        if response.status() == StatusCode::CREATED {
            tracing::info!(
                game_type,
                players = request.players.len(),
                "Game server created"
            );
            Ok(LaunchOutcome::Created)
        } else {
            Err(unexpected(SERVICE, response).await)
        }
    }
}
