use super::{decode, join, transport, unexpected};
use arena_core::collaborators::AccountCollaborator;
use arena_core::types::{Account, UserId};
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

const SERVICE: &str = "accounts";

/// Account service over HTTP.
#[derive(Clone)]
pub struct HttpAccounts {
    client: Client,
    base_url: String,
}

impl HttpAccounts {
    /// Client for the account service at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl AccountCollaborator for HttpAccounts {
    async fn get_user(&self, user_id: &UserId) -> Result<Account> {
        let url = join(&self.base_url, &format!("api/users/id/{user_id}"));
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| transport(SERVICE, &e))?;

        match response.status() {
            StatusCode::OK => decode(SERVICE, response).await,
            StatusCode::NOT_FOUND => Err(ArenaError::not_found("user", user_id)),
            _ => Err(unexpected(SERVICE, response).await),
        }
    }

    async fn update_user(&self, account: &Account) -> Result<()> {
        let response = self
            .client
            .post(join(&self.base_url, "api/users/update"))
            .json(account)
            .send()
            .await
            .map_err(|e| transport(SERVICE, &e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected(SERVICE, response).await)
        }
    }
}
