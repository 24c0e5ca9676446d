use super::{decode, join, transport, unexpected};
use arena_core::collaborators::RenewalEndpoint;
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize)]
struct Renewed {
    expiration: i64,
}

/// Renewal endpoint of another service: `PUT {base_url}/{key}` answering
/// `{"expiration": <unix seconds>}`.
#[derive(Clone)]
pub struct HttpRenewalEndpoint {
    client: Client,
    base_url: String,
    service: String,
}

impl HttpRenewalEndpoint {
    /// Endpoint at `base_url`, named `service` in errors and logs.
    #[must_use]
    pub fn new(client: Client, service: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            service: service.into(),
        }
    }
}

#[async_trait]
impl RenewalEndpoint for HttpRenewalEndpoint {
    async fn renew(&self, reference_key: &str) -> Result<DateTime<Utc>> {
        let response = self
            .client
            .put(join(&self.base_url, reference_key))
            .send()
            .await
            .map_err(|e| transport(&self.service, &e))?;

        if !response.status().is_success() {
            return Err(unexpected(&self.service, response).await);
        }

        let body: Renewed = decode(&self.service, response).await?;
        DateTime::from_timestamp(body.expiration, 0).ok_or_else(|| {
            ArenaError::protocol(
                self.service.as_str(),
                format!("expiration {} out of range", body.expiration),
            )
        })
    }
}
