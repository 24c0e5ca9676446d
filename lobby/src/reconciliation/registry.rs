//! Registry of time-bounded entities and their renewal endpoints.

use arena_core::collaborators::{ExpirationNotifier, RenewalEndpoint};
use arena_core::environment::Clock;
use arena_core::store::RecordStore;
use arena_core::types::{ReconciliationRecord, RecordId, RecordTag};
use arena_core::{ArenaError, Result};
use arena_runtime::metrics::ReconciliationMetrics;
use arena_runtime::with_deadline;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Tracks which entities expire when and knows how to renew each kind.
///
/// Domains register records through [`ExpirationNotifier`]; the
/// reconciliation loop asks [`ReconciliationRegistry::renew`] to move expired
/// ones forward. One registry is built at startup and shared.
pub struct ReconciliationRegistry {
    records: Arc<dyn RecordStore>,
    endpoints: RwLock<HashMap<RecordTag, Arc<dyn RenewalEndpoint>>>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl ReconciliationRegistry {
    /// Registry over `records` with no renewal endpoints and a 5s call timeout.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            records,
            endpoints: RwLock::new(HashMap::new()),
            clock,
            call_timeout: Duration::from_secs(5),
        }
    }

    /// Bound every renewal call by `timeout`.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Route renewals of `tag` records to `endpoint`, replacing any previous one.
    pub fn register_endpoint(&self, tag: RecordTag, endpoint: Arc<dyn RenewalEndpoint>) {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag, endpoint);
    }

    fn endpoint(&self, tag: RecordTag) -> Option<Arc<dyn RenewalEndpoint>> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tag)
            .cloned()
    }

    /// Track `(tag, reference_key)` until `expiration`.
    ///
    /// Registering a reference that is already tracked moves its expiration
    /// instead of adding a second record. Past expirations are accepted; the
    /// next pass renews them.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an empty reference key, or store failures.
    pub async fn track(
        &self,
        tag: RecordTag,
        reference_key: &str,
        expiration: DateTime<Utc>,
    ) -> Result<ReconciliationRecord> {
        if reference_key.trim().is_empty() {
            return Err(ArenaError::BadRequest("reference key must not be empty".into()));
        }

        if let Some(existing) = self.records.find_by_reference(tag, reference_key).await? {
            let moved = ReconciliationRecord {
                expiration,
                ..existing
            };
            self.records.update(&moved).await?;
            tracing::debug!(record_id = %moved.id, tag = %tag, reference_key, "Record expiration moved");
            return Ok(moved);
        }

        let record = ReconciliationRecord {
            id: RecordId::new(),
            tag,
            reference_key: reference_key.to_string(),
            expiration,
        };
        self.records.insert(record.clone()).await?;
        tracing::info!(record_id = %record.id, tag = %tag, reference_key, "Record registered");
        Ok(record)
    }

    /// Stop tracking `(tag, reference_key)`. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn untrack(&self, tag: RecordTag, reference_key: &str) -> Result<bool> {
        match self.records.find_by_reference(tag, reference_key).await? {
            Some(record) => {
                self.records.delete(record.id).await?;
                tracing::info!(record_id = %record.id, tag = %tag, reference_key, "Record deregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load one record.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    pub async fn get(&self, id: RecordId) -> Result<ReconciliationRecord> {
        self.records.get(id).await
    }

    /// Every record, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self) -> Result<Vec<ReconciliationRecord>> {
        self.records.list().await
    }

    /// Remove one record.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.records.delete(id).await
    }

    /// Remove every record, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_all(&self) -> Result<usize> {
        self.records.delete_all().await
    }

    /// Current time on the registry's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether `record` is due for renewal now.
    #[must_use]
    pub fn is_expired(&self, record: &ReconciliationRecord) -> bool {
        record.is_expired(self.now())
    }

    /// Ask the owning domain to renew `record` and store the new expiration.
    ///
    /// On any error the stored record keeps its old expiration.
    ///
    /// # Errors
    ///
    /// - `UpstreamUnavailable` if no endpoint serves the tag, or the call
    ///   fails or times out
    /// - `UpstreamProtocolError` if the new expiration is not in the future
    /// - whatever the owning domain returns
    pub async fn renew(&self, record: &ReconciliationRecord) -> Result<ReconciliationRecord> {
        let service = format!("{} renewal", record.tag);
        let endpoint = self
            .endpoint(record.tag)
            .ok_or_else(|| ArenaError::unavailable(service.as_str(), "no renewal endpoint"))?;

        let started = Instant::now();
        let expiration = with_deadline(
            &service,
            self.call_timeout,
            endpoint.renew(&record.reference_key),
        )
        .await?;

        let now = self.clock.now();
        if expiration <= now {
            return Err(ArenaError::protocol(
                service,
                format!("renewed expiration {expiration} is not after {now}"),
            ));
        }

        let renewed = ReconciliationRecord {
            expiration,
            ..record.clone()
        };
        self.records.update(&renewed).await?;

        ReconciliationMetrics::record_renewal(record.tag.as_str(), started.elapsed());
        tracing::info!(
            record_id = %record.id,
            tag = %record.tag,
            reference_key = %record.reference_key,
            expiration = %expiration,
            "Record renewed"
        );
        Ok(renewed)
    }
}

#[async_trait]
impl ExpirationNotifier for ReconciliationRegistry {
    async fn register(
        &self,
        tag: RecordTag,
        reference_key: &str,
        expiration: DateTime<Utc>,
    ) -> Result<RecordId> {
        self.track(tag, reference_key, expiration)
            .await
            .map(|record| record.id)
    }

    async fn deregister(&self, tag: RecordTag, reference_key: &str) -> Result<()> {
        self.untrack(tag, reference_key).await.map(|_| ())
    }
}
