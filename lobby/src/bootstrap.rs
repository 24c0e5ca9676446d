//! Wiring of the engine, the registry and the reconciliation loop.

use crate::clients::{HttpAccounts, HttpLauncher, HttpRenewalEndpoint, HttpTickets, http_client};
use crate::config::Config;
use crate::engine::{LobbyEngine, LobbyEnvironment};
use crate::reconciliation::{LobbyRenewal, LoopConfig, ReconciliationLoop, ReconciliationRegistry};
use crate::server::AppState;
use crate::store::{InMemoryLobbyStore, InMemoryRecordStore};
use arena_core::Result;
use arena_core::collaborators::ExpirationNotifier;
use arena_core::environment::{Clock, SystemClock};
use arena_core::schedule::LobbyWindow;
use arena_core::types::RecordTag;
use arena_runtime::BackoffConfig;
use arena_runtime::metrics::MetricsExporter;
use std::sync::Arc;
use std::time::Duration;

/// Everything the service runs, wired together.
///
/// The registry is shared by the engine (which registers lobby expirations),
/// the loop (which renews them) and the HTTP layer. Lobby renewals route back
/// into the engine through a weak handle.
pub struct Arena {
    /// Lobby lifecycle operations
    pub engine: Arc<LobbyEngine>,
    /// Reconciliation records and renewal routing
    pub registry: Arc<ReconciliationRegistry>,
    /// Background renewal loop, not yet started
    pub worker: ReconciliationLoop,
}

impl Arena {
    /// Wire an engine built by `environment` to `registry`.
    ///
    /// `environment` receives the registry as the engine's expiration
    /// notifier.
    pub fn assemble<F>(registry: ReconciliationRegistry, loop_config: LoopConfig, environment: F) -> Self
    where
        F: FnOnce(Arc<dyn ExpirationNotifier>) -> LobbyEnvironment,
    {
        let registry = Arc::new(registry);
        let notifier: Arc<dyn ExpirationNotifier> = registry.clone();
        let engine = Arc::new(LobbyEngine::new(environment(notifier)));

        registry.register_endpoint(
            RecordTag::Lobby,
            Arc::new(LobbyRenewal::new(Arc::downgrade(&engine))),
        );

        let worker = ReconciliationLoop::new(Arc::clone(&registry), loop_config);
        Self {
            engine,
            registry,
            worker,
        }
    }

    /// Production wiring: in-memory stores, HTTP collaborators, wall clock.
    ///
    /// # Errors
    ///
    /// `UpstreamUnavailable` if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http_client(config.call_timeout())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let upstream = &config.upstream;

        let registry = ReconciliationRegistry::new(Arc::new(InMemoryRecordStore::new()), clock.clone())
            .with_call_timeout(config.call_timeout());
        registry.register_endpoint(
            RecordTag::Qualification,
            Arc::new(HttpRenewalEndpoint::new(
                client.clone(),
                "qualification renewal",
                upstream.qualification_renew_url.clone(),
            )),
        );
        registry.register_endpoint(
            RecordTag::Training,
            Arc::new(HttpRenewalEndpoint::new(
                client.clone(),
                "training renewal",
                upstream.training_renew_url.clone(),
            )),
        );

        let loop_config = LoopConfig {
            backoff: BackoffConfig {
                initial: Duration::from_millis(config.reconcile.initial_backoff_ms),
                multiplier: config.reconcile.backoff_multiplier,
                max: Duration::from_millis(config.reconcile.max_backoff_ms),
            },
            reset_on_progress: config.reconcile.reset_on_progress,
        };

        let window = i64::try_from(config.lobby_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map_or_else(LobbyWindow::default, LobbyWindow::new);

        Ok(Self::assemble(registry, loop_config, |notifier| {
            LobbyEnvironment::new(
                Arc::new(InMemoryLobbyStore::new()),
                Arc::new(HttpAccounts::new(client.clone(), upstream.users_url.clone())),
                Arc::new(HttpTickets::new(client.clone(), upstream.tickets_url.clone())),
                Arc::new(
                    HttpLauncher::new(client.clone(), upstream.game_servers.clone())
                        .with_service_token(upstream.service_token.clone()),
                ),
                notifier,
            )
            .with_clock(clock)
            .with_window(window)
            .with_call_timeout(config.call_timeout())
        }))
    }

    /// HTTP state over this wiring.
    #[must_use]
    pub fn state(&self, metrics: Option<MetricsExporter>) -> AppState {
        AppState::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.registry),
            self.worker.status(),
            metrics,
        )
    }
}
