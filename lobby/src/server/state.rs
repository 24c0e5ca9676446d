//! Application state shared across HTTP handlers.

use crate::engine::LobbyEngine;
use crate::reconciliation::{LoopStatus, PassOutcome, ReconciliationRegistry};
use arena_runtime::metrics::MetricsExporter;
use arena_runtime::{HealthCheck, HealthReport};
use arena_web::handlers::HealthProbe;
use std::sync::Arc;
use tokio::sync::watch;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything inside is behind an `Arc` or a watch
/// receiver.
#[derive(Clone)]
pub struct AppState {
    /// Lobby lifecycle operations
    pub engine: Arc<LobbyEngine>,
    /// Reconciliation records and renewal routing
    pub registry: Arc<ReconciliationRegistry>,
    /// Latest snapshot from the reconciliation loop
    pub loop_status: watch::Receiver<LoopStatus>,
    /// Prometheus recorder, when metrics are enabled
    pub metrics: Option<MetricsExporter>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(
        engine: Arc<LobbyEngine>,
        registry: Arc<ReconciliationRegistry>,
        loop_status: watch::Receiver<LoopStatus>,
        metrics: Option<MetricsExporter>,
    ) -> Self {
        Self {
            engine,
            registry,
            loop_status,
            metrics,
        }
    }
}

impl HealthProbe for AppState {
    fn health(&self) -> HealthReport {
        let status = self.loop_status.borrow().clone();

        let check = if !status.running {
            HealthCheck::unhealthy("reconciliation", "loop not running")
        } else if status
            .last_report
            .is_some_and(|report| report.outcome == PassOutcome::Failed)
        {
            HealthCheck::degraded("reconciliation", "last pass failed")
        } else {
            HealthCheck::healthy("reconciliation")
        };

        HealthReport::new(vec![
            check
                .with_metadata("passes", status.passes.to_string())
                .with_metadata("delay_ms", status.current_delay_ms.to_string()),
        ])
    }
}
