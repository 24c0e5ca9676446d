//! Prometheus metrics for the lobby engine and the reconciliation loop.
//!
//! Components record through the small recorder types below; the binary
//! installs a [`MetricsExporter`] once at startup and serves
//! [`MetricsExporter::render`] from `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use arena_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = MetricsExporter::install()?;
//! let body = exporter.render();
//! # Ok(())
//! # }
//! ```

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
#[derive(Clone)]
pub struct MetricsExporter {
    handle: PrometheusHandle,
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter").finish_non_exhaustive()
    }
}

impl MetricsExporter {
    /// Describe every metric and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if a recorder is already installed.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::info!("Prometheus recorder installed");
        Ok(Self { handle })
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("lobby_created_total", "Lobbies opened");
    describe_counter!("lobby_joins_total", "Join requests by outcome");
    describe_counter!("lobby_rollovers_total", "Lobbies that filled and rolled over");
    describe_counter!(
        "lobby_rollover_failures_total",
        "Rollovers that stopped at a failed step"
    );
    describe_histogram!("lobby_join_duration_seconds", "Time taken to handle a join");

    describe_counter!(
        "ticket_consumptions_total",
        "Ticket consumption attempts by outcome"
    );

    describe_counter!("reconciliation_passes_total", "Reconciliation passes by outcome");
    describe_counter!("reconciliation_renewals_total", "Records renewed");
    describe_counter!(
        "reconciliation_renewal_failures_total",
        "Renewals that failed and will be retried next pass"
    );
    describe_gauge!(
        "reconciliation_backoff_seconds",
        "Current wait between reconciliation passes"
    );
    describe_histogram!(
        "reconciliation_renewal_duration_seconds",
        "Time taken by one renewal call"
    );
}

/// Lobby engine metrics recorder.
pub struct LobbyMetrics;

impl LobbyMetrics {
    /// Record a lobby opened.
    pub fn record_created(game_type: &str) {
        counter!("lobby_created_total", "game_type" => game_type.to_string()).increment(1);
    }

    /// Record a join by outcome ("admitted", "ready", "rejected").
    pub fn record_join(outcome: &'static str, duration: Duration) {
        counter!("lobby_joins_total", "outcome" => outcome).increment(1);
        histogram!("lobby_join_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rollover, failed or not.
    pub fn record_rollover(failed_step: Option<&'static str>) {
        counter!("lobby_rollovers_total").increment(1);
        if let Some(step) = failed_step {
            counter!("lobby_rollover_failures_total", "step" => step).increment(1);
        }
    }
}

/// Ticket saga metrics recorder.
pub struct TicketMetrics;

impl TicketMetrics {
    /// Record a consumption attempt by outcome ("consumed", "resumed", "rejected", "failed").
    pub fn record_consumption(outcome: &'static str) {
        counter!("ticket_consumptions_total", "outcome" => outcome).increment(1);
    }
}

/// Reconciliation loop metrics recorder.
pub struct ReconciliationMetrics;

impl ReconciliationMetrics {
    /// Record a pass by outcome ("idle", "failed", "progress").
    pub fn record_pass(outcome: &'static str) {
        counter!("reconciliation_passes_total", "outcome" => outcome).increment(1);
    }

    /// Record a successful renewal.
    pub fn record_renewal(tag: &'static str, duration: Duration) {
        counter!("reconciliation_renewals_total", "tag" => tag).increment(1);
        histogram!("reconciliation_renewal_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failed renewal.
    pub fn record_renewal_failure(tag: &'static str) {
        counter!("reconciliation_renewal_failures_total", "tag" => tag).increment(1);
    }

    /// Record the wait before the next pass.
    pub fn record_backoff(delay: Duration) {
        gauge!("reconciliation_backoff_seconds").set(delay.as_secs_f64());
    }
}
