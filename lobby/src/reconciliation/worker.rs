//! Background loop that renews expired records.

use super::registry::ReconciliationRegistry;
use arena_runtime::metrics::ReconciliationMetrics;
use arena_runtime::{BackoffConfig, ExponentialBackoff};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How a pass went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOutcome {
    /// Nothing registered, or nothing expired
    Idle,
    /// Listing failed, or every due renewal failed
    Failed,
    /// At least one record was renewed
    Progress,
}

impl PassOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Failed => "failed",
            Self::Progress => "progress",
        }
    }
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Overall result
    pub outcome: PassOutcome,
    /// Records inspected
    pub scanned: usize,
    /// Records renewed
    pub renewed: usize,
    /// Renewals that failed and will be retried next pass
    pub failed: usize,
}

impl PassReport {
    const fn idle(scanned: usize) -> Self {
        Self {
            outcome: PassOutcome::Idle,
            scanned,
            renewed: 0,
            failed: 0,
        }
    }
}

/// Snapshot published after every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStatus {
    /// Whether the loop is currently running
    pub running: bool,
    /// Passes completed since start
    pub passes: u64,
    /// When the last pass finished
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Result of the last pass
    pub last_report: Option<PassReport>,
    /// Wait before the next pass
    pub current_delay_ms: u64,
}

/// Loop tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Wait growth between unproductive passes
    pub backoff: BackoffConfig,
    /// Drop back to the initial wait after a pass that renewed something
    pub reset_on_progress: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            reset_on_progress: true,
        }
    }
}

/// Waits, scans the registry, renews what is due, repeats.
///
/// Failed renewals are logged and left for the next pass; nothing a pass
/// encounters stops the loop. Only the shutdown signal does.
pub struct ReconciliationLoop {
    registry: Arc<ReconciliationRegistry>,
    config: LoopConfig,
    status: watch::Sender<LoopStatus>,
}

impl ReconciliationLoop {
    /// Loop over `registry`.
    #[must_use]
    pub fn new(registry: Arc<ReconciliationRegistry>, config: LoopConfig) -> Self {
        let (status, _) = watch::channel(LoopStatus::default());
        Self {
            registry,
            config,
            status,
        }
    }

    /// Receiver of status snapshots.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<LoopStatus> {
        self.status.subscribe()
    }

    /// Run one scan-and-renew pass.
    pub async fn run_pass(&self) -> PassReport {
        let records = match self.registry.list().await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to list reconciliation records");
                return PassReport {
                    outcome: PassOutcome::Failed,
                    scanned: 0,
                    renewed: 0,
                    failed: 0,
                };
            }
        };

        let scanned = records.len();
        let due: Vec<_> = records
            .into_iter()
            .filter(|record| self.registry.is_expired(record))
            .collect();
        if due.is_empty() {
            return PassReport::idle(scanned);
        }

        let mut renewed = 0;
        let mut failed = 0;
        for record in &due {
            match self.registry.renew(record).await {
                Ok(_) => renewed += 1,
                Err(err) => {
                    failed += 1;
                    ReconciliationMetrics::record_renewal_failure(record.tag.as_str());
                    tracing::error!(
                        record_id = %record.id,
                        tag = %record.tag,
                        reference_key = %record.reference_key,
                        error = %err,
                        "Renewal failed, retrying next pass"
                    );
                }
            }
        }

        let outcome = if renewed > 0 {
            PassOutcome::Progress
        } else {
            PassOutcome::Failed
        };
        PassReport {
            outcome,
            scanned,
            renewed,
            failed,
        }
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = ExponentialBackoff::new(self.config.backoff.clone());
        self.status.send_modify(|status| {
            status.running = true;
            status.current_delay_ms = millis(backoff.current());
        });
        tracing::info!("Reconciliation loop started");

        while !*shutdown.borrow() {
            let delay = backoff.current();
            ReconciliationMetrics::record_backoff(delay);

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let report = self.run_pass().await;
            ReconciliationMetrics::record_pass(report.outcome.as_str());

            if report.outcome == PassOutcome::Progress && self.config.reset_on_progress {
                backoff.reset();
            } else {
                backoff.next_delay();
            }

            tracing::debug!(
                outcome = report.outcome.as_str(),
                renewed = report.renewed,
                failed = report.failed,
                delay_ms = millis(backoff.current()),
                "Reconciliation pass finished"
            );

            let finished_at = self.registry.now();
            self.status.send_modify(|status| {
                status.passes += 1;
                status.last_pass_at = Some(finished_at);
                status.last_report = Some(report);
                status.current_delay_ms = millis(backoff.current());
            });
        }

        self.status.send_modify(|status| status.running = false);
        tracing::info!("Reconciliation loop stopped");
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}
