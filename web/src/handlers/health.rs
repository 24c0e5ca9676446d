//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use arena_runtime::{HealthReport, HealthStatus};
use axum::{Json, extract::State, http::StatusCode};

/// Anything that can report its own health.
pub trait HealthProbe: Send + Sync {
    /// Current health of every component.
    fn health(&self) -> HealthReport;
}

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK whenever the process is serving requests. Dependencies
/// are not checked.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness endpoint backed by a [`HealthProbe`].
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness_check<P>(State(probe): State<P>) -> (StatusCode, Json<HealthReport>)
where
    P: HealthProbe,
{
    let report = probe.health();

    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_runtime::HealthCheck;

    #[derive(Clone)]
    struct Probe(HealthStatus);

    impl HealthProbe for Probe {
        fn health(&self) -> HealthReport {
            let check = match self.0 {
                HealthStatus::Healthy => HealthCheck::healthy("loop"),
                HealthStatus::Degraded => HealthCheck::degraded("loop", "slow"),
                HealthStatus::Unhealthy => HealthCheck::unhealthy("loop", "stopped"),
            };
            HealthReport::new(vec![check])
        }
    }

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn degraded_is_still_ready() {
        let (status, Json(report)) = readiness_check(State(Probe(HealthStatus::Degraded))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn unhealthy_is_not_ready() {
        let (status, _) = readiness_check(State(Probe(HealthStatus::Unhealthy))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
