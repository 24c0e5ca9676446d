//! Time bounds for outbound collaborator calls.

use arena_core::{ArenaError, Result};
use std::future::Future;
use std::time::Duration;

/// Run `call` against `service`, failing with `UpstreamUnavailable` if it
/// does not finish within `timeout`.
///
/// # Errors
///
/// Whatever `call` returns, or `UpstreamUnavailable` on expiry.
pub async fn with_deadline<T, F>(service: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Ok(outcome) = tokio::time::timeout(timeout, call).await {
        outcome
    } else {
        tracing::warn!(
            service,
            timeout_ms = timeout.as_millis(),
            "Collaborator call timed out"
        );
        Err(ArenaError::unavailable(
            service,
            format!("no response within {}ms", timeout.as_millis()),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_call_becomes_unavailable() {
        let result: Result<()> = with_deadline("tickets", Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(ArenaError::UpstreamUnavailable { ref service, .. }) if service == "tickets"
        ));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let value = with_deadline("users", Duration::from_secs(1), async { Ok(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);

        let err: Result<()> = with_deadline("users", Duration::from_secs(1), async {
            Err(ArenaError::not_found("user", "u1"))
        })
        .await;
        assert_eq!(err.unwrap_err(), ArenaError::not_found("user", "u1"));
    }
}
