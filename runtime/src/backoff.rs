//! Stateful exponential backoff for polling loops.
//!
//! Unlike [`RetryPolicy`](crate::retry::RetryPolicy), which sizes the pause
//! before retry number `n` of a single call, an [`ExponentialBackoff`] lives
//! as long as the loop that owns it and grows each time the loop comes up
//! empty. Intervals never shrink except through [`ExponentialBackoff::reset`].

use std::time::Duration;

/// Growth parameters for an [`ExponentialBackoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// First interval handed out
    pub initial: Duration,
    /// Growth factor applied after every interval; values below 1.0 act as 1.0
    pub multiplier: f64,
    /// Ceiling on any interval
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(2),
            multiplier: 1.5,
            max: Duration::from_secs(10),
        }
    }
}

/// Monotonic, capped exponential backoff timer.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current: Duration,
}

impl ExponentialBackoff {
    /// Start at `config.initial`.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let current = config.initial.min(config.max);
        Self { config, current }
    }

    /// Interval the next call to [`next_delay`](Self::next_delay) returns.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Hand out the current interval and grow the next one.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let factor = self.config.multiplier.max(1.0);
        let grown_ms = delay.as_millis() as f64 * factor;
        let max_ms = self.config.max.as_millis() as f64;

        self.current = if !grown_ms.is_finite() || grown_ms >= max_ms {
            self.config.max
        } else {
            // Advance by at least 1ms so tiny intervals still grow.
            Duration::from_millis((grown_ms.ceil() as u64).max(delay.as_millis() as u64 + 1))
                .min(self.config.max)
        };
        delay
    }

    /// Back to the initial interval.
    pub fn reset(&mut self) {
        self.current = self.config.initial.min(self.config.max);
    }
}
