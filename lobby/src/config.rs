//! Configuration management for the lobby service.
//!
//! Loads configuration from environment variables with defaults matching the
//! usual local deployment (users on 10002, tickets on 10004, lobby on 10006).

use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `GAME_SERVER_URLS` entry without `game=url` shape.
    #[error("invalid GAME_SERVER_URLS entry: {0:?} (expected game_type=url)")]
    GameServerEntry(String),
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Collaborator endpoints
    pub upstream: UpstreamConfig,
    /// Reconciliation loop tuning
    pub reconcile: ReconcileConfig,
    /// Length of a match in seconds
    pub lobby_window_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Collaborator configuration
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConfig {
    /// Account service base URL
    pub users_url: String,
    /// Ticket service base URL
    pub tickets_url: String,
    /// Game server launch URL per game type
    pub game_servers: HashMap<String, String>,
    /// Qualification renewal base URL
    pub qualification_renew_url: String,
    /// Training renewal base URL
    pub training_renew_url: String,
    /// Token sent to launchers when the caller sent none
    #[serde(skip_serializing)]
    pub service_token: Option<String>,
    /// Per-call timeout in milliseconds
    pub call_timeout_ms: u64,
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileConfig {
    /// First wait between passes in milliseconds
    pub initial_backoff_ms: u64,
    /// Ceiling on the wait in milliseconds
    pub max_backoff_ms: u64,
    /// Growth factor after an unproductive pass
    pub backoff_multiplier: f64,
    /// Reset the wait after a pass that renewed something
    pub reset_on_progress: bool,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse `snake=http://a,quiz=http://b`.
///
/// # Errors
///
/// [`ConfigError::GameServerEntry`] for an entry without `=` or with an
/// empty side.
pub fn parse_game_servers(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((game, url)) if !game.trim().is_empty() && !url.trim().is_empty() => {
                Ok((game.trim().to_string(), url.trim().to_string()))
            }
            _ => Err(ConfigError::GameServerEntry(entry.to_string())),
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if `GAME_SERVER_URLS` is malformed. Other unparsable
    /// values fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig {
                host: string_or("ARENA_HOST", "0.0.0.0"),
                port: var_or("ARENA_PORT", 10006),
                metrics_enabled: var_or("METRICS_ENABLED", true),
                shutdown_timeout_secs: var_or("SHUTDOWN_TIMEOUT_SECS", 10),
            },
            upstream: UpstreamConfig {
                users_url: string_or("USERS_URL", "http://localhost:10002"),
                tickets_url: string_or("TICKETS_URL", "http://localhost:10004"),
                game_servers: parse_game_servers(&string_or(
                    "GAME_SERVER_URLS",
                    "snake=http://localhost:10008/api/snake/",
                ))?,
                qualification_renew_url: string_or(
                    "QUALIFICATION_RENEW_URL",
                    "http://localhost:10011/api/qualifications/time",
                ),
                training_renew_url: string_or(
                    "TRAINING_RENEW_URL",
                    "http://localhost:10003/api/training/time",
                ),
                service_token: env::var("SERVICE_TOKEN").ok().filter(|t| !t.is_empty()),
                call_timeout_ms: var_or("CALL_TIMEOUT_MS", 5000),
            },
            reconcile: ReconcileConfig {
                initial_backoff_ms: var_or("RECONCILE_INITIAL_BACKOFF_MS", 2),
                max_backoff_ms: var_or("RECONCILE_MAX_BACKOFF_MS", 10_000),
                backoff_multiplier: var_or("RECONCILE_BACKOFF_MULTIPLIER", 1.5),
                reset_on_progress: var_or("RECONCILE_RESET_ON_PROGRESS", true),
            },
            lobby_window_secs: var_or("LOBBY_WINDOW_SECS", 7200),
        })
    }

    /// Listener address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Collaborator call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.call_timeout_ms)
    }

    /// Graceful shutdown budget.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}
