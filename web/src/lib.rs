//! Axum integration for the arena services.
//!
//! Handlers stay thin: extract the request, call the engine, map the result.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP (Axum)                │  ← JSON, headers, status codes
//! │  - correlation ids, bearer tokens       │
//! │  - AppError → {code, message}           │
//! ├─────────────────────────────────────────┤
//! │           Lobby engine                  │  ← business rules, sagas
//! │  - ArenaError                           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use arena_web::{AppError, correlation_id_layer};
//! use axum::{Router, routing::post, Json};
//!
//! async fn join(
//!     State(state): State<AppState>,
//!     Json(request): Json<JoinRequest>,
//! ) -> Result<Json<JoinOutcome>, AppError> {
//!     Ok(Json(state.engine.join(request.into()).await?))
//! }
//!
//! let app = Router::new()
//!     .route("/api/lobbies/join", post(join))
//!     .layer(correlation_id_layer())
//!     .with_state(app_state);
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorResponse};
pub use extractors::{BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
