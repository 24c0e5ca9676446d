//! Router configuration for the lobby service.

use super::state::AppState;
use crate::api::{lobbies, manager};
use arena_web::correlation_id_layer;
use arena_web::handlers::{health_check, readiness_check};
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/health/ready`, `/metrics`
/// - `/api/lobbies/...`: lobby lifecycle
/// - `/api/manager/...`: reconciliation records
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Lobby lifecycle
        .route(
            "/lobbies",
            post(lobbies::create_lobby)
                .get(lobbies::list_lobbies)
                .delete(lobbies::delete_all_lobbies),
        )
        .route("/lobbies/join", post(lobbies::join_lobby))
        .route("/lobbies/params", post(lobbies::find_by_params))
        .route("/lobbies/time/:id", put(lobbies::extend_schedule))
        .route(
            "/lobbies/:id",
            get(lobbies::get_lobby).delete(lobbies::delete_lobby),
        )
        .route("/lobbies/:id/recreate", post(lobbies::recreate_lobby))
        // Reconciliation records
        .route(
            "/manager",
            post(manager::register_record)
                .get(manager::list_records)
                .delete(manager::delete_all_records),
        )
        .route("/manager/status", get(manager::loop_status))
        .route(
            "/manager/:id",
            get(manager::get_record).delete(manager::delete_record),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check::<AppState>))
        .route("/metrics", get(render_metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(exporter) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            exporter.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
