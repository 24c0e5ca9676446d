//! Reconciliation record API endpoints.
//!
//! - POST /api/manager - Track an expiration
//! - GET /api/manager - List records
//! - GET /api/manager/status - Reconciliation loop status
//! - GET /api/manager/:id - Get one record
//! - DELETE /api/manager - Delete every record
//! - DELETE /api/manager/:id - Delete one record

use super::lobbies::Deleted;
use crate::reconciliation::LoopStatus;
use crate::server::state::AppState;
use arena_core::types::{ReconciliationRecord, RecordId, RecordTag};
use arena_web::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to track an expiration.
///
/// Other services send `type` and either `lobby_id` or `game_type`; both
/// spellings are accepted.
#[derive(Debug, Deserialize)]
pub struct RegisterRecordRequest {
    /// Owning domain
    #[serde(alias = "type")]
    pub tag: RecordTag,
    /// Key into the owning domain
    #[serde(alias = "lobby_id", alias = "game_type")]
    pub reference_key: String,
    /// Deadline, unix seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiration: DateTime<Utc>,
}

/// Response carrying a record id.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordCreated {
    /// Tracked record
    pub id: RecordId,
}

fn parse_record_id(raw: &str) -> Result<RecordId, AppError> {
    Uuid::parse_str(raw)
        .map(RecordId::from_uuid)
        .map_err(|_| AppError::bad_request(format!("invalid record id: {raw}")))
}

/// Track an expiration, or move an existing one for the same reference.
///
/// # Errors
///
/// 400 for an empty reference key.
pub async fn register_record(
    State(state): State<AppState>,
    Json(request): Json<RegisterRecordRequest>,
) -> Result<(StatusCode, Json<RecordCreated>), AppError> {
    let record = state
        .registry
        .track(request.tag, &request.reference_key, request.expiration)
        .await?;
    Ok((StatusCode::CREATED, Json(RecordCreated { id: record.id })))
}

/// List every record.
///
/// # Errors
///
/// 503 if the store cannot be read.
pub async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReconciliationRecord>>, AppError> {
    Ok(Json(state.registry.list().await?))
}

/// Get one record.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent.
pub async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReconciliationRecord>, AppError> {
    let id = parse_record_id(&id)?;
    Ok(Json(state.registry.get(id).await?))
}

/// Delete one record.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_record_id(&id)?;
    state.registry.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every record.
///
/// # Errors
///
/// 503 if the store cannot be written.
pub async fn delete_all_records(
    State(state): State<AppState>,
) -> Result<Json<Deleted>, AppError> {
    let deleted = state.registry.delete_all().await?;
    Ok(Json(Deleted { deleted }))
}

/// Latest reconciliation loop snapshot.
#[allow(clippy::unused_async)]
pub async fn loop_status(State(state): State<AppState>) -> Json<LoopStatus> {
    Json(state.loop_status.borrow().clone())
}
