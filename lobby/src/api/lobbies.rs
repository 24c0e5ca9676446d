//! Lobby API endpoints.
//!
//! - POST /api/lobbies - Open a lobby
//! - GET /api/lobbies - List lobbies
//! - GET /api/lobbies/:id - Get one lobby
//! - DELETE /api/lobbies - Delete every lobby
//! - DELETE /api/lobbies/:id - Delete one lobby
//! - POST /api/lobbies/:id/recreate - Replace a lobby with an empty copy
//! - POST /api/lobbies/join - Join, or confirm readiness
//! - POST /api/lobbies/params - Find a lobby by game type, seats and prize
//! - PUT /api/lobbies/time/:id - Move a lobby to its next slot

use crate::engine::{CreateLobby, JoinLobby, JoinOutcome};
use crate::server::state::AppState;
use arena_core::store::LobbyCriteria;
use arena_core::types::{Lobby, LobbyId, Prize, TicketId, UserId};
use arena_web::{AppError, BearerToken, CorrelationId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to open a lobby.
#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    /// Game type tag
    pub game_type: String,
    /// Seat count
    pub max_players: u32,
    /// Entry price in tickets
    #[serde(default)]
    pub ticket_price: u64,
    /// Prize amount
    #[serde(default)]
    pub prize_sum: u64,
    /// Prize kind
    #[serde(default)]
    pub prize_type: u32,
    /// Start, unix seconds; defaults to the next even hour
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    /// Accepted for compatibility; the end is always derived from the start
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub end_time: Option<DateTime<Utc>>,
}

impl From<CreateLobbyRequest> for CreateLobby {
    fn from(request: CreateLobbyRequest) -> Self {
        Self {
            game_type: request.game_type,
            max_players: request.max_players,
            ticket_price: request.ticket_price,
            prize: Prize {
                prize_sum: request.prize_sum,
                prize_type: request.prize_type,
            },
            start_time: request.start_time,
        }
    }
}

/// Response carrying a lobby id.
#[derive(Debug, Serialize, Deserialize)]
pub struct LobbyCreated {
    /// Opened lobby
    pub lobby_id: LobbyId,
}

/// Request to join a lobby.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Joining user
    pub user_id: UserId,
    /// Target lobby
    pub lobby_id: String,
    /// Ticket to spend on admission
    pub ticket_id: TicketId,
}

/// Request to find a lobby by its parameters.
#[derive(Debug, Deserialize)]
pub struct ParamsRequest {
    /// Game type tag
    pub game_type: String,
    /// Seat count
    pub max_players: u32,
    /// Prize amount
    pub prize_sum: u64,
}

/// Response carrying a matched lobby id.
#[derive(Debug, Serialize, Deserialize)]
pub struct LobbyMatch {
    /// Matched lobby
    pub id: LobbyId,
}

/// Response to a bulk delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    /// Number of entities removed
    pub deleted: usize,
}

/// Response to a schedule extension.
#[derive(Debug, Serialize, Deserialize)]
pub struct Extended {
    /// New start, unix seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiration: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a lobby.
///
/// ```bash
/// curl -X POST http://localhost:10006/api/lobbies \
///   -H "Content-Type: application/json" \
///   -d '{"game_type":"snake","max_players":4,"ticket_price":1,"prize_sum":100,"prize_type":1}'
/// ```
///
/// # Errors
///
/// 400 for zero seats or an empty game type, 503 if the lobby cannot be
/// stored or registered.
pub async fn create_lobby(
    State(state): State<AppState>,
    Json(request): Json<CreateLobbyRequest>,
) -> Result<(StatusCode, Json<LobbyCreated>), AppError> {
    let lobby_id = state.engine.create(request.into()).await?;
    Ok((StatusCode::CREATED, Json(LobbyCreated { lobby_id })))
}

/// List every lobby.
///
/// # Errors
///
/// 503 if the store cannot be read.
pub async fn list_lobbies(State(state): State<AppState>) -> Result<Json<Vec<Lobby>>, AppError> {
    Ok(Json(state.engine.list().await?))
}

/// Get one lobby.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent.
pub async fn get_lobby(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Lobby>, AppError> {
    let id: LobbyId = id.parse()?;
    Ok(Json(state.engine.get(id).await?))
}

/// Delete one lobby.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent.
pub async fn delete_lobby(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: LobbyId = id.parse()?;
    state.engine.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every lobby.
///
/// # Errors
///
/// 503 if the store cannot be written.
pub async fn delete_all_lobbies(State(state): State<AppState>) -> Result<Json<Deleted>, AppError> {
    let deleted = state.engine.delete_all().await?;
    Ok(Json(Deleted { deleted }))
}

/// Replace a lobby with an empty copy.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent.
pub async fn recreate_lobby(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<LobbyCreated>), AppError> {
    let id: LobbyId = id.parse()?;
    let lobby_id = state.engine.recreate(id).await?;
    Ok((StatusCode::CREATED, Json(LobbyCreated { lobby_id })))
}

/// Join a lobby, or confirm readiness when already seated.
///
/// The caller's bearer token is forwarded to the game server launcher if this
/// join fills the lobby.
///
/// ```bash
/// curl -X POST http://localhost:10006/api/lobbies/join \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"user_id":"u1","lobby_id":"<uuid>","ticket_id":"t1"}'
/// ```
///
/// # Errors
///
/// 404 unknown lobby or user, 409 full lobby or already ready, 422 missing
/// tickets, 400 foreign ticket, 503 collaborator failure.
pub async fn join_lobby(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    bearer: BearerToken,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinOutcome>, AppError> {
    let lobby_id: LobbyId = request.lobby_id.parse()?;
    tracing::debug!(
        correlation_id = %correlation_id,
        lobby_id = %lobby_id,
        user_id = %request.user_id,
        "Join requested"
    );

    let outcome = state
        .engine
        .join(JoinLobby {
            lobby_id,
            user_id: request.user_id,
            ticket_id: request.ticket_id,
            bearer: bearer.0,
        })
        .await?;
    Ok(Json(outcome))
}

/// Find the first lobby with the given game type, seat count and prize.
///
/// # Errors
///
/// 404 if none match.
pub async fn find_by_params(
    State(state): State<AppState>,
    Json(request): Json<ParamsRequest>,
) -> Result<Json<LobbyMatch>, AppError> {
    let criteria = LobbyCriteria {
        game_type: request.game_type,
        max_players: request.max_players,
        prize_sum: request.prize_sum,
    };
    let id = state.engine.find_by_params(&criteria).await?;
    Ok(Json(LobbyMatch { id }))
}

/// Move a lobby to its next slot.
///
/// # Errors
///
/// 400 for a malformed id, 404 if absent, 409 on a concurrent change.
pub async fn extend_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Extended>, AppError> {
    let id: LobbyId = id.parse()?;
    let expiration = state.engine.extend_schedule(id).await?;
    Ok(Json(Extended { expiration }))
}
