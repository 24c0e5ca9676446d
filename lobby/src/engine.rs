//! Lobby lifecycle engine.
//!
//! The engine owns every state transition of a lobby: opening it, seating
//! players (through the ticket saga), toggling readiness, and replacing it
//! with an empty sibling once the last seat is taken. Joins on the same lobby
//! are serialized by a keyed lock; the store's version check catches anything
//! that slips past it (another process, a direct store write).

use crate::saga::TicketConsumptionSaga;
use arena_core::collaborators::{
    AccountCollaborator, ExpirationNotifier, GameServerLauncher, LaunchOutcome,
    TicketCollaborator,
};
use arena_core::environment::{Clock, SystemClock};
use arena_core::schedule::{LobbyWindow, next_even_hour, next_slot};
use arena_core::store::{LobbyCriteria, LobbyStore};
use arena_core::types::{
    LaunchRequest, Lobby, LobbyId, LobbyParams, Prize, RecordTag, TicketId, UserId,
};
use arena_core::{ArenaError, Result};
use arena_runtime::metrics::LobbyMetrics;
use arena_runtime::{KeyedMutex, RetryPolicy, with_deadline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const LAUNCHER: &str = "launcher";
const REGISTRY: &str = "registry";

/// Dependencies injected into the engine.
pub struct LobbyEnvironment {
    /// Lobby persistence
    pub store: Arc<dyn LobbyStore>,
    /// Account service
    pub accounts: Arc<dyn AccountCollaborator>,
    /// Ticket service
    pub tickets: Arc<dyn TicketCollaborator>,
    /// Game server launcher
    pub launcher: Arc<dyn GameServerLauncher>,
    /// Where new lobbies register their expiration
    pub notifier: Arc<dyn ExpirationNotifier>,
    /// Time source for default start times
    pub clock: Arc<dyn Clock>,
    /// Match duration per game type
    pub window: LobbyWindow,
    /// Bound on every collaborator call
    pub call_timeout: Duration,
    /// Retry policy for the ticket saga
    pub retry: RetryPolicy,
}

impl LobbyEnvironment {
    /// Environment with the wall clock, a two-hour window, 5s call timeouts
    /// and the default retry policy.
    #[must_use]
    pub fn new(
        store: Arc<dyn LobbyStore>,
        accounts: Arc<dyn AccountCollaborator>,
        tickets: Arc<dyn TicketCollaborator>,
        launcher: Arc<dyn GameServerLauncher>,
        notifier: Arc<dyn ExpirationNotifier>,
    ) -> Self {
        Self {
            store,
            accounts,
            tickets,
            launcher,
            notifier,
            clock: Arc::new(SystemClock),
            window: LobbyWindow::default(),
            call_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the match window.
    #[must_use]
    pub fn with_window(mut self, window: LobbyWindow) -> Self {
        self.window = window;
        self
    }

    /// Replace the call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Replace the saga retry policy.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }
}

/// Input for opening a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLobby {
    /// Game type tag
    pub game_type: String,
    /// Seat count, at least one
    pub max_players: u32,
    /// Entry price in tickets
    pub ticket_price: u64,
    /// Prize descriptor
    pub prize: Prize,
    /// Explicit start; defaults to the next even hour
    pub start_time: Option<DateTime<Utc>>,
}

/// Input for a join call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLobby {
    /// Target lobby
    pub lobby_id: LobbyId,
    /// Joining user
    pub user_id: UserId,
    /// Ticket spent on admission; ignored for a ready toggle
    pub ticket_id: TicketId,
    /// Caller's bearer token, forwarded to the launcher on rollover
    pub bearer: Option<String>,
}

/// What a join did to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// A new player took a seat
    Admitted,
    /// An existing player confirmed readiness
    Ready,
}

/// Progress of the replace-when-full sequence.
///
/// Steps run in order (create sibling, launch, delete filled lobby) and stop
/// at the first failure. Completed steps are never undone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverReport {
    /// Empty sibling opened with the filled lobby's parameters
    pub sibling: Option<LobbyId>,
    /// Whether the game server acknowledged (or no launcher is configured)
    pub launched: bool,
    /// Whether the filled lobby was removed
    pub deleted: bool,
    /// Step that failed ("create", "launch", "delete")
    pub failed_step: Option<&'static str>,
    /// Error from the failed step
    pub error: Option<String>,
}

impl RolloverReport {
    fn fail(mut self, step: &'static str, err: &ArenaError) -> Self {
        self.failed_step = Some(step);
        self.error = Some(err.to_string());
        self
    }

    /// Whether every step succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    /// Lobby joined
    pub lobby_id: LobbyId,
    /// Admission or ready toggle
    pub kind: JoinKind,
    /// Present when this join filled the lobby
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollover: Option<RolloverReport>,
}

/// Lobby lifecycle operations.
pub struct LobbyEngine {
    store: Arc<dyn LobbyStore>,
    launcher: Arc<dyn GameServerLauncher>,
    notifier: Arc<dyn ExpirationNotifier>,
    clock: Arc<dyn Clock>,
    window: LobbyWindow,
    call_timeout: Duration,
    saga: TicketConsumptionSaga,
    locks: KeyedMutex<LobbyId>,
}

impl LobbyEngine {
    /// Engine over `env`.
    #[must_use]
    pub fn new(env: LobbyEnvironment) -> Self {
        let saga = TicketConsumptionSaga::new(env.accounts, env.tickets)
            .with_call_timeout(env.call_timeout)
            .with_retry(env.retry);

        Self {
            store: env.store,
            launcher: env.launcher,
            notifier: env.notifier,
            clock: env.clock,
            window: env.window,
            call_timeout: env.call_timeout,
            saga,
            locks: KeyedMutex::new(),
        }
    }

    /// Open an empty lobby.
    ///
    /// Without a start time the lobby starts at the next even hour. The end
    /// time is always the start plus the game type's window.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for zero seats or an empty game type
    /// - `UpstreamUnavailable` if the lobby cannot be stored or its
    ///   expiration cannot be registered
    pub async fn create(&self, request: CreateLobby) -> Result<LobbyId> {
        if request.game_type.trim().is_empty() {
            return Err(ArenaError::BadRequest("game_type must not be empty".into()));
        }
        if request.max_players == 0 {
            return Err(ArenaError::BadRequest(
                "max_players must be at least 1".into(),
            ));
        }

        let start_time = request
            .start_time
            .unwrap_or_else(|| next_even_hour(self.clock.now()));
        let end_time = self.window.end_for(&request.game_type, start_time);

        self.open(LobbyParams {
            game_type: request.game_type,
            max_players: request.max_players,
            ticket_price: request.ticket_price,
            prize: request.prize,
            start_time,
            end_time,
        })
        .await
    }

    async fn open(&self, params: LobbyParams) -> Result<LobbyId> {
        let lobby = Lobby::open(LobbyId::new(), params);
        let id = lobby.id;
        let start_time = lobby.start_time;
        let game_type = lobby.game_type.clone();

        self.store.create(lobby).await?;

        let key = id.to_string();
        let registered = with_deadline(
            REGISTRY,
            self.call_timeout,
            self.notifier.register(RecordTag::Lobby, &key, start_time),
        )
        .await;

        if let Err(err) = registered {
            // An untracked lobby would never move past its start; take it back out.
            if let Err(cleanup) = self.store.delete(id).await {
                tracing::error!(lobby_id = %id, error = %cleanup, "Failed to remove untracked lobby");
            }
            return Err(err);
        }

        LobbyMetrics::record_created(&game_type);
        tracing::info!(lobby_id = %id, game_type = %game_type, start_time = %start_time, "Lobby opened");
        Ok(id)
    }

    /// Load one lobby.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    pub async fn get(&self, id: LobbyId) -> Result<Lobby> {
        self.store.find_by_id(id).await
    }

    /// Every lobby, oldest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self) -> Result<Vec<Lobby>> {
        self.store.find_all().await
    }

    /// Id of the first lobby matching `criteria`.
    ///
    /// # Errors
    ///
    /// `NotFound` if none match.
    pub async fn find_by_params(&self, criteria: &LobbyCriteria) -> Result<LobbyId> {
        self.store.find_by_params(criteria).await.map(|lobby| lobby.id)
    }

    /// Join a lobby, or confirm readiness if already seated.
    ///
    /// A new player spends one ticket through the saga before taking a seat.
    /// The join that takes the last seat also runs the rollover and reports
    /// how far it got.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the lobby does not exist
    /// - `AlreadyReady` if the user already confirmed
    /// - `LobbyFull` if a new player finds no free seat
    /// - any ticket saga error; the lobby is left untouched
    /// - `Conflict` if the lobby changed underneath the update
    pub async fn join(&self, request: JoinLobby) -> Result<JoinOutcome> {
        let started = Instant::now();
        let lobby_id = request.lobby_id;

        let guard = self.locks.lock(lobby_id).await;
        let outcome = self.join_locked(request).await;
        drop(guard);

        let label = match &outcome {
            Ok(JoinOutcome {
                kind: JoinKind::Admitted,
                ..
            }) => "admitted",
            Ok(JoinOutcome {
                kind: JoinKind::Ready,
                ..
            }) => "ready",
            Err(_) => "rejected",
        };
        LobbyMetrics::record_join(label, started.elapsed());

        let replaced = matches!(
            &outcome,
            Ok(JoinOutcome {
                rollover: Some(RolloverReport { deleted: true, .. }),
                ..
            })
        );
        if replaced {
            self.locks.forget(&lobby_id).await;
        }

        outcome
    }

    async fn join_locked(&self, request: JoinLobby) -> Result<JoinOutcome> {
        let JoinLobby {
            lobby_id,
            user_id,
            ticket_id,
            bearer,
        } = request;

        let mut lobby = self.store.find_by_id(lobby_id).await?;

        if lobby.player(&user_id).is_some() {
            lobby.mark_ready(&user_id)?;
            self.store.update(&lobby).await?;
            tracing::info!(lobby_id = %lobby_id, user_id = %user_id, "Player ready");
            return Ok(JoinOutcome {
                lobby_id,
                kind: JoinKind::Ready,
                rollover: None,
            });
        }

        if lobby.is_full() {
            return Err(ArenaError::LobbyFull {
                lobby_id: lobby_id.to_string(),
            });
        }

        self.saga
            .consume(&user_id, &lobby.game_type, &ticket_id)
            .await?;

        lobby.admit(user_id.clone())?;
        lobby.version = self.store.update(&lobby).await?;

        tracing::info!(
            lobby_id = %lobby_id,
            user_id = %user_id,
            players = lobby.current_players,
            max_players = lobby.max_players,
            "Player admitted"
        );

        let rollover = if lobby.is_full() {
            Some(self.rollover(&lobby, bearer.as_deref()).await)
        } else {
            None
        };

        Ok(JoinOutcome {
            lobby_id,
            kind: JoinKind::Admitted,
            rollover,
        })
    }

    /// Replace a filled lobby: open an empty sibling, launch the match, and
    /// remove the filled lobby.
    async fn rollover(&self, filled: &Lobby, bearer: Option<&str>) -> RolloverReport {
        let report = self.run_rollover(filled, bearer).await;
        LobbyMetrics::record_rollover(report.failed_step);

        match (&report.failed_step, &report.error) {
            (Some(step), Some(error)) => tracing::error!(
                lobby_id = %filled.id,
                step = *step,
                error = %error,
                "Rollover stopped"
            ),
            _ => tracing::info!(
                lobby_id = %filled.id,
                sibling = ?report.sibling.map(|id| id.to_string()),
                "Lobby filled and replaced"
            ),
        }
        report
    }

    async fn run_rollover(&self, filled: &Lobby, bearer: Option<&str>) -> RolloverReport {
        let mut report = RolloverReport::default();

        match self.open(filled.params()).await {
            Ok(id) => report.sibling = Some(id),
            Err(err) => return report.fail("create", &err),
        }

        let request = LaunchRequest {
            players: filled.player_ids(),
            start_time: filled.start_time,
            end_time: filled.end_time,
        };
        let launched = with_deadline(
            LAUNCHER,
            self.call_timeout,
            self.launcher.launch(&filled.game_type, &request, bearer),
        )
        .await;
        match launched {
            Ok(LaunchOutcome::Created) => report.launched = true,
            Ok(LaunchOutcome::Skipped) => {
                tracing::info!(
                    lobby_id = %filled.id,
                    game_type = %filled.game_type,
                    "No game server configured, skipping launch"
                );
                report.launched = true;
            }
            Err(err) => return report.fail("launch", &err),
        }

        match self.remove(filled.id).await {
            Ok(()) => report.deleted = true,
            Err(err) => return report.fail("delete", &err),
        }

        report
    }

    /// Delete a lobby and stop tracking its expiration.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent.
    pub async fn delete(&self, id: LobbyId) -> Result<()> {
        let guard = self.locks.lock(id).await;
        let removed = self.remove(id).await;
        drop(guard);
        self.locks.forget(&id).await;
        removed
    }

    async fn remove(&self, id: LobbyId) -> Result<()> {
        self.store.delete(id).await?;
        self.untrack(id).await;
        tracing::info!(lobby_id = %id, "Lobby deleted");
        Ok(())
    }

    async fn untrack(&self, id: LobbyId) {
        let key = id.to_string();
        let deregistered = with_deadline(
            REGISTRY,
            self.call_timeout,
            self.notifier.deregister(RecordTag::Lobby, &key),
        )
        .await;
        if let Err(err) = deregistered {
            tracing::warn!(lobby_id = %id, error = %err, "Failed to deregister lobby expiration");
        }
    }

    /// Delete every lobby, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_all(&self) -> Result<usize> {
        let lobbies = self.store.find_all().await?;
        let removed = self.store.delete_all().await?;
        for lobby in &lobbies {
            self.untrack(lobby.id).await;
            self.locks.forget(&lobby.id).await;
        }
        tracing::info!(removed, "All lobbies deleted");
        Ok(removed)
    }

    /// Replace a lobby with an empty copy carrying the same parameters and
    /// schedule. Returns the new lobby's id.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent; create errors leave the original in place.
    pub async fn recreate(&self, id: LobbyId) -> Result<LobbyId> {
        let guard = self.locks.lock(id).await;
        let original = self.store.find_by_id(id).await?;
        let replacement = self.open(original.params()).await?;
        let removed = self.remove(id).await;
        drop(guard);
        self.locks.forget(&id).await;
        removed?;

        tracing::info!(lobby_id = %id, replacement = %replacement, "Lobby recreated");
        Ok(replacement)
    }

    /// Move a lobby to its next slot and return the new start.
    ///
    /// Slots advance an hour at a time, except that 02:00 jumps to 16:00.
    /// A lobby whose start lies further back than one slot is advanced until
    /// the start is in the future. Roster and counts are kept, and the
    /// lobby's expiration record moves to the new start.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `Conflict` if the lobby changed concurrently.
    pub async fn extend_schedule(&self, id: LobbyId) -> Result<DateTime<Utc>> {
        let _guard = self.locks.lock(id).await;
        let mut lobby = self.store.find_by_id(id).await?;

        let now = self.clock.now();
        let mut start = next_slot(lobby.start_time);
        while start <= now {
            start = next_slot(start);
        }

        lobby.start_time = start;
        lobby.end_time = self.window.end_for(&lobby.game_type, start);
        self.store.update(&lobby).await?;

        // The record must follow the start, or its old deadline moves the lobby again.
        let key = id.to_string();
        let registered = with_deadline(
            REGISTRY,
            self.call_timeout,
            self.notifier.register(RecordTag::Lobby, &key, start),
        )
        .await;
        if let Err(err) = registered {
            tracing::warn!(lobby_id = %id, error = %err, "Failed to move lobby expiration");
        }

        tracing::info!(lobby_id = %id, start_time = %start, "Lobby schedule extended");
        Ok(start)
    }
}
