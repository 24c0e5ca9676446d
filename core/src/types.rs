//! Domain types for lobbies, accounts and reconciliation records.

use crate::error::{ArenaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a lobby
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobbyId(Uuid);

impl LobbyId {
    /// Creates a new random `LobbyId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `LobbyId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LobbyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LobbyId {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ArenaError::BadRequest(format!("invalid lobby id: {s}")))
    }
}

/// Unique identifier for a reconciliation record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random `RecordId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RecordId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account identifier as issued by the account service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an account identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry ticket identifier as issued by the ticket service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Wrap a ticket identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Lobby
// ============================================================================

/// Prize paid out to the winner of a lobby's match
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    /// Prize amount
    pub prize_sum: u64,
    /// Prize kind as understood by the prize service
    pub prize_type: u32,
}

/// Lobby-scoped membership of one user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Member
    pub user_id: UserId,
    /// Whether the member confirmed readiness by joining a second time
    pub ready: bool,
}

/// Everything needed to open a lobby, without its roster
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyParams {
    /// Game type tag ("snake", "quiz", ...)
    pub game_type: String,
    /// Seat count
    pub max_players: u32,
    /// Entry price in tickets
    pub ticket_price: u64,
    /// Prize descriptor
    pub prize: Prize,
    /// Match start
    pub start_time: DateTime<Utc>,
    /// Match end
    pub end_time: DateTime<Utc>,
}

/// A capacity-bounded pending match that players join before it starts.
///
/// `current_players` always equals `players.len()` and never exceeds
/// `max_players`. Roster changes go through [`Lobby::admit`] and
/// [`Lobby::mark_ready`] so both hold after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    /// Identity
    pub id: LobbyId,
    /// Game type tag
    pub game_type: String,
    /// Seat count
    pub max_players: u32,
    /// Occupied seats
    #[serde(rename = "now_players")]
    pub current_players: u32,
    /// Entry price in tickets
    pub ticket_price: u64,
    /// Prize descriptor
    #[serde(flatten)]
    pub prize: Prize,
    /// Members in join order
    #[serde(default)]
    pub players: Vec<Player>,
    /// Match start
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    /// Match end
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    /// Optimistic concurrency stamp, bumped by every successful store update
    #[serde(default)]
    pub version: u64,
}

impl Lobby {
    /// Open an empty lobby with the given parameters.
    #[must_use]
    pub fn open(id: LobbyId, params: LobbyParams) -> Self {
        Self {
            id,
            game_type: params.game_type,
            max_players: params.max_players,
            current_players: 0,
            ticket_price: params.ticket_price,
            prize: params.prize,
            players: Vec::new(),
            start_time: params.start_time,
            end_time: params.end_time,
            version: 0,
        }
    }

    /// The parameters this lobby was opened with.
    #[must_use]
    pub fn params(&self) -> LobbyParams {
        LobbyParams {
            game_type: self.game_type.clone(),
            max_players: self.max_players,
            ticket_price: self.ticket_price,
            prize: self.prize.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }

    /// Membership of `user_id`, if any.
    #[must_use]
    pub fn player(&self, user_id: &UserId) -> Option<&Player> {
        self.players.iter().find(|p| &p.user_id == user_id)
    }

    /// Whether every seat is taken.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    /// Seat a new player (not ready yet).
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::LobbyFull`] if no seat is free.
    pub fn admit(&mut self, user_id: UserId) -> Result<()> {
        if self.is_full() {
            return Err(ArenaError::LobbyFull {
                lobby_id: self.id.to_string(),
            });
        }
        self.players.push(Player {
            user_id,
            ready: false,
        });
        self.current_players += 1;
        Ok(())
    }

    /// Flip an existing member's ready flag.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::AlreadyReady`] if the member is ready already and
    /// [`ArenaError::NotFound`] if the user is not a member.
    pub fn mark_ready(&mut self, user_id: &UserId) -> Result<()> {
        let player = self
            .players
            .iter_mut()
            .find(|p| &p.user_id == user_id)
            .ok_or_else(|| ArenaError::not_found("player", user_id))?;
        if player.ready {
            return Err(ArenaError::AlreadyReady {
                user_id: user_id.to_string(),
            });
        }
        player.ready = true;
        Ok(())
    }

    /// Member ids in join order.
    #[must_use]
    pub fn player_ids(&self) -> Vec<UserId> {
        self.players.iter().map(|p| p.user_id.clone()).collect()
    }
}

/// Request sent to a game server launcher once a lobby fills
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Every seated player
    pub players: Vec<UserId>,
    /// Match start
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    /// Match end
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
}

// ============================================================================
// Accounts
// ============================================================================

/// Per-game-type entry ticket holdings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketInventory {
    /// Game type these tickets admit to
    pub game_type: String,
    /// Remaining count
    pub amount: u32,
    /// Unconsumed ticket ids
    #[serde(rename = "tickets_of_gt", default)]
    pub ticket_ids: Vec<TicketId>,
}

/// Account as served by the account service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identity
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub username: String,
    /// Whether the free starter ticket is still unclaimed
    #[serde(default)]
    pub has_free_ticket: bool,
    /// Ticket inventory per game type
    #[serde(default)]
    pub tickets: Vec<TicketInventory>,
}

impl Account {
    /// Inventory entry for `game_type`.
    #[must_use]
    pub fn inventory_mut(&mut self, game_type: &str) -> Option<&mut TicketInventory> {
        self.tickets.iter_mut().find(|t| t.game_type == game_type)
    }

    /// Read-only inventory entry for `game_type`.
    #[must_use]
    pub fn inventory(&self, game_type: &str) -> Option<&TicketInventory> {
        self.tickets.iter().find(|t| t.game_type == game_type)
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Owning domain of a reconciliation record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTag {
    /// Matchmaking lobbies (reference key is the lobby id)
    Lobby,
    /// Tournament qualification tables (reference key is the game type)
    #[serde(alias = "qualifications")]
    Qualification,
    /// Training tables (reference key is the game type)
    Training,
}

impl RecordTag {
    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Qualification => "qualification",
            Self::Training => "training",
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordTag {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lobby" => Ok(Self::Lobby),
            "qualification" | "qualifications" => Ok(Self::Qualification),
            "training" => Ok(Self::Training),
            other => Err(ArenaError::BadRequest(format!("unknown record tag: {other}"))),
        }
    }
}

/// A tracked (domain, reference, expiration) triple
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    /// Identity
    pub id: RecordId,
    /// Owning domain
    pub tag: RecordTag,
    /// Key into the owning domain
    pub reference_key: String,
    /// Deadline after which the owning domain must renew the entity
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiration: DateTime<Utc>,
}

impl ReconciliationRecord {
    /// Whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn params(max_players: u32) -> LobbyParams {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap();
        LobbyParams {
            game_type: "snake".into(),
            max_players,
            ticket_price: 1,
            prize: Prize {
                prize_sum: 100,
                prize_type: 1,
            },
            start_time: start,
            end_time: start + chrono::Duration::hours(2),
        }
    }

    #[test]
    fn admit_keeps_count_in_step_with_roster() {
        let mut lobby = Lobby::open(LobbyId::new(), params(2));
        lobby.admit(UserId::new("a")).unwrap();
        lobby.admit(UserId::new("b")).unwrap();

        assert_eq!(lobby.current_players, 2);
        assert_eq!(lobby.players.len(), 2);
        assert!(lobby.is_full());
        assert!(matches!(
            lobby.admit(UserId::new("c")),
            Err(ArenaError::LobbyFull { .. })
        ));
        assert_eq!(lobby.current_players, 2);
    }

    #[test]
    fn mark_ready_only_once() {
        let mut lobby = Lobby::open(LobbyId::new(), params(3));
        let user = UserId::new("a");
        lobby.admit(user.clone()).unwrap();

        lobby.mark_ready(&user).unwrap();
        assert!(lobby.player(&user).unwrap().ready);
        assert_eq!(
            lobby.mark_ready(&user),
            Err(ArenaError::AlreadyReady {
                user_id: "a".into()
            })
        );
    }

    #[test]
    fn lobby_wire_format_uses_service_field_names() {
        let mut lobby = Lobby::open(LobbyId::new(), params(2));
        lobby.admit(UserId::new("u1")).unwrap();

        let json = serde_json::to_value(&lobby).unwrap();
        assert_eq!(json["now_players"], 1);
        assert_eq!(json["prize_sum"], 100);
        assert_eq!(json["players"][0]["user_id"], "u1");
        assert_eq!(json["start_time"], lobby.start_time.timestamp());

        let back: Lobby = serde_json::from_value(json).unwrap();
        assert_eq!(back, lobby);
    }

    #[test]
    fn account_reads_tickets_of_gt() {
        let account: Account = serde_json::from_str(
            r#"{"id":"u1","username":"neo","has_free_ticket":false,
                "tickets":[{"game_type":"snake","amount":2,"tickets_of_gt":["t1","t2"]}]}"#,
        )
        .unwrap();

        let entry = account.inventory("snake").unwrap();
        assert_eq!(entry.amount, 2);
        assert_eq!(entry.ticket_ids, vec![TicketId::new("t1"), TicketId::new("t2")]);
    }

    #[test]
    fn record_tag_accepts_plural_qualification() {
        let tag: RecordTag = serde_json::from_str(r#""qualifications""#).unwrap();
        assert_eq!(tag, RecordTag::Qualification);
        assert_eq!("training".parse::<RecordTag>().unwrap(), RecordTag::Training);
        assert!("arena".parse::<RecordTag>().is_err());
    }

    #[derive(Debug, Clone)]
    enum RosterOp {
        Admit(u8),
        Ready(u8),
    }

    fn roster_op() -> impl Strategy<Value = RosterOp> {
        prop_oneof![
            (0u8..8).prop_map(RosterOp::Admit),
            (0u8..8).prop_map(RosterOp::Ready),
        ]
    }

    proptest! {
        #[test]
        fn roster_never_exceeds_capacity(
            max_players in 1u32..6,
            ops in proptest::collection::vec(roster_op(), 0..40),
        ) {
            let mut lobby = Lobby::open(LobbyId::new(), params(max_players));
            for op in ops {
                let _ = match op {
                    RosterOp::Admit(n) => lobby.admit(UserId::new(format!("u{n}"))),
                    RosterOp::Ready(n) => lobby.mark_ready(&UserId::new(format!("u{n}"))),
                };
                prop_assert_eq!(lobby.current_players as usize, lobby.players.len());
                prop_assert!(lobby.current_players <= lobby.max_players);
            }
        }
    }

    #[test]
    fn record_expired_at_deadline() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let record = ReconciliationRecord {
            id: RecordId::new(),
            tag: RecordTag::Lobby,
            reference_key: "k".into(),
            expiration: at,
        };
        assert!(record.is_expired(at));
        assert!(!record.is_expired(at - chrono::Duration::seconds(1)));
    }
}
