//! Lobby scheduling rules.
//!
//! Lobbies start on even hours by default and run for a fixed window that
//! depends on the game type. When a lobby's start passes without it filling,
//! it moves to the next slot: one hour later, except that a lobby starting at
//! 02:00 skips the overnight quiet period and moves to 16:00.

use chrono::{DateTime, Duration, Timelike, Utc};
use std::collections::HashMap;

/// Hour at which the overnight quiet period begins.
const QUIET_START_HOUR: u32 = 2;

/// Hours skipped when a slot hits the quiet period.
const QUIET_SKIP_HOURS: i64 = 14;

/// Truncate to the start of the current hour.
fn hour_floor(at: DateTime<Utc>) -> DateTime<Utc> {
    let into_hour = i64::from(at.minute() * 60 + at.second());
    at - Duration::seconds(into_hour) - Duration::nanoseconds(i64::from(at.nanosecond()))
}

/// Next even-hour boundary strictly after the current hour.
///
/// An even current hour advances two hours and an odd one advances one, so
/// 13:05 yields 14:00 and 14:05 yields 16:00.
#[must_use]
pub fn next_even_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let step = if now.hour() % 2 == 0 { 2 } else { 1 };
    hour_floor(now) + Duration::hours(step)
}

/// Start of the slot following `start`.
#[must_use]
pub fn next_slot(start: DateTime<Utc>) -> DateTime<Utc> {
    if start.hour() == QUIET_START_HOUR {
        start + Duration::hours(QUIET_SKIP_HOURS)
    } else {
        start + Duration::hours(1)
    }
}

/// Match duration per game type.
#[derive(Debug, Clone)]
pub struct LobbyWindow {
    default: Duration,
    overrides: HashMap<String, Duration>,
}

impl Default for LobbyWindow {
    fn default() -> Self {
        Self::new(Duration::hours(2))
    }
}

impl LobbyWindow {
    /// Same window for every game type.
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Use a different window for one game type.
    #[must_use]
    pub fn with_override(mut self, game_type: impl Into<String>, window: Duration) -> Self {
        self.overrides.insert(game_type.into(), window);
        self
    }

    /// Window for `game_type`.
    #[must_use]
    pub fn for_game(&self, game_type: &str) -> Duration {
        self.overrides.get(game_type).copied().unwrap_or(self.default)
    }

    /// End time of a match of `game_type` starting at `start`.
    #[must_use]
    pub fn end_for(&self, game_type: &str, start: DateTime<Utc>) -> DateTime<Utc> {
        start + self.for_game(game_type)
    }
}
