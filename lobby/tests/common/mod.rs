//! Shared fixtures for lobby integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use arena_core::environment::Clock;
use arena_core::types::{Account, LobbyId, Prize, TicketId, TicketInventory, UserId};
use arena_lobby::engine::{CreateLobby, JoinLobby, LobbyEnvironment};
use arena_lobby::reconciliation::{LoopConfig, ReconciliationRegistry};
use arena_lobby::store::{InMemoryLobbyStore, InMemoryRecordStore};
use arena_lobby::{Arena, LobbyEngine};
use arena_runtime::RetryPolicy;
use arena_testing::{ManualClock, MockAccounts, MockLauncher, MockTickets, test_clock};
use std::sync::Arc;

/// Account holding `tickets` for `game_type`.
pub fn account(user: &str, game_type: &str, tickets: &[&str]) -> Account {
    Account {
        id: UserId::new(user),
        username: format!("{user}-name"),
        has_free_ticket: false,
        tickets: vec![TicketInventory {
            game_type: game_type.to_string(),
            amount: u32::try_from(tickets.len()).unwrap(),
            ticket_ids: tickets.iter().map(|t| TicketId::new(*t)).collect(),
        }],
    }
}

/// Snake lobby with `max_players` seats and a default start.
pub fn snake(max_players: u32) -> CreateLobby {
    CreateLobby {
        game_type: "snake".into(),
        max_players,
        ticket_price: 1,
        prize: Prize {
            prize_sum: 100,
            prize_type: 1,
        },
        start_time: None,
    }
}

/// Join request spending `ticket`.
pub fn join(lobby_id: LobbyId, user: &str, ticket: &str) -> JoinLobby {
    JoinLobby {
        lobby_id,
        user_id: UserId::new(user),
        ticket_id: TicketId::new(ticket),
        bearer: None,
    }
}

/// Fully wired arena over mocks and in-memory stores.
///
/// The clock starts at 2025-01-01 13:05 UTC. Saga retries are disabled so
/// injected failures surface directly.
pub struct Harness {
    pub arena: Arena,
    pub lobbies: Arc<InMemoryLobbyStore>,
    pub accounts: Arc<MockAccounts>,
    pub tickets: Arc<MockTickets>,
    pub launcher: Arc<MockLauncher>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(MockLauncher::new(), LoopConfig::default())
    }

    pub fn with_launcher(launcher: MockLauncher) -> Self {
        Self::build(launcher, LoopConfig::default())
    }

    pub fn with_loop_config(config: LoopConfig) -> Self {
        Self::build(MockLauncher::new(), config)
    }

    fn build(launcher: MockLauncher, loop_config: LoopConfig) -> Self {
        let clock = Arc::new(ManualClock::new(test_clock().now()));
        let lobbies = Arc::new(InMemoryLobbyStore::new());
        let accounts = Arc::new(MockAccounts::new());
        let tickets = Arc::new(MockTickets::new());
        let launcher = Arc::new(launcher);

        let registry =
            ReconciliationRegistry::new(Arc::new(InMemoryRecordStore::new()), clock.clone());

        let env_parts = (
            lobbies.clone(),
            accounts.clone(),
            tickets.clone(),
            launcher.clone(),
            clock.clone(),
        );
        let arena = Arena::assemble(registry, loop_config, move |notifier| {
            let (lobbies, accounts, tickets, launcher, clock) = env_parts;
            LobbyEnvironment::new(lobbies, accounts, tickets, launcher, notifier)
                .with_clock(clock)
                .with_retry(RetryPolicy::none())
        });

        Self {
            arena,
            lobbies,
            accounts,
            tickets,
            launcher,
            clock,
        }
    }

    pub fn engine(&self) -> &LobbyEngine {
        &self.arena.engine
    }

    pub fn registry(&self) -> &ReconciliationRegistry {
        &self.arena.registry
    }

    /// Give `user` the listed snake tickets.
    pub fn seed(&self, user: &str, tickets: &[&str]) {
        self.accounts.insert(account(user, "snake", tickets));
    }
}
