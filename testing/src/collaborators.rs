//! In-memory collaborator mocks.
//!
//! Each mock records its calls and can be told to fail or hang on upcoming
//! calls. Injected behaviours are consumed in order, one per call; once the
//! queue is empty the mock answers normally.

use crate::lock;
use arena_core::collaborators::{
    AccountCollaborator, ExpirationNotifier, GameServerLauncher, LaunchOutcome, MarkOutcome,
    RenewalEndpoint, TicketCollaborator,
};
use arena_core::types::{Account, LaunchRequest, RecordId, RecordTag, TicketId, UserId};
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the next call should do instead of answering normally.
#[derive(Debug, Clone)]
enum Injected {
    Fail(ArenaError),
    Hang,
}

#[derive(Debug, Default)]
struct Script(Mutex<VecDeque<Injected>>);

impl Script {
    fn push(&self, behaviour: Injected) {
        lock(&self.0).push_back(behaviour);
    }

    /// Apply the next injected behaviour, if any.
    async fn play(&self) -> Result<()> {
        let next = lock(&self.0).pop_front();
        match next {
            None => Ok(()),
            Some(Injected::Fail(err)) => Err(err),
            Some(Injected::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// In-memory account service.
#[derive(Debug, Default)]
pub struct MockAccounts {
    accounts: Mutex<HashMap<UserId, Account>>,
    get_script: Script,
    update_script: Script,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MockAccounts {
    /// No accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account.
    #[must_use]
    pub fn with_account(self, account: Account) -> Self {
        self.insert(account);
        self
    }

    /// Add or replace an account.
    pub fn insert(&self, account: Account) {
        lock(&self.accounts).insert(account.id.clone(), account);
    }

    /// Current stored state of an account.
    #[must_use]
    pub fn account(&self, user_id: &UserId) -> Option<Account> {
        lock(&self.accounts).get(user_id).cloned()
    }

    /// Fail the next `get_user`.
    pub fn fail_next_get(&self, err: ArenaError) {
        self.get_script.push(Injected::Fail(err));
    }

    /// Fail the next `update_user`.
    pub fn fail_next_update(&self, err: ArenaError) {
        self.update_script.push(Injected::Fail(err));
    }

    /// Never answer the next `update_user`.
    pub fn hang_next_update(&self) {
        self.update_script.push(Injected::Hang);
    }

    /// Number of `get_user` calls.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_user` calls.
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountCollaborator for MockAccounts {
    async fn get_user(&self, user_id: &UserId) -> Result<Account> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.get_script.play().await?;
        self.account(user_id)
            .ok_or_else(|| ArenaError::not_found("user", user_id))
    }

    async fn update_user(&self, account: &Account) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.update_script.play().await?;
        self.insert(account.clone());
        Ok(())
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// In-memory ticket service. Every ticket id is known; the mock tracks which
/// ones have been used.
#[derive(Debug, Default)]
pub struct MockTickets {
    used: Mutex<HashSet<TicketId>>,
    script: Script,
    calls: AtomicUsize,
}

impl MockTickets {
    /// No ticket used yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a ticket used before the test starts.
    #[must_use]
    pub fn with_used(self, ticket_id: TicketId) -> Self {
        lock(&self.used).insert(ticket_id);
        self
    }

    /// Whether `ticket_id` has been used.
    #[must_use]
    pub fn is_used(&self, ticket_id: &TicketId) -> bool {
        lock(&self.used).contains(ticket_id)
    }

    /// Number of tickets used so far.
    #[must_use]
    pub fn used_count(&self) -> usize {
        lock(&self.used).len()
    }

    /// Fail the next `mark_used` without marking.
    pub fn fail_next(&self, err: ArenaError) {
        self.script.push(Injected::Fail(err));
    }

    /// Never answer the next `mark_used`.
    pub fn hang_next(&self) {
        self.script.push(Injected::Hang);
    }

    /// Number of `mark_used` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketCollaborator for MockTickets {
    async fn mark_used(&self, ticket_id: &TicketId) -> Result<MarkOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.play().await?;
        if lock(&self.used).insert(ticket_id.clone()) {
            Ok(MarkOutcome::Marked)
        } else {
            Ok(MarkOutcome::AlreadyUsed)
        }
    }
}

// ============================================================================
// Launcher
// ============================================================================

/// A launch request as the mock received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLaunch {
    /// Game type routed on
    pub game_type: String,
    /// Request body
    pub request: LaunchRequest,
    /// Forwarded bearer token
    pub bearer: Option<String>,
}

/// Game server launcher that records every request.
#[derive(Debug, Default)]
pub struct MockLauncher {
    launches: Mutex<Vec<RecordedLaunch>>,
    unsupported: Mutex<HashSet<String>>,
    script: Script,
}

impl MockLauncher {
    /// Accepts every game type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `Skipped` for `game_type`.
    #[must_use]
    pub fn without_game(self, game_type: impl Into<String>) -> Self {
        lock(&self.unsupported).insert(game_type.into());
        self
    }

    /// Fail the next launch.
    pub fn fail_next(&self, err: ArenaError) {
        self.script.push(Injected::Fail(err));
    }

    /// Every launch received, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<RecordedLaunch> {
        lock(&self.launches).clone()
    }
}

#[async_trait]
impl GameServerLauncher for MockLauncher {
    async fn launch(
        &self,
        game_type: &str,
        request: &LaunchRequest,
        bearer: Option<&str>,
    ) -> Result<LaunchOutcome> {
        self.script.play().await?;
        if lock(&self.unsupported).contains(game_type) {
            return Ok(LaunchOutcome::Skipped);
        }
        lock(&self.launches).push(RecordedLaunch {
            game_type: game_type.to_string(),
            request: request.clone(),
            bearer: bearer.map(str::to_string),
        });
        Ok(LaunchOutcome::Created)
    }
}

// ============================================================================
// Expiration notifier
// ============================================================================

/// Expiration notifier that records registrations.
#[derive(Debug, Default)]
pub struct MockNotifier {
    registered: Mutex<Vec<(RecordTag, String, DateTime<Utc>)>>,
    deregistered: Mutex<Vec<(RecordTag, String)>>,
    script: Script,
}

impl MockNotifier {
    /// Nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next register or deregister call.
    pub fn fail_next(&self, err: ArenaError) {
        self.script.push(Injected::Fail(err));
    }

    /// Registrations received, in order.
    #[must_use]
    pub fn registered(&self) -> Vec<(RecordTag, String, DateTime<Utc>)> {
        lock(&self.registered).clone()
    }

    /// Deregistrations received, in order.
    #[must_use]
    pub fn deregistered(&self) -> Vec<(RecordTag, String)> {
        lock(&self.deregistered).clone()
    }
}

#[async_trait]
impl ExpirationNotifier for MockNotifier {
    async fn register(
        &self,
        tag: RecordTag,
        reference_key: &str,
        expiration: DateTime<Utc>,
    ) -> Result<RecordId> {
        self.script.play().await?;
        lock(&self.registered).push((tag, reference_key.to_string(), expiration));
        Ok(RecordId::new())
    }

    async fn deregister(&self, tag: RecordTag, reference_key: &str) -> Result<()> {
        self.script.play().await?;
        lock(&self.deregistered).push((tag, reference_key.to_string()));
        Ok(())
    }
}

// ============================================================================
// Renewal
// ============================================================================

/// Renewal endpoint answering with a fixed expiration.
#[derive(Debug)]
pub struct MockRenewal {
    expiration: Mutex<DateTime<Utc>>,
    calls: Mutex<Vec<String>>,
    script: Script,
}

impl MockRenewal {
    /// Renew every key to `expiration`.
    #[must_use]
    pub fn returning(expiration: DateTime<Utc>) -> Self {
        Self {
            expiration: Mutex::new(expiration),
            calls: Mutex::new(Vec::new()),
            script: Script::default(),
        }
    }

    /// Change the expiration handed out from now on.
    pub fn set_expiration(&self, expiration: DateTime<Utc>) {
        *lock(&self.expiration) = expiration;
    }

    /// Fail the next renewal.
    pub fn fail_next(&self, err: ArenaError) {
        self.script.push(Injected::Fail(err));
    }

    /// Never answer the next renewal.
    pub fn hang_next(&self) {
        self.script.push(Injected::Hang);
    }

    /// Reference keys renewed or attempted, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RenewalEndpoint for MockRenewal {
    async fn renew(&self, reference_key: &str) -> Result<DateTime<Utc>> {
        lock(&self.calls).push(reference_key.to_string());
        self.script.play().await?;
        Ok(*lock(&self.expiration))
    }
}
