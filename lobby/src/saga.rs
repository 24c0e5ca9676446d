//! Ticket consumption saga.
//!
//! Spending an entry ticket touches two services with no shared transaction:
//! the ticket service owns whether a ticket is used, the account service owns
//! the user's inventory. The saga marks the ticket used first and only then
//! rewrites the inventory, deriving the new count from the remaining ticket
//! ids. A retry after a partial failure finds the ticket still listed but
//! already used, treats that as its own earlier attempt, and finishes the
//! inventory update. Either way exactly one ticket leaves the inventory.
//!
//! The inventory update is a read-modify-write of the whole account, so runs
//! for the same user are serialized; joins for one user in different lobbies
//! would otherwise overwrite each other's removals.

use arena_core::collaborators::{AccountCollaborator, MarkOutcome, TicketCollaborator};
use arena_core::types::{Account, TicketId, UserId};
use arena_core::{ArenaError, Result};
use arena_runtime::metrics::TicketMetrics;
use arena_runtime::retry::{RetryPolicy, retry_with_predicate};
use arena_runtime::{KeyedMutex, with_deadline};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const ACCOUNTS: &str = "accounts";
const TICKETS: &str = "tickets";

/// How a successful consumption came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// The ticket was active and has been spent by this call.
    Consumed,
    /// An earlier attempt had marked the ticket used; this call finished it.
    Resumed,
}

/// Spends one entry ticket per admission.
#[derive(Clone)]
pub struct TicketConsumptionSaga {
    accounts: Arc<dyn AccountCollaborator>,
    tickets: Arc<dyn TicketCollaborator>,
    call_timeout: Duration,
    retry: RetryPolicy,
    users: Arc<KeyedMutex<UserId>>,
}

impl TicketConsumptionSaga {
    /// Saga over the given collaborators with a 5s call timeout and the
    /// default retry policy.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountCollaborator>,
        tickets: Arc<dyn TicketCollaborator>,
    ) -> Self {
        Self {
            accounts,
            tickets,
            call_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            users: Arc::new(KeyedMutex::new()),
        }
    }

    /// Bound every collaborator call by `timeout`.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Retry transient collaborator failures under `policy`.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Spend `ticket_id` from `user_id`'s `game_type` inventory.
    ///
    /// # Errors
    ///
    /// - `NoTicketsOfType` / `NoTicketsRemaining` / `TicketNotOwned` when the
    ///   inventory does not allow the spend; nothing is changed remotely
    /// - `UpstreamUnavailable` when a collaborator keeps failing; a later
    ///   retry of the whole saga completes the spend without a second ticket
    pub async fn consume(
        &self,
        user_id: &UserId,
        game_type: &str,
        ticket_id: &TicketId,
    ) -> Result<Consumption> {
        let guard = self.users.lock(user_id.clone()).await;
        let outcome = self.run(user_id, game_type, ticket_id).await;
        drop(guard);
        self.users.forget(user_id).await;

        match &outcome {
            Ok(Consumption::Consumed) => TicketMetrics::record_consumption("consumed"),
            Ok(Consumption::Resumed) => TicketMetrics::record_consumption("resumed"),
            Err(err) if err.is_transient() => TicketMetrics::record_consumption("failed"),
            Err(_) => TicketMetrics::record_consumption("rejected"),
        }
        outcome
    }

    async fn run(
        &self,
        user_id: &UserId,
        game_type: &str,
        ticket_id: &TicketId,
    ) -> Result<Consumption> {
        let mut account = self
            .call(ACCOUNTS, || self.accounts.get_user(user_id))
            .await?;

        check_spendable(&account, user_id, game_type, ticket_id)?;

        let consumption = match self
            .call(TICKETS, || self.tickets.mark_used(ticket_id))
            .await?
        {
            MarkOutcome::Marked => Consumption::Consumed,
            MarkOutcome::AlreadyUsed => {
                tracing::warn!(
                    user_id = %user_id,
                    ticket_id = %ticket_id,
                    "Ticket already used but still in inventory, resuming"
                );
                Consumption::Resumed
            }
        };

        remove_ticket(&mut account, game_type, ticket_id);

        self.call(ACCOUNTS, || self.accounts.update_user(&account))
            .await?;

        tracing::info!(
            user_id = %user_id,
            game_type,
            ticket_id = %ticket_id,
            resumed = consumption == Consumption::Resumed,
            "Ticket consumed"
        );
        Ok(consumption)
    }

    async fn call<T, F, Fut>(&self, service: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        retry_with_predicate(
            &self.retry,
            || with_deadline(service, self.call_timeout, op()),
            ArenaError::is_transient,
        )
        .await
    }
}

fn check_spendable(
    account: &Account,
    user_id: &UserId,
    game_type: &str,
    ticket_id: &TicketId,
) -> Result<()> {
    let entry = account
        .inventory(game_type)
        .ok_or_else(|| ArenaError::NoTicketsOfType {
            user_id: user_id.to_string(),
            game_type: game_type.to_string(),
        })?;

    if entry.amount == 0 {
        return Err(ArenaError::NoTicketsRemaining {
            user_id: user_id.to_string(),
            game_type: game_type.to_string(),
        });
    }

    if !entry.ticket_ids.contains(ticket_id) {
        return Err(ArenaError::TicketNotOwned {
            user_id: user_id.to_string(),
            ticket_id: ticket_id.to_string(),
        });
    }

    Ok(())
}

/// Drop `ticket_id` (and any duplicates of it) and recount.
fn remove_ticket(account: &mut Account, game_type: &str, ticket_id: &TicketId) {
    if let Some(entry) = account.inventory_mut(game_type) {
        let mut seen = HashSet::new();
        entry
            .ticket_ids
            .retain(|id| id != ticket_id && seen.insert(id.clone()));
        entry.amount = u32::try_from(entry.ticket_ids.len()).unwrap_or(u32::MAX);
    }
}
