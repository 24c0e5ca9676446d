//! In-memory lobby and record stores.
//!
//! Both stores keep creation order so listings and "first match" lookups are
//! stable across calls.

use arena_core::store::{LobbyCriteria, LobbyStore, RecordStore};
use arena_core::types::{Lobby, LobbyId, ReconciliationRecord, RecordId, RecordTag};
use arena_core::{ArenaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const STORE: &str = "store";

struct Ordered<K, V> {
    next_seq: u64,
    entries: HashMap<K, (u64, V)>,
}

impl<K, V> Default for Ordered<K, V> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            entries: HashMap::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq, V: Clone> Ordered<K, V> {
    fn insert_new(&mut self, key: K, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, (seq, value));
        true
    }

    fn in_order(&self) -> Vec<V> {
        let mut values: Vec<_> = self.entries.values().collect();
        values.sort_by_key(|(seq, _)| *seq);
        values.into_iter().map(|(_, v)| v.clone()).collect()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| ArenaError::unavailable(STORE, "lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| ArenaError::unavailable(STORE, "lock poisoned"))
}

/// Lobbies held in process memory.
#[derive(Default)]
pub struct InMemoryLobbyStore {
    lobbies: RwLock<Ordered<LobbyId, Lobby>>,
}

impl InMemoryLobbyStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LobbyStore for InMemoryLobbyStore {
    async fn create(&self, lobby: Lobby) -> Result<()> {
        let id = lobby.id;
        if write(&self.lobbies)?.insert_new(id, lobby) {
            Ok(())
        } else {
            Err(ArenaError::Conflict(format!("lobby {id} already exists")))
        }
    }

    async fn find_by_id(&self, id: LobbyId) -> Result<Lobby> {
        read(&self.lobbies)?
            .entries
            .get(&id)
            .map(|(_, lobby)| lobby.clone())
            .ok_or_else(|| ArenaError::not_found("lobby", id))
    }

    async fn find_all(&self) -> Result<Vec<Lobby>> {
        Ok(read(&self.lobbies)?.in_order())
    }

    async fn find_by_params(&self, criteria: &LobbyCriteria) -> Result<Lobby> {
        read(&self.lobbies)?
            .in_order()
            .into_iter()
            .find(|lobby| criteria.matches(lobby))
            .ok_or_else(|| {
                ArenaError::not_found(
                    "lobby",
                    format!(
                        "matching {}/{}/{}",
                        criteria.game_type, criteria.max_players, criteria.prize_sum
                    ),
                )
            })
    }

    async fn update(&self, lobby: &Lobby) -> Result<u64> {
        let mut lobbies = write(&self.lobbies)?;
        let (_, stored) = lobbies
            .entries
            .get_mut(&lobby.id)
            .ok_or_else(|| ArenaError::not_found("lobby", lobby.id))?;

        if stored.version != lobby.version {
            return Err(ArenaError::Conflict(format!(
                "lobby {} changed (read version {}, stored {})",
                lobby.id, lobby.version, stored.version
            )));
        }

        let next = lobby.version + 1;
        *stored = Lobby {
            version: next,
            ..lobby.clone()
        };
        Ok(next)
    }

    async fn delete(&self, id: LobbyId) -> Result<()> {
        write(&self.lobbies)?
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ArenaError::not_found("lobby", id))
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut lobbies = write(&self.lobbies)?;
        let removed = lobbies.entries.len();
        lobbies.entries.clear();
        Ok(removed)
    }
}

/// Reconciliation records held in process memory.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Ordered<RecordId, ReconciliationRecord>>,
}

impl InMemoryRecordStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, record: ReconciliationRecord) -> Result<()> {
        let id = record.id;
        if write(&self.records)?.insert_new(id, record) {
            Ok(())
        } else {
            Err(ArenaError::Conflict(format!("record {id} already exists")))
        }
    }

    async fn get(&self, id: RecordId) -> Result<ReconciliationRecord> {
        read(&self.records)?
            .entries
            .get(&id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| ArenaError::not_found("record", id))
    }

    async fn list(&self) -> Result<Vec<ReconciliationRecord>> {
        Ok(read(&self.records)?.in_order())
    }

    async fn find_by_reference(
        &self,
        tag: RecordTag,
        reference_key: &str,
    ) -> Result<Option<ReconciliationRecord>> {
        Ok(read(&self.records)?
            .in_order()
            .into_iter()
            .find(|r| r.tag == tag && r.reference_key == reference_key))
    }

    async fn update(&self, record: &ReconciliationRecord) -> Result<()> {
        let mut records = write(&self.records)?;
        let (_, stored) = records
            .entries
            .get_mut(&record.id)
            .ok_or_else(|| ArenaError::not_found("record", record.id))?;
        *stored = record.clone();
        Ok(())
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        write(&self.records)?
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ArenaError::not_found("record", id))
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut records = write(&self.records)?;
        let removed = records.entries.len();
        records.entries.clear();
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arena_core::types::{LobbyParams, Prize, UserId};
    use chrono::{Duration, TimeZone, Utc};

    fn lobby(game_type: &str, prize_sum: u64) -> Lobby {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 14, 0, 0).unwrap();
        Lobby::open(
            LobbyId::new(),
            LobbyParams {
                game_type: game_type.into(),
                max_players: 2,
                ticket_price: 1,
                prize: Prize {
                    prize_sum,
                    prize_type: 0,
                },
                start_time: start,
                end_time: start + Duration::hours(2),
            },
        )
    }

    #[tokio::test]
    async fn update_is_compare_and_swap() {
        let store = InMemoryLobbyStore::new();
        let original = lobby("snake", 10);
        store.create(original.clone()).await.unwrap();

        let mut first = store.find_by_id(original.id).await.unwrap();
        let mut second = first.clone();

        first.admit(UserId::new("a")).unwrap();
        assert_eq!(store.update(&first).await.unwrap(), 1);

        second.admit(UserId::new("b")).unwrap();
        assert!(matches!(
            store.update(&second).await,
            Err(ArenaError::Conflict(_))
        ));

        let stored = store.find_by_id(original.id).await.unwrap();
        assert_eq!(stored.player_ids(), vec![UserId::new("a")]);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn find_by_params_returns_oldest_match() {
        let store = InMemoryLobbyStore::new();
        let older = lobby("snake", 10);
        let newer = lobby("snake", 10);
        store.create(lobby("quiz", 10)).await.unwrap();
        store.create(older.clone()).await.unwrap();
        store.create(newer).await.unwrap();

        let found = store
            .find_by_params(&LobbyCriteria {
                game_type: "snake".into(),
                max_players: 2,
                prize_sum: 10,
            })
            .await
            .unwrap();
        assert_eq!(found.id, older.id);

        let missing = store
            .find_by_params(&LobbyCriteria {
                game_type: "snake".into(),
                max_players: 5,
                prize_sum: 10,
            })
            .await;
        assert!(matches!(missing, Err(ArenaError::NotFound { .. })));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryLobbyStore::new();
        let l = lobby("snake", 10);
        store.create(l.clone()).await.unwrap();
        assert!(matches!(store.create(l).await, Err(ArenaError::Conflict(_))));
    }

    #[tokio::test]
    async fn records_round_trip_by_reference() {
        let store = InMemoryRecordStore::new();
        let record = ReconciliationRecord {
            id: RecordId::new(),
            tag: RecordTag::Training,
            reference_key: "snake".into(),
            expiration: Utc::now(),
        };
        store.insert(record.clone()).await.unwrap();

        let found = store
            .find_by_reference(RecordTag::Training, "snake")
            .await
            .unwrap();
        assert_eq!(found, Some(record.clone()));
        assert_eq!(
            store.find_by_reference(RecordTag::Lobby, "snake").await.unwrap(),
            None
        );

        store.delete(record.id).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
