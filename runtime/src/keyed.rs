//! Per-key single-writer serialization.
//!
//! A [`KeyedMutex`] hands out one async lock per key, so work on different
//! keys runs concurrently while work on the same key runs one at a time.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held while a key is locked.
pub type KeyGuard = OwnedMutexGuard<()>;

/// Lazily created async mutex per key.
#[derive(Debug)]
pub struct KeyedMutex<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash,
{
    /// No keys locked.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyGuard {
        let slot = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Drop the lock slot for `key` once nothing holds or awaits it.
    ///
    /// Returns whether the slot was removed.
    pub async fn forget(&self, key: &K) -> bool {
        let mut locks = self.locks.lock().await;
        match locks.get(key) {
            Some(slot) if Arc::strong_count(slot) == 1 => {
                locks.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Number of keys with a live slot.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no key has a live slot.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            tokio::spawn(async move {
                let _guard = locks.lock("lobby-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            })
        });
        for result in futures::future::join_all(tasks).await {
            assert!(result.is_ok());
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn waiter_wakes_when_guard_drops() {
        let locks = KeyedMutex::new();
        let guard = locks.lock("a").await;

        let mut waiter = tokio_test::task::spawn(locks.lock("a"));
        tokio_test::assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        let _next = tokio_test::assert_ready!(waiter.poll());
    }

    #[tokio::test]
    async fn forget_skips_held_slots() {
        let locks = KeyedMutex::new();
        let guard = locks.lock("a").await;
        assert!(!locks.forget(&"a").await);

        drop(guard);
        assert!(locks.forget(&"a").await);
        assert!(locks.is_empty().await);
    }
}
