//! In-process store with lazy expiration

use crate::Result;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::value::StoredValue;
use crate::storage::{KeyValueStore, compose_key};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// HashMap-backed store
///
/// Expired entries are dropped when they are next read.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
    expired_removed: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            expired_removed: AtomicU64::new(0),
        }
    }

    /// Number of entries held, including expired ones not yet collected
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Keys removed by lazy expiration
    pub fn expired_removed(&self) -> u64 {
        self.expired_removed.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = compose_key(namespace, key);
        let now = self.clock.now_millis();

        {
            let entries = self.entries.read();
            match entries.get(&full_key) {
                None => return Ok(None),
                Some(value) if !value.is_expired_at(now) => return Ok(Some(value.data.clone())),
                Some(_) => {}
            }
        }

        // Re-check under the write lock, a concurrent set may have refreshed it
        let mut entries = self.entries.write();
        if let Some(value) = entries.get(&full_key) {
            if !value.is_expired_at(now) {
                return Ok(Some(value.data.clone()));
            }
            entries.remove(&full_key);
            self.expired_removed.fetch_add(1, Ordering::Relaxed);
            trace!(key = %full_key, "Lazy expiration: removed expired key");
        }
        Ok(None)
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let stored = StoredValue::new(value, ttl, self.clock.now_millis());
        self.entries
            .write()
            .insert(compose_key(namespace, key), stored);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let now = self.clock.now_millis();
        let removed = self.entries.write().remove(&compose_key(namespace, key));
        Ok(removed.is_some_and(|value| !value.is_expired_at(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::clock::ManualClock;

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get() {
        let (store, _) = store_with_clock();
        store.set("ns", "key", b"hello".to_vec(), None).await.unwrap();

        assert_eq!(store.get("ns", "key").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("other", "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let (store, clock) = store_with_clock();
        store
            .set("ns", "key", b"v".to_vec(), Some(Duration::from_secs(3)))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(2));
        assert!(store.get("ns", "key").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("ns", "key").await.unwrap().is_none());
        assert_eq!(store.expired_removed(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_resets_ttl() {
        let (store, clock) = store_with_clock();
        let ttl = Some(Duration::from_secs(3));
        store.set("ns", "key", b"a".to_vec(), ttl).await.unwrap();
        clock.advance(Duration::from_secs(2));
        store.set("ns", "key", b"b".to_vec(), ttl).await.unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.get("ns", "key").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_ttl_on_wall_clock() {
        let store = MemoryStore::new();
        store
            .set("ns", "key", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(store.get("ns", "key").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.get("ns", "key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, clock) = store_with_clock();
        assert!(!store.delete("ns", "missing").await.unwrap());

        store.set("ns", "key", b"v".to_vec(), None).await.unwrap();
        assert!(store.delete("ns", "key").await.unwrap());
        assert!(store.get("ns", "key").await.unwrap().is_none());

        store
            .set("ns", "short", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(!store.delete("ns", "short").await.unwrap());
    }
}
