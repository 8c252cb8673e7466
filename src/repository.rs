//! Key-value repository with per-record TTL
//!
//! Records are stored under `<keyspace>:<id>` and expire according to their
//! own TTL rather than a cache-wide one.

use crate::Result;
use crate::metrics::Metrics;
use crate::storage::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A record persisted through a [`Repository`]
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Namespace shared by all records of this type
    fn keyspace() -> &'static str;

    fn id(&self) -> &str;

    /// Lifetime of this record in the store (`None` = persistent)
    fn ttl(&self) -> Option<Duration> {
        None
    }
}

/// CRUD access to one entity type
pub struct Repository<T> {
    store: Arc<dyn KeyValueStore>,
    metrics: Arc<Metrics>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn KeyValueStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            metrics,
            _entity: PhantomData,
        }
    }

    /// Write `entity`, replacing any previous record with the same id
    pub async fn save(&self, entity: T) -> Result<T> {
        let bytes = serde_json::to_vec(&entity)?;
        self.store
            .set(T::keyspace(), entity.id(), bytes, entity.ttl())
            .await
            .inspect_err(|e| self.metrics.record_error(e))?;
        self.metrics.repo_saves.inc();
        debug!(keyspace = T::keyspace(), id = entity.id(), ttl = ?entity.ttl(), "Saved record");
        Ok(entity)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        self.metrics.repo_finds.inc();
        let found = self
            .store
            .get(T::keyspace(), id)
            .await
            .inspect_err(|e| self.metrics.record_error(e))?;
        match found {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).inspect_err(|_| {
                self.metrics.codec_errors.inc();
            })?)),
            None => Ok(None),
        }
    }

    pub async fn exists_by_id(&self, id: &str) -> Result<bool> {
        Ok(self
            .store
            .get(T::keyspace(), id)
            .await
            .inspect_err(|e| self.metrics.record_error(e))?
            .is_some())
    }

    /// Returns `true` if a live record was removed
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let removed = self
            .store
            .delete(T::keyspace(), id)
            .await
            .inspect_err(|e| self.metrics.record_error(e))?;
        self.metrics.repo_deletes.inc();
        debug!(keyspace = T::keyspace(), id, removed, "Deleted record");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ManualClock, MemoryStore};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        id: String,
        user: String,
        ttl_secs: Option<u64>,
    }

    impl Entity for Session {
        fn keyspace() -> &'static str {
            "sessions"
        }

        fn id(&self) -> &str {
            &self.id
        }

        fn ttl(&self) -> Option<Duration> {
            self.ttl_secs.map(Duration::from_secs)
        }
    }

    fn session(id: &str, ttl_secs: Option<u64>) -> Session {
        Session {
            id: id.to_string(),
            user: "ramanda".to_string(),
            ttl_secs,
        }
    }

    fn repository() -> (Repository<Session>, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(500));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let repo = Repository::new(store.clone(), Arc::new(Metrics::new()));
        (repo, clock, store)
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let (repo, _, store) = repository();
        let saved = repo.save(session("1", None)).await.unwrap();

        assert_eq!(repo.find_by_id("1").await.unwrap(), Some(saved));
        assert!(repo.exists_by_id("1").await.unwrap());
        assert!(!repo.exists_by_id("2").await.unwrap());
        assert!(store.get("sessions", "1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_ttl() {
        let (repo, clock, _) = repository();
        repo.save(session("short", Some(3))).await.unwrap();
        repo.save(session("forever", None)).await.unwrap();

        assert!(repo.find_by_id("short").await.unwrap().is_some());
        clock.advance(Duration::from_secs(5));
        assert!(repo.find_by_id("short").await.unwrap().is_none());
        assert!(repo.find_by_id("forever").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, _, _) = repository();
        repo.save(session("1", None)).await.unwrap();

        assert!(repo.delete_by_id("1").await.unwrap());
        assert!(!repo.delete_by_id("1").await.unwrap());
        assert!(repo.find_by_id("1").await.unwrap().is_none());
    }
}
