//! Read-through wrapper binding a cache to a record producer

use crate::Result;
use crate::cache::Cache;
use crate::error::BoxError;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

/// Slow or authoritative source of records, consulted on cache misses
#[async_trait]
pub trait Producer<V>: Send + Sync {
    async fn produce(&self, id: &str) -> std::result::Result<V, BoxError>;
}

/// Records that know the cache key they are stored under
pub trait Keyed {
    fn cache_key(&self) -> &str;
}

/// Producer backed by a plain async function
pub struct FnProducer<F> {
    f: F,
}

/// Wrap an async function taking the record id as a [`Producer`]
pub fn from_fn<F>(f: F) -> FnProducer<F> {
    FnProducer { f }
}

#[async_trait]
impl<V, F, Fut> Producer<V> for FnProducer<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<V, BoxError>> + Send,
    V: Send,
{
    async fn produce(&self, id: &str) -> std::result::Result<V, BoxError> {
        (self.f)(id.to_string()).await
    }
}

/// Read-through cache for one record type
///
/// - `get` serves live entries and falls back to the producer on a miss
/// - `put` overwrites unconditionally and resets the TTL
/// - `evict` removes unconditionally
pub struct ReadThrough<V, P> {
    cache: Cache,
    producer: P,
    _record: PhantomData<fn() -> V>,
}

impl<V, P> ReadThrough<V, P>
where
    V: Keyed + Serialize + DeserializeOwned + Send + Sync,
    P: Producer<V>,
{
    pub fn new(cache: Cache, producer: P) -> Self {
        Self {
            cache,
            producer,
            _record: PhantomData,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    /// Cached record for `id`, produced and stored on a miss
    pub async fn get(&self, id: &str) -> Result<V> {
        self.cache
            .get_or_load(id, || self.producer.produce(id))
            .await
    }

    /// Store `record` under its own key and hand it back
    pub async fn put(&self, record: V) -> Result<V> {
        self.cache.put(record.cache_key(), &record).await?;
        Ok(record)
    }

    /// Drop any cached record for `id`
    pub async fn evict(&self, id: &str) -> Result<()> {
        debug!(cache = %self.cache.name(), id, "Evicting");
        self.cache.evict(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadThruError;
    use crate::cache::CacheManager;
    use crate::config::CacheConfig;
    use crate::metrics::Metrics;
    use crate::storage::{KeyValueStore, ManualClock, MemoryStore};
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        version: usize,
    }

    impl Keyed for Item {
        fn cache_key(&self) -> &str {
            &self.id
        }
    }

    /// Producer that stamps each record with the invocation count
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Producer<Item> for Counting {
        async fn produce(&self, id: &str) -> std::result::Result<Item, BoxError> {
            let version = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Item {
                id: id.to_string(),
                version,
            })
        }
    }

    fn setup() -> (ReadThrough<Item, Counting>, Arc<AtomicUsize>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_clock(clock.clone()));
        let config = CacheConfig {
            default_ttl_secs: 3,
            ..CacheConfig::default()
        };
        let manager = CacheManager::new(store, config, Arc::new(Metrics::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let items = ReadThrough::new(
            manager.cache("items"),
            Counting {
                calls: calls.clone(),
            },
        );
        (items, calls, clock)
    }

    #[tokio::test]
    async fn test_second_get_is_served_from_cache() {
        let (items, calls, _) = setup();

        let first = items.get("a").await.unwrap();
        let second = items.get("a").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_put_wins_over_producer() {
        let (items, calls, _) = setup();
        let record = Item {
            id: "p".to_string(),
            version: 99,
        };

        assert_eq!(items.put(record.clone()).await.unwrap(), record);
        assert_eq!(items.get("p").await.unwrap(), record);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry_calls_producer_again() {
        let (items, calls, clock) = setup();

        assert_eq!(items.get("a").await.unwrap().version, 1);
        clock.advance(Duration::from_secs(2));
        assert_eq!(items.get("a").await.unwrap().version, 1);
        clock.advance(Duration::from_secs(1));
        assert_eq!(items.get("a").await.unwrap().version, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_put_resets_ttl() {
        let (items, calls, clock) = setup();
        let record = Item {
            id: "p".to_string(),
            version: 42,
        };

        items.put(record.clone()).await.unwrap();
        clock.advance(Duration::from_secs(2));
        items.put(record.clone()).await.unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(items.get("p").await.unwrap(), record);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_evict_forces_producer() {
        let (items, calls, _) = setup();

        assert_eq!(items.get("a").await.unwrap().version, 1);
        items.evict("a").await.unwrap();
        assert_eq!(items.get("a").await.unwrap().version, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Idempotent on absent keys
        items.evict("never-cached").await.unwrap();
        items.evict("never-cached").await.unwrap();
    }

    #[tokio::test]
    async fn test_producer_failure_propagates() {
        let clock = Arc::new(ManualClock::new(0));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_clock(clock));
        let manager = CacheManager::new(store, CacheConfig::default(), Arc::new(Metrics::new()));
        let failing = from_fn(|id: String| async move {
            Err::<Item, BoxError>(format!("no record {id}").into())
        });
        let items: ReadThrough<Item, _> = ReadThrough::new(manager.cache("items"), failing);

        let err = items.get("x").await.unwrap_err();
        match err {
            ReadThruError::Producer(source) => assert_eq!(source.to_string(), "no record x"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
