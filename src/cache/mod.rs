//! Named caches over a key-value store
//!
//! A [`Cache`] is bound to one namespace and owns nothing but the mapping
//! from its keys to store keys. Entries are JSON-encoded and written with the
//! cache's TTL; expiry itself is left to the store. Keys land in the store as
//! `<name>::<key>`.

mod read_through;

pub use read_through::{FnProducer, Keyed, Producer, ReadThrough, from_fn};

use crate::config::CacheConfig;
use crate::error::BoxError;
use crate::metrics::Metrics;
use crate::storage::KeyValueStore;
use crate::{ReadThruError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Hands out [`Cache`] handles that share one store
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
    metrics: Arc<Metrics>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// Cache handle for `name` with its configured TTL
    pub fn cache(&self, name: &str) -> Cache {
        Cache::new(
            name,
            Arc::clone(&self.store),
            self.config.ttl_for(name),
            Arc::clone(&self.metrics),
        )
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// One cache namespace
#[derive(Clone)]
pub struct Cache {
    name: String,
    namespace: String,
    ttl: Option<Duration>,
    store: Arc<dyn KeyValueStore>,
    metrics: Arc<Metrics>,
}

impl Cache {
    pub fn new(
        name: &str,
        store: Arc<dyn KeyValueStore>,
        ttl: Option<Duration>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: format!("{name}:"),
            ttl,
            store,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// TTL written with every entry (`None` = no expiry)
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Look up a live entry
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        let start = Instant::now();
        let result = self.lookup(key).await;
        self.finish(start, &result);
        result
    }

    /// Overwrite the entry for `key`, resetting its TTL
    pub async fn put<V: Serialize + Sync>(&self, key: &str, value: &V) -> Result<()> {
        let start = Instant::now();
        let result = self.store_value(key, value).await;
        self.finish(start, &result);
        if result.is_ok() {
            self.metrics.cache_puts.inc();
            debug!(cache = %self.name, key, "Cache put");
        }
        result
    }

    /// Remove the entry for `key`; absent keys are not an error
    pub async fn evict(&self, key: &str) -> Result<()> {
        let start = Instant::now();
        let result = self.store.delete(&self.namespace, key).await.map(|removed| {
            self.metrics.cache_evictions.inc();
            debug!(cache = %self.name, key, removed, "Cache evict");
        });
        self.finish(start, &result);
        result
    }

    /// Read-through lookup
    ///
    /// A live entry is returned without calling `loader`. On a miss `loader`
    /// runs exactly once, its value is stored with the cache TTL and returned.
    /// Loader errors come back as [`ReadThruError::Producer`] and nothing is
    /// stored. Concurrent misses on the same key each run their own loader.
    pub async fn get_or_load<V, F, Fut, E>(&self, key: &str, loader: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<BoxError>,
    {
        let start = Instant::now();
        let result = self.load_through(key, loader).await;
        self.finish(start, &result);
        result
    }

    async fn load_through<V, F, Fut, E>(&self, key: &str, loader: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
        E: Into<BoxError>,
    {
        if let Some(value) = self.lookup(key).await? {
            return Ok(value);
        }

        self.metrics.producer_calls.inc();
        let value = loader()
            .await
            .map_err(|e| ReadThruError::Producer(e.into()))?;

        self.store_value(key, &value).await?;
        Ok(value)
    }

    async fn lookup<V: DeserializeOwned>(&self, key: &str) -> Result<Option<V>> {
        match self.store.get(&self.namespace, key).await? {
            Some(bytes) => {
                self.metrics.cache_hits.inc();
                debug!(cache = %self.name, key, "Cache hit");
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            None => {
                self.metrics.cache_misses.inc();
                debug!(cache = %self.name, key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn store_value<V: Serialize + Sync>(&self, key: &str, value: &V) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.set(&self.namespace, key, bytes, self.ttl).await
    }

    fn finish<T>(&self, start: Instant, result: &Result<T>) {
        self.metrics
            .op_latency
            .observe(start.elapsed().as_secs_f64());
        if let Err(e) = result {
            self.metrics.record_error(e);
        }
    }
}
