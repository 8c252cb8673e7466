//! Key-value store client interface and backends

mod clock;
mod memcache;
mod memory;
mod rocks;
mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memcache::MemcacheStore;
pub use memory::MemoryStore;
pub use rocks::{EXPIRED_KEYS_REMOVED, RocksStorage, TTL_COMPACTION_REMOVED, TtlStats};
pub use value::{
    StoredValue, calculate_expire_at, current_timestamp, current_timestamp_millis, ttl_secs,
};

use crate::Result;
use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Generic get/set/delete-with-expiry client
///
/// A value written with a TTL must stay readable until, and read as absent
/// once, that many seconds of store-side time have passed. Expiry is the store's job, never the caller's.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a live value
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Unconditionally write a value, replacing any previous one and its TTL
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<()>;

    /// Remove a value, returns `true` if a live value was removed
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;
}

/// Physical key for `key` inside `namespace`
pub fn compose_key(namespace: &str, key: &str) -> String {
    let mut full = String::with_capacity(namespace.len() + key.len() + 1);
    full.push_str(namespace);
    full.push(':');
    full.push_str(key);
    full
}

/// Open the backend selected in the configuration
pub fn open(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Rocksdb => {
            info!("Opening RocksDB at {:?}", config.rocksdb.db_path);
            Arc::new(RocksStorage::open(&config.rocksdb)?)
        }
        StoreBackend::Memcache => {
            info!("Using memcached store at {}", config.memcache.addr);
            Arc::new(MemcacheStore::new(config.memcache.clone()))
        }
    };
    Ok(store)
}
