//! RocksDB storage backend
//!
//! Embedded store with lazy expiration on read and a TTL compaction filter.

use crate::Result;
use crate::StorageError;
use crate::config::RocksConfig;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::value::{StoredValue, current_timestamp_millis};
use crate::storage::{KeyValueStore, compose_key};
use async_trait::async_trait;
use rust_rocksdb::{
    BlockBasedOptions, CompactionDecision, DB, DBCompactionStyle, LogLevel, Options, WriteOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Global counter for TTL compaction removals (accessible from compaction filter)
pub static TTL_COMPACTION_REMOVED: AtomicU64 = AtomicU64::new(0);

/// Global counter for expired keys removed on read
pub static EXPIRED_KEYS_REMOVED: AtomicU64 = AtomicU64::new(0);

/// RocksDB-backed store
pub struct RocksStorage {
    db: Arc<DB>,
    write_opts: WriteOptions,
    clock: Arc<dyn Clock>,
}

impl RocksStorage {
    /// Open or create a RocksDB database
    pub fn open(config: &RocksConfig) -> std::result::Result<Self, StorageError> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open with a custom clock for read-side expiry checks
    ///
    /// The compaction filter always uses wall-clock time.
    pub fn open_with_clock(
        config: &RocksConfig,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(config.max_background_jobs);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compaction_style(DBCompactionStyle::Level);

        opts.set_log_level(parse_log_level(&config.rocksdb_log_level));
        opts.set_max_log_file_size(config.rocksdb_max_log_file_size);
        opts.set_keep_log_file_num(config.rocksdb_keep_log_file_num);

        if config.enable_compression {
            opts.set_compression_type(rust_rocksdb::DBCompressionType::Lz4);
        } else {
            opts.set_compression_type(rust_rocksdb::DBCompressionType::None);
        }

        let mut block_opts = BlockBasedOptions::default();
        let cache = rust_rocksdb::Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        if config.enable_ttl_compaction {
            opts.set_compaction_filter("ttl_filter", ttl_compaction_filter);
        }

        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!("Failed to create directory: {e}"))
            })?;
        }

        let db = DB::open(&opts, &config.db_path)?;

        info!(
            "RocksDB opened: path={:?}, block_cache={}MB",
            config.db_path,
            config.block_cache_size / (1024 * 1024),
        );

        // Cache contents are reproducible, a crash may lose unflushed writes
        let mut write_opts = WriteOptions::default();
        write_opts.disable_wal(true);

        Ok(Self {
            db: Arc::new(db),
            write_opts,
            clock,
        })
    }

    /// Get TTL expiration statistics
    pub fn ttl_stats() -> TtlStats {
        TtlStats {
            expired_removed: EXPIRED_KEYS_REMOVED.load(Ordering::Relaxed),
            compaction_removed: TTL_COMPACTION_REMOVED.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl KeyValueStore for RocksStorage {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = compose_key(namespace, key);
        let Some(bytes) = self.db.get(full_key.as_bytes()).map_err(StorageError::from)? else {
            return Ok(None);
        };

        let value = StoredValue::decode(&bytes)?;
        if value.is_expired_at(self.clock.now_millis()) {
            EXPIRED_KEYS_REMOVED.fetch_add(1, Ordering::Relaxed);
            debug!(
                key = %full_key,
                expire_at = value.expire_at,
                "Lazy expiration: removed expired key"
            );
            let _ = self.db.delete_opt(full_key.as_bytes(), &self.write_opts);
            return Ok(None);
        }
        Ok(Some(value.data))
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let stored = StoredValue::new(value, ttl, self.clock.now_millis());
        self.db
            .put_opt(compose_key(namespace, key).as_bytes(), stored.encode(), &self.write_opts)
            .map_err(StorageError::from)?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let full_key = compose_key(namespace, key);
        let existed = match self.db.get(full_key.as_bytes()).map_err(StorageError::from)? {
            Some(bytes) => StoredValue::decode(&bytes)
                .map(|v| !v.is_expired_at(self.clock.now_millis()))
                .unwrap_or(false),
            None => false,
        };
        // Always delete: RocksDB delete is idempotent
        self.db
            .delete_opt(full_key.as_bytes(), &self.write_opts)
            .map_err(StorageError::from)?;
        Ok(existed)
    }
}

/// TTL expiration statistics
#[derive(Debug, Clone, Default)]
pub struct TtlStats {
    /// Keys removed by lazy expiration
    pub expired_removed: u64,
    /// Keys removed by compaction filter
    pub compaction_removed: u64,
}

fn parse_log_level(level: &str) -> LogLevel {
    match level.to_lowercase().as_str() {
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        "warn" => LogLevel::Warn,
        "fatal" => LogLevel::Fatal,
        "header" => LogLevel::Header,
        _ => LogLevel::Error,
    }
}

/// TTL compaction filter - removes expired entries during compaction
fn ttl_compaction_filter(_level: u32, _key: &[u8], value: &[u8]) -> CompactionDecision {
    if let Ok(stored) = StoredValue::decode(value)
        && stored.is_expired_at(current_timestamp_millis())
    {
        TTL_COMPACTION_REMOVED.fetch_add(1, Ordering::Relaxed);
        return CompactionDecision::Remove;
    }
    CompactionDecision::Keep
}
