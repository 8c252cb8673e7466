//! Configuration for readthru

use crate::ReadThruError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

/// Read-through cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied to cache entries, in seconds (0 = no expiry)
    pub default_ttl_secs: u64,

    /// Per-cache TTL overrides keyed by cache name
    pub ttl_overrides: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 60,
            ttl_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Effective TTL for the named cache
    pub fn ttl_for(&self, name: &str) -> Option<Duration> {
        let secs = self
            .ttl_overrides
            .get(name)
            .copied()
            .unwrap_or(self.default_ttl_secs);
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// Which backend holds the data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Rocksdb,
    Memcache,
}

impl FromStr for StoreBackend {
    type Err = ReadThruError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::Rocksdb),
            "memcache" | "memcached" => Ok(Self::Memcache),
            other => Err(ReadThruError::Config(format!("Unknown store backend: {other}"))),
        }
    }
}

/// Store selection and per-backend settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub rocksdb: RocksConfig,
    pub memcache: MemcacheConfig,
}

/// Embedded RocksDB configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RocksConfig {
    /// Path to RocksDB data directory
    pub db_path: PathBuf,

    /// Block cache size in bytes
    pub block_cache_size: usize,

    /// Write buffer size in bytes
    pub write_buffer_size: usize,

    /// Maximum number of write buffers
    pub max_write_buffer_number: i32,

    /// Maximum number of background jobs
    pub max_background_jobs: i32,

    /// Enable compression
    pub enable_compression: bool,

    /// Enable TTL compaction filter (runs during RocksDB compaction)
    pub enable_ttl_compaction: bool,

    /// RocksDB LOG verbosity (debug, info, warn, error, fatal, header)
    pub rocksdb_log_level: String,

    /// Maximum size of a RocksDB LOG file in bytes
    pub rocksdb_max_log_file_size: usize,

    /// Number of RocksDB LOG files to keep
    pub rocksdb_keep_log_file_num: usize,
}

impl Default for RocksConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/readthru"),
            block_cache_size: 64 * 1024 * 1024, // 64MB block cache
            write_buffer_size: 16 * 1024 * 1024, // 16MB
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_compression: false,
            enable_ttl_compaction: true,
            rocksdb_log_level: "error".to_string(),
            rocksdb_max_log_file_size: 10 * 1024 * 1024,
            rocksdb_keep_log_file_num: 5,
        }
    }
}

/// External memcached-compatible server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemcacheConfig {
    /// Server address
    pub addr: String,

    /// Connect/read/write timeout in milliseconds (0 = no timeout)
    pub timeout_ms: u64,

    /// Read buffer size for the connection (bytes)
    pub read_buffer_size: usize,

    /// Largest value accepted in either direction (bytes)
    pub max_value_size: usize,
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:11211".to_string(),
            timeout_ms: 1000,
            read_buffer_size: 8192,
            max_value_size: 1024 * 1024, // memcached default item size
        }
    }
}

impl MemcacheConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReadThruError::Config(format!("Failed to read config file: {e}"))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ReadThruError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `READTHRU_*` environment variables
    pub fn apply_env(&mut self) -> crate::Result<()> {
        if let Ok(backend) = std::env::var("READTHRU_STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }

        if let Ok(path) = std::env::var("READTHRU_DB_PATH") {
            self.store.rocksdb.db_path = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("READTHRU_MEMCACHE_ADDR") {
            self.store.memcache.addr = addr;
        }

        if let Ok(ttl) = std::env::var("READTHRU_CACHE_TTL") {
            self.cache.default_ttl_secs = ttl
                .parse()
                .map_err(|_| ReadThruError::Config(format!("Invalid READTHRU_CACHE_TTL: {ttl}")))?;
        }

        Ok(())
    }
}
