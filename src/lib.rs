//! # readthru
//!
//! Read-through record cache over pluggable key-value stores.
//!
//! ## Features
//!
//! - Read-through `get`, unconditional `put`, idempotent `evict`
//! - Cache-wide TTL per named cache, enforced by the store
//! - Key-value repository with per-record TTL
//! - Stores: in-memory, embedded RocksDB, external memcached (ASCII protocol)
//! - Prometheus metrics for hits, misses, producer calls and errors
//!
//! ## Example
//!
//! ```ignore
//! use readthru::prelude::*;
//!
//! let store = storage::open(&config.store)?;
//! let caches = CacheManager::new(store, config.cache, Arc::new(Metrics::new()));
//! let products = ProductService::new(&caches);
//! let product = products.get_product("001").await?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌────────────────────┐
//! │ caller       │────▶│ ReadThrough      │────▶│ KeyValueStore      │
//! │ (service,    │     │  ├─ Cache (TTL)  │     │  ├─ MemoryStore     │
//! │  CLI)        │     │  └─ Producer     │     │  ├─ RocksStorage    │
//! └──────────────┘     └──────────────────┘     │  └─ MemcacheStore   │
//!                                               └────────────────────┘
//! ```

// Modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod product;
pub mod protocol;
pub mod repository;
pub mod storage;

// Re-exports for convenience
pub use error::{BoxError, ProtocolError, ReadThruError, Result, StorageError};
