//! Prelude module for common imports.
//!
//! # Usage
//!
//! ```ignore
//! use readthru::prelude::*;
//! ```

// Error types
pub use crate::error::{BoxError, ReadThruError, Result, StorageError};

// Configuration
pub use crate::config::{CacheConfig, Config, StoreBackend, StoreConfig};

// Caching
pub use crate::cache::{Cache, CacheManager, Keyed, Producer, ReadThrough, from_fn};
pub use crate::repository::{Entity, Repository};

// Storage
pub use crate::storage::{self, KeyValueStore, MemcacheStore, MemoryStore, RocksStorage};

// Products
pub use crate::product::{Product, ProductCatalog, ProductService};

// Metrics
pub use crate::metrics::Metrics;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
