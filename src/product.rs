//! Product records and the cached product service

use crate::Result;
use crate::cache::{CacheManager, Keyed, Producer, ReadThrough};
use crate::error::BoxError;
use crate::repository::Entity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Name of the product cache
pub const PRODUCTS: &str = "products";

/// Default record TTL in seconds
pub const DEFAULT_TTL_SECS: u64 = 3;

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: i64,
    /// Repository TTL in seconds (0 = persistent)
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            ttl: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Keyed for Product {
    fn cache_key(&self) -> &str {
        &self.id
    }
}

impl Entity for Product {
    fn keyspace() -> &'static str {
        PRODUCTS
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn ttl(&self) -> Option<Duration> {
        (self.ttl > 0).then(|| Duration::from_secs(self.ttl))
    }
}

/// Producer standing in for the product catalog
///
/// Deterministic: every id yields the same name and price, so two
/// independently produced records for one id compare equal.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog;

#[async_trait]
impl Producer<Product> for ProductCatalog {
    async fn produce(&self, id: &str) -> std::result::Result<Product, BoxError> {
        info!("Get product {}", id);
        Ok(Product::new(id, "kamu", 17))
    }
}

/// Cached product lookups over the "products" cache
pub struct ProductService<P = ProductCatalog> {
    products: ReadThrough<Product, P>,
}

impl ProductService<ProductCatalog> {
    pub fn new(caches: &CacheManager) -> Self {
        Self::with_producer(caches, ProductCatalog)
    }
}

impl<P: Producer<Product>> ProductService<P> {
    pub fn with_producer(caches: &CacheManager, producer: P) -> Self {
        Self {
            products: ReadThrough::new(caches.cache(PRODUCTS), producer),
        }
    }

    /// Cached product, produced on a miss
    pub async fn get_product(&self, id: &str) -> Result<Product> {
        self.products.get(id).await
    }

    /// Overwrite the cached product
    pub async fn save(&self, product: Product) -> Result<Product> {
        info!("Save product {:?}", product);
        self.products.put(product).await
    }

    /// Drop the cached product
    pub async fn remove(&self, id: &str) -> Result<()> {
        info!("Remove product {}", id);
        self.products.evict(id).await
    }

    pub fn producer(&self) -> &P {
        self.products.producer()
    }
}
