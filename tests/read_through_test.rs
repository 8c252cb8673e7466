//! Read-through contract against the embedded stores

use readthru::config::{CacheConfig, RocksConfig};
use readthru::prelude::*;
use readthru::storage::{ManualClock, current_timestamp_millis};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Producer that records how often it ran
struct TrackedCatalog {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Producer<Product> for TrackedCatalog {
    async fn produce(&self, id: &str) -> std::result::Result<Product, BoxError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Product::new(id, format!("generated-{n}"), 17))
    }
}

fn cache_config() -> CacheConfig {
    CacheConfig {
        default_ttl_secs: 3,
        ..CacheConfig::default()
    }
}

fn service_over(store: Arc<dyn KeyValueStore>) -> ProductService<TrackedCatalog> {
    let caches = CacheManager::new(store, cache_config(), Arc::new(Metrics::new()));
    ProductService::with_producer(
        &caches,
        TrackedCatalog {
            calls: AtomicUsize::new(0),
        },
    )
}

fn calls(service: &ProductService<TrackedCatalog>) -> usize {
    service.producer().calls.load(Ordering::SeqCst)
}

async fn check_contract(service: &ProductService<TrackedCatalog>, clock: &ManualClock) {
    // Memoization
    let first = service.get_product("001").await.unwrap();
    let second = service.get_product("001").await.unwrap();
    assert_eq!(first.id, "001");
    assert_eq!(first, second);
    assert_eq!(calls(service), 1);

    // Put wins over the producer
    let put = Product::new("P02", "kamu", 1000).with_ttl(3);
    service.save(put.clone()).await.unwrap();
    assert_eq!(service.get_product("P02").await.unwrap(), put);
    assert_eq!(calls(service), 1);

    // Evict clears the entry
    let before = service.get_product("P003").await.unwrap();
    service.remove("P003").await.unwrap();
    let after = service.get_product("P003").await.unwrap();
    assert_eq!(after.id, before.id);
    assert_ne!(after.name, before.name, "evicted entry was served again");
    assert_eq!(calls(service), 3);

    // TTL expiry brings the producer back
    clock.advance(Duration::from_secs(3));
    let refreshed = service.get_product("001").await.unwrap();
    assert_ne!(refreshed, first);
    assert_eq!(calls(service), 4);
}

#[tokio::test]
async fn test_contract_on_memory_store() {
    let clock = Arc::new(ManualClock::new(10_000));
    let service = service_over(Arc::new(MemoryStore::with_clock(clock.clone())));
    check_contract(&service, &clock).await;
}

#[tokio::test]
async fn test_contract_on_rocksdb() {
    let tmp_dir = TempDir::new().unwrap();
    let config = RocksConfig {
        db_path: tmp_dir.path().join("cache_db"),
        block_cache_size: 8 * 1024 * 1024,
        write_buffer_size: 4 * 1024 * 1024,
        ..RocksConfig::default()
    };
    let clock = Arc::new(ManualClock::new(current_timestamp_millis()));
    let store = RocksStorage::open_with_clock(&config, clock.clone()).unwrap();

    let service = service_over(Arc::new(store));
    check_contract(&service, &clock).await;
}

#[tokio::test]
async fn test_rocksdb_ttl_on_wall_clock() {
    let tmp_dir = TempDir::new().unwrap();
    let config = RocksConfig {
        db_path: tmp_dir.path().join("wall_clock_db"),
        block_cache_size: 8 * 1024 * 1024,
        write_buffer_size: 4 * 1024 * 1024,
        ..RocksConfig::default()
    };
    let store = RocksStorage::open(&config).unwrap();
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
async fn test_put_survives_until_ttl_on_wall_clock() {
    let config = CacheConfig {
        default_ttl_secs: 1,
        ..CacheConfig::default()
    };
    let caches = CacheManager::new(Arc::new(MemoryStore::new()), config, Arc::new(Metrics::new()));
    let service = ProductService::with_producer(
        &caches,
        TrackedCatalog {
            calls: AtomicUsize::new(0),
        },
    );

    let put = Product::new("P02", "kamu", 1000);
    service.save(put.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(service.get_product("P02").await.unwrap(), put);
    assert_eq!(calls(&service), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_ne!(service.get_product("P02").await.unwrap(), put);
    assert_eq!(calls(&service), 1);
}

#[tokio::test]
async fn test_repository_and_cache_share_a_store() {
    let clock = Arc::new(ManualClock::new(0));
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::with_clock(clock.clone()));
    let metrics = Arc::new(Metrics::new());
    let caches = CacheManager::new(Arc::clone(&store), cache_config(), Arc::clone(&metrics));
    let service = ProductService::new(&caches);
    let repository: Repository<Product> = Repository::new(store, metrics);

    let stored = repository
        .save(Product::new("1", "kamu", 1000).with_ttl(5))
        .await
        .unwrap();
    let cached = service.get_product("1").await.unwrap();

    // Same id, different namespaces
    assert_eq!(cached.price, 17);
    assert_eq!(repository.find_by_id("1").await.unwrap(), Some(stored));

    clock.advance(Duration::from_secs(5));
    assert!(repository.find_by_id("1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_misses_each_see_a_record() {
    let clock = Arc::new(ManualClock::new(0));
    let service = Arc::new(service_over(Arc::new(MemoryStore::with_clock(clock))));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.get_product("hot").await.unwrap() })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().id, "hot");
    }
    // No single-flight: anywhere from one to eight producer runs
    assert!((1..=8).contains(&calls(&service)));
}
