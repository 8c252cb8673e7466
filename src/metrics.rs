//! Prometheus metrics for readthru

use crate::storage::RocksStorage;
use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};

/// Cache and repository counters
pub struct Metrics {
    pub registry: Registry,

    // Read-through counters
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub cache_puts: IntCounter,
    pub cache_evictions: IntCounter,

    // Producer counters
    pub producer_calls: IntCounter,
    pub producer_errors: IntCounter,

    // Repository counters
    pub repo_saves: IntCounter,
    pub repo_finds: IntCounter,
    pub repo_deletes: IntCounter,

    // Latency histograms
    pub op_latency: Histogram,

    // Error counters
    pub store_errors: IntCounter,
    pub codec_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let cache_hits =
            IntCounter::new("readthru_cache_hits_total", "Reads served from the cache").unwrap();
        let cache_misses = IntCounter::new(
            "readthru_cache_misses_total",
            "Reads that fell through to the producer",
        )
        .unwrap();
        let cache_puts =
            IntCounter::new("readthru_cache_puts_total", "Explicit cache overwrites").unwrap();
        let cache_evictions =
            IntCounter::new("readthru_cache_evictions_total", "Explicit cache evictions").unwrap();

        let producer_calls =
            IntCounter::new("readthru_producer_calls_total", "Producer invocations").unwrap();
        let producer_errors =
            IntCounter::new("readthru_producer_errors_total", "Failed producer invocations")
                .unwrap();

        let repo_saves =
            IntCounter::new("readthru_repo_saves_total", "Repository saves").unwrap();
        let repo_finds =
            IntCounter::new("readthru_repo_finds_total", "Repository lookups").unwrap();
        let repo_deletes =
            IntCounter::new("readthru_repo_deletes_total", "Repository deletes").unwrap();

        let op_latency = Histogram::with_opts(
            HistogramOpts::new(
                "readthru_op_latency_seconds",
                "Cache operation latency in seconds, producer time included",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .unwrap();

        let store_errors =
            IntCounter::new("readthru_store_errors_total", "Total store errors").unwrap();
        let codec_errors =
            IntCounter::new("readthru_codec_errors_total", "Total record codec errors").unwrap();

        // Register all metrics
        registry.register(Box::new(cache_hits.clone())).unwrap();
        registry.register(Box::new(cache_misses.clone())).unwrap();
        registry.register(Box::new(cache_puts.clone())).unwrap();
        registry.register(Box::new(cache_evictions.clone())).unwrap();
        registry.register(Box::new(producer_calls.clone())).unwrap();
        registry.register(Box::new(producer_errors.clone())).unwrap();
        registry.register(Box::new(repo_saves.clone())).unwrap();
        registry.register(Box::new(repo_finds.clone())).unwrap();
        registry.register(Box::new(repo_deletes.clone())).unwrap();
        registry.register(Box::new(op_latency.clone())).unwrap();
        registry.register(Box::new(store_errors.clone())).unwrap();
        registry.register(Box::new(codec_errors.clone())).unwrap();

        Self {
            registry,
            cache_hits,
            cache_misses,
            cache_puts,
            cache_evictions,
            producer_calls,
            producer_errors,
            repo_saves,
            repo_finds,
            repo_deletes,
            op_latency,
            store_errors,
            codec_errors,
        }
    }

    /// Count a failed operation by its error kind
    pub fn record_error(&self, error: &crate::ReadThruError) {
        use crate::ReadThruError;
        match error {
            ReadThruError::Producer(_) => self.producer_errors.inc(),
            ReadThruError::Codec(_) => self.codec_errors.inc(),
            ReadThruError::StoreUnavailable(_) | ReadThruError::Storage(_) => {
                self.store_errors.inc();
            }
            ReadThruError::Io(_) | ReadThruError::Config(_) => {}
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        let mut output = String::from_utf8(buffer).unwrap();

        // RocksDB expiry stats live in static counters
        let stats = RocksStorage::ttl_stats();
        let expired_removed = stats.expired_removed;
        let compaction_removed = stats.compaction_removed;

        output.push_str(&format!(
            "\n# HELP readthru_expired_keys_removed_total Keys removed by lazy expiration\n\
             # TYPE readthru_expired_keys_removed_total counter\n\
             readthru_expired_keys_removed_total {expired_removed}\n"
        ));

        output.push_str(&format!(
            "\n# HELP readthru_ttl_compaction_removed_total Keys removed by TTL compaction filter\n\
             # TYPE readthru_ttl_compaction_removed_total counter\n\
             readthru_ttl_compaction_removed_total {compaction_removed}\n"
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
