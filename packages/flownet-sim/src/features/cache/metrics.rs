//! Prometheus metrics for the solve cache

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Solve cache metrics
#[derive(Clone)]
pub struct CacheMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub entries: IntGauge,
    pub evictions: IntCounter,
    pub expired: IntCounter,
    pub bytes: IntGauge,
}

impl CacheMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            hits: register_int_counter_with_registry!(
                Opts::new("solve_cache_hits_total", "Solve cache hits"),
                registry
            )
            .unwrap(),
            misses: register_int_counter_with_registry!(
                Opts::new("solve_cache_misses_total", "Solve cache misses"),
                registry
            )
            .unwrap(),
            entries: register_int_gauge_with_registry!(
                Opts::new("solve_cache_entries", "Solve cache entry count"),
                registry
            )
            .unwrap(),
            evictions: register_int_counter_with_registry!(
                Opts::new("solve_cache_evictions_total", "LRU evictions"),
                registry
            )
            .unwrap(),
            expired: register_int_counter_with_registry!(
                Opts::new("solve_cache_expired_total", "Entries removed by TTL sweep"),
                registry
            )
            .unwrap(),
            bytes: register_int_gauge_with_registry!(
                Opts::new("solve_cache_bytes", "Solve cache memory usage"),
                registry
            )
            .unwrap(),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}
