//! Cache configuration

use std::time::Duration;

/// Solve cache tuning knobs
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// LRU eviction kicks in once this many entries are stored
    pub max_entries: usize,

    /// TTL applied when `set` is called without one; `None` = no expiry
    pub default_ttl: Option<Duration>,

    /// Background sweep cadence for expired entries; `None` disables the
    /// sweeper thread
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl: None,
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

impl CacheConfig {
    /// Small unswept cache, handy in tests
    pub fn unswept(max_entries: usize) -> Self {
        Self {
            max_entries,
            default_ttl: None,
            sweep_interval: None,
        }
    }
}
