//! Bounded key→bytes store with TTL, LRU eviction and glob patterns
//!
//! Concurrency contract: one read-write mutex guards the whole store.
//! Reads that need LRU bookkeeping (`get`, `mget`) take the write lock;
//! `exists`, `keys` and `stats` take the read lock. Every operation checks
//! the closed flag first. Values are copied on both write and read so
//! callers and the internal store never alias.

use super::config::CacheConfig;
use super::error::{CacheError, CacheResult};
use super::metrics::CacheMetrics;
use super::pattern::pattern_matches;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use prometheus::Registry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct CacheEntry {
    value: Vec<u8>,
    /// `None` = no expiry
    expires_at: Option<Instant>,
    /// Updated on every read and write; eviction removes the smallest
    accessed_at: Instant,
    size: usize,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| now >= t)
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    memory_bytes: usize,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.memory_bytes -= entry.size;
        Some(entry)
    }

    /// Evict least-recently-accessed entries until there is room for one
    /// more. Ties on `accessed_at` break deterministically by key.
    fn evict_for_insert(&mut self, max_entries: usize, metrics: &CacheMetrics) {
        while self.entries.len() >= max_entries {
            let victim = self
                .entries
                .iter()
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.accessed_at
                        .cmp(&eb.accessed_at)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());
            match victim {
                Some(key) => {
                    self.remove(&key);
                    metrics.evictions.inc();
                    tracing::debug!(key = %key, "solve cache evicted LRU entry");
                }
                None => break,
            }
        }
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub total_keys: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub memory_bytes: usize,
    /// Key count per namespace: the token before the first `':'`, or
    /// `"other"` for keys without one
    pub keys_by_prefix: HashMap<String, usize>,
}

struct Sweeper {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// In-process solve-result cache
pub struct SolveCache {
    state: Arc<RwLock<CacheState>>,
    closed: Arc<AtomicBool>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl SolveCache {
    pub fn new(config: CacheConfig, registry: &Registry) -> Self {
        let state = Arc::new(RwLock::new(CacheState::default()));
        let closed = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(CacheMetrics::new(registry));

        let sweeper = config.sweep_interval.map(|interval| {
            let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
            let state = Arc::clone(&state);
            let closed = Arc::clone(&closed);
            let metrics = Arc::clone(&metrics);
            let handle = std::thread::spawn(move || loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if closed.load(Ordering::SeqCst) {
                            break;
                        }
                        sweep_expired(&state, &metrics);
                    }
                    _ => break,
                }
            });
            Sweeper {
                shutdown: shutdown_tx,
                handle,
            }
        });

        Self {
            state,
            closed,
            config,
            metrics,
            sweeper: Mutex::new(sweeper),
        }
    }

    fn check_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    /// Fetch a value, counting a hit and touching its access time
    pub fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.check_open()?;
        let mut state = self.state.write();
        self.get_locked(&mut state, key, Instant::now())
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    /// Fetch a value together with its remaining TTL (`None` = no expiry)
    pub fn get_with_ttl(&self, key: &str) -> CacheResult<(Vec<u8>, Option<Duration>)> {
        self.check_open()?;
        let now = Instant::now();
        let mut state = self.state.write();
        let value = self
            .get_locked(&mut state, key, now)
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))?;
        let remaining = state
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|t| t.saturating_duration_since(now));
        Ok((value, remaining))
    }

    fn get_locked(&self, state: &mut CacheState, key: &str, now: Instant) -> Option<Vec<u8>> {
        match state.entries.get(key).map(|e| e.is_expired(now)) {
            None => {
                state.misses += 1;
                self.metrics.misses.inc();
                None
            }
            Some(true) => {
                state.remove(key);
                self.metrics.expired.inc();
                state.misses += 1;
                self.metrics.misses.inc();
                self.refresh_gauges(state);
                None
            }
            Some(false) => {
                let value = state.entries.get_mut(key).map(|entry| {
                    entry.accessed_at = now;
                    entry.value.clone()
                });
                state.hits += 1;
                self.metrics.hits.inc();
                value
            }
        }
    }

    /// Store a value copy
    ///
    /// A missing or zero TTL applies the cache default; a default of `None`
    /// means no expiry.
    pub fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.check_open()?;
        let mut state = self.state.write();
        self.set_locked(&mut state, key, value, ttl, Instant::now());
        self.refresh_gauges(&state);
        Ok(())
    }

    fn set_locked(
        &self,
        state: &mut CacheState,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
        now: Instant,
    ) {
        let effective_ttl = match ttl {
            Some(d) if d > Duration::ZERO => Some(d),
            _ => self.config.default_ttl,
        };
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: effective_ttl.map(|d| now + d),
            accessed_at: now,
            size: key.len() + value.len(),
        };

        if state.entries.contains_key(key) {
            state.remove(key);
        } else {
            state.evict_for_insert(self.config.max_entries, &self.metrics);
        }
        state.memory_bytes += entry.size;
        state.entries.insert(key.to_string(), entry);
    }

    /// Remove a key; returns whether it was present
    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        self.check_open()?;
        let mut state = self.state.write();
        let removed = state.remove(key).is_some();
        self.refresh_gauges(&state);
        Ok(removed)
    }

    /// Non-touching presence check
    pub fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check_open()?;
        let state = self.state.read();
        let now = Instant::now();
        Ok(state
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now)))
    }

    /// Batch get; missing/expired keys yield `None` in their slot
    pub fn mget(&self, keys: &[&str]) -> CacheResult<Vec<Option<Vec<u8>>>> {
        self.check_open()?;
        let now = Instant::now();
        let mut state = self.state.write();
        Ok(keys
            .iter()
            .map(|key| self.get_locked(&mut state, key, now))
            .collect())
    }

    /// Batch set under one lock acquisition
    pub fn mset(&self, pairs: &[(&str, &[u8])], ttl: Option<Duration>) -> CacheResult<()> {
        self.check_open()?;
        let now = Instant::now();
        let mut state = self.state.write();
        for (key, value) in pairs {
            self.set_locked(&mut state, key, value, ttl, now);
        }
        self.refresh_gauges(&state);
        Ok(())
    }

    /// Batch delete; returns how many keys were removed
    pub fn mdelete(&self, keys: &[&str]) -> CacheResult<usize> {
        self.check_open()?;
        let mut state = self.state.write();
        let removed = keys.iter().filter(|k| state.remove(k).is_some()).count();
        self.refresh_gauges(&state);
        Ok(removed)
    }

    /// Live keys matching `pattern`, sorted for determinism
    pub fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.check_open()?;
        let state = self.state.read();
        let now = Instant::now();
        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(k, e)| !e.is_expired(now) && pattern_matches(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    /// Delete every key matching `pattern`; returns the removed count
    pub fn delete_by_pattern(&self, pattern: &str) -> CacheResult<usize> {
        self.check_open()?;
        let mut state = self.state.write();
        let matching: Vec<String> = state
            .entries
            .keys()
            .filter(|k| pattern_matches(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            state.remove(key);
        }
        self.refresh_gauges(&state);
        Ok(matching.len())
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheResult<CacheStats> {
        self.check_open()?;
        let state = self.state.read();
        let total = state.hits + state.misses;
        let mut keys_by_prefix: HashMap<String, usize> = HashMap::new();
        for key in state.entries.keys() {
            let prefix = match key.split_once(':') {
                Some((prefix, _)) => prefix.to_string(),
                None => "other".to_string(),
            };
            *keys_by_prefix.entry(prefix).or_insert(0) += 1;
        }
        Ok(CacheStats {
            total_keys: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            hit_rate: if total > 0 {
                state.hits as f64 / total as f64
            } else {
                0.0
            },
            memory_bytes: state.memory_bytes,
            keys_by_prefix,
        })
    }

    /// Drop every entry, keeping counters
    pub fn clear(&self) -> CacheResult<()> {
        self.check_open()?;
        let mut state = self.state.write();
        state.entries.clear();
        state.memory_bytes = 0;
        self.refresh_gauges(&state);
        Ok(())
    }

    /// Shut the cache down; idempotent. Subsequent operations fail with
    /// `CacheError::Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(sweeper) = self.sweeper.lock().take() {
            let _ = sweeper.shutdown.send(());
            let _ = sweeper.handle.join();
        }
        self.state.write().entries.clear();
    }

    fn refresh_gauges(&self, state: &CacheState) {
        self.metrics.entries.set(state.entries.len() as i64);
        self.metrics.bytes.set(state.memory_bytes as i64);
    }

    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Drop for SolveCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn sweep_expired(state: &Arc<RwLock<CacheState>>, metrics: &CacheMetrics) {
    let now = Instant::now();
    let mut state = state.write();
    let expired: Vec<String> = state
        .entries
        .iter()
        .filter(|(_, e)| e.is_expired(now))
        .map(|(k, _)| k.clone())
        .collect();
    for key in &expired {
        state.remove(key);
        metrics.expired.inc();
    }
    if !expired.is_empty() {
        tracing::debug!(count = expired.len(), "solve cache swept expired entries");
        metrics.entries.set(state.entries.len() as i64);
        metrics.bytes.set(state.memory_bytes as i64);
    }
}
