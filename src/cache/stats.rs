//! Fetch resolution statistics
//!
//! `FetchStatsTracker` counts outcomes with relaxed atomics; `FetchStats` is
//! the serializable snapshot reported to callers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of fetch resolution counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchStats {
    /// Requests answered from the current bucket
    pub hits: u64,
    /// Requests not found in the current bucket
    pub misses: u64,
    /// Requests sent to the network (misses and uncacheable requests)
    pub network_fetches: u64,
    /// Network calls that failed
    pub network_failures: u64,
    /// Fallback documents served in place of a failed request
    pub fallbacks: u64,
    /// Responses written back into the bucket
    pub write_backs: u64,
    /// Write-backs that failed (logged, never surfaced to the caller)
    pub write_back_failures: u64,
}

impl FetchStats {
    /// Calculate hit rate (hits / lookups)
    /// Returns 0.0 if there were no lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub struct FetchStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
    fallbacks: AtomicU64,
    write_backs: AtomicU64,
    write_back_failures: AtomicU64,
}

impl FetchStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_failure(&self) {
        self.network_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_back(&self, succeeded: bool) {
        if succeeded {
            self.write_backs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_back_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> FetchStats {
        FetchStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            network_failures: self.network_failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            write_back_failures: self.write_back_failures.load(Ordering::Relaxed),
        }
    }
}
