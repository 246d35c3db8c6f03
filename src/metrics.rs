//! Translation pipeline counters.
//!
//! One instance lives inside the orchestrator and is shared by all requests;
//! the counters are relaxed atomics, no request ever waits on them.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Requests answered from the cache
    cache_hits: AtomicUsize,

    /// Lookups that found nothing
    cache_misses: AtomicUsize,

    /// Lookups or writes that failed because the store was unreachable
    cache_unavailable: AtomicUsize,

    /// Calls made to the translation provider
    provider_calls: AtomicUsize,

    /// Provider calls that ended in an error
    provider_failures: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_unavailable(&self) {
        self.cache_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_call(&self) {
        self.provider_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.provider_calls.load(Ordering::Relaxed);
        let failures = self.provider_failures.load(Ordering::Relaxed);
        let provider_success_rate = if calls > 0 {
            (calls.saturating_sub(failures) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_unavailable: self.cache_unavailable.load(Ordering::Relaxed),
            cache_hit_rate,
            provider_calls: calls,
            provider_failures: failures,
            provider_success_rate,
        }
    }
}

/// Point-in-time view of [`TranslationMetrics`], served on `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_unavailable: usize,
    /// Percentage (0-100) of successful lookups that hit
    pub cache_hit_rate: f64,
    pub provider_calls: usize,
    pub provider_failures: usize,
    /// Percentage (0-100)
    pub provider_success_rate: f64,
}
