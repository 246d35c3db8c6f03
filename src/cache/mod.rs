//! Cache-aside storage for translation results.
//!
//! [`CacheStore`] is the raw key/value capability (Redis in production, an
//! in-memory map in tests). [`ResultCache`] sits on top of it and owns the
//! translation-specific policy: JSON encoding, the fixed TTL, the per-call
//! timeout, and forcing `cache_hit` on values read back.

mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use crate::cache_key::CacheKey;
use crate::translation::TranslationResult;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Entries live for two weeks from the moment they are written.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Upper bound on a single store round trip before it counts as unavailable.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Failure talking to the cache store. Never reaches the HTTP caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Raw key/value store with per-entry expiry.
///
/// Implementations must be safe to share between concurrent requests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the value stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite `key` with `value`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Outcome of a cache lookup.
#[derive(Debug)]
pub enum CacheLookup {
    /// Entry present; `cache_hit` is already set to `true`.
    Found(TranslationResult),
    NotFound,
    /// The store could not be reached. Callers proceed as on a miss.
    Unavailable(StoreError),
}

/// Translation-aware wrapper around a [`CacheStore`].
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    timeout: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the TTL applied to every entry written
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the bound on each store call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up a cached translation.
    ///
    /// A value that no longer decodes as a [`TranslationResult`] is reported
    /// as [`CacheLookup::NotFound`] so the fresh translation overwrites it.
    pub async fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let raw = match self.bounded(self.store.get(key.as_str())).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheLookup::NotFound,
            Err(e) => return CacheLookup::Unavailable(e),
        };

        match serde_json::from_str::<TranslationResult>(&raw) {
            Ok(mut result) => {
                result.cache_hit = true;
                CacheLookup::Found(result)
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry for {}: {}", key, e);
                CacheLookup::NotFound
            }
        }
    }

    /// Write a translation result under `key` with the configured TTL.
    ///
    /// The entry is persisted with `cache_hit` as given (callers pass fresh
    /// results, so this is `false`).
    pub async fn store(&self, key: &CacheKey, result: &TranslationResult) -> Result<(), StoreError> {
        let json = serde_json::to_string(result)?;
        self.bounded(self.store.set(key.as_str(), &json, self.ttl))
            .await?;
        debug!("Cached translation under {} for {:?}", key, self.ttl);
        Ok(())
    }

    /// Probe the underlying store.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.store.ping()).await
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}
