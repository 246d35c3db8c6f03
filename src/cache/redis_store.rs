use super::{CacheStore, StoreError};
use crate::config::Config;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Redis/Valkey-backed [`CacheStore`].
///
/// One multiplexed connection is opened lazily and shared by every request.
/// Any command error drops it so the next call reconnects; a Redis outage
/// therefore costs one failed call per request instead of a dead process.
pub struct RedisStore {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Create a store around an existing client. No connection is made yet.
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: Mutex::new(None),
        }
    }

    /// Create a store from a `redis://` or `rediss://` URL.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL: {e}")))?;
        Ok(Self::new(client))
    }

    /// Create a store from the process configuration.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::from_url(&config.redis_url())
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        if let Some(con) = self.connection.lock().await.as_ref() {
            return Ok(con.clone());
        }

        // Connect without holding the slot so a slow handshake that gets
        // timed out never blocks other requests
        debug!("Opening Redis connection");
        let con = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis connection error: {e}")))?;

        // A concurrent request may have connected first; keep that one
        let mut guard = self.connection.lock().await;
        Ok(guard.get_or_insert(con).clone())
    }

    async fn discard_connection(&self, error: &redis::RedisError) {
        warn!("Dropping Redis connection after error: {}", error);
        *self.connection.lock().await = None;
    }

    /// Map a command failure, discarding the shared connection on the way.
    async fn command_failed(&self, command: &str, error: redis::RedisError) -> StoreError {
        self.discard_connection(&error).await;
        StoreError::Unavailable(format!("Redis {command} error: {error}"))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.connection().await?;
        let result: Result<Option<String>, redis::RedisError> = con.get(key).await;
        match result {
            Ok(raw) => Ok(raw),
            Err(e) => Err(self.command_failed("GET", e).await),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        // SET .. EX writes value and expiry in one command
        let result: Result<(), redis::RedisError> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut con)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_failed("SET", e).await),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection().await?;
        let result: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut con).await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.command_failed("PING", e).await),
        }
    }
}
