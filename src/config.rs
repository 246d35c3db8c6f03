use anyhow::{bail, Context, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_GOOGLE_TRANSLATE_URL: &str =
    "https://translation.googleapis.com/language/translate/v2";

#[derive(Clone)]
pub struct Config {
    // Cache store (Redis / Valkey)
    pub redis_address: String,
    pub redis_password: String,
    pub redis_db: i64,
    pub redis_tls: bool,
    pub cache_ttl: Duration,
    pub cache_timeout: Duration,

    // Translation provider
    pub google_api_key: String,
    pub google_translate_url: String,
    pub provider_timeout: Duration,

    // Server
    pub server_port: u16,
    pub auth_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            // Cache store
            redis_address: std::env::var("REDIS_ADDRESS")
                .unwrap_or_else(|_| "localhost:6379".to_string()),
            redis_password: std::env::var("REDIS_PASSWORD").unwrap_or_default(),
            redis_db: std::env::var("REDIS_DB")
                .ok()
                .map(|v| v.parse::<i64>())
                .transpose()
                .context("REDIS_DB must be an integer")?
                .unwrap_or(0),
            // TLS unless explicitly opted out
            redis_tls: std::env::var("USE_REDIS_UNSECURE")
                .map(|v| v.is_empty())
                .unwrap_or(true),
            cache_ttl: Duration::from_secs(
                std::env::var("CACHE_TTL_SECS")
                    .ok()
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("CACHE_TTL_SECS must be a whole number of seconds")?
                    .unwrap_or(60 * 60 * 24 * 14),
            ),
            cache_timeout: Duration::from_millis(
                std::env::var("CACHE_TIMEOUT_MS")
                    .ok()
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("CACHE_TIMEOUT_MS must be a whole number of milliseconds")?
                    .unwrap_or(500),
            ),

            // Translation provider
            google_api_key: std::env::var("GOOGLE_TRANSLATE_API_KEY")
                .context("GOOGLE_TRANSLATE_API_KEY not set")?,
            google_translate_url: std::env::var("GOOGLE_TRANSLATE_URL")
                .unwrap_or_else(|_| DEFAULT_GOOGLE_TRANSLATE_URL.to_string()),
            provider_timeout: Duration::from_secs(
                std::env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("PROVIDER_TIMEOUT_SECS must be a whole number of seconds")?
                    .unwrap_or(10),
            ),

            // Server
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("SERVER_PORT must be a valid port number")?
                .unwrap_or(8080),
            auth_token: std::env::var("AUTH_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
        };

        // Redis rejects EX 0 and an in-memory store would expire entries at once
        if config.cache_ttl.is_zero() {
            bail!("CACHE_TTL_SECS must be greater than 0");
        }

        Ok(config)
    }

    /// Connection URL for the cache store, `rediss://` when TLS is on.
    pub fn redis_url(&self) -> String {
        let scheme = if self.redis_tls { "rediss" } else { "redis" };
        let auth = if self.redis_password.is_empty() {
            String::new()
        } else {
            format!(":{}@", urlencoding::encode(&self.redis_password))
        };
        format!("{}://{}{}/{}", scheme, auth, self.redis_address, self.redis_db)
    }

    /// Whether `POST /translate` requires an auth token.
    pub fn auth_enabled(&self) -> bool {
        self.auth_token.is_some()
    }
}

// Secrets stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_address", &self.redis_address)
            .field("redis_db", &self.redis_db)
            .field("redis_tls", &self.redis_tls)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_timeout", &self.cache_timeout)
            .field("google_translate_url", &self.google_translate_url)
            .field("provider_timeout", &self.provider_timeout)
            .field("server_port", &self.server_port)
            .field("auth_enabled", &self.auth_enabled())
            .finish_non_exhaustive()
    }
}
