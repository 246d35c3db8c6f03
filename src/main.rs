use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use translation_cache_service::cache::{RedisStore, ResultCache};
use translation_cache_service::config::Config;
use translation_cache_service::provider::GoogleTranslateClient;
use translation_cache_service::retry::{with_retry, RetryConfig};
use translation_cache_service::server;
use translation_cache_service::translation::Translator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_cache_service=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!("Starting translation service");

    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    // Cache store
    let store = Arc::new(RedisStore::from_config(&config).context("Failed to create Redis client")?);
    info!(
        "Connecting to Redis/Valkey at {} ({})",
        config.redis_address,
        if config.redis_tls { "TLS" } else { "plain TCP" }
    );
    let cache = ResultCache::new(store)
        .with_ttl(config.cache_ttl)
        .with_timeout(config.cache_timeout);

    match with_retry(&RetryConfig::cache_probe(), "Redis startup probe", || cache.ping()).await {
        Ok(()) => info!("✓ Connected to Redis"),
        Err(e) => warn!("Redis unreachable at startup, serving without cache until it recovers: {}", e),
    }

    // Translation provider
    let provider = GoogleTranslateClient::from_config(&config)
        .context("Failed to create Google Translate client")?;

    let translator = Translator::new(cache, Arc::new(provider))
        .with_auth_token(config.auth_token.clone());
    if !config.auth_enabled() {
        warn!("AUTH_TOKEN not set, /translate accepts unauthenticated requests");
    }

    let app = server::router(Arc::new(translator));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Translation service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Translation service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
