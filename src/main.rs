mod config;
mod models;
mod routes;
mod services;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{
    cache::Cache,
    crypto::Decryptor,
    http::HttpFetcher,
    keys::KeyRing,
    providers::CatalogService,
    redis::RedisStore,
    warmup::start_warmup_task,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<CatalogService>,
    pub start_time: Instant,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cricfy_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = Config::from_env();
    let port = config.port;

    tracing::info!("Starting Cricfy Server v{}", env!("CARGO_PKG_VERSION"));

    let catalog_url = config
        .resolve_catalog_url()
        .context("No catalog URL configured (set CATALOG_URL or CATALOG_URL_FILE)")?;
    let fallback_providers = config.load_fallback_providers()?;
    tracing::info!("Loaded {} fallback providers", fallback_providers.len());

    // Key material
    let keys = KeyRing::load(&config.secret_files, config.legacy_secret_file.as_deref());

    // Cache backend
    let cache = match &config.redis_url {
        Some(url) => {
            let store = RedisStore::new(url).await?;
            tracing::info!("Redis connected: {}", url);
            Cache::redis(&config.cache_namespace, config.cache_ttl_hours, store)
        }
        None => {
            tracing::info!(
                "Using in-memory cache ({} entries max)",
                config.cache_max_entries
            );
            Cache::memory(
                &config.cache_namespace,
                config.cache_ttl_hours,
                config.cache_max_entries,
            )
        }
    };

    let catalog = Arc::new(CatalogService::new(
        HttpFetcher::new(&config.user_agent, config.fetch_timeout_secs),
        cache,
        Decryptor::new(keys, config.playlist_scheme),
        &catalog_url,
        fallback_providers,
        config.channel_cache_ttl_secs,
    ));
    tracing::info!("Playlist scheme: {}", config.playlist_scheme);

    // Warm-up task (runs in background)
    if config.warm_cache_on_start {
        tokio::spawn(start_warmup_task(catalog.clone()));
    }

    // Build application state
    let state = Arc::new(AppState {
        config,
        catalog,
        start_time: Instant::now(),
    });

    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
