//! # warden-api — Binary Entry Point
//!
//! Loads configuration, connects the cache and principal store (falling back
//! to in-memory backends when their URLs are unset), seeds the role table,
//! and serves the Axum application.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use warden_api::{AppConfig, AppState, Collaborators};
use warden_core::{Clock, SystemClock};
use warden_store::{
    seed_roles, CacheBackend, MemoryCache, MemoryPrincipalStore, PgPrincipalStore, RedisCache,
};

/// Sweep interval for expired entries in the in-memory cache.
const MEMORY_CACHE_SWEEP: Duration = Duration::from_secs(60);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect_cache(config: &AppConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn CacheBackend>> {
    match &config.redis_url {
        Some(url) => {
            let cache = RedisCache::connect(url)
                .await
                .context("connecting to redis")?;
            Ok(Arc::new(cache))
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set; using in-process cache. Role cache and rate limits are not shared between instances."
            );
            let cache = MemoryCache::new(clock);
            let sweeper = cache.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(MEMORY_CACHE_SWEEP);
                loop {
                    tick.tick().await;
                    sweeper.evict_expired();
                }
            });
            Ok(Arc::new(cache))
        }
    }
}

async fn connect_collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = connect_cache(config, clock.clone()).await?;

    let collaborators = match &config.database_url {
        Some(url) => {
            let store = PgPrincipalStore::connect(url)
                .await
                .context("connecting to postgres")?;
            Collaborators::new(Arc::new(store), cache, clock)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; principals are held in memory and lost on restart.");
            let store = MemoryPrincipalStore::new(clock.clone());
            Collaborators::new(Arc::new(store), cache, clock)
        }
    };
    Ok(collaborators)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    if config.jwt.uses_development_secret() {
        tracing::warn!("JWT_SECRET not set; signing tokens with the development secret");
    }

    let collaborators = connect_collaborators(&config).await?;
    let seeded = seed_roles(collaborators.principals.as_ref())
        .await
        .context("seeding roles")?;
    tracing::info!(inserted = seeded, "role table seeded");

    let port = config.server.port;
    let state = AppState::new(config, collaborators);
    let app = warden_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Warden API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
