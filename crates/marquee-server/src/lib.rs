pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod origin;
pub mod retriever;
pub mod server;

use std::sync::Arc;

use marquee_core::PayloadCodec;

pub use cache::{CacheError, CacheTier, EntryTtl, HotCache, WarmCache};
pub use config::{AppConfig, CacheConfig, OriginConfig, RedisConfig, ServerConfig};
pub use error::RetrievalError;
pub use observability::{init_tracing, shutdown_tracing};
pub use origin::{HttpOriginClient, OriginClient, OriginError};
pub use retriever::{CacheAsideRetriever, FetchResult, FetchSource, RetrievalPolicy};
pub use server::{AppState, MarqueeServer, ServerBuilder, build_app};

/// Build the shared application state from configuration.
///
/// ## Graceful Degradation
///
/// The Redis pool connects lazily, so the service starts even when Redis is
/// down; warm tier failures read as misses until it comes back.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let hot = HotCache::new();
    hot.start_purge_task(config.cache.hot.ttl().absolute);

    let warm = cache::create_warm_cache(&config.redis).await?;
    let origin = HttpOriginClient::new(&config.origin)?;
    tracing::info!(url = %origin.url(), "Origin client ready");

    let payload = PayloadCodec::new(config.cache.codec());
    let policy = RetrievalPolicy::from_config(&config.cache);
    tracing::info!(
        key = %policy.key,
        single_flight = policy.single_flight,
        "Cache-aside retriever configured"
    );

    let retriever = CacheAsideRetriever::new(
        Arc::new(hot),
        Arc::new(warm.clone()),
        Arc::new(origin),
        payload,
        policy,
    );

    Ok(AppState {
        retriever: Arc::new(retriever),
        warm: Some(warm),
    })
}
