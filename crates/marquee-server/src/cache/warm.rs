//! Redis-backed warm tier shared by every instance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use super::tier::{CacheError, CacheTier, EntryTtl};
use crate::config::RedisConfig;

/// Warm tier over a Redis connection pool.
///
/// Redis keeps a single expiry per key, so entries are written with the
/// shorter of the absolute and sliding TTLs and reads do not extend them.
#[derive(Clone)]
pub struct WarmCache {
    pool: Pool,
}

impl WarmCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check if Redis is reachable (for readiness checks).
    pub async fn is_available(&self) -> bool {
        match self.pool.get().await {
            Ok(mut conn) => {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong.is_ok()
            }
            Err(_) => false,
        }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to get Redis connection");
            CacheError::Unavailable(e.to_string())
        })
    }
}

#[async_trait]
impl CacheTier for WarmCache {
    fn name(&self) -> &'static str {
        "warm"
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        let mut conn = self.connection().await?;
        let data = conn
            .get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis GET error");
                CacheError::Backend(e.to_string())
            })?;
        Ok(data.map(Arc::new))
    }

    async fn set(&self, key: &str, value: Arc<Vec<u8>>, ttl: EntryTtl) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let ttl_ms = u64::try_from(ttl.effective().as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        conn.pset_ex::<_, _, ()>(key, value.as_slice(), ttl_ms)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Redis SET error");
                CacheError::Backend(e.to_string())
            })?;
        tracing::debug!(key = %key, ttl_ms = %ttl_ms, "warm tier set");
        Ok(())
    }
}

/// Create the warm tier from configuration.
///
/// The pool connects lazily, so this succeeds even when Redis is down; the
/// first failed round trip is logged and the retriever treats it as a miss.
pub async fn create_warm_cache(config: &RedisConfig) -> Result<WarmCache, CacheError> {
    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut pool_config = PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::Unavailable(format!("failed to create Redis pool: {e}")))?;
    let cache = WarmCache::new(pool);

    if cache.is_available().await {
        tracing::info!("Connected to Redis");
    } else {
        tracing::warn!("Redis is not reachable yet; warm tier reads will miss until it is");
    }

    Ok(cache)
}
