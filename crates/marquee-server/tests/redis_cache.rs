//! Warm tier against a real Redis.
//!
//! Tests use testcontainers to spin up Redis and are ignored by default;
//! run them with `--ignored` where Docker is available.

use std::sync::Arc;
use std::time::Duration;

use marquee_server::{CacheTier, EntryTtl, RedisConfig, cache::create_warm_cache};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{host_port}");

            (container, url)
        })
        .await;

    url.clone()
}

async fn redis_config() -> RedisConfig {
    RedisConfig {
        url: get_redis_url().await,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_warm_cache_round_trip() {
    let cache = create_warm_cache(&redis_config().await).await.unwrap();
    assert!(cache.is_available().await);

    let payload = Arc::new(vec![0x1f, 0x8b, 0x00, 0xff, 0x10]);
    cache
        .set(
            "round_trip",
            payload.clone(),
            EntryTtl::absolute(Duration::from_secs(60)),
        )
        .await
        .unwrap();

    assert_eq!(cache.get("round_trip").await.unwrap(), Some(payload));
    assert_eq!(cache.get("never_written").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_warm_cache_uses_shorter_ttl() {
    let cache = create_warm_cache(&redis_config().await).await.unwrap();

    let ttl = EntryTtl::absolute(Duration::from_secs(60)).with_sliding(Duration::from_millis(300));
    cache
        .set("short_lived", Arc::new(b"v".to_vec()), ttl)
        .await
        .unwrap();
    assert!(cache.get("short_lived").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(cache.get("short_lived").await.unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_redis_reads_as_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = RedisConfig {
        url: format!("redis://{addr}"),
        timeout_ms: 200,
        ..Default::default()
    };
    // Startup does not fail on an unreachable Redis
    let cache = create_warm_cache(&config).await.unwrap();
    assert!(!cache.is_available().await);

    assert!(cache.get("anything").await.is_err());
    assert!(
        cache
            .set(
                "anything",
                Arc::new(b"v".to_vec()),
                EntryTtl::absolute(Duration::from_secs(1))
            )
            .await
            .is_err()
    );
}
