use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

use marquee_core::{Codec, CompressionLevel, DEFAULT_MAX_DECOMPRESSED};

use crate::cache::EntryTtl;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote API the listing is fetched from
    #[serde(default)]
    pub origin: OriginConfig,
    /// Hot/warm tier policy
    #[serde(default)]
    pub cache: CacheConfig,
    /// Redis connection for the warm tier
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        self.origin.validate()?;
        self.cache.validate()?;
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Origin API settings.
///
/// The bearer token is never written back out when the config is
/// serialized. Prefer `MARQUEE__ORIGIN__BEARER_TOKEN` over the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_url")]
    pub url: String,

    #[serde(default, skip_serializing)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request deadline in milliseconds
    #[serde(default = "default_origin_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_origin_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Responses larger than this are treated as malformed
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_origin_url() -> String {
    "https://api.themoviedb.org/3/movie/now_playing".into()
}
fn default_user_agent() -> String {
    concat!("marquee/", env!("CARGO_PKG_VERSION")).into()
}
fn default_origin_timeout_ms() -> u64 {
    10_000
}
fn default_origin_connect_timeout_ms() -> u64 {
    5_000
}
fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: default_origin_url(),
            bearer_token: None,
            user_agent: default_user_agent(),
            timeout_ms: default_origin_timeout_ms(),
            connect_timeout_ms: default_origin_connect_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl OriginConfig {
    fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.url).map_err(|e| format!("origin.url is invalid: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("origin.url must use http or https".into());
        }
        if self.timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err("origin timeouts must be > 0".into());
        }
        if self.max_body_bytes == 0 {
            return Err("origin.max_body_bytes must be > 0".into());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key of the single cached listing
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// In-process tier expiration
    #[serde(default)]
    pub hot: HotTtlConfig,

    /// Shared (Redis) tier expiration
    #[serde(default)]
    pub warm: WarmTtlConfig,

    /// Collapse concurrent misses into a single origin call
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,

    /// gzip level for cache entries (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Entries that inflate past this many bytes are treated as corrupt
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: usize,
}

fn default_cache_key() -> String {
    "MoviesList".into()
}
fn default_single_flight() -> bool {
    true
}
fn default_compression_level() -> u32 {
    CompressionLevel::fastest().get()
}
fn default_max_entry_bytes() -> usize {
    DEFAULT_MAX_DECOMPRESSED
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            hot: HotTtlConfig::default(),
            warm: WarmTtlConfig::default(),
            single_flight: default_single_flight(),
            compression_level: default_compression_level(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("cache.key must not be empty".into());
        }
        validate_ttl("cache.hot", self.hot.absolute_secs)?;
        validate_ttl("cache.warm", self.warm.absolute_secs)?;
        if self.hot.absolute_secs > self.warm.absolute_secs {
            return Err("cache.hot.absolute_secs must be <= cache.warm.absolute_secs".into());
        }
        if self.hot.ttl().effective() > self.warm.ttl().effective() {
            return Err("cache.hot expiration must not outlive cache.warm".into());
        }
        if CompressionLevel::new(self.compression_level).is_none() {
            return Err(format!(
                "cache.compression_level must be <= {}",
                CompressionLevel::MAX
            ));
        }
        if self.max_entry_bytes == 0 {
            return Err("cache.max_entry_bytes must be > 0".into());
        }
        Ok(())
    }

    pub fn compression(&self) -> CompressionLevel {
        CompressionLevel::new(self.compression_level).unwrap_or_default()
    }

    /// Codec for cache entries at the configured level and size bound.
    pub fn codec(&self) -> Codec {
        Codec::new(self.compression()).with_max_decompressed(self.max_entry_bytes)
    }
}

/// Hot tier expiration, in seconds. `sliding_secs = 0` disables the sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotTtlConfig {
    #[serde(default = "default_hot_absolute_secs")]
    pub absolute_secs: u64,
    #[serde(default = "default_hot_sliding_secs")]
    pub sliding_secs: Option<u64>,
}

fn default_hot_absolute_secs() -> u64 {
    10
}
fn default_hot_sliding_secs() -> Option<u64> {
    Some(10)
}

impl Default for HotTtlConfig {
    fn default() -> Self {
        Self {
            absolute_secs: default_hot_absolute_secs(),
            sliding_secs: default_hot_sliding_secs(),
        }
    }
}

impl HotTtlConfig {
    pub fn ttl(&self) -> EntryTtl {
        entry_ttl(self.absolute_secs, self.sliding_secs)
    }
}

/// Warm tier expiration, in seconds. `sliding_secs = 0` disables the sliding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmTtlConfig {
    #[serde(default = "default_warm_absolute_secs")]
    pub absolute_secs: u64,
    #[serde(default = "default_warm_sliding_secs")]
    pub sliding_secs: Option<u64>,
}

fn default_warm_absolute_secs() -> u64 {
    60
}
fn default_warm_sliding_secs() -> Option<u64> {
    Some(60)
}

impl Default for WarmTtlConfig {
    fn default() -> Self {
        Self {
            absolute_secs: default_warm_absolute_secs(),
            sliding_secs: default_warm_sliding_secs(),
        }
    }
}

impl WarmTtlConfig {
    pub fn ttl(&self) -> EntryTtl {
        entry_ttl(self.absolute_secs, self.sliding_secs)
    }
}

fn entry_ttl(absolute_secs: u64, sliding_secs: Option<u64>) -> EntryTtl {
    EntryTtl {
        absolute: Duration::from_secs(absolute_secs),
        sliding: sliding_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs),
    }
}

fn validate_ttl(section: &str, absolute_secs: u64) -> Result<(), String> {
    if absolute_secs == 0 {
        return Err(format!("{section}.absolute_secs must be > 0"));
    }
    Ok(())
}

/// Redis configuration for the warm tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("marquee.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., MARQUEE__CACHE__SINGLE_FLIGHT=false
        builder = builder.add_source(
            Environment::with_prefix("MARQUEE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
