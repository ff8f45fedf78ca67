//! Contract shared by the hot and warm tiers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Expiration policy for one entry.
///
/// `absolute` bounds the lifetime from the moment of the write; `sliding`,
/// when set, additionally expires the entry after that long without a read.
/// Whichever elapses first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTtl {
    pub absolute: Duration,
    pub sliding: Option<Duration>,
}

impl EntryTtl {
    pub fn absolute(absolute: Duration) -> Self {
        Self {
            absolute,
            sliding: None,
        }
    }

    pub fn with_sliding(mut self, sliding: Duration) -> Self {
        self.sliding = Some(sliding);
        self
    }

    /// Longest an entry can live when nobody reads it.
    pub fn effective(&self) -> Duration {
        match self.sliding {
            Some(sliding) => sliding.min(self.absolute),
            None => self.absolute,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The tier could not be reached (pool exhausted, connection refused).
    #[error("cache tier unavailable: {0}")]
    Unavailable(String),

    /// The tier was reached but the command failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// A key-value store holding compressed cache entries.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Tier label for logs and metrics.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError>;

    async fn set(&self, key: &str, value: Arc<Vec<u8>>, ttl: EntryTtl) -> Result<(), CacheError>;
}
