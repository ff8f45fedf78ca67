//! In-process hot tier.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::tier::{CacheError, CacheTier, EntryTtl};

/// A cached entry with absolute and sliding expiration.
///
/// The data is wrapped in `Arc` so hits and tier-to-tier copies never
/// clone the payload.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub last_access: Instant,
    pub ttl: EntryTtl,
}

impl CachedEntry {
    pub fn new(data: Arc<Vec<u8>>, ttl: EntryTtl) -> Self {
        let now = Instant::now();
        Self {
            data,
            cached_at: now,
            last_access: now,
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        if now.saturating_duration_since(self.cached_at) >= self.ttl.absolute {
            return true;
        }
        match self.ttl.sliding {
            Some(sliding) => now.saturating_duration_since(self.last_access) >= sliding,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// Process-local tier backed by `DashMap`.
///
/// Construct one per process and share it (it is cheap to clone) with
/// everything that needs it.
#[derive(Clone, Default)]
pub struct HotCache {
    entries: Arc<DashMap<String, CachedEntry>>,
}

impl HotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry, refreshing its sliding window.
    pub fn get_entry(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired_at(now) {
                entry.last_access = now;
                return Some(Arc::clone(&entry.data));
            }
        } else {
            return None;
        }

        // Remove expired entry, unless a writer replaced it meanwhile
        self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        None
    }

    pub fn insert(&self, key: &str, data: Arc<Vec<u8>>, ttl: EntryTtl) {
        self.entries
            .insert(key.to_string(), CachedEntry::new(data, ttl));
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Start background purge of entries nobody reads again.
    pub fn start_purge_task(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged = purged, "Purged expired hot tier entries");
                    crate::metrics::set_cache_entries("hot", cache.len());
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheTier for HotCache {
    fn name(&self) -> &'static str {
        "hot"
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        Ok(self.get_entry(key))
    }

    async fn set(&self, key: &str, value: Arc<Vec<u8>>, ttl: EntryTtl) -> Result<(), CacheError> {
        self.insert(key, value, ttl);
        crate::metrics::set_cache_entries(self.name(), self.len());
        Ok(())
    }
}
