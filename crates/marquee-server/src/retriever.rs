//! Cache-aside retrieval of the listing.
//!
//! Lookup order is hot tier, warm tier, origin. Whatever the origin yields
//! (or the empty listing when it answers with an application-level failure)
//! is encoded once and written to both tiers. Tier failures and corrupt
//! entries degrade to a miss; only an unreachable origin is an error.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use marquee_core::{MovieCollection, PayloadCodec};
use tokio::sync::broadcast;

use crate::cache::{CacheTier, EntryTtl};
use crate::config::CacheConfig;
use crate::error::RetrievalError;
use crate::metrics;
use crate::origin::OriginClient;

/// Where a retrieved listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Hot,
    Warm,
    Origin,
    /// Empty listing substituted for an application-level origin failure.
    Fallback,
}

impl FetchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Origin => "origin",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful retrieval.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub collection: Arc<MovieCollection>,
    pub elapsed: Duration,
    pub source: FetchSource,
}

/// Key and expirations the retriever caches under.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub key: String,
    pub hot_ttl: EntryTtl,
    pub warm_ttl: EntryTtl,
    pub single_flight: bool,
}

impl RetrievalPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            key: config.key.clone(),
            hot_ttl: config.hot.ttl(),
            warm_ttl: config.warm.ttl(),
            single_flight: config.single_flight,
        }
    }
}

type Outcome = Result<(Arc<MovieCollection>, FetchSource), RetrievalError>;

/// At most one origin load in flight; its outcome, success or failure, is
/// broadcast to every caller that missed while it ran.
#[derive(Default)]
struct SingleFlight {
    current: Mutex<Option<(u64, broadcast::Sender<Outcome>)>>,
    next_id: AtomicU64,
}

enum Role<'a> {
    Leader(Flight<'a>),
    Follower(broadcast::Receiver<Outcome>),
}

/// Leadership of the running load. Dropping it without completing (the
/// leader's future was cancelled) closes the channel so followers retry.
struct Flight<'a> {
    group: &'a SingleFlight,
    id: u64,
    tx: broadcast::Sender<Outcome>,
}

impl SingleFlight {
    fn join(&self) -> Role<'_> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, tx)) = current.as_ref() {
            return Role::Follower(tx.subscribe());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = broadcast::channel(1);
        *current = Some((id, tx.clone()));
        Role::Leader(Flight {
            group: self,
            id,
            tx,
        })
    }

    fn finish(&self, id: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(current.as_ref(), Some((running, _)) if *running == id) {
            *current = None;
        }
    }
}

impl Flight<'_> {
    fn complete(self, outcome: Outcome) {
        // Later misses start a new flight instead of joining this one
        self.group.finish(self.id);
        let _ = self.tx.send(outcome);
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.group.finish(self.id);
    }
}

/// Hot → warm → origin lookup with write-back to both tiers.
pub struct CacheAsideRetriever {
    hot: Arc<dyn CacheTier>,
    warm: Arc<dyn CacheTier>,
    origin: Arc<dyn OriginClient>,
    payload: PayloadCodec,
    policy: RetrievalPolicy,
    // Shares one origin load between concurrent misses when enabled
    flight: Option<SingleFlight>,
}

impl CacheAsideRetriever {
    pub fn new(
        hot: Arc<dyn CacheTier>,
        warm: Arc<dyn CacheTier>,
        origin: Arc<dyn OriginClient>,
        payload: PayloadCodec,
        policy: RetrievalPolicy,
    ) -> Self {
        let flight = policy.single_flight.then(SingleFlight::default);
        Self {
            hot,
            warm,
            origin,
            payload,
            policy,
            flight,
        }
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    /// Return the listing, consulting the origin only on a full miss.
    pub async fn fetch(&self) -> Result<FetchResult, RetrievalError> {
        let started = Instant::now();
        let (collection, source) = self.resolve().await?;
        let elapsed = started.elapsed();

        metrics::record_retrieval(source.as_str(), elapsed);
        tracing::debug!(
            source = %source,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            items = collection.len(),
            "Listing retrieved"
        );

        Ok(FetchResult {
            collection,
            elapsed,
            source,
        })
    }

    async fn resolve(&self) -> Outcome {
        if let Some(hit) = self.read_tiers().await {
            return Ok(hit);
        }
        let Some(flight) = &self.flight else {
            return self.load_after_miss().await;
        };

        loop {
            match flight.join() {
                Role::Leader(leader) => {
                    // A flight that finished since our lookup may have filled the tiers
                    let outcome = match self.read_tiers().await {
                        Some(hit) => Ok(hit),
                        None => self.load_after_miss().await,
                    };
                    leader.complete(outcome.clone());
                    return outcome;
                }
                Role::Follower(mut rx) => match rx.recv().await {
                    Ok(outcome) => return outcome,
                    Err(_) => {
                        tracing::debug!("In-flight origin load was abandoned, retrying");
                    }
                },
            }
        }
    }

    async fn load_after_miss(&self) -> Outcome {
        metrics::record_cache_miss();
        tracing::debug!(key = %self.policy.key, "Cache miss on both tiers");
        let (collection, source) = self.load_from_origin().await?;
        Ok((Arc::new(collection), source))
    }

    async fn read_tiers(&self) -> Option<(Arc<MovieCollection>, FetchSource)> {
        if let Some((collection, _)) = self.read_tier(self.hot.as_ref()).await {
            return Some((Arc::new(collection), FetchSource::Hot));
        }

        let (collection, bytes) = self.read_tier(self.warm.as_ref()).await?;
        if let Err(e) = self
            .hot
            .set(&self.policy.key, bytes, self.policy.hot_ttl)
            .await
        {
            tracing::warn!(error = %e, "Failed to promote warm entry to hot tier");
        }
        Some((Arc::new(collection), FetchSource::Warm))
    }

    /// Read and decode one tier. Failures of any kind read as a miss.
    async fn read_tier(&self, tier: &dyn CacheTier) -> Option<(MovieCollection, Arc<Vec<u8>>)> {
        let key = &self.policy.key;
        let bytes = match tier.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(tier = tier.name(), key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(tier = tier.name(), key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        match self.payload.decode(&bytes) {
            Ok(collection) => {
                metrics::record_cache_hit(tier.name());
                tracing::debug!(tier = tier.name(), key = %key, "Cache hit");
                Some((collection, bytes))
            }
            Err(e) => {
                metrics::record_corrupt_entry(tier.name());
                tracing::warn!(
                    tier = tier.name(),
                    key = %key,
                    kind = e.kind(),
                    error = %e,
                    "Discarding corrupt cache entry"
                );
                None
            }
        }
    }

    async fn load_from_origin(&self) -> Result<(MovieCollection, FetchSource), RetrievalError> {
        let (collection, source) = match self.origin.fetch().await {
            Ok(collection) => {
                metrics::record_origin_request("ok");
                tracing::info!(items = collection.len(), "Listing loaded from origin");
                (collection, FetchSource::Origin)
            }
            Err(e) if e.is_transport() => {
                metrics::record_origin_request(e.kind());
                tracing::error!(kind = e.kind(), error = %e, "Origin unreachable");
                return Err(RetrievalError::OriginUnavailable(e));
            }
            Err(e) => {
                metrics::record_origin_request(e.kind());
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    "Origin failed, caching the empty listing"
                );
                (MovieCollection::empty(), FetchSource::Fallback)
            }
        };

        self.store(&collection).await;
        Ok((collection, source))
    }

    async fn store(&self, collection: &MovieCollection) {
        let bytes = match self.payload.encode(collection) {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Failed to encode listing, not caching");
                return;
            }
        };

        let key = &self.policy.key;
        if let Err(e) = self
            .warm
            .set(key, Arc::clone(&bytes), self.policy.warm_ttl)
            .await
        {
            tracing::warn!(tier = self.warm.name(), error = %e, "Cache write failed");
        }
        if let Err(e) = self.hot.set(key, bytes, self.policy.hot_ttl).await {
            tracing::warn!(tier = self.hot.name(), error = %e, "Cache write failed");
        }
    }
}
