//! Cache-aside behaviour against in-memory tiers and scripted origins.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use marquee_core::{Movie, MovieCollection, PayloadCodec};
use marquee_server::{
    CacheAsideRetriever, CacheConfig, CacheError, CacheTier, EntryTtl, FetchSource, OriginClient,
    OriginError, RetrievalPolicy,
};

const KEY: &str = "MoviesList";

/// Tier that records every call and can be told to fail.
#[derive(Default)]
struct RecordingTier {
    entries: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    writes: Mutex<Vec<(String, EntryTtl)>>,
    gets: AtomicUsize,
    unavailable: bool,
}

impl RecordingTier {
    fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(bytes));
    }

    fn stored(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn writes(&self) -> Vec<(String, EntryTtl)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheTier for RecordingTier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(CacheError::Unavailable("connection refused".into()));
        }
        Ok(self.stored(key))
    }

    async fn set(&self, key: &str, value: Arc<Vec<u8>>, ttl: EntryTtl) -> Result<(), CacheError> {
        if self.unavailable {
            return Err(CacheError::Unavailable("connection refused".into()));
        }
        self.writes.lock().unwrap().push((key.to_string(), ttl));
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Origin that replays a script of outcomes, repeating the last one.
struct ScriptedOrigin {
    script: Mutex<VecDeque<Result<MovieCollection, OriginError>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedOrigin {
    fn new(outcomes: Vec<Result<MovieCollection, OriginError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn returning(outcome: Result<MovieCollection, OriginError>) -> Self {
        Self::new(vec![outcome])
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginClient for ScriptedOrigin {
    async fn fetch(&self) -> Result<MovieCollection, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

struct Harness {
    retriever: Arc<CacheAsideRetriever>,
    hot: Arc<RecordingTier>,
    warm: Arc<RecordingTier>,
    origin: Arc<ScriptedOrigin>,
}

fn harness_with(
    hot: RecordingTier,
    warm: RecordingTier,
    origin: ScriptedOrigin,
    single_flight: bool,
) -> Harness {
    let hot = Arc::new(hot);
    let warm = Arc::new(warm);
    let origin = Arc::new(origin);
    let mut policy = RetrievalPolicy::from_config(&CacheConfig::default());
    policy.single_flight = single_flight;

    let retriever = CacheAsideRetriever::new(
        hot.clone(),
        warm.clone(),
        origin.clone(),
        PayloadCodec::default(),
        policy,
    );
    Harness {
        retriever: Arc::new(retriever),
        hot,
        warm,
        origin,
    }
}

fn harness(origin: ScriptedOrigin) -> Harness {
    harness_with(
        RecordingTier::default(),
        RecordingTier::default(),
        origin,
        true,
    )
}

fn listing(n: i64) -> MovieCollection {
    let mut collection = MovieCollection::empty();
    collection.page = 1;
    collection.total_pages = 1;
    collection.total_results = n;
    collection.results = (1..=n)
        .map(|id| {
            let mut movie = Movie::new(id, format!("Movie {id}"));
            movie.vote_average = 6.5 + id as f64 / 10.0;
            movie.genre_ids = vec![18, 53];
            movie
        })
        .collect();
    collection
}

fn encode(collection: &MovieCollection) -> Vec<u8> {
    PayloadCodec::default().encode(collection).unwrap()
}

fn decode(bytes: &[u8]) -> MovieCollection {
    PayloadCodec::default().decode(bytes).unwrap()
}

#[tokio::test]
async fn hot_hit_skips_warm_and_origin() {
    let h = harness(ScriptedOrigin::returning(Ok(listing(1))));
    h.hot.seed(KEY, encode(&listing(3)));

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Hot);
    assert_eq!(*result.collection, listing(3));
    assert_eq!(h.warm.gets(), 0);
    assert_eq!(h.origin.calls(), 0);
}

#[tokio::test]
async fn warm_hit_is_promoted_to_hot() {
    let h = harness(ScriptedOrigin::returning(Ok(listing(1))));
    let bytes = encode(&listing(2));
    h.warm.seed(KEY, bytes.clone());

    let first = h.retriever.fetch().await.unwrap();
    assert_eq!(first.source, FetchSource::Warm);
    assert_eq!(*first.collection, listing(2));

    // Same representation in both tiers, under the hot expiration
    assert_eq!(h.hot.stored(KEY).as_deref(), Some(&bytes));
    let writes = h.hot.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].1, CacheConfig::default().hot.ttl());

    let second = h.retriever.fetch().await.unwrap();
    assert_eq!(second.source, FetchSource::Hot);
    assert_eq!(*second.collection, listing(2));
    assert_eq!(h.warm.gets(), 1);
    assert_eq!(h.origin.calls(), 0);
}

#[tokio::test]
async fn transport_failure_propagates_without_writes() {
    let h = harness(ScriptedOrigin::returning(Err(OriginError::Transport(
        "connection refused".into(),
    ))));

    let err = h.retriever.fetch().await.unwrap_err();

    assert_eq!(err.kind(), "origin_transport");
    assert!(h.hot.writes().is_empty());
    assert!(h.warm.writes().is_empty());
}

#[tokio::test]
async fn timeout_propagates_as_its_own_kind() {
    let h = harness(ScriptedOrigin::returning(Err(OriginError::Timeout(
        Duration::from_secs(10),
    ))));

    let err = h.retriever.fetch().await.unwrap_err();

    assert_eq!(err.kind(), "origin_timeout");
    assert!(h.hot.stored(KEY).is_none());
}

#[tokio::test]
async fn non_success_status_caches_empty_default_in_both_tiers() {
    let h = harness(ScriptedOrigin::returning(Err(OriginError::Status(503))));

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Fallback);
    let fallback = &*result.collection;
    assert_eq!(fallback.page, 0);
    assert_eq!(fallback.total_pages, 0);
    assert_eq!(fallback.total_results, 0);
    assert!(fallback.results.is_empty());

    assert_eq!(decode(&h.hot.stored(KEY).unwrap()), MovieCollection::empty());
    assert_eq!(decode(&h.warm.stored(KEY).unwrap()), MovieCollection::empty());

    // Cached fallback is served without another origin call
    let again = h.retriever.fetch().await.unwrap();
    assert_eq!(again.source, FetchSource::Hot);
    assert_eq!(h.origin.calls(), 1);
}

#[tokio::test]
async fn malformed_body_is_an_application_failure() {
    let h = harness(ScriptedOrigin::returning(Err(OriginError::Malformed(
        "expected value at line 1".into(),
    ))));

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Fallback);
    assert!(result.collection.is_empty());
}

#[tokio::test]
async fn origin_listing_is_written_to_both_tiers() {
    let origin = ScriptedOrigin::returning(Ok(listing(4))).with_delay(Duration::from_millis(5));
    let h = harness(origin);

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Origin);
    assert_eq!(*result.collection, listing(4));
    assert!(result.elapsed > Duration::ZERO);

    let hot = h.hot.stored(KEY).unwrap();
    let warm = h.warm.stored(KEY).unwrap();
    assert_eq!(hot, warm);
    assert_eq!(decode(&hot), listing(4));

    let defaults = CacheConfig::default();
    assert_eq!(h.warm.writes(), vec![(KEY.to_string(), defaults.warm.ttl())]);
    assert_eq!(h.hot.writes(), vec![(KEY.to_string(), defaults.hot.ttl())]);
}

#[tokio::test]
async fn corrupt_hot_entry_falls_through_to_warm() {
    let h = harness(ScriptedOrigin::returning(Ok(listing(1))));
    h.hot.seed(KEY, b"definitely not gzip".to_vec());
    h.warm.seed(KEY, encode(&listing(5)));

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Warm);
    assert_eq!(*result.collection, listing(5));
    assert_eq!(h.origin.calls(), 0);
    // The good bytes replace the corrupt ones
    assert_eq!(decode(&h.hot.stored(KEY).unwrap()), listing(5));
}

#[tokio::test]
async fn corrupt_entries_in_both_tiers_reach_origin() {
    let h = harness(ScriptedOrigin::returning(Ok(listing(2))));
    h.hot.seed(KEY, Vec::new());
    h.warm.seed(KEY, vec![0x1f, 0x8b, 0x08]);

    let result = h.retriever.fetch().await.unwrap();

    assert_eq!(result.source, FetchSource::Origin);
    assert_eq!(decode(&h.warm.stored(KEY).unwrap()), listing(2));
}

#[tokio::test]
async fn unavailable_warm_tier_reads_as_miss() {
    let h = harness_with(
        RecordingTier::default(),
        RecordingTier::unavailable(),
        ScriptedOrigin::returning(Ok(listing(3))),
        true,
    );

    let result = h.retriever.fetch().await.unwrap();
    assert_eq!(result.source, FetchSource::Origin);
    assert_eq!(decode(&h.hot.stored(KEY).unwrap()), listing(3));

    let again = h.retriever.fetch().await.unwrap();
    assert_eq!(again.source, FetchSource::Hot);
    assert_eq!(h.origin.calls(), 1);
}

#[tokio::test]
async fn origin_recovers_after_transport_failure() {
    let h = harness(ScriptedOrigin::new(vec![
        Err(OriginError::Transport("reset by peer".into())),
        Ok(listing(2)),
    ]));

    assert!(h.retriever.fetch().await.is_err());
    let result = h.retriever.fetch().await.unwrap();
    assert_eq!(result.source, FetchSource::Origin);
    assert_eq!(h.origin.calls(), 2);
}

#[tokio::test]
async fn single_flight_coalesces_concurrent_misses() {
    let origin = ScriptedOrigin::returning(Ok(listing(3))).with_delay(Duration::from_millis(100));
    let h = harness(origin);

    let results = join_all((0..8).map(|_| {
        let retriever = Arc::clone(&h.retriever);
        tokio::spawn(async move { retriever.fetch().await })
    }))
    .await;

    for result in results {
        let result = result.unwrap().unwrap();
        assert_eq!(*result.collection, listing(3));
    }
    assert_eq!(h.origin.calls(), 1);
}

#[tokio::test]
async fn without_single_flight_each_miss_calls_origin() {
    let origin = ScriptedOrigin::returning(Ok(listing(3))).with_delay(Duration::from_millis(100));
    let h = harness_with(
        RecordingTier::default(),
        RecordingTier::default(),
        origin,
        false,
    );

    let results = join_all((0..4).map(|_| {
        let retriever = Arc::clone(&h.retriever);
        tokio::spawn(async move { retriever.fetch().await })
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap().unwrap().source, FetchSource::Origin);
    }
    assert_eq!(h.origin.calls(), 4);
}

#[tokio::test]
async fn single_flight_shares_transport_failure() {
    let origin = ScriptedOrigin::returning(Err(OriginError::Timeout(Duration::from_millis(50))))
        .with_delay(Duration::from_millis(50));
    let h = harness(origin);

    let started = std::time::Instant::now();
    let results = join_all((0..8).map(|_| {
        let retriever = Arc::clone(&h.retriever);
        tokio::spawn(async move { retriever.fetch().await })
    }))
    .await;

    for result in results {
        let err = result.unwrap().unwrap_err();
        assert_eq!(err.kind(), "origin_timeout");
    }
    assert_eq!(h.origin.calls(), 1);
    // Callers wait for one deadline, not one per caller
    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(h.hot.writes().is_empty());
    assert!(h.warm.writes().is_empty());

    // The failed load is not remembered; the next miss tries the origin again
    assert!(h.retriever.fetch().await.is_err());
    assert_eq!(h.origin.calls(), 2);
}

#[tokio::test]
async fn waiters_take_over_when_loading_caller_is_cancelled() {
    let origin = ScriptedOrigin::returning(Ok(listing(2))).with_delay(Duration::from_millis(100));
    let h = harness(origin);

    let leader = {
        let retriever = Arc::clone(&h.retriever);
        tokio::spawn(async move { retriever.fetch().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let retriever = Arc::clone(&h.retriever);
            tokio::spawn(async move { retriever.fetch().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;
    leader.abort();

    for result in join_all(waiters).await {
        assert_eq!(*result.unwrap().unwrap().collection, listing(2));
    }
    assert_eq!(h.origin.calls(), 2);
}
