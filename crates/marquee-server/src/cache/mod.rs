//! Two-tier caching for the listing.
//!
//! ## Architecture
//!
//! - **Hot tier (DashMap)**: In-memory, microsecond latency, per-instance
//! - **Warm tier (Redis)**: Network, millisecond latency, shared across instances
//!
//! ## Cache Hierarchy
//!
//! ```text
//! GET /movie → Hot (DashMap) → Warm (Redis) → Origin (HTTP)
//!                  ↓                ↓              ↓
//!             <1µs latency    ~5ms latency   ~100ms latency
//! ```
//!
//! Both tiers hold the same compressed entry bytes. A tier that fails is
//! treated as a miss by the retriever, so an unreachable Redis degrades the
//! service to hot-tier plus origin.

pub mod hot;
pub mod tier;
pub mod warm;

pub use hot::HotCache;
pub use tier::{CacheError, CacheTier, EntryTtl};
pub use warm::{WarmCache, create_warm_cache};
