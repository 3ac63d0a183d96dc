//! Cache Module
//!
//! Provides the in-memory store with TTL, stale-while-revalidate, tag-based
//! invalidation and least-recently-accessed eviction, plus deterministic key
//! derivation.

mod clock;
mod config;
mod entry;
mod key;
mod stats;
mod store;
mod tags;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CacheConfig, Capacity, DEFAULT_MAX_ENTRIES};
pub use entry::{CacheEntry, Freshness};
pub use key::{generate_key, NAMESPACE_SEPARATOR};
pub use stats::CacheStats;
pub use store::{CacheStore, Lookup, SizeEstimator};
pub use tags::TagIndex;
