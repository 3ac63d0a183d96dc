//! Tender Cache - in-memory caching and request coalescing
//!
//! Provides a tag-aware TTL cache with LRU eviction, a fetch coordinator that
//! deduplicates concurrent loads and serves stale values while refreshing,
//! and an HTTP admin surface over the shared store.

pub mod api;
pub mod cache;
pub mod config;
pub mod domains;
pub mod error;
pub mod fetch;
pub mod models;

pub use api::AppState;
pub use cache::{generate_key, CacheConfig, CacheStore, Capacity, Lookup};
pub use config::Config;
pub use domains::DomainCaches;
pub use error::{CacheError, Result};
pub use fetch::{CancelHandle, FetchCoordinator, Pending, SharedStore};
