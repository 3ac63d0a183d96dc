//! Search results cache.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheConfig, Capacity};
use crate::domains::DomainCache;
use crate::error::Result;
use crate::fetch::FetchCoordinator;

pub const NAMESPACE: &str = "search";
pub const TAG: &str = "search";

/// Search results keyed by the full query object. Field order in the query
/// does not matter; keys are canonicalized.
pub struct SearchResultsCache<V> {
    inner: DomainCache<V>,
}

impl<V> SearchResultsCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        coordinator: FetchCoordinator<V>,
        ttl: Duration,
        stale_window: Option<Duration>,
    ) -> Self {
        let base = CacheConfig::new(ttl)
            .stale_while_revalidate(stale_window)
            .with_tag(TAG);
        Self {
            inner: DomainCache::new(NAMESPACE, base, coordinator),
        }
    }

    /// Overrides the default store budget enforced after each write.
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.inner.set_capacity(capacity);
        self
    }

    pub fn namespace(&self) -> &'static str {
        self.inner.namespace()
    }

    pub async fn get_or_fetch<Q, F, Fut>(&self, query: &Q, fetch_fn: F) -> Result<V>
    where
        Q: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.inner.fetch(query, Vec::new(), fetch_fn).await
    }

    /// Drops all cached results, e.g. after new documents are indexed.
    pub async fn invalidate_all(&self) -> usize {
        self.inner.invalidate(TAG).await
    }
}
