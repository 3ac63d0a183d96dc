//! Domain Caches
//!
//! Thin wrappers that fix namespace, TTL, tags and stale-while-revalidate per
//! domain and otherwise call straight through the fetch coordinator.

mod documents;
mod research;
mod search;

pub use documents::DocumentMetadataCache;
pub use research::ResearchSessionCache;
pub use search::SearchResultsCache;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheConfig, Capacity};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::FetchCoordinator;

// == Domain Caches ==
/// The three domain caches over one coordinator, configured from `Config`.
pub struct DomainCaches<V> {
    pub research: ResearchSessionCache<V>,
    pub documents: DocumentMetadataCache<V>,
    pub search: SearchResultsCache<V>,
}

impl<V> DomainCaches<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn from_config(coordinator: &FetchCoordinator<V>, config: &Config) -> Self {
        let capacity = Capacity::Entries(config.max_entries);
        let stale_window = config.stale_window();
        Self {
            research: ResearchSessionCache::new(
                coordinator.clone(),
                Duration::from_millis(config.research_session_ttl_ms),
                stale_window,
            )
            .with_capacity(capacity),
            documents: DocumentMetadataCache::new(
                coordinator.clone(),
                Duration::from_millis(config.document_metadata_ttl_ms),
            )
            .with_capacity(capacity),
            search: SearchResultsCache::new(
                coordinator.clone(),
                Duration::from_millis(config.search_results_ttl_ms),
                stale_window,
            )
            .with_capacity(capacity),
        }
    }
}

// == Domain Cache ==
/// Namespace plus base config shared by every domain wrapper.
pub(crate) struct DomainCache<V> {
    namespace: &'static str,
    base: CacheConfig,
    coordinator: FetchCoordinator<V>,
}

impl<V> DomainCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        namespace: &'static str,
        base: CacheConfig,
        coordinator: FetchCoordinator<V>,
    ) -> Self {
        Self {
            namespace,
            base,
            coordinator,
        }
    }

    pub(crate) fn set_capacity(&mut self, capacity: Capacity) {
        self.base.capacity = capacity;
    }

    pub(crate) fn namespace(&self) -> &'static str {
        self.namespace
    }

    /// Base config extended with per-call tags.
    pub(crate) fn config_with<I>(&self, tags: I) -> CacheConfig
    where
        I: IntoIterator<Item = String>,
    {
        self.base.clone().with_tags(tags)
    }

    pub(crate) async fn fetch<P, F, Fut>(
        &self,
        params: &P,
        tags: Vec<String>,
        fetch_fn: F,
    ) -> Result<V>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let config = self.config_with(tags);
        self.coordinator
            .fetch_with(self.namespace, params, fetch_fn, &config)
            .await
    }

    pub(crate) async fn invalidate(&self, tag: &str) -> usize {
        self.coordinator.store().write().await.invalidate_by_tag(tag)
    }
}
