//! Research session cache.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheConfig, Capacity};
use crate::domains::DomainCache;
use crate::error::Result;
use crate::fetch::FetchCoordinator;

pub const NAMESPACE: &str = "research-session";
/// Carried by every research session entry
pub const TAG: &str = "research";

#[derive(Serialize)]
struct SessionParams<'a> {
    session_id: &'a str,
}

fn session_tag(session_id: &str) -> String {
    format!("research:{session_id}")
}

/// Research sessions change while a user works on them, so stale sessions
/// are served while a refresh runs.
pub struct ResearchSessionCache<V> {
    inner: DomainCache<V>,
}

impl<V> ResearchSessionCache<V>
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

    pub async fn get_or_fetch<F, Fut>(&self, session_id: &str, fetch_fn: F) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let params = SessionParams { session_id };
        self.inner
            .fetch(&params, vec![session_tag(session_id)], fetch_fn)
            .await
    }

    /// Drops the cached copy of one session.
    pub async fn invalidate_session(&self, session_id: &str) -> usize {
        self.inner.invalidate(&session_tag(session_id)).await
    }

    /// Drops every cached session, e.g. on sign-out.
    pub async fn invalidate_all(&self) -> usize {
        self.inner.invalidate(TAG).await
    }
}
