//! Document metadata cache.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheConfig, Capacity};
use crate::domains::DomainCache;
use crate::error::Result;
use crate::fetch::FetchCoordinator;

pub const NAMESPACE: &str = "document-metadata";
pub const TAG: &str = "documents";

#[derive(Serialize)]
struct DocumentParams<'a> {
    document_id: &'a str,
}

fn tender_tag(tender_id: &str) -> String {
    format!("tender:{tender_id}")
}

fn document_tag(document_id: &str) -> String {
    format!("document:{document_id}")
}

/// Metadata for documents attached to a tender. Entries are tagged with
/// their tender so that editing a tender drops all of its documents.
pub struct DocumentMetadataCache<V> {
    inner: DomainCache<V>,
}

impl<V> DocumentMetadataCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(coordinator: FetchCoordinator<V>, ttl: Duration) -> Self {
        let base = CacheConfig::new(ttl).with_tag(TAG);
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

    pub async fn get_or_fetch<F, Fut>(
        &self,
        tender_id: &str,
        document_id: &str,
        fetch_fn: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let params = DocumentParams { document_id };
        let tags = vec![tender_tag(tender_id), document_tag(document_id)];
        self.inner.fetch(&params, tags, fetch_fn).await
    }

    pub async fn invalidate_document(&self, document_id: &str) -> usize {
        self.inner.invalidate(&document_tag(document_id)).await
    }

    pub async fn invalidate_tender(&self, tender_id: &str) -> usize {
        self.inner.invalidate(&tender_tag(tender_id)).await
    }
}
