//! Per-call Cache Configuration
//!
//! Freshness, capacity and tagging settings supplied with every `set` or
//! `fetch`. There is no global entry policy; each write carries its own.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default entry-count capacity when none is given.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// == Capacity ==
/// Budget the store must respect right after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// At most `n` entries
    Entries(usize),
    /// At most `n` estimated bytes across all entries
    Bytes(usize),
}

impl Capacity {
    fn limit(&self) -> usize {
        match *self {
            Capacity::Entries(n) | Capacity::Bytes(n) => n,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Entries(DEFAULT_MAX_ENTRIES)
    }
}

// == Cache Config ==
/// Settings applied to a single entry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Time-to-live, measured from the write
    pub ttl: Duration,
    /// Store budget enforced after the write
    pub capacity: Capacity,
    /// Serve the value after expiry while a refresh runs
    pub stale_while_revalidate: bool,
    /// How long past expiry a stale value may be served; None = until removed
    pub stale_window: Option<Duration>,
    /// Invalidation tags carried by the entry
    pub tags: BTreeSet<String>,
}

impl CacheConfig {
    // == Constructor ==
    /// Creates a config with the given TTL, default capacity, no tags and
    /// stale-while-revalidate disabled.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            capacity: Capacity::default(),
            stale_while_revalidate: false,
            stale_window: None,
            tags: BTreeSet::new(),
        }
    }

    /// Shorthand for `CacheConfig::new(Duration::from_millis(ms))`.
    pub fn with_ttl_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_max_entries(self, max_entries: usize) -> Self {
        self.with_capacity(Capacity::Entries(max_entries))
    }

    pub fn with_max_bytes(self, max_bytes: usize) -> Self {
        self.with_capacity(Capacity::Bytes(max_bytes))
    }

    /// Enables stale-while-revalidate with an optional grace window.
    pub fn stale_while_revalidate(mut self, window: Option<Duration>) -> Self {
        self.stale_while_revalidate = true;
        self.stale_window = window;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    // == Validate ==
    /// Rejects settings that could never produce a valid entry.
    ///
    /// Entries are timed in whole milliseconds, so a ttl or stale window
    /// under 1ms is rejected rather than truncated to zero.
    pub fn validate(&self) -> Result<()> {
        if self.ttl_ms() == 0 {
            return Err(CacheError::Configuration(
                "ttl must be at least 1ms".to_string(),
            ));
        }
        if self.capacity.limit() == 0 {
            return Err(CacheError::Configuration(
                "max size must be greater than zero".to_string(),
            ));
        }
        if self.stale_while_revalidate && self.stale_window_ms() == Some(0) {
            return Err(CacheError::Configuration(
                "stale window must be at least 1ms".to_string(),
            ));
        }
        if self.tags.iter().any(|t| t.is_empty()) {
            return Err(CacheError::Configuration(
                "tags cannot be empty strings".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn ttl_ms(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }

    pub(crate) fn stale_window_ms(&self) -> Option<u64> {
        self.stale_window
            .map(|w| u64::try_from(w.as_millis()).unwrap_or(u64::MAX))
    }
}
