//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and their read-time
//! freshness classification.

use std::collections::BTreeSet;

use crate::cache::CacheConfig;

// == Freshness ==
/// Read-time classification of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < expires_at`
    Fresh,
    /// Expired, but stale-while-revalidate allows serving it
    Stale,
    /// Expired and not servable
    Expired,
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    /// The stored value
    pub value: V,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    pub ttl_ms: u64,
    /// `created_at + ttl_ms`, saturating
    pub expires_at: u64,
    pub tags: BTreeSet<String>,
    pub stale_while_revalidate: bool,
    /// Grace after `expires_at` during which a stale value is served
    pub stale_window_ms: Option<u64>,
    /// Estimated once, at write time
    pub size_bytes: usize,
    pub last_accessed_at: u64,
    /// Write order within the owning store; final eviction tie-break
    pub sequence: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry written at `now` under `config`.
    pub fn new(key: String, value: V, size_bytes: usize, config: &CacheConfig, now: u64) -> Self {
        let ttl_ms = config.ttl_ms();
        Self {
            key,
            value,
            created_at: now,
            ttl_ms,
            expires_at: now.saturating_add(ttl_ms),
            tags: config.tags.clone(),
            stale_while_revalidate: config.stale_while_revalidate,
            stale_window_ms: config.stale_window_ms(),
            size_bytes,
            last_accessed_at: now,
            sequence: 0,
        }
    }

    // == Freshness ==
    /// Classifies the entry at `now`.
    ///
    /// Boundary condition: once `now` reaches `expires_at` the entry is no
    /// longer fresh. A stale window ends the same way at
    /// `expires_at + window`.
    pub fn freshness(&self, now: u64) -> Freshness {
        if now < self.expires_at {
            return Freshness::Fresh;
        }
        if !self.stale_while_revalidate {
            return Freshness::Expired;
        }
        match self.stale_window_ms {
            Some(window) if now >= self.expires_at.saturating_add(window) => Freshness::Expired,
            _ => Freshness::Stale,
        }
    }

    /// Returns true unless the entry has fully expired.
    pub fn is_servable(&self, now: u64) -> bool {
        self.freshness(now) != Freshness::Expired
    }

    // == Time To Live ==
    /// Returns remaining freshness in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }

    /// Records an access at `now`.
    pub fn touch(&mut self, now: u64) {
        self.last_accessed_at = now;
    }
}
