//! Request DTOs for the cache admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LENGTH: usize = 4096;

/// Request body for writing an entry (PUT /entries)
///
/// Omitted fields fall back to the server's default cache config.
#[derive(Debug, Clone, Deserialize)]
pub struct SetEntryRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: serde_json::Value,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub stale_while_revalidate: bool,
    /// Stale grace window; absent = unbounded
    #[serde(default)]
    pub stale_window_ms: Option<u64>,
}

impl SetEntryRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        None
    }

    /// Builds the entry config on top of `defaults`.
    pub fn to_config(&self, defaults: &CacheConfig) -> CacheConfig {
        let mut config = defaults.clone().with_tags(self.tags.iter().cloned());
        if let Some(ttl_ms) = self.ttl_ms {
            config.ttl = Duration::from_millis(ttl_ms);
        }
        if self.stale_while_revalidate {
            config = config.stale_while_revalidate(self.stale_window_ms.map(Duration::from_millis));
        }
        config
    }
}
