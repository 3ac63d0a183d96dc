//! Configuration Module
//!
//! Handles loading cache and admin server settings from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheConfig, Capacity};

/// Engine configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default entry-count capacity
    pub max_entries: usize,
    /// Default TTL in milliseconds for admin writes without an explicit TTL
    pub default_ttl_ms: u64,
    /// Stale grace in milliseconds for SWR domains; 0 = until removed
    pub stale_window_ms: u64,
    pub research_session_ttl_ms: u64,
    pub document_metadata_ttl_ms: u64,
    pub search_results_ttl_ms: u64,
    /// Admin HTTP server port
    pub admin_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL (default: 300000)
    /// - `CACHE_STALE_WINDOW_MS` - Stale grace window (default: 0, unbounded)
    /// - `RESEARCH_SESSION_TTL_MS` - (default: 300000)
    /// - `DOCUMENT_METADATA_TTL_MS` - (default: 600000)
    /// - `SEARCH_RESULTS_TTL_MS` - (default: 120000)
    /// - `ADMIN_PORT` - Admin HTTP port (default: 3000)
    ///
    /// Unparseable or zero-valued limits fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: positive_var("CACHE_MAX_ENTRIES", defaults.max_entries),
            default_ttl_ms: positive_var("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            stale_window_ms: var_or("CACHE_STALE_WINDOW_MS", defaults.stale_window_ms),
            research_session_ttl_ms: positive_var(
                "RESEARCH_SESSION_TTL_MS",
                defaults.research_session_ttl_ms,
            ),
            document_metadata_ttl_ms: positive_var(
                "DOCUMENT_METADATA_TTL_MS",
                defaults.document_metadata_ttl_ms,
            ),
            search_results_ttl_ms: positive_var(
                "SEARCH_RESULTS_TTL_MS",
                defaults.search_results_ttl_ms,
            ),
            admin_port: var_or("ADMIN_PORT", defaults.admin_port),
        }
    }

    /// Base entry config for writes that do not specify their own.
    pub fn cache_defaults(&self) -> CacheConfig {
        CacheConfig::with_ttl_ms(self.default_ttl_ms)
            .with_capacity(Capacity::Entries(self.max_entries))
    }

    /// Stale grace window, `None` when unbounded.
    pub fn stale_window(&self) -> Option<Duration> {
        (self.stale_window_ms > 0).then(|| Duration::from_millis(self.stale_window_ms))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl_ms: 300_000,
            stale_window_ms: 0,
            research_session_ttl_ms: 300_000,
            document_metadata_ttl_ms: 600_000,
            search_results_ttl_ms: 120_000,
            admin_port: 3000,
        }
    }
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like `var_or`, but zero is never a usable limit.
fn positive_var<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialEq + Default,
{
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|v: &T| *v != T::default())
        .unwrap_or(default)
}
