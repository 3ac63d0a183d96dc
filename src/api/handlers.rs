//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints. All handlers share
//! the same store the fetch coordinator writes to.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheConfig, CacheStore, Lookup};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::fetch::SharedStore;
use crate::models::{
    ClearResponse, DeleteResponse, EntryResponse, EntryStatus, HealthResponse,
    InvalidateResponse, SetEntryRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Store shared with the fetch coordinator
    pub cache: SharedStore<Value>,
    /// Entry config for writes that omit ttl or tags
    pub defaults: CacheConfig,
}

impl AppState {
    /// Creates a new AppState over an existing shared store.
    pub fn new(cache: SharedStore<Value>, defaults: CacheConfig) -> Self {
        Self { cache, defaults }
    }

    /// Creates a new AppState with a fresh JSON store sized from `config`.
    pub fn from_config(config: &Config) -> Self {
        let cache = Arc::new(RwLock::new(CacheStore::json()));
        Self::new(cache, config.cache_defaults())
    }
}

/// Handler for PUT /entries
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetEntryRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let config = req.to_config(&state.defaults);
    let mut cache = state.cache.write().await;
    cache.set(req.key.clone(), req.value, &config)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /entries/:key
///
/// Takes the write lock: a read records stats, touches recency and may drop
/// an expired entry.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<EntryResponse>> {
    let mut cache = state.cache.write().await;
    let (status, value) = match cache.get(&key) {
        Lookup::Fresh(value) => (EntryStatus::Fresh, value),
        Lookup::Stale(value) => (EntryStatus::Stale, value),
        Lookup::Miss => return Err(CacheError::NotFound(key)),
    };

    Ok(Json(EntryResponse { key, status, value }))
}

/// Handler for DELETE /entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let removed = state.cache.write().await.delete(&key);
    Json(DeleteResponse { key, removed })
}

/// Handler for POST /tags/:tag/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<InvalidateResponse> {
    let removed = state.cache.write().await.invalidate_by_tag(&tag);
    info!(tag = %tag, removed, "Invalidated tag");
    Json(InvalidateResponse { tag, removed })
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.write().await.clear();
    info!("Cache cleared");
    Json(ClearResponse::cleared())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.read().await.stats();
    Json(StatsResponse::from(stats))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;

    fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = CacheStore::json().with_clock(clock.clone());
        let state = AppState::new(
            Arc::new(RwLock::new(store)),
            CacheConfig::with_ttl_ms(1000).with_max_entries(100),
        );
        (state, clock)
    }

    fn set_request(key: &str, value: Value) -> SetEntryRequest {
        SetEntryRequest {
            key: key.to_string(),
            value,
            ttl_ms: None,
            tags: Vec::new(),
            stale_while_revalidate: false,
            stale_window_ms: None,
        }
    }

    /// Writes through the handler and returns the response body.
    async fn put(state: &AppState, req: SetEntryRequest) -> SetResponse {
        let Json(response) = set_handler(State(state.clone()), Json(req)).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let (state, _) = test_state();

        let response = put(&state, set_request("user:1", json!({"name": "A"}))).await;
        assert_eq!(response.key, "user:1");

        let response = get_handler(State(state), Path("user:1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status, EntryStatus::Fresh);
        assert_eq!(response.value, json!({"name": "A"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let (state, _) = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_reports_stale() {
        let (state, clock) = test_state();

        let mut req = set_request("user:1", json!(1));
        req.stale_while_revalidate = true;
        req.stale_window_ms = Some(2000);
        put(&state, req).await;

        clock.advance(1500);
        let response = get_handler(State(state.clone()), Path("user:1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status, EntryStatus::Stale);

        clock.advance(2000);
        let result = get_handler(State(state), Path("user:1".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let (state, _) = test_state();
        put(&state, set_request("to_delete", json!("v"))).await;

        let response = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(response.removed);

        let response = delete_handler(State(state), Path("to_delete".to_string())).await;
        assert!(!response.removed);
    }

    #[tokio::test]
    async fn test_invalidate_handler() {
        let (state, _) = test_state();
        for key in ["a", "b"] {
            let mut req = set_request(key, json!(key));
            req.tags = vec!["research".to_string()];
            put(&state, req).await;
        }
        put(&state, set_request("c", json!("c"))).await;

        let response = invalidate_handler(State(state.clone()), Path("research".to_string())).await;
        assert_eq!(response.removed, 2);
        assert!(state.cache.read().await.has("c"));
    }

    #[tokio::test]
    async fn test_clear_handler_resets_stats() {
        let (state, _) = test_state();
        put(&state, set_request("k", json!(1))).await;
        let _ = get_handler(State(state.clone()), Path("k".to_string())).await;

        let Json(cleared) = clear_handler(State(state.clone())).await;
        assert_eq!(cleared.message, "Cache cleared");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.entry_count, 0);
        assert_eq!(response.stats.hit_count, 0);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = test_state();
        put(&state, set_request("k", json!(1))).await;
        let _ = get_handler(State(state.clone()), Path("k".to_string())).await;
        let _ = get_handler(State(state.clone()), Path("missing".to_string())).await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.hit_count, 1);
        assert_eq!(response.stats.miss_count, 1);
        assert!((response.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let (state, _) = test_state();

        let result = set_handler(State(state), Json(set_request("", json!(1)))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_set_invalid_ttl() {
        let (state, _) = test_state();

        let mut req = set_request("k", json!(1));
        req.ttl_ms = Some(0);
        let result = set_handler(State(state), Json(req)).await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }
}
