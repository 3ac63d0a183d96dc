//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Invariant violations (a tag index pointing at a missing key, a size total
/// drifting from the sum of entry sizes) are not represented here: they are
/// defects and are asserted at the mutation point instead.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid ttl, capacity or an entry that can never fit its budget
    #[error("Invalid cache configuration: {0}")]
    Configuration(String),

    /// Key parameters could not be canonicalized
    #[error("Cannot serialize key parameters: {0}")]
    Serialization(String),

    /// Error raised by the fetch function, shared verbatim with every waiter
    #[error(transparent)]
    Upstream(Arc<anyhow::Error>),

    /// The caller withdrew its interest before the fetch settled
    #[error("Fetch cancelled")]
    Cancelled,

    /// Key not found or no longer servable (admin API)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data on the admin API
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Returns the upstream error if this is one.
    pub fn upstream(&self) -> Option<&anyhow::Error> {
        match self {
            CacheError::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Upstream(Arc::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Configuration(_)
            | CacheError::Serialization(_)
            | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Upstream(_) => StatusCode::BAD_GATEWAY,
            CacheError::Cancelled => StatusCode::CONFLICT,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
