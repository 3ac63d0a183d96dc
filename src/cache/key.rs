//! Key Generation
//!
//! Builds deterministic cache keys from a namespace and structured params.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Separator between namespace and canonical params.
pub const NAMESPACE_SEPARATOR: char = ':';

// == Generate Key ==
/// Derives the cache key for `params` under `namespace`.
///
/// Object keys are sorted recursively so two logically identical requests
/// built in different field orders hit the same entry. Arrays keep their
/// order. Params that serde_json cannot represent (maps with non-string
/// keys, failing `Serialize` impls) are rejected with
/// `CacheError::Serialization`.
pub fn generate_key<P>(namespace: &str, params: &P) -> Result<String>
where
    P: Serialize + ?Sized,
{
    let canonical = canonicalize(serde_json::to_value(params)?);
    let body = serde_json::to_string(&canonical)?;
    Ok(format!("{namespace}{NAMESPACE_SEPARATOR}{body}"))
}

/// Recursively rebuilds objects with their keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
