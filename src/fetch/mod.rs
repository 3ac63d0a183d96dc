//! Fetch Module
//!
//! Coalesced, freshness-aware fetching on top of the cache store.

mod coordinator;
mod pending;

pub use coordinator::{FetchCoordinator, SharedStore};
pub use pending::{CancelHandle, Pending};
