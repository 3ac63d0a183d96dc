//! Fetch Coordinator
//!
//! Wraps a caller-supplied async fetch with cache reads,
//! stale-while-revalidate and per-key coalescing of in-flight fetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{oneshot, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::cache::{generate_key, CacheConfig, CacheStore, Lookup};
use crate::error::{CacheError, Result};
use crate::fetch::{CancelHandle, Pending};

/// Store shared between the coordinator, domain caches and the admin API.
pub type SharedStore<V> = Arc<RwLock<CacheStore<V>>>;

type Waiter<V> = oneshot::Sender<Result<V>>;

// == Flight ==
/// One in-flight fetch for a key and the callers waiting on it.
struct Flight<V> {
    id: u64,
    waiters: HashMap<u64, Waiter<V>>,
    /// Background refreshes keep running with no waiters
    detached: bool,
    abort: AbortHandle,
}

// == Flight Table ==
/// Per-key fetch state. A key with no flight is idle.
pub(crate) struct FlightTable<V> {
    flights: Mutex<HashMap<String, Flight<V>>>,
    next_id: AtomicU64,
}

impl<V> FlightTable<V> {
    fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Flight<V>>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the flight for `key` only if it is still flight `id`.
    fn take(&self, key: &str, id: u64) -> Option<Flight<V>> {
        let mut flights = self.lock();
        match flights.get(key) {
            Some(flight) if flight.id == id => flights.remove(key),
            _ => None,
        }
    }

    /// Withdraws one waiter. Aborts the fetch if it was the last waiter of a
    /// foreground flight.
    pub(crate) fn withdraw(&self, key: &str, waiter: u64) -> bool {
        let mut flights = self.lock();
        let Some(flight) = flights.get_mut(key) else {
            return false;
        };
        if flight.waiters.remove(&waiter).is_none() {
            return false;
        }

        if flight.waiters.is_empty() && !flight.detached {
            if let Some(flight) = flights.remove(key) {
                flight.abort.abort();
                debug!(key = %key, "last waiter withdrew, fetch aborted");
            }
        }
        true
    }
}

impl<V: Clone> FlightTable<V> {
    /// Completes flight `id` for `key`, writing a successful value through
    /// to the store before any waiter is released.
    fn settle(
        &self,
        store: &mut CacheStore<V>,
        key: &str,
        id: u64,
        outcome: anyhow::Result<V>,
        config: &CacheConfig,
    ) {
        let Some(flight) = self.take(key, id) else {
            debug!(key = %key, "fetch settled after withdrawal, result dropped");
            return;
        };

        let result = match outcome {
            Ok(value) => store.set(key, value.clone(), config).map(|()| value),
            Err(err) => {
                warn!(key = %key, error = %err, "upstream fetch failed");
                Err(CacheError::from(err))
            }
        };

        let waiters = flight.waiters.len();
        for (_, waiter) in flight.waiters {
            let _ = waiter.send(result.clone());
        }
        debug!(key = %key, waiters, ok = result.is_ok(), "fetch settled");
    }
}

/// Fails a flight whose task unwound before settling.
///
/// A settled or aborted flight is already gone from the table, so dropping
/// the guard after either is a no-op.
struct SettleGuard<V: Clone> {
    table: Arc<FlightTable<V>>,
    key: String,
    id: u64,
}

impl<V: Clone> Drop for SettleGuard<V> {
    fn drop(&mut self) {
        if let Some(flight) = self.table.take(&self.key, self.id) {
            warn!(key = %self.key, "fetch task ended without settling");
            let err = CacheError::from(anyhow::anyhow!("fetch for '{}' panicked", self.key));
            for (_, waiter) in flight.waiters {
                let _ = waiter.send(Err(err.clone()));
            }
        }
    }
}

// == Fetch Coordinator ==
/// Deduplicated, freshness-aware access to an async data source.
///
/// Each key is either idle or has exactly one in-flight fetch. The lookup and
/// the idle-to-fetching transition happen under the store's write lock, and
/// a fetch writes its result under the same lock before leaving the table,
/// so no caller can observe a miss and start a second fetch in between.
pub struct FetchCoordinator<V> {
    store: SharedStore<V>,
    table: Arc<FlightTable<V>>,
}

impl<V> Clone for FetchCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table: Arc::clone(&self.table),
        }
    }
}

impl<V> FetchCoordinator<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    pub fn new(store: SharedStore<V>) -> Self {
        Self {
            store,
            table: Arc::new(FlightTable::new()),
        }
    }

    /// The store this coordinator reads and writes.
    pub fn store(&self) -> &SharedStore<V> {
        &self.store
    }

    // == Fetch ==
    /// Returns the value for `key`, fetching it at most once across
    /// concurrent callers.
    pub async fn fetch<F, Fut>(
        &self,
        key: impl Into<String>,
        fetch_fn: F,
        config: &CacheConfig,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.begin(key, fetch_fn, config).await?.await
    }

    /// Like `fetch`, deriving the key from `namespace` and `params`.
    pub async fn fetch_with<P, F, Fut>(
        &self,
        namespace: &str,
        params: &P,
        fetch_fn: F,
        config: &CacheConfig,
    ) -> Result<V>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let key = generate_key(namespace, params)?;
        self.fetch(key, fetch_fn, config).await
    }

    // == Begin ==
    /// Starts a lookup and returns a handle to its outcome.
    ///
    /// - Fresh: resolves immediately, `fetch_fn` is dropped uncalled.
    /// - Stale under a stale-while-revalidate config: resolves immediately
    ///   with the stale value and starts one background refresh unless the
    ///   key is already fetching.
    /// - Otherwise: joins the key's in-flight fetch, or starts one.
    ///
    /// Dropping the returned `Pending` before it resolves withdraws the
    /// caller, as does `CancelHandle::cancel`.
    ///
    /// # Errors
    /// `CacheError::Configuration` for an invalid config, before any lookup.
    pub async fn begin<F, Fut>(
        &self,
        key: impl Into<String>,
        fetch_fn: F,
        config: &CacheConfig,
    ) -> Result<Pending<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        config.validate()?;
        let key = key.into();

        let mut store = self.store.write().await;
        Ok(self.route(&mut store, key, fetch_fn, config))
    }

    /// Returns true while `key` has a fetch in flight.
    pub fn is_fetching(&self, key: &str) -> bool {
        self.table.lock().contains_key(key)
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight_count(&self) -> usize {
        self.table.lock().len()
    }

    // == Internals ==
    fn route<F, Fut>(
        &self,
        store: &mut CacheStore<V>,
        key: String,
        fetch_fn: F,
        config: &CacheConfig,
    ) -> Pending<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let lookup = store.get(&key);
        let mut flights = self.table.lock();

        match lookup {
            Lookup::Fresh(value) => Pending::ready(value),
            Lookup::Stale(value) if config.stale_while_revalidate => {
                if flights.contains_key(&key) {
                    debug!(key = %key, "serving stale, refresh already in flight");
                } else {
                    debug!(key = %key, "serving stale, starting background refresh");
                    self.launch(&mut flights, key, fetch_fn, config, true);
                }
                Pending::ready(value)
            }
            Lookup::Stale(_) | Lookup::Miss => {
                let waiter = self.table.next_id();
                let (tx, rx) = oneshot::channel();

                match flights.get_mut(&key) {
                    Some(flight) => {
                        debug!(key = %key, "coalesced onto in-flight fetch");
                        flight.waiters.insert(waiter, tx);
                    }
                    None => {
                        let flight =
                            self.launch(&mut flights, key.clone(), fetch_fn, config, false);
                        flight.waiters.insert(waiter, tx);
                    }
                }

                let cancel = CancelHandle::new(
                    key,
                    waiter,
                    Arc::downgrade(&self.table),
                    Arc::new(AtomicBool::new(false)),
                );
                Pending::waiting(rx, cancel)
            }
        }
    }

    /// Spawns `fetch_fn` and registers its flight. Must be called with the
    /// store write lock held so the spawned task cannot settle before the
    /// caller's waiter is registered.
    fn launch<'a, F, Fut>(
        &self,
        flights: &'a mut HashMap<String, Flight<V>>,
        key: String,
        fetch_fn: F,
        config: &CacheConfig,
        detached: bool,
    ) -> &'a mut Flight<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let id = self.table.next_id();
        let store = Arc::clone(&self.store);
        let guard = SettleGuard {
            table: Arc::clone(&self.table),
            key: key.clone(),
            id,
        };
        let config = config.clone();

        let handle = tokio::spawn(async move {
            let outcome = fetch_fn().await;
            let mut store = store.write().await;
            guard.table.settle(&mut store, &guard.key, guard.id, outcome, &config);
        });

        debug!(key = %key, detached, "fetch started");
        flights.entry(key).or_insert(Flight {
            id,
            waiters: HashMap::new(),
            detached,
            abort: handle.abort_handle(),
        })
    }
}
