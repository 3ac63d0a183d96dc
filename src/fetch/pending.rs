//! Pending Fetch Handles
//!
//! The per-caller side of a coalesced fetch: a future for the outcome and a
//! handle to withdraw interest in it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{CacheError, Result};
use crate::fetch::coordinator::FlightTable;

// == Cancel Handle ==
/// Withdraws one caller from an in-flight fetch.
///
/// Withdrawing never affects other callers on the same fetch. Withdrawing
/// the last caller of a foreground fetch aborts it.
pub struct CancelHandle<V> {
    target: Option<Target<V>>,
    withdrawn: Arc<AtomicBool>,
}

struct Target<V> {
    key: String,
    waiter: u64,
    table: Weak<FlightTable<V>>,
}

impl<V> CancelHandle<V> {
    pub(crate) fn new(
        key: String,
        waiter: u64,
        table: Weak<FlightTable<V>>,
        withdrawn: Arc<AtomicBool>,
    ) -> Self {
        Self {
            target: Some(Target { key, waiter, table }),
            withdrawn,
        }
    }

    /// Handle for a lookup that resolved without waiting.
    fn settled() -> Self {
        Self {
            target: None,
            withdrawn: Arc::new(AtomicBool::new(false)),
        }
    }

    // == Cancel ==
    /// Withdraws the caller. Returns false if already withdrawn or if there
    /// was nothing to withdraw from.
    ///
    /// After this call the paired `Pending` resolves to
    /// `CacheError::Cancelled`, even if the fetch has already delivered.
    pub fn cancel(&self) -> bool {
        if self.withdrawn.swap(true, Ordering::SeqCst) {
            return false;
        }
        match &self.target {
            Some(target) => target
                .table
                .upgrade()
                .is_some_and(|table| table.withdraw(&target.key, target.waiter)),
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.withdrawn.load(Ordering::SeqCst)
    }

    /// Key of the fetch this handle withdraws from, if any.
    pub fn key(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.key.as_str())
    }
}

impl<V> Clone for CancelHandle<V> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.as_ref().map(|t| Target {
                key: t.key.clone(),
                waiter: t.waiter,
                table: Weak::clone(&t.table),
            }),
            withdrawn: Arc::clone(&self.withdrawn),
        }
    }
}

impl<V> fmt::Debug for CancelHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("key", &self.key())
            .field("withdrawn", &self.is_cancelled())
            .finish()
    }
}

// == Pending ==
/// Outcome of `FetchCoordinator::begin`, resolved by awaiting.
///
/// Dropping an unresolved `Pending` withdraws its caller.
#[must_use = "dropping a Pending withdraws the caller from the fetch"]
pub struct Pending<V> {
    state: State<V>,
    cancel: CancelHandle<V>,
}

enum State<V> {
    Ready(Option<V>),
    Waiting(oneshot::Receiver<Result<V>>),
    Done,
}

// `V` is only ever moved out, never pinned in place.
impl<V> Unpin for Pending<V> {}

impl<V> Pending<V> {
    pub(crate) fn ready(value: V) -> Self {
        Self {
            state: State::Ready(Some(value)),
            cancel: CancelHandle::settled(),
        }
    }

    pub(crate) fn waiting(rx: oneshot::Receiver<Result<V>>, cancel: CancelHandle<V>) -> Self {
        Self {
            state: State::Waiting(rx),
            cancel,
        }
    }

    /// True if the value was served from cache without waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Handle that withdraws this caller; usable from another task.
    pub fn cancel_handle(&self) -> CancelHandle<V> {
        self.cancel.clone()
    }
}

impl<V> Future for Pending<V> {
    type Output = Result<V>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.cancel.is_cancelled() {
            this.state = State::Done;
            return Poll::Ready(Err(CacheError::Cancelled));
        }

        let output = match &mut this.state {
            State::Ready(value) => value.take().ok_or(CacheError::Cancelled),
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(result)) => result,
                // The fetch was aborted and its waiters dropped
                Poll::Ready(Err(_)) => Err(CacheError::Cancelled),
                Poll::Pending => return Poll::Pending,
            },
            State::Done => panic!("Pending polled after completion"),
        };

        this.state = State::Done;
        Poll::Ready(output)
    }
}

impl<V> Drop for Pending<V> {
    fn drop(&mut self) {
        if matches!(self.state, State::Waiting(_)) {
            self.cancel.cancel();
        }
    }
}

impl<V> fmt::Debug for Pending<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(_) => "ready",
            State::Waiting(_) => "waiting",
            State::Done => "done",
        };
        f.debug_struct("Pending")
            .field("state", &state)
            .field("cancel", &self.cancel)
            .finish()
    }
}
