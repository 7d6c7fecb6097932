//! Scheduling primitives shared by the estimator services
//!
//! [`Sequencer`] hands out monotonically increasing tickets so that only the
//! latest request may apply its result. [`CancelableTimer`] runs a task after
//! a delay and aborts it when re-armed, cancelled or dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Identifies one request issued through a [`Sequencer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

/// "Last request wins" bookkeeping
///
/// Clones share the same counter, so a spawned task can check whether its
/// ticket is still current without holding a reference to its owner.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    latest: Arc<AtomicU64>,
}

impl Sequencer {
    /// Create a sequencer with no outstanding ticket
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket, superseding every earlier one
    pub fn next(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is the most recently issued one
    #[must_use]
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Supersede every outstanding ticket without issuing a new one
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

/// A single delayed task slot
///
/// Scheduling replaces whatever was armed before. The delay starts when
/// [`CancelableTimer::schedule`] is called, not when the runtime first polls
/// the task.
#[derive(Debug, Default)]
pub struct CancelableTimer {
    handle: Option<JoinHandle<()>>,
}

impl CancelableTimer {
    /// Create an unarmed timer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `delay` has elapsed, cancelling any armed task
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let sleep = tokio::time::sleep(delay);
        self.handle = Some(tokio::spawn(async move {
            sleep.await;
            task.await;
        }));
    }

    /// Abort the armed task, returning whether one was still pending
    pub fn cancel(&mut self) -> bool {
        self.handle.take().is_some_and(|handle| {
            let pending = !handle.is_finished();
            handle.abort();
            pending
        })
    }

    /// Whether a scheduled task has not finished yet
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
