// src/engine/debounce.rs

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Collapses a burst of triggers into a single delayed action.
///
/// Every [`trigger`](Debouncer::trigger) discards the pending firing (if
/// any) and schedules a new one a full quiet period later, so the action
/// runs once, after the last trigger of a burst.
pub struct Debouncer {
    quiet: Duration,
    action: Arc<dyn Fn() + Send + Sync>,
    pending: Mutex<Option<JoinHandle<()>>>,
    runtime: Handle,
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    /// Must be called from within a Tokio runtime; timers are spawned on it,
    /// so `trigger` itself can be called from any thread.
    pub fn new<F>(quiet: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            quiet,
            action: Arc::new(action),
            pending: Mutex::new(None),
            runtime: Handle::current(),
        }
    }

    pub fn trigger(&self) {
        // Holding the lock across abort + spawn keeps concurrent triggers
        // from both surviving; the last one to take the lock wins.
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = pending.take() {
            previous.abort();
            trace!("debounce: pending firing replaced");
        }

        let quiet = self.quiet;
        let action = Arc::clone(&self.action);
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(quiet).await;
            action();
        }));
    }

    /// Drop a pending firing without running it.
    pub fn cancel(&self) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
