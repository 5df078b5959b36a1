//! Deferred Work Scheduler
//!
//! Propagation is synchronous. The only deferred work in the engine is the
//! debounce window of a cell's `set` and of a reaction's deferred phase.
//! Both are armed here as tokio timer tasks.
//!
//! # Algorithm
//!
//! A [`TimerSlot`] holds at most one armed timer. Callers decide whether to
//! arm (they track their own "pending" flag so bursts collapse into one
//! run); the slot only owns the task handle so that `release()` can abort
//! it instead of leaving a timer to fire into a discarded cell.
//!
//! When no tokio runtime is reachable from the calling thread, arming fails
//! and the caller is expected to run the work synchronously.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Owner of at most one pending timer task.
#[derive(Default)]
pub(crate) struct TimerSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that runs `task` after `delay`.
    ///
    /// Returns `false` without running anything when there is no runtime to
    /// host the timer.
    pub(crate) fn arm<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });

        // A previous handle is finished (or finishing) by the time callers
        // re-arm, so dropping it only detaches.
        *self.handle.lock() = Some(handle);
        true
    }

    /// Abort the armed timer, if any. Returns whether a timer was still
    /// pending.
    pub(crate) fn cancel(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Whether a timer is armed and has not fired yet.
    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}
