//! Async mutual exclusion with FIFO hand-off and waiter introspection.
//!
//! A [`Monitor`] serializes state transitions for one protected domain.
//! Unlike a plain mutex it can also report, synchronously, whether anyone is
//! currently queued behind the holder; callers use that to shed advisory
//! work (a zoom nudge arriving mid-transition is dropped rather than queued).
//!
//! Each protected domain gets its own explicitly constructed instance; the
//! session manager keeps one for orchestrator transitions and a separate one
//! for layout-internal rendering, so the two domains never form a circular
//! wait. Acquiring the same monitor twice on one logical flow deadlocks.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

struct MonitorState {
    held: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Async mutual-exclusion lock with a FIFO waiter queue.
pub struct Monitor {
    state: Mutex<MonitorState>,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MonitorState {
                held: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Suspend until the caller is the sole holder.
    ///
    /// Waiters resume in submission order; on release the lock is handed
    /// directly to the next live waiter, so a late arrival can never barge
    /// past the queue. The returned guard releases on drop.
    pub async fn enter(&self) -> MonitorGuard<'_> {
        let waiter = {
            let mut state = self.state.lock().unwrap();
            if !state.held {
                state.held = true;
                return MonitorGuard { monitor: self };
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        // The sender only drops without firing if the Monitor itself is
        // dropped, which the borrow makes impossible while we wait.
        waiter
            .await
            .expect("monitor destroyed while a waiter was queued");
        MonitorGuard { monitor: self }
    }

    /// Whether at least one `enter()` call is suspended right now.
    ///
    /// A point-in-time answer for load-shedding; never rely on it for
    /// correctness.
    pub fn someone_is_waiting(&self) -> bool {
        !self.state.lock().unwrap().waiters.is_empty()
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.held, "monitor released without being held");

        // Hand off to the next waiter still listening. A waiter whose
        // enter() future was dropped is skipped.
        while let Some(next) = state.waiters.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        state.held = false;
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Monitor")
            .field("held", &state.held)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Exclusive hold on a [`Monitor`]; releases on drop.
#[must_use = "dropping the guard immediately releases the monitor"]
pub struct MonitorGuard<'a> {
    monitor: &'a Monitor,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        self.monitor.release();
    }
}
