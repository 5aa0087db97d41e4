/*!
 * Auto-Reset Event
 *
 * A signalled flag guarded by a parking_lot mutex and condvar. `set` releases
 * at most one waiter and the flag clears itself when a waiter consumes it.
 */

use super::traits::WaitStatus;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Auto-reset wait handle
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing in the pool
pub struct AutoResetEvent {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl AutoResetEvent {
    pub const fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Signal the event, waking one waiter if any
    #[inline]
    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }

    /// Clear a pending signal
    #[inline]
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    /// Check for a pending signal without consuming it
    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Wait until signalled or until `timeout` elapses
    ///
    /// A signal that arrived before the call is consumed immediately.
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();

        while !*signaled {
            if self.condvar.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }

        if *signaled {
            *signaled = false;
            WaitStatus::Signaled
        } else {
            WaitStatus::TimedOut
        }
    }
}

impl Default for AutoResetEvent {
    fn default() -> Self {
        Self::new()
    }
}
