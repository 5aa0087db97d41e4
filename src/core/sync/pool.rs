/*!
 * Wait Handle Pool
 *
 * A fixed set of pre-created auto-reset events handed out round robin.
 *
 * # Design: Shared Handles Over Ownership
 *
 * Acquisition is a single `fetch_add` reduced modulo the pool size. Nothing
 * tracks who holds a handle, so two waiters may block on the same event and a
 * signal meant for one can wake the other. Every caller re-checks its own
 * condition after waking, which makes those wakeups harmless.
 *
 * Slots whose event failed to be created stay empty; a wait on such a slot
 * returns `TimedOut` immediately and the caller degrades to polling.
 */

use super::event::AutoResetEvent;
use super::traits::WaitStatus;
use crate::core::errors::SyncResult;
use crate::core::limits::WAIT_HANDLE_POOL_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Round-robin pool of wait handles
pub struct WaitHandlePool {
    events: Box<[Option<AutoResetEvent>]>,
    next: AtomicUsize,
}

/// A handle borrowed from the pool
///
/// Copyable and not exclusive: other waiters may hold the same slot.
#[derive(Clone, Copy)]
pub struct WaitHandle<'a> {
    index: usize,
    event: Option<&'a AutoResetEvent>,
}

impl WaitHandlePool {
    /// Create a pool of `WAIT_HANDLE_POOL_SIZE` events
    pub fn new() -> Self {
        Self::with_factory(|_| Ok(AutoResetEvent::new()))
    }

    /// Create a pool using `factory` for each slot
    ///
    /// A failing slot is logged and left empty; the pool itself always builds.
    pub fn with_factory<F>(mut factory: F) -> Self
    where
        F: FnMut(usize) -> SyncResult<AutoResetEvent>,
    {
        let events: Box<[Option<AutoResetEvent>]> = (0..WAIT_HANDLE_POOL_SIZE)
            .map(|index| match factory(index) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "Wait handle unavailable, slot degrades to polling");
                    None
                }
            })
            .collect();

        let degraded = events.iter().filter(|e| e.is_none()).count();
        debug!(size = events.len(), degraded, "Wait handle pool created");

        Self {
            events,
            next: AtomicUsize::new(0),
        }
    }

    /// Hand out the next handle in round-robin order
    #[inline]
    pub fn acquire(&self) -> WaitHandle<'_> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.events.len();
        WaitHandle {
            index,
            event: self.events[index].as_ref(),
        }
    }

    /// Signal every handle once so blocked waiters re-check their condition
    pub fn signal_all(&self) {
        for event in self.events.iter().flatten() {
            event.set();
        }
    }

    /// Number of slots in the pool
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of slots that have no usable event
    pub fn degraded_slots(&self) -> usize {
        self.events.iter().filter(|e| e.is_none()).count()
    }
}

impl Default for WaitHandlePool {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> WaitHandle<'a> {
    /// Slot index inside the pool
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when this slot has no event and waits return at once
    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.event.is_none()
    }

    /// Clear any stale signal before spinning
    #[inline]
    pub fn reset(&self) {
        if let Some(event) = self.event {
            event.reset();
        }
    }

    /// Wake one waiter blocked on this slot
    #[inline]
    pub fn signal(&self) {
        if let Some(event) = self.event {
            event.set();
        }
    }

    /// Block until signalled or `timeout` elapses
    #[inline]
    pub fn wait(&self, timeout: Duration) -> WaitStatus {
        match self.event {
            Some(event) => event.wait_for(timeout),
            None => WaitStatus::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SyncError;
    use std::time::Instant;

    #[test]
    fn test_round_robin_wraps() {
        let pool = WaitHandlePool::new();
        assert_eq!(pool.len(), 256);

        for expected in 0..pool.len() {
            assert_eq!(pool.acquire().index(), expected);
        }
        assert_eq!(pool.acquire().index(), 0);
    }

    #[test]
    fn test_failed_slots_degrade() {
        let pool = WaitHandlePool::with_factory(|index| {
            if index % 2 == 0 {
                Err(SyncError::HandleCreation {
                    index,
                    reason: "simulated".into(),
                })
            } else {
                Ok(AutoResetEvent::new())
            }
        });
        assert_eq!(pool.degraded_slots(), 128);

        let handle = pool.acquire();
        assert_eq!(handle.index(), 0);
        assert!(handle.is_degraded());

        let start = Instant::now();
        assert_eq!(handle.wait(Duration::from_secs(5)), WaitStatus::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_signal_wakes_only_its_slot() {
        let pool = WaitHandlePool::new();
        let first = pool.acquire();
        let second = pool.acquire();

        first.signal();

        assert_eq!(second.wait(Duration::ZERO), WaitStatus::TimedOut);
        assert_eq!(first.wait(Duration::ZERO), WaitStatus::Signaled);
        // Auto-reset: the signal is consumed by the first wait
        assert_eq!(first.wait(Duration::ZERO), WaitStatus::TimedOut);
    }

    #[test]
    fn test_signal_all_reaches_every_slot() {
        let pool = WaitHandlePool::new();
        pool.signal_all();

        for _ in 0..pool.len() {
            assert_eq!(pool.acquire().wait(Duration::ZERO), WaitStatus::Signaled);
        }
    }
}
