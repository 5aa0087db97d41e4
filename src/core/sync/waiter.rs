/*!
 * Adaptive Waiter
 *
 * Spin-then-block wait on a shared word until it moves away from a comparand.
 *
 * # Phases
 *
 * 1. **Fast check**: value already changed, return at once (no handle, no spin)
 * 2. **Spin**: up to the caller's adaptive budget, paced by role
 * 3. **Block**: one short wait on a pooled handle, then re-check
 *
 * Every call feeds its outcome back to the thread's profile, so a worker that
 * keeps blocking spins a little longer next time and one that keeps winning
 * while spinning spins a little less.
 *
 * The blocking timeout bounds staleness; hitting it is routine. A `false`
 * return only means the value still matched after the timeout and the caller
 * is expected to loop.
 */

use super::config::SyncConfig;
use super::pause::PauseStrategy;
use super::pool::WaitHandlePool;
use super::profile::{ThreadProfile, ThreadProfileRegistry};
use super::traits::Watch;
use crate::core::errors::SyncResult;
use std::time::Duration;
use tracing::trace;

/// How a single wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// The watched value differed from the comparand on return
    pub changed: bool,
    /// Spin iterations performed before returning or blocking
    pub spins: u32,
    /// A blocking wait was attempted
    pub blocked: bool,
    /// The blocking wait ran into its timeout
    pub timed_out: bool,
}

/// Spin-then-block condition waiter
///
/// Owns the wait handle pool and the thread profile registry. Construct one
/// per process (or per test) and share it by reference or `Arc`.
pub struct AdaptiveWaiter {
    config: SyncConfig,
    pause: PauseStrategy,
    pool: WaitHandlePool,
    registry: ThreadProfileRegistry,
}

impl AdaptiveWaiter {
    /// Create a waiter with a freshly built handle pool
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        Self::with_pool(config, WaitHandlePool::new())
    }

    /// Create a waiter around an existing pool
    pub fn with_pool(config: SyncConfig, pool: WaitHandlePool) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            pause: PauseStrategy::new(&config),
            registry: ThreadProfileRegistry::new(&config),
            pool,
            config,
        })
    }

    /// Wait until `target` no longer holds `expected`
    ///
    /// Returns `true` when the value changed, `false` when it still matched
    /// after spinning and one blocking wait of at most `timeout`.
    #[inline]
    pub fn wait<W>(&self, target: &W, expected: W::Value, timeout: Duration) -> bool
    where
        W: Watch + ?Sized,
    {
        self.wait_detailed(target, expected, timeout).changed
    }

    /// Same as [`wait`](Self::wait), reporting how the wait ended
    pub fn wait_detailed<W>(&self, target: &W, expected: W::Value, timeout: Duration) -> WaitOutcome
    where
        W: Watch + ?Sized,
    {
        let profile = self.registry.profile();

        if target.differs_from(expected) {
            self.registry.record_outcome(profile, true, false);
            return WaitOutcome {
                changed: true,
                spins: 0,
                blocked: false,
                timed_out: false,
            };
        }

        let handle = self.pool.acquire();
        handle.reset();

        let budget = profile.spin_budget();
        if let Some(spins) = self.spin(profile, target, expected, budget) {
            self.registry.record_outcome(profile, true, false);
            return WaitOutcome {
                changed: true,
                spins,
                blocked: false,
                timed_out: false,
            };
        }

        let status = handle.wait(timeout);
        let changed = target.differs_from(expected);
        let timed_out = status.timed_out();

        trace!(
            handle = handle.index(),
            width = target.width(),
            spin_budget = budget,
            ?status,
            changed,
            "Blocking wait finished"
        );

        self.registry.record_outcome(profile, changed, timed_out);

        WaitOutcome {
            changed,
            spins: budget,
            blocked: true,
            timed_out,
        }
    }

    /// Spin up to `budget` iterations; returns the iteration that saw a change
    #[inline]
    pub fn spin<W>(
        &self,
        profile: &ThreadProfile,
        target: &W,
        expected: W::Value,
        budget: u32,
    ) -> Option<u32>
    where
        W: Watch + ?Sized,
    {
        for spin in 0..budget {
            if target.differs_from(expected) {
                return Some(spin);
            }
            self.pause.pace(profile, spin);
        }
        None
    }

    /// Signal every pooled handle so blocked waiters re-check early
    #[inline]
    pub fn notify(&self) {
        self.pool.signal_all();
    }

    #[inline]
    pub fn registry(&self) -> &ThreadProfileRegistry {
        &self.registry
    }

    #[inline]
    pub fn pool(&self) -> &WaitHandlePool {
        &self.pool
    }

    #[inline]
    pub fn pause(&self) -> &PauseStrategy {
        &self.pause
    }

    #[inline]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::profile::Role;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn waiter() -> AdaptiveWaiter {
        AdaptiveWaiter::new(SyncConfig::default()).unwrap()
    }

    #[test]
    fn test_fast_path_skips_pool() {
        let waiter = waiter();
        let word = AtomicU32::new(5);

        let outcome = waiter.wait_detailed(&word, 4, Duration::from_millis(1));
        assert!(outcome.changed);
        assert_eq!(outcome.spins, 0);
        assert!(!outcome.blocked);

        // No handle was taken on the fast path
        assert_eq!(waiter.pool().acquire().index(), 0);
    }

    #[test]
    fn test_unchanged_value_times_out() {
        let waiter = waiter();
        let word = AtomicU64::new(9);

        let start = Instant::now();
        let outcome = waiter.wait_detailed(&word, 9, Duration::from_millis(5));

        assert!(!outcome.changed);
        assert!(outcome.blocked);
        assert!(outcome.timed_out);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_worker_budget_grows_after_block() {
        let waiter = waiter();
        let _ = waiter.registry().profile();

        thread::scope(|s| {
            s.spawn(|| {
                let word = AtomicU32::new(1);
                assert!(!waiter.wait(&word, 1, Duration::from_millis(1)));

                let profile = waiter.registry().profile();
                assert_eq!(profile.role(), Role::Worker);
                assert_eq!(profile.spin_budget(), 33);
                assert_eq!(profile.wait_count(), 1);
            });
        });
    }

    #[test]
    fn test_change_during_block_wakes() {
        let waiter = Arc::new(waiter());
        let word = Arc::new(AtomicU32::new(0));

        let handle = {
            let waiter = waiter.clone();
            let word = word.clone();
            thread::spawn(move || {
                let start = Instant::now();
                while !waiter.wait(&*word, 0, Duration::from_millis(1)) {
                    assert!(start.elapsed() < Duration::from_secs(5));
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        word.store(1, Ordering::Release);
        waiter.notify();

        handle.join().unwrap();
    }
}
