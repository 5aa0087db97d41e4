/*!
 * Slot Acquisition
 *
 * Reserves one slot from a shared ring, escalating through progressively
 * more expensive strategies until one resolves or the host shuts down.
 *
 * # Strategies (per round)
 *
 * 1. **Claim**: decrement `head` and try to repossess the descriptor under it
 * 2. **Catch-up**: when `tail` sits on the claimed position, advance it
 * 3. **Refill**: ask the host for a ready slot
 * 4. **Backoff**: every few empty rounds, park the head sequence and block
 *    on it through the adaptive waiter until a producer moves it
 *
 * A reference taken on a slot that other holders still share does not end
 * the round. The claim is handed back and the later strategies still run; the
 * held reference only resolves the round when none of them does.
 *
 * Claims never block. The only suspension points are inside the adaptive
 * waiter, so a shutdown request is seen within one spin burst plus one wait
 * timeout.
 */

use super::cursor::{Repossession, RingCursor, SlotRef};
use super::hooks::{CommitTarget, NoopHooks, SlotHooks};
use crate::core::errors::QueueResult;
use crate::core::limits::PARKED_MASK;
use crate::core::sync::{AdaptiveWaiter, Watch};
use serde::{Deserialize, Serialize};
use std::hint;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, trace};

/// Which strategy ended the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A descriptor under the claim was repossessed
    Reused,
    /// `tail` was advanced onto the claimed position
    CaughtUp,
    /// The host's refill produced a slot
    Refilled,
    /// The shutdown flag was seen
    Shutdown,
    /// Nothing resolved and retries were not allowed
    Exhausted,
}

impl Resolution {
    #[inline]
    pub fn acquired(self) -> bool {
        matches!(
            self,
            Resolution::Reused | Resolution::CaughtUp | Resolution::Refilled
        )
    }
}

/// Outcome of one [`SlotAcquirer::acquire`] call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireReport {
    pub resolution: Resolution,
    /// Reference the acquisition resolved with (repossession or refill)
    pub reference: Option<Repossession>,
    /// Reference on a slot other holders still share, held while a later
    /// strategy resolved the round
    pub shared: Option<Repossession>,
    /// Outer loop iterations, including the resolving one
    pub rounds: u32,
    /// Attempts to write the parked marker
    pub park_attempts: u32,
    /// Parked-marker writes that landed
    pub parks: u32,
    /// Entries into the secondary wait path
    pub secondary_waits: u32,
    /// Free ring slots at finalization
    pub available: u64,
}

impl AcquireReport {
    fn start() -> Self {
        Self {
            resolution: Resolution::Exhausted,
            reference: None,
            shared: None,
            rounds: 0,
            park_attempts: 0,
            parks: 0,
            secondary_waits: 0,
            available: 0,
        }
    }

    /// True when a slot was obtained by any path
    #[inline]
    pub fn acquired(&self) -> bool {
        self.resolution.acquired()
    }

    #[inline]
    pub fn has_reference(&self) -> bool {
        self.reference.is_some() || self.shared.is_some()
    }
}

#[derive(Default)]
struct Claim {
    reference: Option<Repossession>,
    caught_up: bool,
}

/// Ring slot acquirer
///
/// Stateless apart from the shared waiter and the host hooks, so one instance
/// serves any number of threads and rings.
pub struct SlotAcquirer<H = NoopHooks> {
    waiter: Arc<AdaptiveWaiter>,
    hooks: H,
}

impl<H: SlotHooks> SlotAcquirer<H> {
    pub fn new(waiter: Arc<AdaptiveWaiter>, hooks: H) -> Self {
        Self { waiter, hooks }
    }

    /// Reserve one slot from `ring`
    ///
    /// `allow_refill` gates the host refill, `allow_retry` decides whether an
    /// unresolved round loops (and eventually parks) or gives up.
    pub fn acquire(&self, ring: &RingCursor, allow_refill: bool, allow_retry: bool) -> AcquireReport {
        let park_after = self.waiter.config().park_after_rounds;
        let mut report = AcquireReport::start();
        let mut empty_rounds = 0u32;

        let resolution = loop {
            report.rounds += 1;

            let claim = self.claim(ring);
            match claim.reference {
                Some(reference) if reference.remaining() > 1 => {
                    report.shared = Some(reference);
                }
                Some(reference) => {
                    report.reference = Some(reference);
                    break Resolution::Reused;
                }
                None => {}
            }
            if claim.caught_up {
                break Resolution::CaughtUp;
            }

            if ring.is_shutdown() {
                break Resolution::Shutdown;
            }

            let snapshot = ring.sequence().load(Ordering::SeqCst);

            if allow_refill && !ring.is_overflowing() {
                if let Some(reference) = self.hooks.refill(ring, snapshot, allow_retry) {
                    report.reference = Some(reference);
                    break Resolution::Refilled;
                }
            }

            if let Some(shared) = report.shared.take() {
                report.reference = Some(shared);
                break Resolution::Reused;
            }

            if !allow_retry {
                break Resolution::Exhausted;
            }

            empty_rounds += 1;
            if empty_rounds > park_after {
                empty_rounds = 0;
                report.park_attempts += 1;

                let Some(marker) = Self::park(ring, snapshot) else {
                    hint::spin_loop();
                    continue;
                };
                report.parks += 1;

                let head = ring.head().load(Ordering::SeqCst);
                let tail = ring.tail().load(Ordering::SeqCst);
                debug!(marker, head, tail, rounds = report.rounds, "Head sequence parked");

                if tail == head {
                    report.secondary_waits += 1;
                    if !self.await_unpark(ring, marker) {
                        break Resolution::Shutdown;
                    }
                }
            }

            hint::spin_loop();
        };

        report.resolution = resolution;
        report.available = ring.available();

        match (resolution, report.reference) {
            (Resolution::Refilled, Some(reference)) => self.hooks.commit(
                ring,
                CommitTarget::Slot(reference.slot),
                u64::from(reference.refs),
            ),
            _ => self.hooks.commit(ring, CommitTarget::Ring, report.available),
        }

        for reference in report.shared.iter().chain(report.reference.iter()) {
            self.hooks.publish(ring, reference);
        }

        trace!(
            ?resolution,
            rounds = report.rounds,
            parks = report.parks,
            available = report.available,
            "Slot acquisition finished"
        );

        report
    }

    /// One claim plus catch-up against the ring
    fn claim(&self, ring: &RingCursor) -> Claim {
        let claimed = ring.head().fetch_sub(1, Ordering::SeqCst).wrapping_sub(1);
        let tail = ring.tail().load(Ordering::SeqCst);

        if claimed.wrapping_sub(tail) >= ring.capacity() {
            ring.head().fetch_add(1, Ordering::SeqCst);
            return Claim::default();
        }

        let slot = ring.descriptor_at(claimed);
        let reference = ring.slots().repossess(slot).map(|refs| Repossession {
            slot,
            tail_snapshot: tail,
            refs,
        });

        // Other holders remain: hand the position back and keep the reference
        let released = reference.is_some_and(|r| r.remaining() > 1);
        if released {
            ring.head().fetch_add(1, Ordering::SeqCst);
        }

        let mut caught_up = false;
        if tail == claimed {
            caught_up = ring
                .tail()
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if !released {
                ring.head().fetch_add(1, Ordering::SeqCst);
            }
        }

        Claim {
            reference,
            caught_up,
        }
    }

    /// Write the parked marker over `snapshot`; `None` if the sequence moved
    fn park(ring: &RingCursor, snapshot: u32) -> Option<u32> {
        let marker = snapshot.wrapping_add(1) | PARKED_MASK;
        ring.sequence()
            .compare_exchange(snapshot, marker, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| marker)
    }

    /// Block until the head sequence leaves `marker`
    ///
    /// Returns `false` if shutdown was requested first.
    fn await_unpark(&self, ring: &RingCursor, marker: u32) -> bool {
        let waiter = &*self.waiter;
        let registry = waiter.registry();
        let profile = registry.profile();
        let sequence = ring.sequence();

        if sequence.differs_from(marker) {
            registry.record_outcome(profile, true, false);
            return true;
        }
        hint::spin_loop();

        let config = waiter.config();
        let timeout = config.wait_timeout;
        let mut budget = profile.spin_budget();

        loop {
            if waiter.spin(profile, sequence, marker, budget).is_some() {
                registry.record_outcome(profile, true, false);
                return true;
            }

            if ring.is_shutdown() {
                return false;
            }

            // Negative while anyone is blocked
            ring.waiter_count().fetch_sub(1, Ordering::SeqCst);
            let changed = waiter.wait(sequence, marker, timeout);
            ring.waiter_count().fetch_add(1, Ordering::SeqCst);

            if changed {
                return true;
            }

            budget = config.clamp_spin(budget.saturating_mul(2));
            trace!(marker, budget, "Secondary wait timed out");
        }
    }

    /// Producer side: push a descriptor and wake parked acquirers
    pub fn offer(&self, ring: &RingCursor, slot: SlotRef) -> QueueResult<u64> {
        let position = ring.push(slot)?;
        if ring.waiter_count().load(Ordering::SeqCst) < 0 {
            self.waiter.notify();
        }
        Ok(position)
    }

    /// Set the ring's shutdown flag and wake anything blocked on it
    pub fn shutdown(&self, ring: &RingCursor) {
        ring.request_shutdown();
        self.waiter.notify();
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn waiter(&self) -> &Arc<AdaptiveWaiter> {
        &self.waiter
    }
}
