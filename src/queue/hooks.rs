/*!
 * Host Collaborators
 *
 * The three opaque operations the acquisition loop hands off to the host
 * pipeline. Implementations are assumed non-blocking.
 */

use super::cursor::{Repossession, RingCursor, SlotRef};
use std::sync::Arc;

/// What a commit is booked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTarget {
    /// The ring itself; the count is the number of free slots
    Ring,
    /// A slot produced by the refill collaborator; the count is its references
    Slot(SlotRef),
}

/// Host-side bookkeeping around slot acquisition
pub trait SlotHooks: Send + Sync {
    /// Produce a ready slot once the lock-free paths are exhausted
    ///
    /// `prior_sequence` is the head sequence observed this round.
    fn refill(
        &self,
        ring: &RingCursor,
        prior_sequence: u32,
        allow_retry: bool,
    ) -> Option<Repossession>;

    /// Book the outcome of an acquisition
    fn commit(&self, ring: &RingCursor, target: CommitTarget, available: u64);

    /// Finalize a reference taken by repossession or refill
    fn publish(&self, ring: &RingCursor, reference: &Repossession);
}

/// Hooks for hosts that need no bookkeeping
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SlotHooks for NoopHooks {
    #[inline]
    fn refill(&self, _: &RingCursor, _: u32, _: bool) -> Option<Repossession> {
        None
    }

    #[inline]
    fn commit(&self, _: &RingCursor, _: CommitTarget, _: u64) {}

    #[inline]
    fn publish(&self, _: &RingCursor, _: &Repossession) {}
}

impl<H: SlotHooks + ?Sized> SlotHooks for Arc<H> {
    #[inline]
    fn refill(
        &self,
        ring: &RingCursor,
        prior_sequence: u32,
        allow_retry: bool,
    ) -> Option<Repossession> {
        (**self).refill(ring, prior_sequence, allow_retry)
    }

    #[inline]
    fn commit(&self, ring: &RingCursor, target: CommitTarget, available: u64) {
        (**self).commit(ring, target, available)
    }

    #[inline]
    fn publish(&self, ring: &RingCursor, reference: &Repossession) {
        (**self).publish(ring, reference)
    }
}
