/*!
 * Ring Cursor
 *
 * Shared claim/commit counters over a descriptor ring, plus the slot table
 * the descriptors point into.
 *
 * # Layout
 *
 * - `head`: claim end. Producers push here, acquirers claim by decrementing.
 * - `tail`: commit end. Advanced by compare-and-swap when an acquirer takes
 *   the last in-flight slot.
 * - `sequence`: 32-bit head sequence word. Producers bump it on every push;
 *   an acquirer that gives up spinning writes the parked marker into it.
 * - `waiter_count`: minus the number of acquirers blocked on `sequence`.
 *
 * # Packed Words
 *
 * A descriptor in the ring is `epoch << 32 | slot_index`. A slot state in the
 * table keeps the epoch in bits 0..32, the reference count in bits 32..40 and
 * a live flag in bit 59. Repossession only succeeds when the descriptor epoch
 * matches the state epoch, so a descriptor left over from an earlier cycle of
 * the ring can never take a reference on a slot that has since been reused.
 */

use crate::core::errors::{QueueError, QueueResult};
use crate::core::limits::{PARKED_MASK, RING_CAPACITY};
use serde::{Deserialize, Serialize};
use std::hint;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

/// Live flag inside a packed slot state
pub const LIVE_BIT: u64 = 1 << 59;

const REFS_SHIFT: u32 = 32;
const REFS_MASK: u64 = 0xFF << REFS_SHIFT;
const EPOCH_MASK: u64 = 0xFFFF_FFFF;

#[repr(C, align(64))] // Keep head and tail on separate cache lines
struct Padded<T>(T);

impl<T> Deref for Padded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// Reference to one slot-table entry at a given epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub index: u32,
    pub epoch: u32,
}

impl SlotRef {
    #[inline]
    pub const fn new(index: u32, epoch: u32) -> Self {
        Self { index, epoch }
    }

    /// Pack into a ring descriptor
    #[inline]
    pub const fn pack(self) -> u64 {
        ((self.epoch as u64) << 32) | self.index as u64
    }

    /// Unpack a ring descriptor
    #[inline]
    pub const fn unpack(descriptor: u64) -> Self {
        Self {
            index: descriptor as u32,
            epoch: (descriptor >> 32) as u32,
        }
    }
}

/// Decoded slot-table word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotState(u64);

impl SlotState {
    #[inline]
    pub const fn new(epoch: u32, refs: u8, live: bool) -> Self {
        let live = if live { LIVE_BIT } else { 0 };
        Self(epoch as u64 | ((refs as u64) << REFS_SHIFT) | live)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn epoch(self) -> u32 {
        (self.0 & EPOCH_MASK) as u32
    }

    #[inline]
    pub const fn refs(self) -> u8 {
        ((self.0 & REFS_MASK) >> REFS_SHIFT) as u8
    }

    #[inline]
    pub const fn is_live(self) -> bool {
        self.0 & LIVE_BIT != 0
    }

    #[inline]
    const fn with_refs(self, refs: u8) -> Self {
        Self((self.0 & !REFS_MASK) | ((refs as u64) << REFS_SHIFT))
    }

    /// Whether a descriptor carrying `epoch` may take a reference
    #[inline]
    pub const fn admits(self, epoch: u32) -> bool {
        self.epoch() == epoch && self.is_live() && self.refs() != 0
    }
}

/// A reference taken on a slot, by repossession or by an external refill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repossession {
    /// Slot the reference was taken on
    pub slot: SlotRef,
    /// `tail` as observed when the reference was taken
    pub tail_snapshot: u64,
    /// Reference count observed before the decrement
    pub refs: u32,
}

impl Repossession {
    /// References left on the slot after this one was taken
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.refs.saturating_sub(1)
    }
}

#[repr(C, align(64))]
struct SlotEntry {
    state: AtomicU64,
}

/// Table of packed slot states
pub struct SlotTable {
    entries: Box<[SlotEntry]>,
}

impl SlotTable {
    pub fn new(len: usize) -> Self {
        Self {
            entries: (0..len)
                .map(|_| SlotEntry {
                    state: AtomicU64::new(0),
                })
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, index: u32) -> QueueResult<&SlotEntry> {
        self.entries
            .get(index as usize)
            .ok_or(QueueError::SlotOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Make a slot reusable at `epoch` with `refs` outstanding references
    pub fn arm(&self, index: u32, epoch: u32, refs: u8) -> QueueResult<SlotRef> {
        self.entry(index)?
            .state
            .store(SlotState::new(epoch, refs, true).raw(), Ordering::SeqCst);
        Ok(SlotRef::new(index, epoch))
    }

    /// Clear the live flag so no descriptor can repossess the slot
    pub fn retire(&self, index: u32) -> QueueResult<()> {
        self.entry(index)?
            .state
            .fetch_and(!LIVE_BIT, Ordering::SeqCst);
        Ok(())
    }

    /// Current decoded state of a slot
    pub fn state(&self, index: u32) -> Option<SlotState> {
        self.entries
            .get(index as usize)
            .map(|e| SlotState::from_raw(e.state.load(Ordering::Acquire)))
    }

    /// Take one reference on the slot `slot` names
    ///
    /// Read, verify, CAS; repeat until the CAS lands or verification fails.
    /// Returns the reference count seen before the decrement. A count never
    /// goes below zero: a zero count fails verification first.
    pub fn repossess(&self, slot: SlotRef) -> Option<u32> {
        let entry = self.entries.get(slot.index as usize)?;
        let mut current = SlotState::from_raw(entry.state.load(Ordering::Acquire));

        loop {
            if !current.admits(slot.epoch) {
                return None;
            }

            let next = current.with_refs(current.refs() - 1);
            match entry.state.compare_exchange_weak(
                current.raw(),
                next.raw(),
                Ordering::SeqCst,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(u32::from(current.refs())),
                Err(actual) => current = SlotState::from_raw(actual),
            }
        }
    }
}

/// Shared ring cursor owned by the host pipeline
pub struct RingCursor {
    head: Padded<AtomicU64>,
    tail: Padded<AtomicU64>,
    sequence: Padded<AtomicU32>,
    waiter_count: AtomicI64,
    shutdown: AtomicBool,
    overflow: AtomicBool,
    capacity: u64,
    mask: u64,
    ring: Box<[AtomicU64]>,
    slots: SlotTable,
}

impl RingCursor {
    /// Ring of `RING_CAPACITY` descriptors over an equally sized slot table
    pub fn new() -> Self {
        Self::build(RING_CAPACITY, RING_CAPACITY)
    }

    /// Ring with a custom capacity (power of two) and slot-table size
    pub fn with_capacity(capacity: usize, table_len: usize) -> QueueResult<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(QueueError::InvalidCapacity(capacity));
        }
        Ok(Self::build(capacity, table_len))
    }

    fn build(capacity: usize, table_len: usize) -> Self {
        Self {
            head: Padded(AtomicU64::new(0)),
            tail: Padded(AtomicU64::new(0)),
            sequence: Padded(AtomicU32::new(0)),
            waiter_count: AtomicI64::new(0),
            shutdown: AtomicBool::new(false),
            overflow: AtomicBool::new(false),
            capacity: capacity as u64,
            mask: capacity as u64 - 1,
            ring: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            slots: SlotTable::new(table_len),
        }
    }

    #[inline(always)]
    pub fn head(&self) -> &AtomicU64 {
        &self.head
    }

    #[inline(always)]
    pub fn tail(&self) -> &AtomicU64 {
        &self.tail
    }

    #[inline(always)]
    pub fn sequence(&self) -> &AtomicU32 {
        &self.sequence
    }

    #[inline(always)]
    pub fn waiter_count(&self) -> &AtomicI64 {
        &self.waiter_count
    }

    #[inline(always)]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    /// Descriptor stored for a cursor position
    #[inline]
    pub fn descriptor_at(&self, position: u64) -> SlotRef {
        SlotRef::unpack(self.ring[(position & self.mask) as usize].load(Ordering::Acquire))
    }

    /// Slots between tail and head, folded back into range after wraparound
    #[inline]
    pub fn in_flight(&self) -> u64 {
        let head = self.head.load(Ordering::SeqCst);
        let tail = self.tail.load(Ordering::SeqCst);
        let mut in_flight = head.wrapping_sub(tail);
        if in_flight > self.capacity {
            in_flight = tail.wrapping_sub(head);
        }
        in_flight.min(self.capacity)
    }

    /// Free slots left under the capacity bound
    #[inline]
    pub fn available(&self) -> u64 {
        self.capacity - self.in_flight()
    }

    /// Alias for [`in_flight`](Self::in_flight)
    #[inline]
    pub fn len(&self) -> u64 {
        self.in_flight()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.in_flight() == 0
    }

    /// Arm a slot-table entry so descriptors naming it can be repossessed
    pub fn arm_slot(&self, index: u32, epoch: u32, refs: u8) -> QueueResult<SlotRef> {
        self.slots.arm(index, epoch, refs)
    }

    pub fn retire_slot(&self, index: u32) -> QueueResult<()> {
        self.slots.retire(index)
    }

    /// Push a descriptor at the claim end and bump the head sequence
    ///
    /// Single producer. The head only moves by CAS from the position the
    /// descriptor was written at, so claims on an empty ring never lose a
    /// push. A claim racing into a non-empty ring can read the replacement
    /// descriptor, in which case the one it displaced is dropped.
    pub fn push(&self, slot: SlotRef) -> QueueResult<u64> {
        loop {
            let head = self.head.load(Ordering::SeqCst);
            let tail = self.tail.load(Ordering::SeqCst);
            // Signed: head dips below tail while an acquirer holds an empty claim
            let in_flight = head.wrapping_sub(tail) as i64;

            if in_flight < 0 {
                hint::spin_loop();
                continue;
            }
            if in_flight >= self.capacity as i64 {
                return Err(QueueError::Full {
                    in_flight: in_flight as u64,
                    capacity: self.capacity,
                });
            }

            self.ring[(head & self.mask) as usize].store(slot.pack(), Ordering::Release);
            if self
                .head
                .compare_exchange(head, head.wrapping_add(1), Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.bump_sequence();
                return Ok(head);
            }
        }
    }

    /// Advance the head sequence, clearing any parked marker
    pub fn bump_sequence(&self) -> u32 {
        let previous = self
            .sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.wrapping_add(1) & !PARKED_MASK)
            })
            .unwrap_or_else(|s| s);
        previous.wrapping_add(1) & !PARKED_MASK
    }

    /// True while an acquirer has parked the head sequence
    #[inline]
    pub fn is_parked(&self) -> bool {
        self.sequence.load(Ordering::Acquire) & PARKED_MASK == PARKED_MASK
    }

    /// Ask every acquisition loop to stop at its next round
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Suppress (or re-enable) the external refill path
    pub fn set_overflow(&self, overflow: bool) {
        self.overflow.store(overflow, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_overflowing(&self) -> bool {
        self.overflow.load(Ordering::SeqCst)
    }
}

impl Default for RingCursor {
    fn default() -> Self {
        Self::new()
    }
}
