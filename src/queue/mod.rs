/*!
 * Ring Queue
 * Shared ring cursor, host collaborators and the slot acquisition loop
 */

pub mod acquire;
pub mod cursor;
pub mod hooks;

pub use acquire::{AcquireReport, Resolution, SlotAcquirer};
pub use cursor::{Repossession, RingCursor, SlotRef, SlotState, SlotTable, LIVE_BIT};
pub use hooks::{CommitTarget, NoopHooks, SlotHooks};
