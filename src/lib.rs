/*!
 * Adaptive Sync Library
 * Spin-then-block waiting and lock-free ring slot acquisition
 */

pub mod core;
pub mod monitoring;
pub mod queue;

// Re-exports
pub use crate::core::errors::{QueueError, QueueResult, SyncError, SyncResult};
pub use crate::core::sync::{
    AdaptiveWaiter, PauseStrategy, ProfileSnapshot, Role, SyncConfig, ThreadProfileRegistry,
    WaitHandlePool, WaitOutcome, Watch,
};
pub use monitoring::init_tracing;
pub use queue::{
    AcquireReport, CommitTarget, NoopHooks, Repossession, Resolution, RingCursor, SlotAcquirer,
    SlotHooks, SlotRef,
};
