/*!
 * Synchronization Traits
 *
 * Core abstractions for watching a shared word and reporting how a wait ended.
 *
 * # Design: Width Through Types
 *
 * A wait compares the watched value against a comparand of the same width.
 * Instead of passing a byte count alongside a raw address, the width is
 * carried by the atomic type implementing `Watch`, so an `AtomicU32` can only
 * be compared against a `u32`.
 */

use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Result of one blocking wait on a pool handle
///
/// Compact representation for efficient returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The handle was signalled before the timeout
    Signaled,
    /// The timeout elapsed (routine, not an error)
    TimedOut,
}

impl WaitStatus {
    /// Check if the wait ran into its timeout
    #[inline(always)]
    pub fn timed_out(&self) -> bool {
        matches!(self, WaitStatus::TimedOut)
    }
}

/// A shared word that can be watched for change
///
/// Implementations must be:
/// - **Thread-safe**: read concurrently with writers on other threads
/// - **Cheap**: `current` is called on every spin iteration
pub trait Watch: Send + Sync {
    /// Plain value stored in the watched word
    type Value: Copy + Eq + std::fmt::Debug;

    /// Read the current value with acquire ordering
    fn current(&self) -> Self::Value;

    /// Width of the watched word in bytes
    #[inline(always)]
    fn width(&self) -> usize {
        std::mem::size_of::<Self::Value>()
    }

    /// Check whether the value moved away from `expected`
    #[inline(always)]
    fn differs_from(&self, expected: Self::Value) -> bool {
        self.current() != expected
    }
}

macro_rules! impl_watch {
    ($($atomic:ty => $value:ty),* $(,)?) => {
        $(
            impl Watch for $atomic {
                type Value = $value;

                #[inline(always)]
                fn current(&self) -> $value {
                    self.load(Ordering::Acquire)
                }
            }
        )*
    };
}

impl_watch!(
    AtomicU8 => u8,
    AtomicU16 => u16,
    AtomicU32 => u32,
    AtomicU64 => u64,
    AtomicUsize => usize,
);
