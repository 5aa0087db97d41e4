/*!
 * System Limits and Constants
 *
 * Centralized location for the fixed sizes and thresholds used by the
 * synchronization core and the ring cursor.
 *
 * ## Conventions
 * - Values are grouped by domain (spinning, waiting, profiles, ring)
 * - Performance-critical constants are marked with [PERF]
 * - Table sizes are powers of two so indices reduce with a mask
 */

use std::time::Duration;

// =============================================================================
// SPIN BUDGET
// =============================================================================

/// Lowest adaptive spin budget a worker can converge to
pub const MIN_SPIN: u32 = 32;

/// Highest adaptive spin budget, and the fixed budget of the main thread
/// [PERF] Roughly a few microseconds of pausing on current x86 parts
pub const MAX_SPIN: u32 = 1024;

// =============================================================================
// PACING
// =============================================================================

/// Worker threads yield to the scheduler on every Nth spin past the warm-up
/// Must be a power of two
pub const YIELD_EVERY_N_SPINS: u32 = 32;

/// Spin-loop hints issued per iteration once a worker is past warm-up
pub const WORKER_PAUSE_ITERATIONS: u32 = 6;

// =============================================================================
// BLOCKING WAIT
// =============================================================================

/// Upper bound on one blocking wait
/// [PERF] Short enough that a missed wake only costs a millisecond of staleness
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(1);

/// Number of pre-created wait handles
pub const WAIT_HANDLE_POOL_SIZE: usize = 256;

// =============================================================================
// THREAD PROFILES
// =============================================================================

/// Maximum tracked threads before round-robin eviction kicks in
pub const MAX_TRACKED_THREADS: usize = 64;

// =============================================================================
// RING CURSOR
// =============================================================================

/// Slots in the descriptor ring
/// [PERF] Power of two: position & (capacity - 1) picks the ring index
pub const RING_CAPACITY: usize = 4096;

/// Empty rounds an acquirer tolerates before parking the head sequence
pub const PARK_AFTER_ROUNDS: u32 = 10;

/// High-bit pattern written into the head sequence word while parked
pub const PARKED_MASK: u32 = 0xFF80_0000;
