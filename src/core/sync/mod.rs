/*!
 * Synchronization Primitives
 *
 * Adaptive spin-then-block waiting for hot shared words:
 * - Role-aware pacing between re-checks
 * - A fixed pool of reusable wait handles
 * - Per-thread spin budgets driven by recent outcomes
 *
 * # Architecture
 *
 * `AdaptiveWaiter` owns a `WaitHandlePool` and a `ThreadProfileRegistry` and
 * consults `PauseStrategy` while spinning. Construct it once and pass it by
 * reference; nothing here is a process global, so tests build isolated
 * instances.
 *
 * # Performance
 *
 * - Lock-free fast paths: atomic loads, `fetch_add` and CAS only
 * - No allocation after construction
 * - Cache-line aligned profiles and events to prevent false sharing
 */

mod config;
mod event;
mod identity;
mod pause;
mod pool;
mod profile;
mod traits;
mod waiter;

pub use config::SyncConfig;
pub use event::AutoResetEvent;
pub use identity::current_token;
pub use pause::{Pace, PauseStrategy};
pub use pool::{WaitHandle, WaitHandlePool};
pub use profile::{ProfileSnapshot, Role, ThreadProfile, ThreadProfileRegistry};
pub use traits::{WaitStatus, Watch};
pub use waiter::{AdaptiveWaiter, WaitOutcome};
