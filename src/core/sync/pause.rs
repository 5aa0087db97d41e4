/*!
 * Role-Aware Pause Strategy
 *
 * Paces a spin loop between condition re-checks. The hint count per step
 * never decreases as the spin index grows within a burst, and restarts with
 * each burst. Past warm-up, workers interleave yields with the longest pause.
 *
 * # Policy
 *
 * - **Main**: 1 hint below 8 spins, 2 below 32, then 4. Never yields, because
 *   a voluntary yield can cost the latency-critical thread a full scheduler
 *   quantum.
 * - **Worker**: 1 hint below 4 spins, 4 below 16, then a zero-length yield on
 *   every `yield_interval`-th spin and `worker_pause_iterations` hints on the
 *   others.
 */

use super::config::SyncConfig;
use super::profile::{Role, ThreadProfile};
use std::hint;
use std::thread;

/// What one pacing step does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Issue this many spin-loop hints
    Pause(u32),
    /// Hand the rest of the time slice back to the OS scheduler
    Yield,
}

/// Role-aware pacing between spin re-checks
#[derive(Debug, Clone, Copy)]
pub struct PauseStrategy {
    yield_mask: u32,
    worker_pauses: u32,
}

impl PauseStrategy {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            yield_mask: config.yield_interval.max(1) - 1,
            worker_pauses: config.worker_pause_iterations,
        }
    }

    /// Decide the pacing step without executing it
    #[inline]
    pub fn plan(&self, role: Role, spin: u32) -> Pace {
        match role {
            Role::Main => match spin {
                0..=7 => Pace::Pause(1),
                8..=31 => Pace::Pause(2),
                _ => Pace::Pause(4),
            },
            Role::Worker => match spin {
                0..=3 => Pace::Pause(1),
                4..=15 => Pace::Pause(4),
                _ if spin & self.yield_mask == 0 => Pace::Yield,
                _ => Pace::Pause(self.worker_pauses),
            },
        }
    }

    /// Delay the calling thread according to its profile
    #[inline]
    pub fn pace(&self, profile: &ThreadProfile, spin: u32) {
        match self.plan(profile.role(), spin) {
            Pace::Pause(n) => {
                for _ in 0..n {
                    hint::spin_loop();
                }
            }
            Pace::Yield => thread::yield_now(),
        }
    }
}

impl Default for PauseStrategy {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}
