/*!
 * Synchronization Configuration
 *
 * Runtime tunables for spinning, pacing and blocking
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    MAX_SPIN, MIN_SPIN, PARK_AFTER_ROUNDS, WAIT_TIMEOUT, WORKER_PAUSE_ITERATIONS,
    YIELD_EVERY_N_SPINS,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Floor of the adaptive spin budget
    pub min_spin: u32,
    /// Ceiling of the adaptive spin budget (main thread always spins this much)
    pub max_spin: u32,
    /// Bound on a single blocking wait
    pub wait_timeout: Duration,
    /// Workers yield on every Nth spin once past warm-up (power of two)
    pub yield_interval: u32,
    /// Spin-loop hints per iteration for workers past warm-up
    pub worker_pause_iterations: u32,
    /// Empty acquisition rounds before parking the head sequence
    pub park_after_rounds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_spin: MIN_SPIN,
            max_spin: MAX_SPIN,
            wait_timeout: WAIT_TIMEOUT,
            yield_interval: YIELD_EVERY_N_SPINS,
            worker_pause_iterations: WORKER_PAUSE_ITERATIONS,
            park_after_rounds: PARK_AFTER_ROUNDS,
        }
    }
}

impl SyncConfig {
    /// Configuration for pipelines where every thread is latency critical
    pub const fn low_latency() -> Self {
        Self {
            min_spin: MAX_SPIN / 2,
            max_spin: MAX_SPIN,
            wait_timeout: Duration::from_micros(200),
            yield_interval: 64,
            worker_pause_iterations: 4,
            park_after_rounds: PARK_AFTER_ROUNDS * 4,
        }
    }

    /// Configuration that gives up the CPU early
    pub const fn power_saving() -> Self {
        Self {
            min_spin: MIN_SPIN / 2,
            max_spin: MAX_SPIN / 4,
            wait_timeout: WAIT_TIMEOUT,
            yield_interval: 8,
            worker_pause_iterations: WORKER_PAUSE_ITERATIONS * 2,
            park_after_rounds: 2,
        }
    }

    /// Load defaults, overridden by `SYNC_*` environment variables
    ///
    /// Environment variables:
    /// - SYNC_MIN_SPIN / SYNC_MAX_SPIN: spin budget bounds
    /// - SYNC_WAIT_TIMEOUT_US: blocking wait bound in microseconds
    /// - SYNC_YIELD_INTERVAL: worker yield period
    /// - SYNC_WORKER_PAUSES: worker pause count
    /// - SYNC_PARK_AFTER_ROUNDS: empty rounds before parking
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_value("SYNC_MIN_SPIN") {
            config.min_spin = v;
        }
        if let Some(v) = env_value("SYNC_MAX_SPIN") {
            config.max_spin = v;
        }
        if let Some(v) = env_value::<u64>("SYNC_WAIT_TIMEOUT_US") {
            config.wait_timeout = Duration::from_micros(v);
        }
        if let Some(v) = env_value("SYNC_YIELD_INTERVAL") {
            config.yield_interval = v;
        }
        if let Some(v) = env_value("SYNC_WORKER_PAUSES") {
            config.worker_pause_iterations = v;
        }
        if let Some(v) = env_value("SYNC_PARK_AFTER_ROUNDS") {
            config.park_after_rounds = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the waiter relies on
    pub fn validate(&self) -> SyncResult<()> {
        if self.min_spin == 0 {
            return Err(SyncError::InvalidConfig("min_spin must be non-zero".into()));
        }
        if self.min_spin > self.max_spin {
            return Err(SyncError::InvalidConfig(format!(
                "min_spin {} exceeds max_spin {}",
                self.min_spin, self.max_spin
            )));
        }
        if self.worker_pause_iterations < 4 {
            return Err(SyncError::InvalidConfig(format!(
                "worker_pause_iterations {} is below the warm-up pause count of 4",
                self.worker_pause_iterations
            )));
        }
        if !self.yield_interval.is_power_of_two() {
            return Err(SyncError::InvalidConfig(format!(
                "yield_interval {} is not a power of two",
                self.yield_interval
            )));
        }
        Ok(())
    }

    /// Clamp a budget into the configured bounds
    #[inline]
    pub fn clamp_spin(&self, budget: u32) -> u32 {
        budget.clamp(self.min_spin, self.max_spin)
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable sync setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_spin, 32);
        assert_eq!(config.max_spin, 1024);
        assert_eq!(config.wait_timeout, Duration::from_millis(1));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(SyncConfig::low_latency().validate().is_ok());
        assert!(SyncConfig::power_saving().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = SyncConfig {
            min_spin: 100,
            max_spin: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_odd_yield_interval() {
        let config = SyncConfig {
            yield_interval: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shrinking_worker_pauses() {
        let config = SyncConfig {
            worker_pause_iterations: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_spin() {
        let config = SyncConfig::default();
        assert_eq!(config.clamp_spin(0), 32);
        assert_eq!(config.clamp_spin(5000), 1024);
        assert_eq!(config.clamp_spin(100), 100);
    }
}
