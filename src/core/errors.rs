/*!
 * Error Types
 * Construction and producer-side errors with thiserror, miette, and serde support
 *
 * The waiting and acquisition hot paths never return errors: timeouts, lost
 * races and stale slots are routine outcomes reported through return values.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Synchronization setup errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Invalid sync configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Spin bounds must satisfy 0 < min_spin <= max_spin and the yield interval must be a power of two.")
    )]
    InvalidConfig(String),

    #[error("Failed to create wait handle {index}: {reason}")]
    #[diagnostic(
        code(sync::handle_creation),
        help("The pool keeps running; waits on this slot degrade to busy polling.")
    )]
    HandleCreation { index: usize, reason: String },
}

/// Ring cursor errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum QueueError {
    #[error("Ring full: {in_flight} of {capacity} slots in flight")]
    #[diagnostic(
        code(queue::full),
        help("Consumers are behind. Wait for acquisitions to drain the ring.")
    )]
    Full { in_flight: u64, capacity: u64 },

    #[error("Slot {index} out of range (table holds {len})")]
    #[diagnostic(code(queue::slot_out_of_range))]
    SlotOutOfRange { index: u32, len: usize },

    #[error("Invalid ring capacity {0}")]
    #[diagnostic(
        code(queue::invalid_capacity),
        help("Capacity must be a non-zero power of two.")
    )]
    InvalidCapacity(usize),
}

/// Result type for synchronization setup
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for ring cursor operations
pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::Full {
            in_flight: 4096,
            capacity: 4096,
        };
        assert_eq!(err.to_string(), "Ring full: 4096 of 4096 slots in flight");
    }

    #[test]
    fn test_error_serializes_tagged() {
        let err = SyncError::InvalidConfig("min_spin is zero".into());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"error_type\":\"invalid_config\""));
    }
}
