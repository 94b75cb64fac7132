//! Error types for recall-core.

use thiserror::Error;

/// Result type alias using SchedulerError.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors raised by the scheduling core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("invalid difficulty: {0:?}")]
    InvalidDifficulty(String),

    /// Incoming scheduling state already breaks an invariant.
    #[error("invalid scheduling state: {0}")]
    InvalidState(String),

    /// A computed field would break an invariant. Nothing may be persisted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("response time out of range: {0} ms")]
    InvalidResponseTime(i64),
}
