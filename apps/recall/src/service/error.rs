//! Errors surfaced to callers of the review service.

use recall_core::SchedulerError;
use thiserror::Error;

use crate::db::DbError;

/// Result type alias using ReviewError.
pub type Result<T> = std::result::Result<T, ReviewError>;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("flashcard not found: {0}")]
    NotFound(i64),

    #[error("invalid difficulty: {0:?}")]
    InvalidDifficulty(String),

    /// Another writer saved the card first. Retry the whole review.
    #[error("flashcard {card_id} was modified concurrently (expected version {expected_version})")]
    Conflict { card_id: i64, expected_version: i64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid scheduling state: {0}")]
    InvalidState(String),

    #[error("response time out of range: {0} ms")]
    InvalidResponseTime(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("import of {count} cards exceeds the limit of {max}")]
    ImportTooLarge { count: usize, max: usize },

    #[error(transparent)]
    Storage(DbError),
}

impl From<DbError> for ReviewError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::CardNotFound(id) => Self::NotFound(id),
            DbError::Conflict {
                card_id,
                expected_version,
            } => Self::Conflict {
                card_id,
                expected_version,
            },
            other => Self::Storage(other),
        }
    }
}

impl From<SchedulerError> for ReviewError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::InvalidDifficulty(value) => Self::InvalidDifficulty(value),
            SchedulerError::InvalidState(message) => Self::InvalidState(message),
            SchedulerError::InvariantViolation(message) => Self::InvariantViolation(message),
            SchedulerError::InvalidResponseTime(ms) => Self::InvalidResponseTime(ms),
        }
    }
}
