//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("card not found: {0}")]
    CardNotFound(i64),

    /// The stored row moved past the version the caller read.
    #[error("card {card_id} was modified concurrently (expected version {expected_version})")]
    Conflict { card_id: i64, expected_version: i64 },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
