//! Scheduling algorithms.
//!
//! SM-2 owns the interval and due date. The Leitner classifier runs alongside
//! it as a coarser progress indicator and never moves the due date.

pub mod leitner;
pub mod sm2;

use crate::error::Result;
use crate::types::{Difficulty, Sm2State};
use chrono::{DateTime, Utc};

/// Result of scheduling a card after review.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingResult {
    pub new_state: Sm2State,
    pub next_due: DateTime<Utc>,
}

/// Trait for interval-based spaced repetition algorithms.
pub trait SpacedRepetitionAlgorithm: Send + Sync {
    /// Algorithm identifier.
    fn name(&self) -> &'static str;

    /// Calculate next review state after a review.
    fn schedule(
        &self,
        state: &Sm2State,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<SchedulingResult>;

    /// Initial state for a new card.
    fn initial_state(&self) -> Sm2State;
}
