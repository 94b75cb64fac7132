//! Scheduling core for the recall flashcard engine.
//!
//! Provides:
//! - SM-2 interval engine and seven-box Leitner classifier
//! - Card lifecycle state machine
//! - The combined review transition with post-condition checks
//! - Collection statistics and daily study counters
//!
//! Everything here is pure; storage and the clock live in the application crate.

pub mod algorithm;
pub mod error;
pub mod lifecycle;
pub mod review;
pub mod stats;
pub mod types;

pub use algorithm::{SchedulingResult, SpacedRepetitionAlgorithm};
pub use error::{Result, SchedulerError};
pub use lifecycle::{Lifecycle, StatusCommand};
pub use review::{retention_rate, ReviewOutcome, Scheduler};
pub use stats::{
    compute_stats, review_capacity, FlashcardStats, LeitnerDistribution, ReviewCapacity,
    StatusDistribution, StudyStats,
};
pub use types::{
    CardStatus, CardUpdate, Difficulty, Flashcard, LeitnerBox, NewFlashcard, ResponseTimePolicy,
    ReviewRecord, SchedulerSettings, SchedulingSnapshot, Sm2State, MAX_INTERVAL_CAP_DAYS,
    PASSING_QUALITY,
};
