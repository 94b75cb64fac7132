//! SM-2 spaced repetition algorithm.
//!
//! Based on SuperMemo 2 with a lapse branch: a failed review resets the
//! repetition count and interval but leaves the ease factor alone.

use super::{SchedulingResult, SpacedRepetitionAlgorithm};
use crate::error::{Result, SchedulerError};
use crate::types::{Difficulty, Sm2State};
use chrono::{DateTime, Duration, Utc};

/// SM-2 algorithm with configurable parameters.
#[derive(Debug, Clone)]
pub struct Sm2 {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub first_interval: u32,
    pub second_interval: u32,
    pub maximum_interval: u32,
}

impl Default for Sm2 {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
            first_interval: 1,
            second_interval: 6,
            maximum_interval: 365,
        }
    }
}

impl SpacedRepetitionAlgorithm for Sm2 {
    fn name(&self) -> &'static str {
        "sm2"
    }

    fn initial_state(&self) -> Sm2State {
        Sm2State {
            ease_factor: self.initial_ease,
            interval: 1,
            repetitions: 0,
        }
    }

    fn schedule(
        &self,
        state: &Sm2State,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<SchedulingResult> {
        self.validate(state)?;

        let new_state = if difficulty.is_lapse() {
            Sm2State {
                ease_factor: state.ease_factor,
                interval: 1,
                repetitions: 0,
            }
        } else {
            let repetitions = state.repetitions.saturating_add(1);
            let interval = match repetitions {
                1 => self.first_interval,
                2 => self.second_interval,
                _ => self.grow_interval(state.interval, state.ease_factor),
            };
            Sm2State {
                ease_factor: self.next_ease(state.ease_factor, difficulty.quality()),
                interval: interval.clamp(1, self.maximum_interval.max(1)),
                repetitions,
            }
        };

        let next_due = Duration::try_days(i64::from(new_state.interval))
            .and_then(|offset| now.checked_add_signed(offset))
            .ok_or_else(|| {
                SchedulerError::InvariantViolation(format!(
                    "due date out of range for an interval of {} days",
                    new_state.interval
                ))
            })?;

        Ok(SchedulingResult {
            new_state,
            next_due,
        })
    }
}

impl Sm2 {
    /// SM-2 with the given interval cap.
    pub fn with_maximum_interval(maximum_interval: u32) -> Self {
        Self {
            maximum_interval,
            ..Self::default()
        }
    }

    /// EF' = EF + (0.1 - (6 - q) * (0.08 + (6 - q) * 0.02)), floored at the minimum.
    pub fn next_ease(&self, ease_factor: f64, quality: u8) -> f64 {
        // Worked in hundredths so a zero adjustment stays exactly zero.
        let d = i32::from(6 - quality.min(6));
        let adjustment = f64::from(10 - d * (8 + 2 * d)) / 100.0;
        (ease_factor + adjustment).max(self.minimum_ease)
    }

    fn grow_interval(&self, previous: u32, ease_factor: f64) -> u32 {
        let grown = (f64::from(previous) * ease_factor).round();
        grown.min(f64::from(self.maximum_interval)) as u32
    }

    fn validate(&self, state: &Sm2State) -> Result<()> {
        // Written so NaN fails too.
        if !(state.ease_factor >= self.minimum_ease) || !state.ease_factor.is_finite() {
            return Err(SchedulerError::InvalidState(format!(
                "ease factor {} below minimum {}",
                state.ease_factor, self.minimum_ease
            )));
        }
        if state.interval < 1 {
            return Err(SchedulerError::InvalidState(format!(
                "interval {} below 1 day",
                state.interval
            )));
        }
        Ok(())
    }
}
