//! The review transition: SM-2, Leitner and lifecycle applied together.

use chrono::{DateTime, Utc};

use crate::algorithm::leitner;
use crate::algorithm::sm2::Sm2;
use crate::algorithm::SpacedRepetitionAlgorithm;
use crate::error::{Result, SchedulerError};
use crate::lifecycle::Lifecycle;
use crate::types::{CardStatus, Difficulty, Flashcard, SchedulerSettings, SchedulingSnapshot};

/// Everything a single review changes on a card.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub card: Flashcard,
    pub before: SchedulingSnapshot,
    pub after: SchedulingSnapshot,
    pub previous_status: CardStatus,
    pub next_due: DateTime<Utc>,
}

impl ReviewOutcome {
    pub fn was_new(&self) -> bool {
        self.previous_status == CardStatus::New
    }
}

/// Applies reviews to cards. Pure: no clock, no storage.
#[derive(Debug, Clone)]
pub struct Scheduler {
    sm2: Sm2,
    lifecycle: Lifecycle,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(&SchedulerSettings::default())
    }
}

impl Scheduler {
    pub fn new(settings: &SchedulerSettings) -> Self {
        Self {
            sm2: Sm2::with_maximum_interval(settings.max_interval_days),
            lifecycle: Lifecycle::new(settings.mastery_threshold),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Name of the interval algorithm, for logs.
    pub fn algorithm_name(&self) -> &'static str {
        self.sm2.name()
    }

    /// Compute the post-review card. The input card is left untouched.
    ///
    /// Early reviews are allowed; the new due date counts from `now`.
    pub fn apply_review(
        &self,
        card: &Flashcard,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let before = card.snapshot();
        let scheduled = self.sm2.schedule(&card.sm2_state(), difficulty, now)?;
        let leitner_box = leitner::classify(card.leitner_box, difficulty);

        let after = SchedulingSnapshot {
            ease_factor: scheduled.new_state.ease_factor,
            interval: scheduled.new_state.interval,
            repetitions: scheduled.new_state.repetitions,
            leitner_box,
        };

        let mut updated = card.clone();
        updated.apply_snapshot(&after, scheduled.next_due);
        updated.status = self
            .lifecycle
            .transition(card.status, difficulty, after.repetitions);
        updated.last_review = Some(now);
        updated.updated_at = now;
        updated.total_reviews = card.total_reviews.saturating_add(1);
        if difficulty.is_lapse() {
            updated.streak = 0;
        } else {
            updated.correct_reviews = card.correct_reviews.saturating_add(1);
            updated.streak = card.streak.saturating_add(1);
        }
        updated.max_streak = card.max_streak.max(updated.streak);

        self.check_invariants(&before, &after, difficulty)?;

        Ok(ReviewOutcome {
            card: updated,
            before,
            after,
            previous_status: card.status,
            next_due: scheduled.next_due,
        })
    }

    fn check_invariants(
        &self,
        before: &SchedulingSnapshot,
        after: &SchedulingSnapshot,
        difficulty: Difficulty,
    ) -> Result<()> {
        if !(after.ease_factor >= self.sm2.minimum_ease) || !after.ease_factor.is_finite() {
            return Err(SchedulerError::InvariantViolation(format!(
                "ease factor {} below {}",
                after.ease_factor, self.sm2.minimum_ease
            )));
        }
        if after.interval < 1 {
            return Err(SchedulerError::InvariantViolation(
                "interval below 1 day".to_string(),
            ));
        }
        let expected_repetitions = if difficulty.is_lapse() {
            0
        } else {
            before.repetitions.saturating_add(1)
        };
        if after.repetitions != expected_repetitions {
            return Err(SchedulerError::InvariantViolation(format!(
                "repetitions {} -> {} on {}",
                before.repetitions, after.repetitions, difficulty
            )));
        }
        if !leitner::is_valid_transition(before.leitner_box, after.leitner_box, difficulty) {
            return Err(SchedulerError::InvariantViolation(format!(
                "leitner box {} -> {} on {}",
                before.leitner_box.as_str(),
                after.leitner_box.as_str(),
                difficulty
            )));
        }
        Ok(())
    }
}

/// Retention as a percentage with two decimals; zero when nothing was reviewed.
pub fn retention_rate(correct_reviews: u32, total_reviews: u32) -> f64 {
    if total_reviews == 0 {
        return 0.0;
    }
    round2(f64::from(correct_reviews) / f64::from(total_reviews) * 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
