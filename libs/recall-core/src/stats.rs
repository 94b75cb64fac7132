//! Daily study counters and collection-wide statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::review::{round2, ReviewOutcome};
use crate::types::{CardStatus, Flashcard, LeitnerBox, SchedulerSettings};

/// Card count per Leitner box. Always holds all seven boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeitnerDistribution(BTreeMap<LeitnerBox, u64>);

impl Default for LeitnerDistribution {
    fn default() -> Self {
        Self(LeitnerBox::ALL.iter().map(|b| (*b, 0)).collect())
    }
}

impl LeitnerDistribution {
    pub fn get(&self, leitner_box: LeitnerBox) -> u64 {
        self.0.get(&leitner_box).copied().unwrap_or(0)
    }

    pub fn set(&mut self, leitner_box: LeitnerBox, count: u64) {
        self.0.insert(leitner_box, count);
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

/// Card count per status. Always holds all six statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusDistribution(BTreeMap<CardStatus, u64>);

impl Default for StatusDistribution {
    fn default() -> Self {
        Self(CardStatus::ALL.iter().map(|s| (*s, 0)).collect())
    }
}

impl StatusDistribution {
    pub fn get(&self, status: CardStatus) -> u64 {
        self.0.get(&status).copied().unwrap_or(0)
    }

    fn increment(&mut self, status: CardStatus) {
        *self.0.entry(status).or_insert(0) += 1;
    }
}

/// How much to study today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCapacity {
    pub max_new_cards: u32,
    pub max_review_cards: u32,
    pub recommended_minutes: u32,
}

/// Collection-wide statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardStats {
    pub total_cards: u64,
    pub due_cards: u64,
    pub status_distribution: StatusDistribution,
    pub leitner_distribution: LeitnerDistribution,
    /// Mean lifetime retention (percent) over cards reviewed at least once.
    pub average_retention_rate: f64,
    pub review_capacity: ReviewCapacity,
}

/// Aggregate a consistent set of cards. Deterministic for a given `now`.
pub fn compute_stats(
    cards: &[Flashcard],
    now: DateTime<Utc>,
    settings: &SchedulerSettings,
) -> FlashcardStats {
    let mut status_distribution = StatusDistribution::default();
    let mut leitner_distribution = LeitnerDistribution::default();
    let mut due_cards = 0u64;
    let mut retention_sum = 0.0;
    let mut reviewed_cards = 0u32;

    for card in cards {
        status_distribution.increment(card.status);
        let count = leitner_distribution.get(card.leitner_box);
        leitner_distribution.set(card.leitner_box, count + 1);
        if card.is_due(now) {
            due_cards += 1;
        }
        if card.total_reviews > 0 {
            retention_sum += f64::from(card.correct_reviews) / f64::from(card.total_reviews);
            reviewed_cards += 1;
        }
    }

    let average_retention_rate = if reviewed_cards == 0 {
        0.0
    } else {
        round2(retention_sum / f64::from(reviewed_cards) * 100.0)
    };

    let total_cards = cards.len() as u64;
    FlashcardStats {
        total_cards,
        due_cards,
        status_distribution,
        leitner_distribution,
        average_retention_rate,
        review_capacity: review_capacity(total_cards, due_cards, settings),
    }
}

/// Daily workload heuristic: a tenth of the collection as new cards, and a
/// fixed per-card time estimate times every due card, bounded to a sane range.
/// `reviews_per_day` caps the queue, not the time estimate.
pub fn review_capacity(total_cards: u64, due_cards: u64, settings: &SchedulerSettings) -> ReviewCapacity {
    let tenth = u32::try_from(total_cards / 10).unwrap_or(u32::MAX);
    let max_new_cards = settings.new_cards_per_day.min(tenth.max(1));
    let max_review_cards = settings.reviews_per_day;

    let workload = due_cards.saturating_mul(u64::from(settings.seconds_per_card));
    let minutes = u32::try_from(workload.div_ceil(60)).unwrap_or(u32::MAX);
    let recommended_minutes = minutes
        .max(settings.min_study_minutes)
        .min(settings.max_study_minutes.max(settings.min_study_minutes));

    ReviewCapacity {
        max_new_cards,
        max_review_cards,
        recommended_minutes,
    }
}

/// Study counters for one study day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyStats {
    pub date: NaiveDate,
    /// Cards reviewed for the first time.
    pub new_cards: u32,
    pub reviewed_cards: u32,
    pub correct_cards: u32,
    /// Cumulative response time.
    pub study_time_ms: i64,
    /// Mean response time in milliseconds.
    pub average_response_time: f64,
    /// Box occupancy of the whole collection as of the day's last review.
    /// Storage refreshes it; `record_review` leaves it alone.
    pub box_counts: LeitnerDistribution,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyStats {
    pub fn new(date: NaiveDate, box_counts: LeitnerDistribution, now: DateTime<Utc>) -> Self {
        Self {
            date,
            new_cards: 0,
            reviewed_cards: 0,
            correct_cards: 0,
            study_time_ms: 0,
            average_response_time: 0.0,
            box_counts,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold one review into the day's counters.
    pub fn record_review(&mut self, outcome: &ReviewOutcome, correct: bool, response_time_ms: i64) {
        if outcome.was_new() {
            self.new_cards += 1;
        }
        self.reviewed_cards += 1;
        if correct {
            self.correct_cards += 1;
        }
        self.study_time_ms = self.study_time_ms.saturating_add(response_time_ms);
        self.average_response_time = self.study_time_ms as f64 / f64::from(self.reviewed_cards);
        self.updated_at = outcome.card.updated_at;
    }

    /// Percentage of today's reviews answered correctly.
    pub fn accuracy(&self) -> f64 {
        crate::review::retention_rate(self.correct_cards, self.reviewed_cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::Scheduler;
    use crate::types::{Difficulty, NewFlashcard};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn card(id: i64) -> Flashcard {
        Flashcard::new(id, NewFlashcard::default(), now() - Duration::days(1))
    }

    #[test]
    fn empty_collection() {
        let stats = compute_stats(&[], now(), &SchedulerSettings::default());
        assert_eq!(stats.total_cards, 0);
        assert_eq!(stats.due_cards, 0);
        assert_eq!(stats.average_retention_rate, 0.0);
        assert_eq!(stats.leitner_distribution.total(), 0);
        assert_eq!(stats.review_capacity.max_new_cards, 1);
        assert_eq!(stats.review_capacity.recommended_minutes, 10);
    }

    #[test]
    fn due_count_skips_side_states_and_future_cards() {
        let mut cards: Vec<_> = (1..=5).map(card).collect();
        cards[0].status = CardStatus::Suspended;
        cards[1].status = CardStatus::Buried;
        cards[2].due_date = now() + Duration::hours(1);

        let stats = compute_stats(&cards, now(), &SchedulerSettings::default());
        assert_eq!(stats.total_cards, 5);
        assert_eq!(stats.due_cards, 2);
        assert_eq!(stats.status_distribution.get(CardStatus::New), 3);
        assert_eq!(stats.status_distribution.get(CardStatus::Suspended), 1);
        assert_eq!(stats.status_distribution.get(CardStatus::Buried), 1);
        assert_eq!(stats.status_distribution.get(CardStatus::Reviewing), 0);
    }

    #[test]
    fn average_retention_ignores_unreviewed_cards() {
        let mut cards: Vec<_> = (1..=3).map(card).collect();
        cards[0].total_reviews = 4;
        cards[0].correct_reviews = 4;
        cards[1].total_reviews = 4;
        cards[1].correct_reviews = 2;
        let stats = compute_stats(&cards, now(), &SchedulerSettings::default());
        assert_eq!(stats.average_retention_rate, 75.0);
    }

    #[test]
    fn leitner_distribution_counts_boxes() {
        let mut cards: Vec<_> = (1..=4).map(card).collect();
        cards[0].leitner_box = LeitnerBox::Box3;
        cards[1].leitner_box = LeitnerBox::Box3;
        cards[2].leitner_box = LeitnerBox::Box7;
        let stats = compute_stats(&cards, now(), &SchedulerSettings::default());
        assert_eq!(stats.leitner_distribution.get(LeitnerBox::Box1), 1);
        assert_eq!(stats.leitner_distribution.get(LeitnerBox::Box3), 2);
        assert_eq!(stats.leitner_distribution.get(LeitnerBox::Box7), 1);
        assert_eq!(stats.leitner_distribution.total(), 4);
    }

    #[test]
    fn capacity_scales_with_due_count() {
        let settings = SchedulerSettings::default();
        assert_eq!(
            review_capacity(500, 80, &settings),
            ReviewCapacity {
                max_new_cards: 20,
                max_review_cards: 100,
                recommended_minutes: 40,
            }
        );
        assert_eq!(review_capacity(30, 5, &settings).max_new_cards, 3);
        assert_eq!(review_capacity(5_000, 1_000, &settings).recommended_minutes, 60);
        // Due cards beyond the daily review cap still count towards time.
        assert_eq!(review_capacity(1_000, 110, &settings).recommended_minutes, 55);
    }

    #[test]
    fn compute_stats_is_idempotent() {
        let cards: Vec<_> = (1..=10).map(card).collect();
        let settings = SchedulerSettings::default();
        assert_eq!(
            compute_stats(&cards, now(), &settings),
            compute_stats(&cards, now(), &settings)
        );
    }

    #[test]
    fn study_stats_accumulate_reviews() {
        let scheduler = Scheduler::default();
        let mut boxes = LeitnerDistribution::default();
        boxes.set(LeitnerBox::Box1, 2);
        let mut daily = StudyStats::new(now().date_naive(), boxes, now());

        let first = scheduler.apply_review(&card(1), Difficulty::Good, now()).unwrap();
        daily.record_review(&first, true, 1_000);
        let second = scheduler.apply_review(&card(2), Difficulty::Again, now()).unwrap();
        daily.record_review(&second, false, 3_000);

        assert_eq!(daily.new_cards, 2);
        assert_eq!(daily.reviewed_cards, 2);
        assert_eq!(daily.correct_cards, 1);
        assert_eq!(daily.study_time_ms, 4_000);
        assert_eq!(daily.average_response_time, 2_000.0);
        assert_eq!(daily.box_counts.get(LeitnerBox::Box1), 2);
        assert_eq!(daily.accuracy(), 50.0);
    }
}
