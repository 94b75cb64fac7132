//! Review service.
//!
//! Composes the pure scheduling core with storage. Each review runs as one
//! transaction: the card, its review record and the day's counters are
//! written together or not at all.

pub mod error;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use recall_core::{
    compute_stats, CardUpdate, Difficulty, Flashcard, FlashcardStats, NewFlashcard, ReviewRecord,
    Scheduler, SchedulerSettings, StatusCommand, StudyStats,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::date_utils::study_day;
use crate::db::{CardFilter, CardPage, Store};

pub use error::{Result, ReviewError};

/// Most cards accepted by a single import.
pub const MAX_IMPORT_BATCH: usize = 1000;

/// Due queue size when the caller does not pass one.
pub const DEFAULT_DUE_LIMIT: usize = 50;

/// Source of the current instant.
pub type Clock = fn() -> DateTime<Utc>;

/// What a caller gets back from a review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewResult {
    pub card: Flashcard,
    pub review_record: ReviewRecord,
    pub next_due_date: DateTime<Utc>,
    /// When the card's Leitner box alone would bring it back.
    pub leitner_due_date: DateTime<Utc>,
    /// Lifetime retention of the card, in percent.
    pub retention_rate: f64,
}

pub struct ReviewService<S> {
    store: S,
    scheduler: Scheduler,
    settings: SchedulerSettings,
    clock: Clock,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S, settings: SchedulerSettings) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(&settings),
            settings,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock, for deterministic callers.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    // Stored timestamps carry microseconds; truncate so values read back equal.
    fn now(&self) -> DateTime<Utc> {
        (self.clock)().trunc_subsecs(6)
    }

    /// Review a card by id at the current instant.
    pub fn submit_review(
        &self,
        card_id: i64,
        difficulty: &str,
        response_time_ms: i64,
    ) -> Result<ReviewResult> {
        self.submit_review_at(card_id, difficulty, response_time_ms, self.now())
    }

    /// Review a card by id at `now`.
    pub fn submit_review_at(
        &self,
        card_id: i64,
        difficulty: &str,
        response_time_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult> {
        let difficulty: Difficulty = difficulty.parse()?;
        let response_time = self.normalize_response_time(card_id, response_time_ms)?;
        let now = now.trunc_subsecs(6);

        let result = self.store.transaction(|store| {
            let card = store
                .load_card(card_id)?
                .ok_or(ReviewError::NotFound(card_id))?;
            self.review_in(store, &card, difficulty, response_time, now)
        });
        log_review(self.scheduler.algorithm_name(), card_id, difficulty, &result);
        result
    }

    /// Review a card the caller already holds.
    ///
    /// Fails with `Conflict` when the stored card has been saved since `card`
    /// was read; nothing is written in that case.
    pub fn record_review(
        &self,
        card: &Flashcard,
        difficulty: Difficulty,
        response_time_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult> {
        let response_time = self.normalize_response_time(card.id, response_time_ms)?;
        let now = now.trunc_subsecs(6);

        let result = self
            .store
            .transaction(|store| self.review_in(store, card, difficulty, response_time, now));
        log_review(self.scheduler.algorithm_name(), card.id, difficulty, &result);
        result
    }

    fn review_in(
        &self,
        store: &S,
        card: &Flashcard,
        difficulty: Difficulty,
        response_time: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewResult> {
        let outcome = self.scheduler.apply_review(card, difficulty, now)?;
        let version = store.save_card(&outcome.card)?;

        let mut review_record = ReviewRecord {
            id: 0, // Assigned by the database
            flashcard_id: card.id,
            difficulty,
            response_time,
            before: outcome.before,
            after: outcome.after,
            reviewed_at: now,
            next_due_date: outcome.next_due,
        };
        review_record.id = store.append_review_record(&review_record)?;

        let day = study_day(now, self.settings.daily_reset_hour);
        let mut daily = store.load_or_create_daily_stats(day, now)?;
        daily.record_review(&outcome, !difficulty.is_lapse(), response_time);
        daily.box_counts = store.count_by_box()?;
        store.save_daily_stats(&daily)?;

        let mut updated = outcome.card;
        updated.version = version;
        Ok(ReviewResult {
            retention_rate: updated.retention_rate(),
            next_due_date: outcome.next_due,
            leitner_due_date: updated.leitner_due_date(),
            card: updated,
            review_record,
        })
    }

    fn normalize_response_time(&self, card_id: i64, response_time_ms: i64) -> Result<i64> {
        let normalized = self.settings.normalize_response_time(response_time_ms)?;
        if normalized != response_time_ms {
            warn!(
                card_id,
                submitted = response_time_ms,
                stored = normalized,
                "response time clamped"
            );
        }
        Ok(normalized)
    }

    /// Collection statistics at the current instant.
    pub fn get_stats(&self) -> Result<FlashcardStats> {
        self.get_stats_at(self.now())
    }

    pub fn get_stats_at(&self, now: DateTime<Utc>) -> Result<FlashcardStats> {
        let cards = self.store.all_cards()?;
        let stats = compute_stats(&cards, now, &self.settings);
        debug!(
            total = stats.total_cards,
            due = stats.due_cards,
            retention = stats.average_retention_rate,
            "computed stats"
        );
        Ok(stats)
    }

    pub fn create_card(&self, input: NewFlashcard) -> Result<Flashcard> {
        validate_content(&input.front, &input.back)?;
        let card = self.store.insert_card(input, self.now())?;
        info!(card_id = card.id, "card created");
        Ok(card)
    }

    /// Insert a batch atomically.
    pub fn import_cards(&self, inputs: Vec<NewFlashcard>) -> Result<Vec<Flashcard>> {
        if inputs.len() > MAX_IMPORT_BATCH {
            return Err(ReviewError::ImportTooLarge {
                count: inputs.len(),
                max: MAX_IMPORT_BATCH,
            });
        }
        for input in &inputs {
            validate_content(&input.front, &input.back)?;
        }

        let now = self.now();
        let cards = self
            .store
            .transaction(|store| Ok::<_, ReviewError>(store.insert_cards(inputs, now)?))?;
        info!(count = cards.len(), "cards imported");
        Ok(cards)
    }

    pub fn get_card(&self, card_id: i64) -> Result<Flashcard> {
        self.store
            .load_card(card_id)?
            .ok_or(ReviewError::NotFound(card_id))
    }

    /// Edit card content. Scheduling state is untouched.
    pub fn update_card(&self, card_id: i64, update: CardUpdate) -> Result<Flashcard> {
        if update.is_empty() {
            return Err(ReviewError::InvalidInput("no changes supplied".into()));
        }
        let now = self.now();
        self.store.transaction(|store| {
            let mut card = store
                .load_card(card_id)?
                .ok_or(ReviewError::NotFound(card_id))?;
            card.apply_update(update, now);
            validate_content(&card.front, &card.back)?;
            card.version = store.save_card(&card)?;
            Ok(card)
        })
    }

    /// Delete a card and its review history.
    pub fn delete_card(&self, card_id: i64) -> Result<()> {
        self.store.delete_card(card_id)?;
        info!(card_id, "card deleted");
        Ok(())
    }

    pub fn due_cards(&self, limit: Option<usize>) -> Result<Vec<Flashcard>> {
        let limit = limit.unwrap_or(DEFAULT_DUE_LIMIT);
        Ok(self.store.query_due_cards(self.now(), limit)?)
    }

    pub fn list_cards(&self, filter: &CardFilter) -> Result<CardPage> {
        Ok(self.store.list_cards(filter, self.now())?)
    }

    /// Review log for one card, newest first.
    pub fn review_history(&self, card_id: i64, skip: usize, limit: usize) -> Result<Vec<ReviewRecord>> {
        self.get_card(card_id)?;
        Ok(self.store.reviews_for_card(card_id, skip, limit)?)
    }

    /// Counters for `date`, or for the current study day.
    pub fn daily_stats(&self, date: Option<NaiveDate>) -> Result<Option<StudyStats>> {
        let date = date.unwrap_or_else(|| self.study_day());
        Ok(self.store.get_daily_stats(date)?)
    }

    pub fn daily_stats_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<StudyStats>> {
        if start > end {
            return Err(ReviewError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(self.store.get_daily_stats_range(start, end)?)
    }

    pub fn study_day(&self) -> NaiveDate {
        study_day(self.now(), self.settings.daily_reset_hour)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        Ok(self.store.categories()?)
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        Ok(self.store.tags()?)
    }

    pub fn suspend_card(&self, card_id: i64) -> Result<Flashcard> {
        self.apply_status_command(card_id, StatusCommand::Suspend)
    }

    pub fn bury_card(&self, card_id: i64) -> Result<Flashcard> {
        self.apply_status_command(card_id, StatusCommand::Bury)
    }

    pub fn restore_card(&self, card_id: i64) -> Result<Flashcard> {
        self.apply_status_command(card_id, StatusCommand::Restore)
    }

    fn apply_status_command(&self, card_id: i64, command: StatusCommand) -> Result<Flashcard> {
        let now = self.now();
        let card = self.store.transaction(|store| {
            let mut card = store
                .load_card(card_id)?
                .ok_or(ReviewError::NotFound(card_id))?;
            card.status = self.scheduler.lifecycle().apply_command(&card, command);
            card.updated_at = now;
            card.version = store.save_card(&card)?;
            Ok::<_, ReviewError>(card)
        })?;
        info!(card_id, ?command, status = card.status.as_str(), "status changed");
        Ok(card)
    }
}

fn validate_content(front: &str, back: &str) -> Result<()> {
    if front.trim().is_empty() || back.trim().is_empty() {
        return Err(ReviewError::InvalidInput(
            "front and back must not be empty".into(),
        ));
    }
    Ok(())
}

fn log_review(
    algorithm: &'static str,
    card_id: i64,
    difficulty: Difficulty,
    result: &Result<ReviewResult>,
) {
    match result {
        Ok(review) => info!(
            card_id,
            %difficulty,
            algorithm,
            interval = review.card.interval,
            leitner_box = review.card.leitner_box.as_str(),
            status = review.card.status.as_str(),
            "review recorded"
        ),
        Err(ReviewError::Conflict {
            expected_version, ..
        }) => warn!(card_id, expected_version, "review lost a concurrent update race"),
        Err(err) => debug!(card_id, error = %err, "review rejected"),
    }
}
