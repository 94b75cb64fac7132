//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext wrapping a review service over an in-memory database
//! - A fixed clock so due dates are predictable
//! - Helpers for seeding cards in a given scheduling state

#![allow(dead_code)]

pub mod fixtures;

use chrono::{DateTime, TimeZone, Utc};

use recall::db::{CardRepository, ReviewRepository};
use recall::{ReviewService, SqliteRepository};
use recall_core::{CardStatus, Flashcard, LeitnerBox, SchedulerSettings};

/// The instant every test context treats as "now".
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

/// Test context holding a service backed by a fresh in-memory database.
pub struct TestContext {
    pub service: ReviewService<SqliteRepository>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(SchedulerSettings::default())
    }

    pub fn with_settings(settings: SchedulerSettings) -> Self {
        let repository =
            SqliteRepository::open_in_memory().expect("Failed to open in-memory database");
        Self {
            service: ReviewService::new(repository, settings).with_clock(fixed_now),
        }
    }

    pub fn repo(&self) -> &SqliteRepository {
        self.service.store()
    }

    /// Create a fresh card due now.
    pub fn create_card(&self, front: &str) -> Flashcard {
        self.service
            .create_card(fixtures::new_card(front))
            .expect("Failed to create card")
    }

    /// Create a card already partway through its schedule.
    pub fn create_card_with_state(
        &self,
        ease_factor: f64,
        interval: u32,
        repetitions: u32,
        leitner_box: LeitnerBox,
    ) -> Flashcard {
        let mut card = self.create_card("seeded");
        card.ease_factor = ease_factor;
        card.interval = interval;
        card.repetitions = repetitions;
        card.leitner_box = leitner_box;
        card.status = CardStatus::Reviewing;
        card.total_reviews = repetitions;
        card.correct_reviews = repetitions;
        card.streak = repetitions;
        card.max_streak = repetitions;
        self.repo().save_card(&card).expect("Failed to seed card state");
        self.reload(card.id)
    }

    pub fn reload(&self, card_id: i64) -> Flashcard {
        self.repo()
            .load_card(card_id)
            .expect("Failed to load card")
            .expect("card should exist")
    }

    pub fn review_count(&self, card_id: i64) -> usize {
        self.repo()
            .reviews_for_card(card_id, 0, 10_000)
            .expect("Failed to load reviews")
            .len()
    }
}
