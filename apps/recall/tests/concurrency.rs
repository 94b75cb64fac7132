//! Concurrent reviews against one file-backed database.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use recall::db::{CardRepository, ReviewRepository, StudyStatsRepository};
use recall::{ReviewError, ReviewService, SqliteRepository};
use recall_core::{Difficulty, SchedulerSettings};

use common::{fixed_now, fixtures};

fn open_service(dir: &TempDir) -> ReviewService<SqliteRepository> {
    let repository =
        SqliteRepository::open(dir.path().join("recall.db")).expect("Failed to open database");
    ReviewService::new(repository, SchedulerSettings::default()).with_clock(fixed_now)
}

/// Reviews racing on one card from separate connections are all applied.
#[test]
fn test_parallel_reviews_are_serialized() {
    let dir = TempDir::new().unwrap();
    let card = open_service(&dir)
        .create_card(fixtures::new_card("contended"))
        .unwrap();

    const THREADS: usize = 4;
    const REVIEWS_PER_THREAD: usize = 10;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let repository = SqliteRepository::open(path.join("recall.db")).unwrap();
                let service = ReviewService::new(repository, SchedulerSettings::default())
                    .with_clock(fixed_now);
                barrier.wait();
                for _ in 0..REVIEWS_PER_THREAD {
                    service.submit_review(card.id, "good", 1_000).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS * REVIEWS_PER_THREAD;
    let service = open_service(&dir);
    let stored = service.get_card(card.id).unwrap();
    assert_eq!(stored.total_reviews as usize, total);
    assert_eq!(stored.repetitions as usize, total);
    assert_eq!(stored.version as usize, total);
    assert_eq!(
        service.store().reviews_for_card(card.id, 0, 1_000).unwrap().len(),
        total
    );
    let daily = service
        .store()
        .get_daily_stats(fixed_now().date_naive())
        .unwrap()
        .unwrap();
    assert_eq!(daily.reviewed_cards as usize, total);
    assert_eq!(daily.new_cards, 1);
}

/// A review computed from a copy read before another connection's write is rejected.
#[test]
fn test_stale_read_across_connections_conflicts() {
    let dir = TempDir::new().unwrap();
    let first = open_service(&dir);
    let second = open_service(&dir);

    let card = first.create_card(fixtures::new_card("shared")).unwrap();
    let stale = second.get_card(card.id).unwrap();

    first.submit_review(card.id, "good", 1_000).unwrap();
    let err = second
        .record_review(&stale, Difficulty::Again, 1_000, fixed_now())
        .unwrap_err();

    assert!(matches!(err, ReviewError::Conflict { .. }));
    let stored = first.store().load_card(card.id).unwrap().unwrap();
    assert_eq!(stored.total_reviews, 1);
    assert_eq!(stored.repetitions, 1);

    // Retrying with a fresh read succeeds.
    let fresh = second.get_card(card.id).unwrap();
    let retried = second
        .record_review(&fresh, Difficulty::Again, 1_000, fixed_now())
        .unwrap();
    assert_eq!(retried.card.total_reviews, 2);
    assert_eq!(retried.card.repetitions, 0);
}

/// Different cards reviewed in parallel do not interfere.
#[test]
fn test_independent_cards_in_parallel() {
    let dir = TempDir::new().unwrap();
    let cards = open_service(&dir)
        .import_cards(fixtures::sample_cards(8))
        .unwrap();

    let handles: Vec<_> = cards
        .iter()
        .map(|card| {
            let path = dir.path().join("recall.db");
            let id = card.id;
            thread::spawn(move || {
                let repository = SqliteRepository::open(path).unwrap();
                let service = ReviewService::new(repository, SchedulerSettings::default())
                    .with_clock(fixed_now);
                service.submit_review(id, "easy", 700).unwrap();
                service.submit_review(id, "easy", 700).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let service = open_service(&dir);
    for card in service.store().all_cards().unwrap() {
        assert_eq!(card.repetitions, 2);
        assert_eq!(card.interval, 6);
    }
    let daily = service.daily_stats(None).unwrap().unwrap();
    assert_eq!(daily.reviewed_cards, 16);
    assert_eq!(daily.new_cards, 8);
}
