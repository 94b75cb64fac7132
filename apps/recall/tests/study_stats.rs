//! Statistics and daily counter tests.

mod common;

use chrono::{Duration, NaiveDate};
use pretty_assertions::assert_eq;

use recall::db::CardRepository;
use recall::ReviewError;
use recall_core::{CardStatus, LeitnerBox, SchedulerSettings};

use common::{fixed_now, fixtures, TestContext};

/// Fifty due cards reviewed back-to-back roll up into one day's counters.
#[test]
fn test_session_of_fifty_reviews() {
    let ctx = TestContext::new();
    ctx.service.import_cards(fixtures::sample_cards(50)).unwrap();
    let due = ctx.service.due_cards(Some(50)).unwrap();
    assert_eq!(due.len(), 50);

    let times = fixtures::response_times(50);
    for (card, time) in due.iter().zip(&times) {
        let difficulty = if card.id % 5 == 0 { "again" } else { "good" };
        ctx.service.submit_review(card.id, difficulty, *time).unwrap();
    }

    let daily = ctx.service.daily_stats(None).unwrap().unwrap();
    let expected_mean = times.iter().sum::<i64>() as f64 / 50.0;
    assert_eq!(daily.date, fixed_now().date_naive());
    assert_eq!(daily.reviewed_cards, 50);
    assert_eq!(daily.new_cards, 50);
    assert_eq!(daily.correct_cards, 40);
    assert_eq!(daily.study_time_ms, times.iter().sum::<i64>());
    assert!((daily.average_response_time - expected_mean).abs() < 1e-9);
    assert_eq!(daily.box_counts.get(LeitnerBox::Box1), 10);
    assert_eq!(daily.box_counts.get(LeitnerBox::Box2), 40);
}

/// Box occupancy tracked by the day matches the live distribution.
#[test]
fn test_daily_box_counts_match_distribution() {
    let ctx = TestContext::new();
    let seeded = ctx.create_card_with_state(2.5, 6, 2, LeitnerBox::Box3);
    let fresh = ctx.create_card("fresh");

    ctx.service.submit_review(seeded.id, "easy", 1_000).unwrap();
    ctx.service.submit_review(fresh.id, "good", 1_000).unwrap();
    ctx.service.submit_review(fresh.id, "again", 1_000).unwrap();

    let daily = ctx.service.daily_stats(None).unwrap().unwrap();
    let stats = ctx.service.get_stats().unwrap();
    assert_eq!(daily.box_counts, stats.leitner_distribution);
    assert_eq!(stats.leitner_distribution.get(LeitnerBox::Box4), 1);
    assert_eq!(stats.leitner_distribution.get(LeitnerBox::Box1), 1);
}

/// Cards deleted or added mid-day are reflected by the next review.
#[test]
fn test_daily_box_counts_follow_mid_day_changes() {
    let ctx = TestContext::new();
    let first = ctx.create_card("first");
    let doomed = ctx.create_card_with_state(2.5, 6, 2, LeitnerBox::Box3);
    let last = ctx.create_card("last");

    ctx.service.submit_review(first.id, "good", 1_000).unwrap();
    ctx.service.delete_card(doomed.id).unwrap();
    ctx.create_card("late arrival");
    ctx.service.submit_review(last.id, "good", 1_000).unwrap();

    let daily = ctx.service.daily_stats(None).unwrap().unwrap();
    let stats = ctx.service.get_stats().unwrap();
    assert_eq!(daily.box_counts, stats.leitner_distribution);
    assert_eq!(daily.box_counts.get(LeitnerBox::Box3), 0);
    assert_eq!(daily.box_counts.get(LeitnerBox::Box2), 2);
    assert_eq!(daily.box_counts.get(LeitnerBox::Box1), 1);
    assert_eq!(daily.box_counts.total(), 3);
}

/// Computing stats twice over the same data gives the same answer.
#[test]
fn test_stats_are_idempotent() {
    let ctx = TestContext::new();
    ctx.service.import_cards(fixtures::sample_cards(12)).unwrap();
    ctx.service.submit_review(1, "good", 1_000).unwrap();
    ctx.service.submit_review(2, "again", 1_000).unwrap();

    let first = ctx.service.get_stats().unwrap();
    let second = ctx.service.get_stats().unwrap();
    assert_eq!(first, second);
}

/// Stats reflect due counts, statuses and retention.
#[test]
fn test_stats_after_reviews() {
    let ctx = TestContext::new();
    ctx.service.import_cards(fixtures::sample_cards(20)).unwrap();
    ctx.service.submit_review(1, "good", 1_000).unwrap();
    ctx.service.submit_review(2, "again", 1_000).unwrap();
    ctx.service.suspend_card(3).unwrap();

    let stats = ctx.service.get_stats().unwrap();
    assert_eq!(stats.total_cards, 20);
    assert_eq!(stats.due_cards, 17);
    assert_eq!(stats.status_distribution.get(CardStatus::New), 17);
    assert_eq!(stats.status_distribution.get(CardStatus::Learning), 2);
    assert_eq!(stats.status_distribution.get(CardStatus::Suspended), 1);
    assert_eq!(stats.average_retention_rate, 50.0);
    assert_eq!(stats.review_capacity.max_new_cards, 2);
    assert_eq!(stats.review_capacity.max_review_cards, 100);
    assert_eq!(stats.review_capacity.recommended_minutes, 10);

    // A day later the reviewed cards are due again.
    let tomorrow = ctx
        .service
        .get_stats_at(fixed_now() + Duration::days(1))
        .unwrap();
    assert_eq!(tomorrow.due_cards, 19);
}

/// An empty collection has zeroed stats.
#[test]
fn test_stats_for_empty_collection() {
    let ctx = TestContext::new();
    let stats = ctx.service.get_stats().unwrap();
    assert_eq!(stats.total_cards, 0);
    assert_eq!(stats.due_cards, 0);
    assert_eq!(stats.average_retention_rate, 0.0);
    assert_eq!(stats.leitner_distribution.total(), 0);
    assert_eq!(ctx.service.daily_stats(None).unwrap(), None);
}

/// Reviews before the reset hour count towards the previous study day.
#[test]
fn test_reset_hour_moves_study_day() {
    let ctx = TestContext::with_settings(SchedulerSettings {
        daily_reset_hour: 4,
        ..Default::default()
    });
    let card = ctx.create_card("night owl");
    let late_night = fixed_now().date_naive().succ_opt().unwrap().and_hms_opt(2, 0, 0).unwrap().and_utc();

    ctx.service
        .submit_review_at(card.id, "good", 1_000, late_night)
        .unwrap();

    let day = ctx.service.daily_stats(Some(fixed_now().date_naive())).unwrap().unwrap();
    assert_eq!(day.reviewed_cards, 1);
    assert_eq!(
        ctx.service
            .daily_stats(Some(late_night.date_naive()))
            .unwrap(),
        None
    );
}

/// Range queries are inclusive and ordered by date.
#[test]
fn test_daily_stats_range() {
    let ctx = TestContext::new();
    let card = ctx.create_card("range");
    let mut now = fixed_now();
    for _ in 0..3 {
        let result = ctx.service.submit_review_at(card.id, "good", 500, now).unwrap();
        now = result.next_due_date;
    }
    // Reviews land on day 0, day 1 and day 7.
    let start = fixed_now().date_naive();
    let end = start + Duration::days(7);

    let range = ctx.service.daily_stats_range(start, end).unwrap();
    let dates: Vec<NaiveDate> = range.iter().map(|s| s.date).collect();
    assert_eq!(
        dates,
        vec![start, start + Duration::days(1), start + Duration::days(7)]
    );
    assert_eq!(ctx.service.daily_stats_range(start, start).unwrap().len(), 1);
    assert!(matches!(
        ctx.service.daily_stats_range(end, start),
        Err(ReviewError::InvalidInput(_))
    ));
}

/// Listing filters by status and reports paging.
#[test]
fn test_list_cards_by_status() {
    let ctx = TestContext::new();
    ctx.service.import_cards(fixtures::sample_cards(6)).unwrap();
    ctx.service.submit_review(1, "good", 1_000).unwrap();

    let page = ctx
        .service
        .list_cards(&recall::db::CardFilter {
            status: Some(CardStatus::New),
            limit: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.cards.len(), 3);
    assert!(page.has_more);
    assert_eq!(ctx.repo().all_cards().unwrap().len(), 6);
}
