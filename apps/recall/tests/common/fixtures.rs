//! Test fixtures and factory functions for creating test data.

use recall_core::NewFlashcard;

/// A card with only front and back.
pub fn new_card(front: &str) -> NewFlashcard {
    NewFlashcard {
        front: front.to_string(),
        back: format!("Answer to {front}"),
        category: None,
        tags: None,
    }
}

/// A card filed under a category with tags.
pub fn categorized_card(front: &str, category: &str, tags: &str) -> NewFlashcard {
    NewFlashcard {
        category: Some(category.to_string()),
        tags: Some(tags.to_string()),
        ..new_card(front)
    }
}

/// Generate `count` numbered cards.
pub fn sample_cards(count: usize) -> Vec<NewFlashcard> {
    (0..count)
        .map(|i| new_card(&format!("Question {}?", i + 1)))
        .collect()
}

/// Distinct, plausible response times in milliseconds.
pub fn response_times(count: usize) -> Vec<i64> {
    (0..count).map(|i| 1_500 + (i as i64 * 137) % 4_000).collect()
}
