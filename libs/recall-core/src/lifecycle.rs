//! Card status state machine.
//!
//! Reviews drive new -> learning -> reviewing <-> relearning. Suspended and
//! buried are entered only through explicit commands and are left alone by
//! reviews.

use serde::{Deserialize, Serialize};

use crate::types::{CardStatus, Difficulty, Flashcard};

/// Explicit status commands issued by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCommand {
    Suspend,
    Bury,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub mastery_threshold: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self { mastery_threshold: 2 }
    }
}

impl Lifecycle {
    pub fn new(mastery_threshold: u32) -> Self {
        Self { mastery_threshold }
    }

    /// Status after a review, given the post-review repetition count.
    pub fn transition(
        &self,
        current: CardStatus,
        difficulty: Difficulty,
        repetitions: u32,
    ) -> CardStatus {
        let passed = !difficulty.is_lapse();
        match current {
            CardStatus::New => CardStatus::Learning,
            CardStatus::Learning if passed && repetitions >= self.mastery_threshold => {
                CardStatus::Reviewing
            }
            CardStatus::Learning => CardStatus::Learning,
            CardStatus::Reviewing if passed => CardStatus::Reviewing,
            CardStatus::Reviewing => CardStatus::Relearning,
            CardStatus::Relearning if passed => CardStatus::Reviewing,
            CardStatus::Relearning => CardStatus::Relearning,
            CardStatus::Suspended | CardStatus::Buried => current,
        }
    }

    /// Status after an explicit command.
    pub fn apply_command(&self, card: &Flashcard, command: StatusCommand) -> CardStatus {
        match command {
            StatusCommand::Suspend => CardStatus::Suspended,
            StatusCommand::Bury => CardStatus::Buried,
            StatusCommand::Restore if card.status.is_schedulable() => card.status,
            StatusCommand::Restore => self.restored_status(card),
        }
    }

    /// Where a suspended or buried card resumes, judged from its progress.
    fn restored_status(&self, card: &Flashcard) -> CardStatus {
        if card.total_reviews == 0 {
            CardStatus::New
        } else if card.repetitions >= self.mastery_threshold {
            CardStatus::Reviewing
        } else {
            CardStatus::Learning
        }
    }
}
