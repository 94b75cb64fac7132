//! Core types for the flashcard scheduler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Lowest quality score that still counts as a successful recall.
pub const PASSING_QUALITY: u8 = 3;

/// Largest accepted `max_interval_days`, about a hundred years.
pub const MAX_INTERVAL_CAP_DAYS: u32 = 36_500;

/// Reviewer's rating for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Again,
    Hard,
    Good,
    Easy,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    /// Quality score on the 0-6 scale fed to the SM-2 ease formula.
    pub fn quality(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 3,
            Self::Good => 5,
            Self::Easy => 6,
        }
    }

    /// A lapse resets progression.
    pub fn is_lapse(self) -> bool {
        self.quality() < PASSING_QUALITY
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl FromStr for Difficulty {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "again" => Ok(Self::Again),
            "hard" => Ok(Self::Hard),
            "good" => Ok(Self::Good),
            "easy" => Ok(Self::Easy),
            _ => Err(SchedulerError::InvalidDifficulty(s.to_string())),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    New,
    Learning,
    Reviewing,
    Relearning,
    Suspended,
    Buried,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::New
    }
}

impl CardStatus {
    pub const ALL: [CardStatus; 6] = [
        Self::New,
        Self::Learning,
        Self::Reviewing,
        Self::Relearning,
        Self::Suspended,
        Self::Buried,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Reviewing => "reviewing",
            Self::Relearning => "relearning",
            Self::Suspended => "suspended",
            Self::Buried => "buried",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "learning" => Some(Self::Learning),
            "reviewing" => Some(Self::Reviewing),
            "relearning" => Some(Self::Relearning),
            "suspended" => Some(Self::Suspended),
            "buried" => Some(Self::Buried),
            _ => None,
        }
    }

    /// Suspended and buried cards never show up in due queues.
    pub fn is_schedulable(&self) -> bool {
        !matches!(self, Self::Suspended | Self::Buried)
    }
}

/// Leitner box, 1 (daily) through 7 (quarterly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LeitnerBox {
    #[serde(rename = "box_1")]
    Box1,
    #[serde(rename = "box_2")]
    Box2,
    #[serde(rename = "box_3")]
    Box3,
    #[serde(rename = "box_4")]
    Box4,
    #[serde(rename = "box_5")]
    Box5,
    #[serde(rename = "box_6")]
    Box6,
    #[serde(rename = "box_7")]
    Box7,
}

impl Default for LeitnerBox {
    fn default() -> Self {
        Self::Box1
    }
}

impl LeitnerBox {
    pub const ALL: [LeitnerBox; 7] = [
        Self::Box1,
        Self::Box2,
        Self::Box3,
        Self::Box4,
        Self::Box5,
        Self::Box6,
        Self::Box7,
    ];

    /// Box number, 1-based.
    pub fn number(self) -> u8 {
        match self {
            Self::Box1 => 1,
            Self::Box2 => 2,
            Self::Box3 => 3,
            Self::Box4 => 4,
            Self::Box5 => 5,
            Self::Box6 => 6,
            Self::Box7 => 7,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        number
            .checked_sub(1)
            .and_then(|index| Self::ALL.get(index as usize).copied())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Box1 => "box_1",
            Self::Box2 => "box_2",
            Self::Box3 => "box_3",
            Self::Box4 => "box_4",
            Self::Box5 => "box_5",
            Self::Box6 => "box_6",
            Self::Box7 => "box_7",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        s.strip_prefix("box_")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Self::from_number)
    }

    /// Review cadence implied by the box. Display only; due dates come from SM-2.
    pub fn interval_days(self) -> u32 {
        match self {
            Self::Box1 => 1,
            Self::Box2 => 2,
            Self::Box3 => 4,
            Self::Box4 => 7,
            Self::Box5 => 14,
            Self::Box6 => 30,
            Self::Box7 => 90,
        }
    }
}

/// The SM-2 portion of a card's scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
}

impl Default for Sm2State {
    fn default() -> Self {
        Self {
            ease_factor: 2.5,
            interval: 1,
            repetitions: 0,
        }
    }
}

/// Scheduling fields captured before and after a review.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulingSnapshot {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub leitner_box: LeitnerBox,
}

impl SchedulingSnapshot {
    pub fn sm2_state(&self) -> Sm2State {
        Sm2State {
            ease_factor: self.ease_factor,
            interval: self.interval,
            repetitions: self.repetitions,
        }
    }
}

/// Input for creating a card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFlashcard {
    pub front: String,
    pub back: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Content edits. Scheduling fields are never editable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardUpdate {
    #[serde(default)]
    pub front: Option<String>,
    #[serde(default)]
    pub back: Option<String>,
    /// An empty string clears the category.
    #[serde(default)]
    pub category: Option<String>,
    /// An empty string clears the tags.
    #[serde(default)]
    pub tags: Option<String>,
}

impl CardUpdate {
    pub fn is_empty(&self) -> bool {
        self.front.is_none() && self.back.is_none() && self.category.is_none() && self.tags.is_none()
    }
}

/// A flashcard and its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: i64,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub status: CardStatus,
    pub leitner_box: LeitnerBox,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    pub total_reviews: u32,
    pub correct_reviews: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock version, bumped on every save.
    pub version: i64,
}

impl Flashcard {
    /// Fresh card, due immediately.
    pub fn new(id: i64, input: NewFlashcard, now: DateTime<Utc>) -> Self {
        let initial = Sm2State::default();
        Self {
            id,
            front: input.front,
            back: input.back,
            category: non_empty(input.category),
            tags: non_empty(input.tags),
            ease_factor: initial.ease_factor,
            interval: initial.interval,
            repetitions: initial.repetitions,
            status: CardStatus::New,
            leitner_box: LeitnerBox::Box1,
            due_date: now,
            last_review: None,
            total_reviews: 0,
            correct_reviews: 0,
            streak: 0,
            max_streak: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn sm2_state(&self) -> Sm2State {
        Sm2State {
            ease_factor: self.ease_factor,
            interval: self.interval,
            repetitions: self.repetitions,
        }
    }

    pub fn snapshot(&self) -> SchedulingSnapshot {
        SchedulingSnapshot {
            ease_factor: self.ease_factor,
            interval: self.interval,
            repetitions: self.repetitions,
            leitner_box: self.leitner_box,
        }
    }

    /// Overwrite the scheduling fields from a snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &SchedulingSnapshot, due_date: DateTime<Utc>) {
        self.ease_factor = snapshot.ease_factor;
        self.interval = snapshot.interval;
        self.repetitions = snapshot.repetitions;
        self.leitner_box = snapshot.leitner_box;
        self.due_date = due_date;
    }

    /// Eligible for review at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_schedulable() && self.due_date <= now
    }

    /// Lifetime retention as a percentage.
    pub fn retention_rate(&self) -> f64 {
        crate::review::retention_rate(self.correct_reviews, self.total_reviews)
    }

    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.as_deref().map(|t| split_tags(t).collect()).unwrap_or_default()
    }

    /// Date the Leitner cadence alone would suggest. Informational.
    pub fn leitner_due_date(&self) -> DateTime<Utc> {
        let base = self.last_review.unwrap_or(self.created_at);
        base + Duration::days(i64::from(self.leitner_box.interval_days()))
    }

    /// Apply a content edit.
    pub fn apply_update(&mut self, update: CardUpdate, now: DateTime<Utc>) {
        if let Some(front) = update.front {
            self.front = front;
        }
        if let Some(back) = update.back {
            self.back = back;
        }
        if update.category.is_some() {
            self.category = non_empty(update.category);
        }
        if update.tags.is_some() {
            self.tags = non_empty(update.tags);
        }
        self.updated_at = now;
    }
}

/// Split a comma-delimited tag string, dropping blanks.
pub fn split_tags(tags: &str) -> impl Iterator<Item = &str> {
    tags.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Immutable audit entry for one review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub flashcard_id: i64,
    pub difficulty: Difficulty,
    /// Milliseconds, as submitted by the caller (after the response-time policy).
    pub response_time: i64,
    pub before: SchedulingSnapshot,
    pub after: SchedulingSnapshot,
    pub reviewed_at: DateTime<Utc>,
    pub next_due_date: DateTime<Utc>,
}

impl ReviewRecord {
    /// Replay this record's transition onto a pre-review card.
    pub fn replay(&self, card: &Flashcard) -> Flashcard {
        let mut replayed = card.clone();
        replayed.apply_snapshot(&self.after, self.next_due_date);
        replayed
    }
}

/// How implausible response times are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTimePolicy {
    /// Store whatever the caller sent.
    Accept,
    /// Clamp into `0..=max_response_time_ms`.
    Clamp,
    /// Reject values outside `0..=max_response_time_ms`.
    Reject,
}

impl Default for ResponseTimePolicy {
    fn default() -> Self {
        Self::Clamp
    }
}

impl ResponseTimePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Clamp => "clamp",
            Self::Reject => "reject",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(Self::Accept),
            "clamp" => Some(Self::Clamp),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Repetitions needed for a learning card to graduate to reviewing.
    pub mastery_threshold: u32,
    pub max_interval_days: u32,
    pub new_cards_per_day: u32,
    pub reviews_per_day: u32,
    /// Time estimate per card used by the capacity recommendation.
    pub seconds_per_card: u32,
    pub min_study_minutes: u32,
    pub max_study_minutes: u32,
    /// Hour (0-23, UTC) at which a new study day begins.
    pub daily_reset_hour: u32,
    pub response_time_policy: ResponseTimePolicy,
    pub max_response_time_ms: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            mastery_threshold: 2,
            max_interval_days: 365,
            new_cards_per_day: 20,
            reviews_per_day: 100,
            seconds_per_card: 30,
            min_study_minutes: 10,
            max_study_minutes: 60,
            daily_reset_hour: 0,
            response_time_policy: ResponseTimePolicy::default(),
            max_response_time_ms: 3_600_000,
        }
    }
}

impl SchedulerSettings {
    /// Apply the response-time policy to a submitted value.
    pub fn normalize_response_time(&self, response_time_ms: i64) -> Result<i64> {
        // A negative ceiling is treated as zero.
        let max = self.max_response_time_ms.max(0);
        let in_range = (0..=max).contains(&response_time_ms);
        match self.response_time_policy {
            ResponseTimePolicy::Accept => Ok(response_time_ms),
            ResponseTimePolicy::Clamp => Ok(response_time_ms.clamp(0, max)),
            ResponseTimePolicy::Reject if in_range => Ok(response_time_ms),
            ResponseTimePolicy::Reject => Err(SchedulerError::InvalidResponseTime(response_time_ms)),
        }
    }
}
