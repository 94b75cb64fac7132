//! SQLite schema definitions.

/// Complete schema for the local SQLite database.
///
/// Timestamps are RFC 3339 UTC strings with microsecond precision so that
/// text comparison matches chronological order.
pub const SCHEMA: &str = r#"
-- Cards and their scheduling state
CREATE TABLE IF NOT EXISTS flashcards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    front TEXT NOT NULL,
    back TEXT NOT NULL,
    category TEXT,
    tags TEXT,
    ease_factor REAL NOT NULL DEFAULT 2.5 CHECK (ease_factor >= 1.3),
    interval_days INTEGER NOT NULL DEFAULT 1 CHECK (interval_days >= 1),
    repetitions INTEGER NOT NULL DEFAULT 0 CHECK (repetitions >= 0),
    status TEXT NOT NULL DEFAULT 'new',
    leitner_box INTEGER NOT NULL DEFAULT 1 CHECK (leitner_box BETWEEN 1 AND 7),
    due_date TEXT NOT NULL,
    last_review TEXT,
    total_reviews INTEGER NOT NULL DEFAULT 0,
    correct_reviews INTEGER NOT NULL DEFAULT 0,
    streak INTEGER NOT NULL DEFAULT 0,
    max_streak INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0
);

-- Append-only review log
CREATE TABLE IF NOT EXISTS review_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    flashcard_id INTEGER NOT NULL REFERENCES flashcards(id) ON DELETE CASCADE,
    difficulty TEXT NOT NULL,
    response_time INTEGER NOT NULL,
    before_ease_factor REAL NOT NULL,
    before_interval INTEGER NOT NULL,
    before_repetitions INTEGER NOT NULL,
    before_leitner_box INTEGER NOT NULL,
    after_ease_factor REAL NOT NULL,
    after_interval INTEGER NOT NULL,
    after_repetitions INTEGER NOT NULL,
    after_leitner_box INTEGER NOT NULL,
    reviewed_at TEXT NOT NULL,
    next_due_date TEXT NOT NULL
);

-- One row per study day
CREATE TABLE IF NOT EXISTS study_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL UNIQUE,
    new_cards INTEGER NOT NULL DEFAULT 0,
    reviewed_cards INTEGER NOT NULL DEFAULT 0,
    correct_cards INTEGER NOT NULL DEFAULT 0,
    study_time_ms INTEGER NOT NULL DEFAULT 0,
    average_response_time REAL NOT NULL DEFAULT 0,
    box_1_count INTEGER NOT NULL DEFAULT 0,
    box_2_count INTEGER NOT NULL DEFAULT 0,
    box_3_count INTEGER NOT NULL DEFAULT 0,
    box_4_count INTEGER NOT NULL DEFAULT 0,
    box_5_count INTEGER NOT NULL DEFAULT 0,
    box_6_count INTEGER NOT NULL DEFAULT 0,
    box_7_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_flashcards_due ON flashcards(due_date, leitner_box);
CREATE INDEX IF NOT EXISTS idx_flashcards_status ON flashcards(status);
CREATE INDEX IF NOT EXISTS idx_flashcards_category ON flashcards(category);
CREATE INDEX IF NOT EXISTS idx_review_records_card ON review_records(flashcard_id, reviewed_at);
"#;

/// Per-connection settings, applied on every open.
pub const CONNECTION_PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
"#;
