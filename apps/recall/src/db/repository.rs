//! Repository pattern for database access.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use recall_core::{
    CardStatus, Difficulty, Flashcard, LeitnerBox, LeitnerDistribution, NewFlashcard,
    ReviewRecord, SchedulingSnapshot, StudyStats,
};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use serde::Serialize;

use crate::db::date_utils::{format_date, format_timestamp, parse_date, parse_timestamp};
use crate::db::error::DbError;

type Result<T> = std::result::Result<T, DbError>;

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// How long a connection waits on another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CARD_COLUMNS: &str = "id, front, back, category, tags, ease_factor, interval_days, \
     repetitions, status, leitner_box, due_date, last_review, total_reviews, correct_reviews, \
     streak, max_streak, created_at, updated_at, version";

const REVIEW_COLUMNS: &str = "id, flashcard_id, difficulty, response_time, \
     before_ease_factor, before_interval, before_repetitions, before_leitner_box, \
     after_ease_factor, after_interval, after_repetitions, after_leitner_box, \
     reviewed_at, next_due_date";

const STUDY_STATS_COLUMNS: &str = "date, new_cards, reviewed_cards, correct_cards, \
     study_time_ms, average_response_time, box_1_count, box_2_count, box_3_count, \
     box_4_count, box_5_count, box_6_count, box_7_count, created_at, updated_at";

/// Filters for card listings. Empty filters match everything.
#[derive(Debug, Clone, PartialEq)]
pub struct CardFilter {
    pub status: Option<CardStatus>,
    pub category: Option<String>,
    /// Substring matched against the comma-delimited tag string.
    pub tag: Option<String>,
    /// Text matched against front and back.
    pub search: Option<String>,
    /// Only cards due at the listing instant.
    pub due_only: bool,
    pub skip: usize,
    pub limit: usize,
}

impl Default for CardFilter {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            tag: None,
            search: None,
            due_only: false,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of a card listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPage {
    pub cards: Vec<Flashcard>,
    pub total: u64,
    pub skip: usize,
    pub limit: usize,
    pub has_more: bool,
}

/// Repository for card operations.
pub trait CardRepository {
    fn insert_card(&self, input: NewFlashcard, now: DateTime<Utc>) -> Result<Flashcard>;
    fn insert_cards(&self, inputs: Vec<NewFlashcard>, now: DateTime<Utc>) -> Result<Vec<Flashcard>>;
    fn load_card(&self, id: i64) -> Result<Option<Flashcard>>;
    /// Persist a card read at `card.version`. Returns the new version.
    fn save_card(&self, card: &Flashcard) -> Result<i64>;
    /// Delete a card together with its review history.
    fn delete_card(&self, id: i64) -> Result<()>;
    /// Schedulable cards due at `now`, soonest first, higher boxes breaking ties.
    fn query_due_cards(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Flashcard>>;
    fn list_cards(&self, filter: &CardFilter, now: DateTime<Utc>) -> Result<CardPage>;
    fn all_cards(&self) -> Result<Vec<Flashcard>>;
    fn count_by_box(&self) -> Result<LeitnerDistribution>;
    fn categories(&self) -> Result<Vec<String>>;
    fn tags(&self) -> Result<Vec<String>>;
}

/// Repository for the review log.
pub trait ReviewRepository {
    /// Append a record. Its `id` is ignored; the assigned id is returned.
    fn append_review_record(&self, record: &ReviewRecord) -> Result<i64>;
    /// Newest first.
    fn reviews_for_card(&self, card_id: i64, skip: usize, limit: usize) -> Result<Vec<ReviewRecord>>;
}

/// Repository for per-day study counters.
pub trait StudyStatsRepository {
    /// Today's row, created on first use with box occupancy seeded from the
    /// current collection.
    fn load_or_create_daily_stats(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<StudyStats>;
    fn save_daily_stats(&self, stats: &StudyStats) -> Result<()>;
    fn get_daily_stats(&self, date: NaiveDate) -> Result<Option<StudyStats>>;
    /// Inclusive on both ends, oldest first.
    fn get_daily_stats_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<StudyStats>>;
}

/// Everything the review service needs from storage.
pub trait Store: CardRepository + ReviewRepository + StudyStatsRepository {
    /// Run `f` as one write transaction. An `Err` from `f` rolls back every
    /// write it made.
    fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> std::result::Result<T, E>;
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(super::schema::CONNECTION_PRAGMAS)?;
        self.conn.execute_batch(super::schema::SCHEMA)?;
        Ok(())
    }

    fn row_to_card(row: &Row) -> rusqlite::Result<Flashcard> {
        let status: String = row.get(8)?;
        Ok(Flashcard {
            id: row.get(0)?,
            front: row.get(1)?,
            back: row.get(2)?,
            category: row.get(3)?,
            tags: row.get(4)?,
            ease_factor: row.get(5)?,
            interval: row.get(6)?,
            repetitions: row.get(7)?,
            status: CardStatus::from_str(&status)
                .ok_or_else(|| invalid_column(8, format!("unknown status {status:?}")))?,
            leitner_box: box_column(row, 9)?,
            due_date: timestamp_column(row, 10)?,
            last_review: optional_timestamp_column(row, 11)?,
            total_reviews: row.get(12)?,
            correct_reviews: row.get(13)?,
            streak: row.get(14)?,
            max_streak: row.get(15)?,
            created_at: timestamp_column(row, 16)?,
            updated_at: timestamp_column(row, 17)?,
            version: row.get(18)?,
        })
    }

    fn row_to_review(row: &Row) -> rusqlite::Result<ReviewRecord> {
        let difficulty: String = row.get(2)?;
        Ok(ReviewRecord {
            id: row.get(0)?,
            flashcard_id: row.get(1)?,
            difficulty: difficulty
                .parse::<Difficulty>()
                .map_err(|e| invalid_column(2, e.to_string()))?,
            response_time: row.get(3)?,
            before: SchedulingSnapshot {
                ease_factor: row.get(4)?,
                interval: row.get(5)?,
                repetitions: row.get(6)?,
                leitner_box: box_column(row, 7)?,
            },
            after: SchedulingSnapshot {
                ease_factor: row.get(8)?,
                interval: row.get(9)?,
                repetitions: row.get(10)?,
                leitner_box: box_column(row, 11)?,
            },
            reviewed_at: timestamp_column(row, 12)?,
            next_due_date: timestamp_column(row, 13)?,
        })
    }

    fn row_to_study_stats(row: &Row) -> rusqlite::Result<StudyStats> {
        let date: String = row.get(0)?;
        let mut box_counts = LeitnerDistribution::default();
        for (offset, leitner_box) in LeitnerBox::ALL.iter().enumerate() {
            let count: i64 = row.get(6 + offset)?;
            box_counts.set(*leitner_box, count.max(0) as u64);
        }
        Ok(StudyStats {
            date: parse_date(&date)
                .ok_or_else(|| invalid_column(0, format!("bad date {date:?}")))?,
            new_cards: row.get(1)?,
            reviewed_cards: row.get(2)?,
            correct_cards: row.get(3)?,
            study_time_ms: row.get(4)?,
            average_response_time: row.get(5)?,
            box_counts,
            created_at: timestamp_column(row, 13)?,
            updated_at: timestamp_column(row, 14)?,
        })
    }
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(DbError::InvalidData(message)))
}

fn box_column(row: &Row, index: usize) -> rusqlite::Result<LeitnerBox> {
    let number: u8 = row.get(index)?;
    LeitnerBox::from_number(number)
        .ok_or_else(|| invalid_column(index, format!("leitner box {number} out of range")))
}

fn timestamp_column(row: &Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(index)?;
    parse_timestamp(&value).ok_or_else(|| invalid_column(index, format!("bad timestamp {value:?}")))
}

fn optional_timestamp_column(row: &Row, index: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(index)?;
    value
        .map(|v| parse_timestamp(&v).ok_or_else(|| invalid_column(index, format!("bad timestamp {v:?}"))))
        .transpose()
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl CardRepository for SqliteRepository {
    fn insert_card(&self, input: NewFlashcard, now: DateTime<Utc>) -> Result<Flashcard> {
        let mut card = Flashcard::new(0, input, now);
        self.conn.execute(
            "INSERT INTO flashcards (front, back, category, tags, ease_factor, interval_days,
                repetitions, status, leitner_box, due_date, last_review, total_reviews,
                correct_reviews, streak, max_streak, created_at, updated_at, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                card.front,
                card.back,
                card.category,
                card.tags,
                card.ease_factor,
                card.interval,
                card.repetitions,
                card.status.as_str(),
                card.leitner_box.number(),
                format_timestamp(&card.due_date),
                card.last_review.as_ref().map(format_timestamp),
                card.total_reviews,
                card.correct_reviews,
                card.streak,
                card.max_streak,
                format_timestamp(&card.created_at),
                format_timestamp(&card.updated_at),
                card.version,
            ],
        )?;
        card.id = self.conn.last_insert_rowid();
        Ok(card)
    }

    fn insert_cards(&self, inputs: Vec<NewFlashcard>, now: DateTime<Utc>) -> Result<Vec<Flashcard>> {
        inputs
            .into_iter()
            .map(|input| self.insert_card(input, now))
            .collect()
    }

    fn load_card(&self, id: i64) -> Result<Option<Flashcard>> {
        self.conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM flashcards WHERE id = ?1"),
                params![id],
                Self::row_to_card,
            )
            .optional()
            .map_err(Into::into)
    }

    fn save_card(&self, card: &Flashcard) -> Result<i64> {
        let updated = self.conn.execute(
            "UPDATE flashcards SET front = ?1, back = ?2, category = ?3, tags = ?4,
                ease_factor = ?5, interval_days = ?6, repetitions = ?7, status = ?8,
                leitner_box = ?9, due_date = ?10, last_review = ?11, total_reviews = ?12,
                correct_reviews = ?13, streak = ?14, max_streak = ?15, updated_at = ?16,
                version = version + 1
             WHERE id = ?17 AND version = ?18",
            params![
                card.front,
                card.back,
                card.category,
                card.tags,
                card.ease_factor,
                card.interval,
                card.repetitions,
                card.status.as_str(),
                card.leitner_box.number(),
                format_timestamp(&card.due_date),
                card.last_review.as_ref().map(format_timestamp),
                card.total_reviews,
                card.correct_reviews,
                card.streak,
                card.max_streak,
                format_timestamp(&card.updated_at),
                card.id,
                card.version,
            ],
        )?;

        if updated == 0 {
            let exists = self
                .conn
                .query_row("SELECT 1 FROM flashcards WHERE id = ?1", params![card.id], |_| Ok(()))
                .optional()?
                .is_some();
            return Err(if exists {
                DbError::Conflict {
                    card_id: card.id,
                    expected_version: card.version,
                }
            } else {
                DbError::CardNotFound(card.id)
            });
        }

        Ok(card.version + 1)
    }

    fn delete_card(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM flashcards WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::CardNotFound(id));
        }
        Ok(())
    }

    fn query_due_cards(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Flashcard>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards
             WHERE due_date <= ?1 AND status NOT IN ('suspended', 'buried')
             ORDER BY due_date ASC, leitner_box DESC, id ASC
             LIMIT ?2"
        ))?;

        let cards = stmt
            .query_map(params![format_timestamp(&now), to_sql_count(limit)], Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cards)
    }

    fn list_cards(&self, filter: &CardFilter, now: DateTime<Utc>) -> Result<CardPage> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(category) = &filter.category {
            clauses.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(tag) = &filter.tag {
            clauses.push("tags LIKE ?");
            values.push(Value::Text(format!("%{tag}%")));
        }
        if let Some(search) = &filter.search {
            clauses.push("(front LIKE ? OR back LIKE ?)");
            values.push(Value::Text(format!("%{search}%")));
            values.push(Value::Text(format!("%{search}%")));
        }
        if filter.due_only {
            clauses.push("due_date <= ? AND status NOT IN ('suspended', 'buried')");
            values.push(Value::Text(format_timestamp(&now)));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM flashcards {where_clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(to_sql_count(filter.limit)));
        values.push(Value::Integer(to_sql_count(filter.skip)));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM flashcards {where_clause} ORDER BY id ASC LIMIT ? OFFSET ?"
        ))?;
        let cards = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total = total.max(0) as u64;
        let has_more = ((filter.skip + cards.len()) as u64) < total;
        Ok(CardPage {
            cards,
            total,
            skip: filter.skip,
            limit: filter.limit,
            has_more,
        })
    }

    fn all_cards(&self) -> Result<Vec<Flashcard>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CARD_COLUMNS} FROM flashcards ORDER BY id ASC"))?;

        let cards = stmt
            .query_map([], Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cards)
    }

    fn count_by_box(&self) -> Result<LeitnerDistribution> {
        let mut stmt = self
            .conn
            .prepare("SELECT leitner_box, COUNT(*) FROM flashcards GROUP BY leitner_box")?;

        let rows = stmt
            .query_map([], |row| Ok((box_column(row, 0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut distribution = LeitnerDistribution::default();
        for (leitner_box, count) in rows {
            distribution.set(leitner_box, count.max(0) as u64);
        }
        Ok(distribution)
    }

    fn categories(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT category FROM flashcards
             WHERE category IS NOT NULL AND category != ''
             ORDER BY category",
        )?;

        let categories = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(categories)
    }

    fn tags(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tags FROM flashcards WHERE tags IS NOT NULL AND tags != ''")?;

        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tags: BTreeSet<String> = raw
            .iter()
            .flat_map(|t| recall_core::types::split_tags(t))
            .map(str::to_string)
            .collect();

        Ok(tags.into_iter().collect())
    }
}

impl ReviewRepository for SqliteRepository {
    fn append_review_record(&self, record: &ReviewRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO review_records (flashcard_id, difficulty, response_time,
                before_ease_factor, before_interval, before_repetitions, before_leitner_box,
                after_ease_factor, after_interval, after_repetitions, after_leitner_box,
                reviewed_at, next_due_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.flashcard_id,
                record.difficulty.as_str(),
                record.response_time,
                record.before.ease_factor,
                record.before.interval,
                record.before.repetitions,
                record.before.leitner_box.number(),
                record.after.ease_factor,
                record.after.interval,
                record.after.repetitions,
                record.after.leitner_box.number(),
                format_timestamp(&record.reviewed_at),
                format_timestamp(&record.next_due_date),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn reviews_for_card(&self, card_id: i64, skip: usize, limit: usize) -> Result<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM review_records
             WHERE flashcard_id = ?1
             ORDER BY reviewed_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;

        let records = stmt
            .query_map(
                params![card_id, to_sql_count(limit), to_sql_count(skip)],
                Self::row_to_review,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl StudyStatsRepository for SqliteRepository {
    fn load_or_create_daily_stats(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<StudyStats> {
        if let Some(stats) = self.get_daily_stats(date)? {
            return Ok(stats);
        }
        let stats = StudyStats::new(date, self.count_by_box()?, now);
        self.save_daily_stats(&stats)?;
        Ok(stats)
    }

    fn save_daily_stats(&self, stats: &StudyStats) -> Result<()> {
        let boxes: Vec<i64> = LeitnerBox::ALL
            .iter()
            .map(|b| i64::try_from(stats.box_counts.get(*b)).unwrap_or(i64::MAX))
            .collect();
        self.conn.execute(
            &format!(
                "INSERT INTO study_stats ({STUDY_STATS_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(date) DO UPDATE SET
                    new_cards = excluded.new_cards,
                    reviewed_cards = excluded.reviewed_cards,
                    correct_cards = excluded.correct_cards,
                    study_time_ms = excluded.study_time_ms,
                    average_response_time = excluded.average_response_time,
                    box_1_count = excluded.box_1_count,
                    box_2_count = excluded.box_2_count,
                    box_3_count = excluded.box_3_count,
                    box_4_count = excluded.box_4_count,
                    box_5_count = excluded.box_5_count,
                    box_6_count = excluded.box_6_count,
                    box_7_count = excluded.box_7_count,
                    updated_at = excluded.updated_at"
            ),
            params![
                format_date(stats.date),
                stats.new_cards,
                stats.reviewed_cards,
                stats.correct_cards,
                stats.study_time_ms,
                stats.average_response_time,
                boxes[0],
                boxes[1],
                boxes[2],
                boxes[3],
                boxes[4],
                boxes[5],
                boxes[6],
                format_timestamp(&stats.created_at),
                format_timestamp(&stats.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_daily_stats(&self, date: NaiveDate) -> Result<Option<StudyStats>> {
        self.conn
            .query_row(
                &format!("SELECT {STUDY_STATS_COLUMNS} FROM study_stats WHERE date = ?1"),
                params![format_date(date)],
                Self::row_to_study_stats,
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_daily_stats_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<StudyStats>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {STUDY_STATS_COLUMNS} FROM study_stats
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC"
        ))?;

        let stats = stmt
            .query_map(
                params![format_date(start), format_date(end)],
                Self::row_to_study_stats,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stats)
    }
}

impl Store for SqliteRepository {
    fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&Self) -> std::result::Result<T, E>,
    {
        // IMMEDIATE takes the write lock up front so two writers never both
        // read a card and then race to save it.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = f(self)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}
