//! Date utilities for daily reset hour handling.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Timelike, Utc};

/// Study day that `now` belongs to.
///
/// Before `daily_reset_hour` (UTC) the previous calendar day is still the
/// current study day, so late-night sessions count towards it.
pub fn study_day(now: DateTime<Utc>, daily_reset_hour: u32) -> NaiveDate {
    if now.hour() < daily_reset_hour {
        (now - Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

/// Format a date as YYYY-MM-DD for SQL.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Fixed-width timestamp text; sorts the same as the instant it encodes.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
