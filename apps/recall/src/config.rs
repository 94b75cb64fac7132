//! Configuration loading.
//!
//! Everything comes from `RECALL_*` environment variables, with a `.env` file
//! honoured for local use.

use std::path::PathBuf;
use std::str::FromStr;

use recall_core::{ResponseTimePolicy, SchedulerSettings, MAX_INTERVAL_CAP_DAYS};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("no data directory available; set RECALL_DATABASE")]
    NoDataDir,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub scheduler: SchedulerSettings,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup("RECALL_DATABASE") {
            Some(path) => PathBuf::from(path),
            None => default_database_path()?,
        };

        let defaults = SchedulerSettings::default();
        let response_time_policy = match lookup("RECALL_RESPONSE_TIME_POLICY") {
            Some(value) => ResponseTimePolicy::from_str(value.trim()).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "RECALL_RESPONSE_TIME_POLICY".to_string(),
                    format!("'{value}' is not one of accept, clamp, reject"),
                )
            })?,
            None => defaults.response_time_policy,
        };

        let daily_reset_hour = parse_var(&lookup, "RECALL_DAILY_RESET_HOUR", defaults.daily_reset_hour)?;
        if daily_reset_hour > 23 {
            return Err(ConfigError::InvalidValue(
                "RECALL_DAILY_RESET_HOUR".to_string(),
                format!("{daily_reset_hour} is not an hour of the day"),
            ));
        }

        let max_interval_days = parse_var(&lookup, "RECALL_MAX_INTERVAL_DAYS", defaults.max_interval_days)?;
        if !(1..=MAX_INTERVAL_CAP_DAYS).contains(&max_interval_days) {
            return Err(ConfigError::InvalidValue(
                "RECALL_MAX_INTERVAL_DAYS".to_string(),
                format!("{max_interval_days} is outside 1..={MAX_INTERVAL_CAP_DAYS}"),
            ));
        }

        let max_response_time_ms = parse_var(
            &lookup,
            "RECALL_MAX_RESPONSE_TIME_MS",
            defaults.max_response_time_ms,
        )?;
        if max_response_time_ms < 0 {
            return Err(ConfigError::InvalidValue(
                "RECALL_MAX_RESPONSE_TIME_MS".to_string(),
                format!("{max_response_time_ms} is negative"),
            ));
        }

        let scheduler = SchedulerSettings {
            mastery_threshold: parse_var(&lookup, "RECALL_MASTERY_THRESHOLD", defaults.mastery_threshold)?,
            max_interval_days,
            new_cards_per_day: parse_var(&lookup, "RECALL_NEW_CARDS_PER_DAY", defaults.new_cards_per_day)?,
            reviews_per_day: parse_var(&lookup, "RECALL_REVIEWS_PER_DAY", defaults.reviews_per_day)?,
            seconds_per_card: parse_var(&lookup, "RECALL_SECONDS_PER_CARD", defaults.seconds_per_card)?,
            daily_reset_hour,
            response_time_policy,
            max_response_time_ms,
            ..defaults
        };

        Ok(Self {
            database_path,
            scheduler,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("'{value}': {e}"))),
        None => Ok(default),
    }
}

fn default_database_path() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("recall").join("recall.db"))
        .ok_or(ConfigError::NoDataDir)
}
