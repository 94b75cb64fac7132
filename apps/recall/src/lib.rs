//! Flashcard review engine: SQLite storage and the transactional review
//! service on top of `recall-core`.

pub mod config;
pub mod db;
pub mod service;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use db::{DbError, SqliteRepository};
pub use service::{ReviewError, ReviewResult, ReviewService};
