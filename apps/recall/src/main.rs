use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use recall::db::CardFilter;
use recall::{telemetry, Config, ReviewService, SqliteRepository};
use recall_core::{CardStatus, CardUpdate, NewFlashcard, StudyStats};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "recall", about = "Spaced-repetition flashcards")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a card
    Add {
        front: String,
        back: String,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Import cards from a JSON array of {front, back, category?, tags?}
    Import { file: PathBuf },
    /// Edit card content; an empty value clears category or tags
    Edit {
        id: i64,
        #[arg(long)]
        front: Option<String>,
        #[arg(long)]
        back: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a card and its history
    Delete { id: i64 },
    /// List cards
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<CardStatus>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        search: Option<String>,
        /// Only cards due now
        #[arg(long)]
        due: bool,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = recall::db::DEFAULT_PAGE_SIZE)]
        limit: usize,
    },
    /// Cards due for review
    Due {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record a review: again, hard, good or easy
    Review {
        id: i64,
        difficulty: String,
        /// Time taken to answer, in milliseconds
        #[arg(long, default_value_t = 0)]
        response_ms: i64,
    },
    /// Review history of a card, newest first
    History {
        id: i64,
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Collection statistics
    Stats,
    /// Daily study counters for one day or an inclusive range
    Daily {
        date: Option<NaiveDate>,
        #[arg(long, requires = "to", conflicts_with = "date")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Hide a card from review until restored
    Suspend { id: i64 },
    /// Set a card aside for now; it stays out of the queue until restored
    Bury { id: i64 },
    /// Return a suspended or buried card to review
    Restore { id: i64 },
    /// Distinct categories
    Categories,
    /// Distinct tags
    Tags,
}

fn parse_status(value: &str) -> std::result::Result<CardStatus, String> {
    CardStatus::from_str(value).ok_or_else(|| format!("unknown status '{value}'"))
}

/// A day's counters plus the share answered correctly.
#[derive(Serialize)]
struct DailyReport {
    #[serde(flatten)]
    stats: StudyStats,
    accuracy: f64,
}

impl From<StudyStats> for DailyReport {
    fn from(stats: StudyStats) -> Self {
        Self {
            accuracy: stats.accuracy(),
            stats,
        }
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose);

    let config = Config::from_env()?;
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let repository = SqliteRepository::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    tracing::debug!(path = %config.database_path.display(), "database opened");
    let service = ReviewService::new(repository, config.scheduler);

    match cli.command {
        Commands::Add {
            front,
            back,
            category,
            tags,
        } => print(&service.create_card(NewFlashcard {
            front,
            back,
            category,
            tags,
        })?),
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let inputs: Vec<NewFlashcard> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            print(&service.import_cards(inputs)?)
        }
        Commands::Edit {
            id,
            front,
            back,
            category,
            tags,
        } => print(&service.update_card(
            id,
            CardUpdate {
                front,
                back,
                category,
                tags,
            },
        )?),
        Commands::Delete { id } => {
            service.delete_card(id)?;
            print(&serde_json::json!({ "deleted": id }))
        }
        Commands::List {
            status,
            category,
            tag,
            search,
            due,
            skip,
            limit,
        } => print(&service.list_cards(&CardFilter {
            status,
            category,
            tag,
            search,
            due_only: due,
            skip,
            limit,
        })?),
        Commands::Due { limit } => print(&service.due_cards(limit)?),
        Commands::Review {
            id,
            difficulty,
            response_ms,
        } => print(&service.submit_review(id, &difficulty, response_ms)?),
        Commands::History { id, skip, limit } => print(&service.review_history(id, skip, limit)?),
        Commands::Stats => print(&service.get_stats()?),
        Commands::Daily { date, from, to } => match (from, to) {
            (Some(from), Some(to)) => {
                let days = service.daily_stats_range(from, to)?;
                print(&days.into_iter().map(DailyReport::from).collect::<Vec<_>>())
            }
            (None, None) => print(&service.daily_stats(date)?.map(DailyReport::from)),
            _ => bail!("--from and --to must be given together"),
        },
        Commands::Suspend { id } => print(&service.suspend_card(id)?),
        Commands::Bury { id } => print(&service.bury_card(id)?),
        Commands::Restore { id } => print(&service.restore_card(id)?),
        Commands::Categories => print(&service.categories()?),
        Commands::Tags => print(&service.tags()?),
    }
}
