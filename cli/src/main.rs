//! A simple CLI for printing the leaderboard.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use leaderboard_common::memory_store::MemoryStore;
use leaderboard_common::{
    DEFAULT_MIN_SUBMISSIONS, DEFAULT_TOP_N, RankedUser, RankingConfig, RankingEngine,
};
use log::{debug, info};
use std::path::PathBuf;

/// How to print the leaderboard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Users need at least this many submissions to be ranked
    #[arg(
        long,
        default_value_t = i64::from(DEFAULT_MIN_SUBMISSIONS),
        env = "LEADERBOARD_MIN_SUBMISSIONS",
        allow_hyphen_values = true
    )]
    min_submissions: i64,

    /// Only this many of each user's best submissions count
    #[arg(
        long,
        default_value_t = i64::from(DEFAULT_TOP_N),
        env = "LEADERBOARD_TOP_N",
        allow_hyphen_values = true
    )]
    top_n: i64,

    /// Rank a JSON dataset file instead of the database at DATABASE_URL
    #[arg(short, long, env = "LEADERBOARD_DATASET")]
    dataset: Option<PathBuf>,

    /// The output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Only print the first N entries
    #[arg(short, long)]
    limit: Option<usize>,

    /// Show additional output
    #[arg(short, long, env = "LEADERBOARD_VERBOSE")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // reject a bad config before touching any data
    let config = RankingConfig::new(cli.min_submissions, cli.top_n)?;
    let engine = RankingEngine::new(config);
    debug!("Using {:?}", engine.config());

    let mut rankings = match &cli.dataset {
        Some(path) => {
            info!("Loading dataset from {}", path.display());
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read dataset {}", path.display()))?;
            let mut store = MemoryStore::from_json_str(&json)
                .with_context(|| format!("Could not load dataset {}", path.display()))?;
            engine.rank(&mut store)?
        }
        None => rank_from_database(&engine)?,
    };

    if let Some(limit) = cli.limit {
        rankings.truncate(limit);
    }

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rankings)?),
        OutputFormat::Table => print_table(&rankings),
    }
    Ok(())
}

#[cfg(feature = "database")]
fn rank_from_database(engine: &RankingEngine) -> Result<Vec<RankedUser>> {
    use leaderboard_common::db_util;

    let mut conn = db_util::get_database_connection().context("Could not connect to database")?;
    info!("Database connection established.");
    Ok(engine.rank(&mut conn)?)
}

#[cfg(not(feature = "database"))]
fn rank_from_database(_engine: &RankingEngine) -> Result<Vec<RankedUser>> {
    anyhow::bail!("Built without database support, pass --dataset instead")
}

fn print_table(rankings: &[RankedUser]) {
    let width = rankings
        .iter()
        .map(|r| r.username.len())
        .max()
        .unwrap_or(0)
        .max("Username".len());
    println!("{:>5}  {:<width$}  {:>11}", "Rank", "Username", "Total Score");
    for entry in rankings {
        println!(
            "{:>5}  {:<width$}  {:>11}",
            entry.rank, entry.username, entry.total_score
        );
    }
}
