//! Ingestion pipeline binary entry point.
//!
//! Loads raw faculty records (from the scraper's JSON output, or by crawling
//! the directory directly), normalizes them and stores them in the SQLite
//! database. Re-running is safe: already stored profiles are skipped.
//!
//! # Examples
//!
//! Load the default JSON file into the default database:
//! ```bash
//! ingestion
//! ```
//!
//! Crawl and store in one step:
//! ```bash
//! ingestion --source crawl --db-path data/faculty_data.db
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use faculty_finder::{
    crawler::{FacultyScraper, ScrapeConfig},
    ingestion::IngestionPipeline,
    provider::{json::JsonFileRecordProvider, RecordProvider},
    storage::{sqlite::SqliteStore, RecordStore},
    DEFAULT_DB_PATH, DEFAULT_JSON_PATH,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where raw records come from
#[derive(Debug, Clone, ValueEnum)]
enum Source {
    /// JSON array written by the `scrape` binary (default)
    Json,
    /// Crawl the faculty directory now
    Crawl,
}

/// Ingestion pipeline CLI for building and updating the faculty database
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Build and update the faculty database",
    long_about = "Ingestion pipeline that normalizes scraped faculty profiles and stores them in SQLite.

EXAMPLES:
  Load the scraper output:
    ingestion --input faculty_data.json

  Crawl and store in one step:
    ingestion --source crawl

  Custom database location and logging:
    FACULTY_DB_PATH=data/faculty.db ingestion --log-level debug"
)]
struct IngestionArgs {
    /// Record source
    #[arg(long, value_enum, default_value = "json")]
    source: Source,

    /// Input JSON file containing raw faculty records
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_JSON_PATH)]
    input: PathBuf,

    /// Database file path
    #[arg(long, value_name = "PATH", env = "FACULTY_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Profile pages fetched concurrently when crawling
    #[arg(long, value_name = "N", default_value = "8")]
    concurrency: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Create the record provider selected on the command line
fn create_provider(args: &IngestionArgs) -> Result<Box<dyn RecordProvider>> {
    match args.source {
        Source::Json => {
            if !args.input.exists() {
                error!("Input file does not exist: {:?}", args.input);
                anyhow::bail!("Input file not found: {:?}", args.input);
            }
            info!("Input file: {:?}", args.input);
            Ok(Box::new(JsonFileRecordProvider::new(args.input.clone())))
        }
        Source::Crawl => {
            let config = ScrapeConfig {
                concurrency: args.concurrency.max(1),
                ..ScrapeConfig::default()
            };
            info!("Crawling {} listing pages", config.start_urls.len());
            let scraper = FacultyScraper::new(config).context("Failed to build HTTP client")?;
            Ok(Box::new(scraper))
        }
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = IngestionArgs::parse();

    init_logging(&args.log_level).context("Failed to initialize logging")?;

    info!("Starting faculty ingestion pipeline");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    let provider = create_provider(&args).context("Failed to create record provider")?;

    info!("Database path: {:?}", args.db_path);
    let pipeline = IngestionPipeline::initialize_new(SqliteStore::new(args.db_path.clone()))
        .await
        .context("Failed to prepare database")?;

    let spinner = create_spinner(format!("Ingesting from {}", provider.name()));
    let stats = pipeline
        .ingest_from_provider(&*provider)
        .await
        .context("Failed to store faculty records")?;
    spinner.finish_and_clear();

    let stored = pipeline
        .storage()
        .count()
        .await
        .context("Failed to count stored records")?;

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Ingestion Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Duplicates skipped:   {:>16} ║", stats.duplicates_skipped);
    println!("║ Missing profile URL:  {:>16} ║", stats.missing_key);
    println!("║ Records in database:  {:>16} ║", stored);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if stats.total_processed == 0 {
        warn!("No records were ingested - check the input source");
    } else if stats.missing_key > 0 {
        warn!(
            "{} records had no profile URL and were not stored",
            stats.missing_key
        );
    }

    info!("Ingestion pipeline completed successfully");

    Ok(())
}
