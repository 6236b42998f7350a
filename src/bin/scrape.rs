//! Scraper binary entry point.
//!
//! Crawls the faculty directory and writes the raw records as a JSON array,
//! ready for the `ingestion` binary.
//!
//! ```bash
//! scrape --output faculty_data.json --concurrency 4
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use faculty_finder::{
    crawler::{FacultyScraper, ScrapeConfig},
    DEFAULT_JSON_PATH,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "scrape",
    version,
    about = "Crawl the faculty directory into a JSON file"
)]
struct ScrapeArgs {
    /// Output JSON file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_JSON_PATH)]
    output: PathBuf,

    /// Listing page to crawl (repeatable; defaults to the five directory pages)
    #[arg(long = "start-url", value_name = "URL")]
    start_urls: Vec<String>,

    /// Only follow profile links on this domain
    #[arg(long, value_name = "DOMAIN")]
    allowed_domain: Option<String>,

    /// Profile pages fetched concurrently
    #[arg(long, value_name = "N", default_value = "8")]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value = "30")]
    timeout_secs: u64,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl ScrapeArgs {
    fn config(&self) -> ScrapeConfig {
        let defaults = ScrapeConfig::default();
        ScrapeConfig {
            start_urls: if self.start_urls.is_empty() {
                defaults.start_urls
            } else {
                self.start_urls.clone()
            },
            allowed_domain: self
                .allowed_domain
                .clone()
                .unwrap_or(defaults.allowed_domain),
            concurrency: self.concurrency.max(1),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} profiles")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ScrapeArgs::parse();
    init_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();
    let scraper = FacultyScraper::new(args.config()).context("Failed to build HTTP client")?;

    let entries = scraper
        .collect_listing()
        .await
        .context("Failed to read the faculty listing")?;
    if entries.is_empty() {
        warn!("No profile links found on the listing pages");
    }

    let progress = create_progress_bar(entries.len());
    let records = scraper.scrape_profiles(&entries, || progress.inc(1)).await;
    progress.finish();

    let failed = entries.len() - records.len();
    if failed > 0 {
        warn!("{} profile pages could not be fetched", failed);
    }

    let json = serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    tokio::fs::write(&args.output, json)
        .await
        .with_context(|| format!("Failed to write {:?}", args.output))?;

    info!(
        "Wrote {} records to {:?} in {:.2?}",
        records.len(),
        args.output,
        start_time.elapsed()
    );
    println!("Scraped {} faculty profiles into {}", records.len(), args.output.display());

    Ok(())
}
