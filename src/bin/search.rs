//! Search binary entry point.
//!
//! This binary provides a command-line interface for finding faculty in a
//! pre-built database. Without `--query` it starts an interactive prompt;
//! with `--query` it answers once and exits. Results can be printed as plain
//! text, a table, or JSON.
//!
//! # Examples
//!
//! Interactive mode:
//! ```bash
//! search
//! ```
//!
//! Single query as JSON:
//! ```bash
//! search --query "machine learning expert" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use faculty_finder::{
    corpus::snippet,
    embedding::fastembed::LazyFastEmbed,
    models::{has_content, SearchResult, SearchSettings},
    query::{QueryError, SearchEngine, SearchQuery, SemanticSearchEngine},
    storage::{sqlite::SqliteStore, RecordStore, StorageError},
    DEFAULT_DB_PATH,
};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Engine = SemanticSearchEngine<LazyFastEmbed, SqliteStore>;

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// Output format for search results
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Numbered hits with confidence and context
    Text,
    /// Human-friendly table with colored scores
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Search binary CLI for querying the faculty database
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Find faculty by name, topic or keyword using semantic similarity",
    long_about = "Query the faculty database using semantic search. Starts an interactive \
                  prompt unless --query is given.

EXAMPLES:
  Interactive mode:
    search

  Single query:
    search --query \"who works in VLSI\"

  JSON output with a looser threshold:
    search --query \"Abhishek Gupta\" --format json --min-score 10 --top-k 5"
)]
struct Args {
    /// Database file path
    #[arg(long, value_name = "PATH", env = "FACULTY_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// Search query (omit for interactive mode)
    #[arg(long, value_name = "TEXT")]
    query: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value_t = SearchSettings::TERMINAL.top_k)]
    top_k: usize,

    /// Hits scoring at or below this percentage are hidden
    #[arg(long, value_name = "SCORE", default_value_t = SearchSettings::TERMINAL.min_score)]
    min_score: f32,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR", env = "FASTEMBED_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Execute a search query and return results
async fn execute_search(engine: &Engine, query_text: &str, settings: SearchSettings) -> Result<Vec<SearchResult>> {
    debug!("Executing search for query: {}", query_text);

    let query = SearchQuery::new(query_text, settings);
    engine
        .search(&query)
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query_text))
}

/// Format results the way the prompt prints them
fn format_results_text(query: &str, results: &[SearchResult]) -> String {
    let mut out = format!("\nResults for: '{}'\n{}\n", query, "-".repeat(30));

    if results.is_empty() {
        out.push_str("No confident matches found. Try different keywords.\n");
        return out;
    }

    for (idx, result) in results.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", idx + 1, result.record.display_name()));
        out.push_str(&format!("   Match Confidence: {:.2}%\n", result.score));
        out.push_str(&format!("   Context: {}\n\n", snippet(&result.context)));
    }
    out
}

/// Format results as a pretty table
fn format_results_table(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No confident matches found. Try different keywords.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Research").add_attribute(Attribute::Bold),
        Cell::new("Email").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        let record = &result.record;
        let research = if has_content(record.research.as_deref()) {
            record.research.as_deref().map(snippet).unwrap_or_default()
        } else {
            "N/A".to_string()
        };

        let color = if result.score >= 70.0 {
            Color::Green
        } else if result.score >= 50.0 {
            Color::Cyan
        } else {
            Color::Yellow
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(record.display_name()),
            Cell::new(research),
            Cell::new(record.email.as_deref().unwrap_or("N/A")),
            Cell::new(format!("{:.2}%", result.score)).fg(color),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string_pretty(results).with_context(|| "Failed to serialize results to JSON")
}

fn print_results(query: &str, results: &[SearchResult], format: &OutputFormat, elapsed: Duration) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", format_results_text(query, results)),
        OutputFormat::Table => {
            println!("{}", format_results_table(results));
            println!(
                "\nFound {} results in {:.2}s",
                results.len(),
                elapsed.as_secs_f64()
            );
        }
        OutputFormat::Json => println!("{}", format_results_json(results)?),
    }
    Ok(())
}

/// Display detailed view of a single result
fn display_result_detail(result: &SearchResult, rank: usize) {
    let record = &result.record;
    let field = |value: Option<&str>| value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A").to_string();

    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Name: {}", record.display_name());
    println!("Score: {:.2}%", result.score);
    println!("Email: {}", field(record.email.as_deref()));
    println!("Phone: {}", field(record.phone.as_deref()));
    println!("Address: {}", field(record.address.as_deref()));
    println!("Education: {}", field(record.education.as_deref()));
    println!("Website: {}", field(record.faculty_web.as_deref()));
    println!("Profile: {}", field(record.profile_url.as_deref()));
    println!("\nSpecialization:\n{}", field(record.specialization.as_deref()));
    println!("\nResearch:\n{}", field(record.research.as_deref()));
    println!("\nTeaching:\n{}", field(record.teaching.as_deref()));
    println!("\nBiography:\n{}", field(record.biography.as_deref()));
    println!("\nPublications:\n{}", field(record.publications.as_deref()));
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("You can search by:");
    println!("  Full names (e.g. 'Abhishek Gupta')");
    println!("  Topics (e.g. 'machine learning expert')");
    println!("  Keywords (e.g. 'who works in VLSI')");
    println!("Commands:");
    println!("  /top N          - Set number of results to N");
    println!("  /min SCORE      - Set the minimum match confidence");
    println!("  /format FORMAT  - Use text, table or json output");
    println!("  /detail N       - Show full profile for result rank N");
    println!("  /help           - Show this help");
    println!("  exit, quit, q   - Exit");
}

/// Run interactive REPL mode
async fn run_interactive(engine: Engine, mut settings: SearchSettings, mut format: OutputFormat) -> Result<()> {
    println!("\nSemantic Search Engine Ready!");
    println!("{}", "-".repeat(41));
    print_help();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;
    let mut last_results: Vec<SearchResult> = Vec::new();

    loop {
        match rl.readline("\nSearch query> ") {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }
                if EXIT_WORDS.contains(&line.to_lowercase().as_str()) {
                    println!("Exiting search engine. Goodbye!");
                    break;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_help(),
                        "/top" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(n)) if n > 0 => {
                                settings.top_k = n;
                                println!("Set top-k to {}", n);
                            }
                            _ => eprintln!("Usage: /top N (positive integer)"),
                        },
                        "/min" => match parts.get(1).map(|s| s.parse::<f32>()) {
                            Some(Ok(score)) if score.is_finite() => {
                                settings.min_score = score;
                                println!("Set minimum score to {:.2}", score);
                            }
                            _ => eprintln!("Usage: /min SCORE"),
                        },
                        "/format" => match parts.get(1).copied() {
                            Some("text") => format = OutputFormat::Text,
                            Some("table") => format = OutputFormat::Table,
                            Some("json") => format = OutputFormat::Json,
                            _ => eprintln!("Usage: /format [text|table|json]"),
                        },
                        "/detail" => match parts.get(1).map(|n| n.parse::<usize>()) {
                            Some(Ok(rank)) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1], rank);
                            }
                            Some(Ok(rank)) if rank > last_results.len() => {
                                eprintln!(
                                    "Rank {} out of range (last search had {} results)",
                                    rank,
                                    last_results.len()
                                );
                            }
                            _ => eprintln!("Usage: /detail N (positive integer)"),
                        },
                        other => eprintln!("Unknown command: {}. Type /help for available commands.", other),
                    }
                    continue;
                }

                let start = Instant::now();
                match execute_search(&engine, line, settings).await {
                    Ok(results) => {
                        if let Err(e) = print_results(line, &results, &format, start.elapsed()) {
                            eprintln!("Error formatting results: {}", e);
                        }
                        last_results = results;
                    }
                    Err(e) => eprintln!("Search failed: {:#}", e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Encode the corpus up front so the first query is fast
async fn build_index(engine: &Engine, record_count: usize) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Indexing {} faculty profiles. Please wait...",
        record_count
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let indexed = engine.warm_up().await;
    spinner.finish_and_clear();

    match indexed {
        Ok(count) => {
            info!("Indexed {} faculty profiles", count);
            Ok(())
        }
        Err(QueryError::EmbeddingUnavailable(msg)) => {
            anyhow::bail!("Embedding model unavailable: {}", msg)
        }
        Err(e) => Err(e).context("Failed to index faculty profiles"),
    }
}

/// Whether there is anything to search.
#[derive(Debug, PartialEq)]
enum DataState {
    Ready(usize),
    /// No database, no table or no rows; carries the message for the user
    Missing(String),
}

async fn check_data(storage: &SqliteStore) -> Result<DataState> {
    match storage.count().await {
        Ok(0) => Ok(DataState::Missing(
            "No faculty data found in the database.".to_string(),
        )),
        Ok(count) => Ok(DataState::Ready(count)),
        Err(StorageError::NoData(reason)) => Ok(DataState::Missing(format!(
            "No faculty data found: {}.\n\
             Run the scrape and ingestion binaries first to create the database.",
            reason
        ))),
        Err(e) => Err(e).context("Failed to count faculty records"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    info!("Loading database from: {}", args.db_path.display());
    let storage = SqliteStore::new(args.db_path.clone());

    let record_count = match check_data(&storage).await? {
        DataState::Ready(count) => count,
        DataState::Missing(message) => {
            if matches!(args.format, OutputFormat::Json) {
                eprintln!("{}", message);
            } else {
                println!("{}", message);
            }
            return Ok(());
        }
    };
    info!("Database contains {} faculty records", record_count);

    let engine = SemanticSearchEngine::new(LazyFastEmbed::new(args.cache_dir.clone()), storage);
    if !matches!(args.format, OutputFormat::Json) {
        println!("Loading embedding model ({})...", faculty_finder::DEFAULT_EMBEDDING_MODEL);
    }
    build_index(&engine, record_count).await?;

    let settings = SearchSettings::new(args.top_k, args.min_score);
    match args.query {
        Some(query) => {
            let start = Instant::now();
            let results = execute_search(&engine, query.trim(), settings).await?;
            print_results(query.trim(), &results, &args.format, start.elapsed())?;
        }
        None => run_interactive(engine, settings, args.format).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use faculty_finder::models::FacultyRecord;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_database_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let storage = SqliteStore::new(dir.path().join("absent.db"));

        let state = check_data(&storage).await.unwrap();
        assert!(matches!(state, DataState::Missing(ref msg) if msg.contains("not found")));
        assert!(!storage.path().exists());
    }

    #[tokio::test]
    async fn test_missing_table_is_reported_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER)")
            .unwrap();

        let state = check_data(&SqliteStore::new(path)).await.unwrap();
        assert!(matches!(state, DataState::Missing(ref msg) if msg.contains("faculty")));
    }

    #[tokio::test]
    async fn test_empty_and_populated_tables() {
        let dir = tempdir().unwrap();
        let storage = SqliteStore::new(dir.path().join("faculty_data.db"));
        storage.initialize().await.unwrap();
        assert!(matches!(check_data(&storage).await.unwrap(), DataState::Missing(_)));

        let record = FacultyRecord {
            name: Some("Arpit Rana".to_string()),
            profile_url: Some("u1".to_string()),
            ..FacultyRecord::default()
        };
        storage.upsert_all(&[record]).await.unwrap();
        assert_eq!(check_data(&storage).await.unwrap(), DataState::Ready(1));
    }
}
