//! HTTP server binary entry point.
//!
//! Serves the JSON API and the HTML dashboard over the faculty database.
//! The embedding model is loaded on the first search, not at startup.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use faculty_finder::{
    embedding::fastembed::LazyFastEmbed,
    models::SearchSettings,
    query::SemanticSearchEngine,
    server::{router, AppState, ServerConfig},
    storage::{sqlite::SqliteStore, RecordStore},
    DEFAULT_DB_PATH,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "server",
    version,
    about = "HTTP API and dashboard for the faculty database"
)]
struct ServerArgs {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "FACULTY_BIND", default_value = "127.0.0.1:8000")]
    bind: String,

    /// Database file path
    #[arg(long, value_name = "PATH", env = "FACULTY_DB_PATH", default_value = DEFAULT_DB_PATH)]
    db_path: PathBuf,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR", env = "FASTEMBED_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Default number of hits per search
    #[arg(long, default_value_t = SearchSettings::DASHBOARD.top_k)]
    top_k: usize,

    /// Default minimum score per search
    #[arg(long, default_value_t = SearchSettings::DASHBOARD.min_score)]
    min_score: f32,

    /// Maximum top-k allowed per request
    #[arg(long, default_value_t = 50)]
    max_top_k: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        ServerConfig {
            bind: args.bind,
            db_path: args.db_path,
            model_cache_dir: args.cache_dir,
            settings: SearchSettings::new(args.top_k, args.min_score),
            max_top_k: args.max_top_k,
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_logging(&args.log_level);
    let config = ServerConfig::from(args);

    let store = Arc::new(SqliteStore::new(config.db_path.clone()));
    // Upgrade older databases; a missing one stays missing until ingestion runs
    if config.db_path.exists() {
        let version = store
            .initialize()
            .await
            .context("Failed to migrate database")?;
        info!("Database {:?} at schema version {}", config.db_path, version);
    } else {
        warn!(
            "Database {:?} not found; serving empty results until ingestion runs",
            config.db_path
        );
    }

    let engine = SemanticSearchEngine::new(
        LazyFastEmbed::new(config.model_cache_dir.clone()),
        Arc::clone(&store),
    );
    let state = AppState::new(
        Arc::new(engine),
        store,
        config.settings,
        config.max_top_k,
    );

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, router(state))
        .await
        .context("server shutdown")?;
    Ok(())
}
