//! Faculty Finder - semantic search over scraped faculty profiles.
//!
//! This library provides the core functionality for the faculty finder
//! system: crawl a university's faculty directory, normalize the profiles,
//! store them in SQLite, and rank them against free-text queries by
//! sentence-embedding similarity.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (FacultyRecord, SearchResult, SearchSettings, etc.)
//! - **crawler**: Listing and profile page crawling
//! - **provider**: Sources of raw records (JSON file, live crawl)
//! - **transform**: Field trimming and the null/sentinel policy
//! - **storage**: Record persistence with versioned migrations (SQLite-based)
//! - **corpus**: Per-record search text
//! - **embedding**: Text embedding generation
//! - **query**: Ranking and the search engine
//! - **ingestion**: Offline load pipeline
//! - **server**: HTTP JSON service and HTML dashboard
//!
//! # Workflow
//!
//! ## Offline Ingestion
//!
//! 1. Crawl the faculty listing and profile pages into a JSON file
//! 2. Trim every field; fill missing long-text fields with a sentinel
//! 3. Insert records keyed by profile URL, ignoring ones already stored
//!
//! ## Online Search
//!
//! 1. Load every stored record
//! 2. Build one search string per record (name, research, specialization)
//! 3. Embed the corpus (cached until the record set changes) and the query
//! 4. Rank by cosine similarity, cut to top-k, drop low scores
//!
//! # Example
//!
//! ```ignore
//! use faculty_finder::{
//!     embedding::fastembed::LazyFastEmbed,
//!     storage::sqlite::SqliteStore,
//!     query::{SemanticSearchEngine, SearchQuery},
//!     SearchEngine, SearchSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SemanticSearchEngine::new(
//!         LazyFastEmbed::default(),
//!         SqliteStore::new("faculty_data.db"),
//!     );
//!
//!     let query = SearchQuery::new("machine learning", SearchSettings::TERMINAL);
//!     for result in engine.search(&query).await? {
//!         println!("{}: {:.2}", result.record.display_name(), result.score);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod corpus;
pub mod crawler;
pub mod embedding;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod server;
pub mod storage;
pub mod transform;

// Re-export commonly used types at the crate root
pub use embedding::EmbeddingProvider;
pub use models::{FacultyRecord, RawFacultyRecord, SearchResult, SearchSettings, NOT_AVAILABLE};
pub use provider::RecordProvider;
pub use query::{SearchEngine, SearchQuery};
pub use storage::RecordStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model name
pub const DEFAULT_EMBEDDING_MODEL: &str = "AllMiniLML6V2";

/// Default embedding dimension for all-MiniLM-L6-v2
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default database file
pub const DEFAULT_DB_PATH: &str = "faculty_data.db";

/// Default scrape output / ingestion input file
pub const DEFAULT_JSON_PATH: &str = "faculty_data.json";
