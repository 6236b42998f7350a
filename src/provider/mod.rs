//! Record provider module.
//!
//! This module defines the interface for sourcing raw faculty records and
//! includes the implementations used by the ingestion pipeline.
//!
//! The `RecordProvider` trait abstracts where raw records come from (the
//! scraper's JSON output, or the live scraper itself) so the pipeline does
//! not couple to either.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::RawFacultyRecord;

pub mod json;

/// Errors that can occur when fetching records from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing raw faculty records.
///
/// Providers return records exactly as collected; trimming, defaulting and
/// deduplication happen later in the pipeline.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Fetch all available raw records.
    ///
    /// # Errors
    /// Returns `ProviderError` if the source cannot be read or parsed
    async fn fetch_records(&self) -> ProviderResult<Vec<RawFacultyRecord>>;

    /// Get the total count of records available from this provider.
    ///
    /// The default implementation fetches everything and counts it.
    async fn count_records(&self) -> ProviderResult<usize> {
        self.fetch_records().await.map(|records| records.len())
    }

    /// Human-readable description of this provider, for logging.
    fn name(&self) -> &str;
}
