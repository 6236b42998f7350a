//! Ingestion pipeline module.
//!
//! This module handles the offline load: raw records come from a provider,
//! are normalized, and are written to the record store. Records whose
//! `profile_url` is already stored are skipped, so re-running the pipeline
//! over the same scrape is harmless.
//!
//! ```ignore
//! use faculty_finder::ingestion::IngestionPipeline;
//! use faculty_finder::provider::json::JsonFileRecordProvider;
//! use faculty_finder::storage::sqlite::SqliteStore;
//!
//! let pipeline = IngestionPipeline::initialize_new(SqliteStore::new("faculty_data.db")).await?;
//! let provider = JsonFileRecordProvider::new("faculty_data.json");
//! let stats = pipeline.ingest_from_provider(&provider).await?;
//! println!("Inserted: {}, Duplicates: {}", stats.inserted, stats.duplicates_skipped);
//! ```

use thiserror::Error;
use tracing::{info, warn};

use crate::models::FacultyRecord;
use crate::provider::RecordProvider;
use crate::storage::{RecordStore, StorageError, UpsertOutcome};
use crate::transform::transform_from;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from an ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of normalized records handed to the store
    pub total_processed: usize,

    /// Number of records newly inserted
    pub inserted: usize,

    /// Number of records skipped because their profile URL was already stored
    pub duplicates_skipped: usize,

    /// Number of records skipped because they had no profile URL
    pub missing_key: usize,
}

impl IngestionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a store outcome into these statistics.
    pub fn record_outcome(&mut self, processed: usize, outcome: UpsertOutcome) {
        self.total_processed += processed;
        self.inserted += outcome.inserted;
        self.duplicates_skipped += outcome.ignored;
        self.missing_key += outcome.missing_key;
    }
}

/// Ingestion pipeline coordinator.
///
/// Owns the store and feeds it normalized batches.
pub struct IngestionPipeline<S>
where
    S: RecordStore,
{
    storage: S,
}

impl<S> IngestionPipeline<S>
where
    S: RecordStore,
{
    /// Wrap a store whose schema is already up to date.
    pub fn connect(storage: S) -> Self {
        Self { storage }
    }

    /// Bring the store's schema up to date and wrap it.
    ///
    /// # Errors
    /// Returns `IngestionError::StorageError` if the migration fails
    pub async fn initialize_new(storage: S) -> IngestionResult<Self> {
        let version = storage.initialize().await?;
        info!("Record store at schema version {}", version);
        Ok(Self { storage })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store a batch of already-normalized records.
    ///
    /// An empty batch never touches the store.
    ///
    /// # Errors
    /// Returns `IngestionError::StorageError` if the write fails
    pub async fn ingest_batch(&self, records: &[FacultyRecord]) -> IngestionResult<IngestionStats> {
        let mut stats = IngestionStats::new();
        if records.is_empty() {
            return Ok(stats);
        }

        let outcome = self.storage.upsert_all(records).await?;
        stats.record_outcome(records.len(), outcome);
        Ok(stats)
    }

    /// Fetch, normalize and store everything a provider offers.
    ///
    /// An unreadable provider yields empty statistics rather than an error;
    /// the transform step has already logged why.
    ///
    /// # Errors
    /// Returns `IngestionError::StorageError` if the write fails
    pub async fn ingest_from_provider<P>(&self, provider: &P) -> IngestionResult<IngestionStats>
    where
        P: RecordProvider + ?Sized,
    {
        let records = transform_from(provider).await;
        if records.is_empty() {
            warn!("No records obtained from {}; nothing to store", provider.name());
            return Ok(IngestionStats::new());
        }

        let stats = self.ingest_batch(&records).await?;
        info!(
            "Stored {} new records from {} ({} duplicates, {} without profile URL)",
            stats.inserted,
            provider.name(),
            stats.duplicates_skipped,
            stats.missing_key
        );
        Ok(stats)
    }
}
