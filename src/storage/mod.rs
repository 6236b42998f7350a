//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving faculty
//! records. The search engine and the HTTP service only depend on the
//! `RecordStore` trait, so tests can swap in an in-memory store.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::FacultyRecord;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file or the `faculty` table does not exist yet
    #[error("No data available: {0}")]
    NoData(String),

    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of an `upsert_all` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows newly written
    pub inserted: usize,

    /// Records whose `profile_url` was already stored
    pub ignored: usize,

    /// Records without a `profile_url`, which cannot be keyed
    pub missing_key: usize,
}

/// Trait for faculty record storage backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Bring the schema up to date.
    ///
    /// Runs the versioned migrations once; safe to call repeatedly.
    ///
    /// # Returns
    /// The schema version after migration
    async fn initialize(&self) -> StorageResult<u32>;

    /// Insert every record whose `profile_url` is not already present.
    ///
    /// Existing rows are never modified; the first write wins.
    async fn upsert_all(&self, records: &[FacultyRecord]) -> StorageResult<UpsertOutcome>;

    /// Read every stored record in insertion order.
    ///
    /// # Errors
    /// Returns `StorageError::NoData` if there is nothing to read from
    async fn read_all(&self) -> StorageResult<Vec<FacultyRecord>>;

    /// Number of stored records.
    async fn count(&self) -> StorageResult<usize>;
}

#[async_trait]
impl<T> RecordStore for Arc<T>
where
    T: RecordStore + ?Sized,
{
    async fn initialize(&self) -> StorageResult<u32> {
        (**self).initialize().await
    }

    async fn upsert_all(&self, records: &[FacultyRecord]) -> StorageResult<UpsertOutcome> {
        (**self).upsert_all(records).await
    }

    async fn read_all(&self) -> StorageResult<Vec<FacultyRecord>> {
        (**self).read_all().await
    }

    async fn count(&self) -> StorageResult<usize> {
        (**self).count().await
    }
}
