//! JSON file provider.
//!
//! Reads the array of flat field mappings written by the scraper.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{ProviderError, ProviderResult, RecordProvider};
use crate::models::RawFacultyRecord;

/// Reads raw records from a JSON array on disk.
///
/// The file is read on every fetch, so a provider can be kept around while
/// the scraper rewrites the file.
#[derive(Debug, Clone)]
pub struct JsonFileRecordProvider {
    path: PathBuf,
    label: String,
}

impl JsonFileRecordProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = format!("json file {}", path.display());
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a JSON array of raw records.
    pub fn parse(contents: &str) -> ProviderResult<Vec<RawFacultyRecord>> {
        serde_json::from_str(contents).map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl RecordProvider for JsonFileRecordProvider {
    async fn fetch_records(&self) -> ProviderResult<Vec<RawFacultyRecord>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let records = Self::parse(&contents)?;
        debug!("Read {} raw records from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let records = JsonFileRecordProvider::parse(
            r#"[
                {"name": "A", "profile_url": "u1", "teaching": "DBMS"},
                {"name": null, "profile_url": "u2", "unexpected": "ignored"}
            ]"#,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].teaching.as_deref(), Some("DBMS"));
        assert_eq!(records[1].name, None);
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let result = JsonFileRecordProvider::parse(r#"{"name": "A"}"#);
        assert!(matches!(result, Err(ProviderError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = JsonFileRecordProvider::new(dir.path().join("nope.json"));

        let result = provider.fetch_records().await;
        assert!(matches!(result, Err(ProviderError::IoError(_))));
        assert!(provider.name().contains("nope.json"));
    }

    #[tokio::test]
    async fn test_count_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faculty_data.json");
        std::fs::write(&path, r#"[{"name": "A"}, {"name": "B"}, {}]"#).unwrap();

        let provider = JsonFileRecordProvider::new(&path);
        assert_eq!(provider.count_records().await.unwrap(), 3);
        assert_eq!(provider.path(), path.as_path());
    }
}
