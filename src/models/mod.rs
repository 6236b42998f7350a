//! Core data models for the faculty finder.
//!
//! This module contains the records that flow through the system: the raw
//! field mapping produced by the scraper, the canonical record kept in the
//! store, and the hits returned by a search.

use serde::{Deserialize, Serialize};

/// Placeholder stored for long-text fields that were blank or missing.
pub const NOT_AVAILABLE: &str = "Data is not available";

/// A flat field mapping exactly as the scraper emits it.
///
/// Every field is optional: a missing key and a JSON `null` both mean
/// "absent". No cleanup has happened yet; see [`crate::transform`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawFacultyRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub faculty_web: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub teaching: Option<String>,
    #[serde(default)]
    pub publications: Option<String>,
    #[serde(default)]
    pub research: Option<String>,
}

/// One faculty member as persisted in the `faculty` table.
///
/// Records produced by the normalizer always carry text (or the
/// [`NOT_AVAILABLE`] sentinel) in the five long-text fields. Records read
/// back from an older table may still hold `None` there, because columns
/// added by a later migration read as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FacultyRecord {
    /// Store-assigned identifier; `None` until the record has been saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub name: Option<String>,

    /// Natural key; at most one stored row per URL
    pub profile_url: Option<String>,

    pub education: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub faculty_web: Option<String>,
    pub biography: Option<String>,
    pub specialization: Option<String>,
    pub teaching: Option<String>,
    pub publications: Option<String>,
    pub research: Option<String>,
}

impl FacultyRecord {
    /// Display name, falling back to "Unknown Name" for nameless records.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Name")
    }
}

/// Returns `true` if `value` carries real content, i.e. it is neither
/// absent, blank, nor the [`NOT_AVAILABLE`] sentinel.
pub fn has_content(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        Some(text) => !text.is_empty() && text != NOT_AVAILABLE,
        None => false,
    }
}

/// One ranking result: an index into the ranked corpus and its score.
///
/// Scores are cosine similarity scaled to a percentage, so they range from
/// -100 to 100; in practice only positive scores survive the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankedHit {
    /// Position of the record in the corpus (and in the record list)
    pub index: usize,

    /// Similarity score on a 0-100 scale
    pub score: f32,
}

/// A ranked hit resolved to the record it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The matched faculty record
    pub record: FacultyRecord,

    /// Similarity score on a 0-100 scale
    pub score: f32,

    /// The search text the record was ranked by
    pub context: String,
}

/// Ranking parameters for one front-end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SearchSettings {
    /// Maximum number of hits to return
    pub top_k: usize,

    /// Hits scoring at or below this value are dropped
    pub min_score: f32,
}

impl SearchSettings {
    /// Settings used by the web dashboard.
    pub const DASHBOARD: SearchSettings = SearchSettings {
        top_k: 5,
        min_score: 10.0,
    };

    /// Settings used by the interactive terminal tool.
    pub const TERMINAL: SearchSettings = SearchSettings {
        top_k: 3,
        min_score: 35.0,
    };

    pub fn new(top_k: usize, min_score: f32) -> Self {
        Self { top_k, min_score }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::DASHBOARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_accepts_missing_and_null_fields() {
        let raw: RawFacultyRecord = serde_json::from_str(
            r#"{"name": "Arpit Rana", "email": null, "profile_url": "https://x/arpit"}"#,
        )
        .unwrap();

        assert_eq!(raw.name.as_deref(), Some("Arpit Rana"));
        assert_eq!(raw.email, None);
        assert_eq!(raw.research, None);
        assert_eq!(raw.profile_url.as_deref(), Some("https://x/arpit"));
    }

    #[test]
    fn test_has_content() {
        assert!(has_content(Some("Robotics")));
        assert!(!has_content(Some("   ")));
        assert!(!has_content(Some(NOT_AVAILABLE)));
        assert!(!has_content(None));
    }

    #[test]
    fn test_record_serialization_skips_missing_id() {
        let record = FacultyRecord {
            name: Some("A".to_string()),
            ..FacultyRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["name"], "A");
        assert!(json["research"].is_null());
    }

    #[test]
    fn test_search_settings_presets() {
        assert_eq!(SearchSettings::DASHBOARD.top_k, 5);
        assert_eq!(SearchSettings::DASHBOARD.min_score, 10.0);
        assert_eq!(SearchSettings::TERMINAL.top_k, 3);
        assert_eq!(SearchSettings::TERMINAL.min_score, 35.0);
        assert_eq!(SearchSettings::default(), SearchSettings::DASHBOARD);
    }
}
