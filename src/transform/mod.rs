//! Text normalization of raw scraped records.
//!
//! Every textual field is trimmed. Contact fields that end up empty become
//! `None`; the five long-text fields fall back to [`NOT_AVAILABLE`] so the
//! store never holds null or empty text for them. The profile URL is an
//! opaque key and passes through untouched.

use tracing::{error, info};

use crate::models::{FacultyRecord, RawFacultyRecord, NOT_AVAILABLE};
use crate::provider::RecordProvider;

/// Normalize one raw record into its canonical form.
pub fn normalize_record(raw: &RawFacultyRecord) -> FacultyRecord {
    FacultyRecord {
        id: None,
        name: trimmed_or_none(raw.name.as_deref()),
        profile_url: raw.profile_url.clone(),
        education: trimmed_or_none(raw.education.as_deref()),
        email: trimmed_or_none(raw.email.as_deref()),
        phone: trimmed_or_none(raw.phone.as_deref()),
        address: trimmed_or_none(raw.address.as_deref()),
        faculty_web: trimmed_or_none(raw.faculty_web.as_deref()),
        biography: Some(trimmed_or_sentinel(raw.biography.as_deref())),
        specialization: Some(trimmed_or_sentinel(raw.specialization.as_deref())),
        teaching: Some(trimmed_or_sentinel(raw.teaching.as_deref())),
        publications: Some(trimmed_or_sentinel(raw.publications.as_deref())),
        research: Some(trimmed_or_sentinel(raw.research.as_deref())),
    }
}

/// Normalize a batch of raw records, preserving order.
pub fn normalize_all(raw: &[RawFacultyRecord]) -> Vec<FacultyRecord> {
    raw.iter().map(normalize_record).collect()
}

/// Fetch raw records from `provider` and normalize them.
///
/// An unreadable source is not fatal: the diagnostic is logged and an empty
/// list is returned, so callers must check for emptiness before storing.
pub async fn transform_from<P>(provider: &P) -> Vec<FacultyRecord>
where
    P: RecordProvider + ?Sized,
{
    match provider.fetch_records().await {
        Ok(raw) => {
            info!("Normalizing {} records from {}", raw.len(), provider.name());
            normalize_all(&raw)
        }
        Err(e) => {
            error!("Cannot read records from {}: {}", provider.name(), e);
            Vec::new()
        }
    }
}

fn trimmed_or_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn trimmed_or_sentinel(value: Option<&str>) -> String {
    trimmed_or_none(value).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
