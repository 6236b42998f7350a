//! Search corpus construction.
//!
//! Each stored record maps to exactly one search string composed of its
//! name, research and specialization. Corpus index `i` always corresponds to
//! record index `i`.

use crate::models::{has_content, FacultyRecord};

/// Text used when a record has neither searchable fields nor a profile URL.
const UNKNOWN: &str = "Unknown";

/// Build the search text for one record.
///
/// Components that are absent or hold the "not available" sentinel
/// contribute an empty string. The result is never empty.
pub fn corpus_text(record: &FacultyRecord) -> String {
    let name = searchable(record.name.as_deref());
    let research = searchable(record.research.as_deref());
    let specialization = searchable(record.specialization.as_deref());

    if name.is_empty() && research.is_empty() && specialization.is_empty() {
        return match record.profile_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => UNKNOWN.to_string(),
        };
    }

    format!("{} {} {}", name, research, specialization)
}

/// Build the corpus for an ordered record list.
pub fn build_corpus(records: &[FacultyRecord]) -> Vec<String> {
    records.iter().map(corpus_text).collect()
}

/// Longest context shown before truncation kicks in.
pub const SNIPPET_LIMIT: usize = 160;

/// Shorten search text for display.
///
/// Text longer than [`SNIPPET_LIMIT`] characters keeps its first
/// `SNIPPET_LIMIT - 3` characters followed by `"..."`.
pub fn snippet(text: &str) -> String {
    if text.chars().count() > SNIPPET_LIMIT {
        let head: String = text.chars().take(SNIPPET_LIMIT - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn searchable(value: Option<&str>) -> &str {
    if has_content(value) {
        value.unwrap_or_default()
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    fn record(name: Option<&str>, research: Option<&str>, spec: Option<&str>) -> FacultyRecord {
        FacultyRecord {
            name: name.map(str::to_string),
            research: research.map(str::to_string),
            specialization: spec.map(str::to_string),
            ..FacultyRecord::default()
        }
    }

    #[test]
    fn test_composes_name_research_specialization() {
        let text = corpus_text(&record(
            Some("Arpit Rana"),
            Some("Information Retrieval"),
            Some("Recommender Systems"),
        ));
        assert_eq!(text, "Arpit Rana Information Retrieval Recommender Systems");
    }

    #[test]
    fn test_missing_specialization_keeps_separator() {
        let text = corpus_text(&record(Some("Arpit Rana"), Some("Information Retrieval"), None));
        assert_eq!(text, "Arpit Rana Information Retrieval ");
    }

    #[test]
    fn test_sentinel_does_not_leak() {
        let text = corpus_text(&record(
            Some("Arpit Rana"),
            Some(NOT_AVAILABLE),
            Some(NOT_AVAILABLE),
        ));
        assert_eq!(text, "Arpit Rana  ");
        assert!(!text.contains(NOT_AVAILABLE));
    }

    #[test]
    fn test_fallback_to_profile_url() {
        let mut rec = record(None, Some(NOT_AVAILABLE), None);
        rec.profile_url = Some("https://www.daiict.ac.in/faculty/x".to_string());
        assert_eq!(corpus_text(&rec), "https://www.daiict.ac.in/faculty/x");
    }

    #[test]
    fn test_fallback_to_unknown() {
        assert_eq!(corpus_text(&FacultyRecord::default()), "Unknown");
        assert_eq!(corpus_text(&record(Some("  "), None, None)), "Unknown");
    }

    #[test]
    fn test_corpus_is_parallel_and_never_empty() {
        let records = vec![
            record(Some("A"), None, None),
            FacultyRecord::default(),
            record(None, None, Some("VLSI")),
        ];
        let corpus = build_corpus(&records);

        assert_eq!(corpus.len(), records.len());
        assert!(corpus.iter().all(|text| !text.trim().is_empty()));
        assert_eq!(corpus[0], "A  ");
        assert_eq!(corpus[2], "  VLSI");
    }

    #[test]
    fn test_snippet_truncation() {
        let short = "Arpit Rana Information Retrieval ";
        assert_eq!(snippet(short), short);

        let exact = "x".repeat(SNIPPET_LIMIT);
        assert_eq!(snippet(&exact), exact);

        let long = "é".repeat(SNIPPET_LIMIT + 1);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_LIMIT);
        assert!(cut.ends_with("..."));
        assert!(cut.starts_with(&"é".repeat(SNIPPET_LIMIT - 3)));
    }
}
