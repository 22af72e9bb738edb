use std::collections::HashSet;

use serde::Serialize;

use super::snapshot::PageRecord;

/// Classification of one URL in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    New,
    Changed,
    Unchanged,
    Error,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeStatus::New => "NEW",
            ChangeStatus::Changed => "CHANGED",
            ChangeStatus::Unchanged => "UNCHANGED",
            ChangeStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDiff {
    pub url: String,
    pub status: ChangeStatus,
    pub added_lines: Vec<String>,
    pub removed_lines: Vec<String>,
    pub details: String,
}

impl ContentDiff {
    pub fn has_changes(&self) -> bool {
        matches!(self.status, ChangeStatus::New | ChangeStatus::Changed)
    }
}

/// Compares a URL's current record against the previous run's record
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDiffer;

impl ContentDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `current` against `previous`.
    ///
    /// A previous error record carries no hash and counts as absent.
    pub fn diff(&self, previous: Option<&PageRecord>, current: &PageRecord) -> ContentDiff {
        let url = current.url.clone();

        if let Some(error) = current.error_message() {
            return ContentDiff {
                url,
                status: ChangeStatus::Error,
                added_lines: vec![],
                removed_lines: vec![],
                details: format!("Extraction failed: {}", error),
            };
        }

        let previous = previous.filter(|record| record.content_hash().is_some());

        let (Some(previous), Some(current_hash)) = (previous, current.content_hash()) else {
            return ContentDiff {
                url,
                status: ChangeStatus::New,
                added_lines: vec![],
                removed_lines: vec![],
                details: "First time scraped.".to_string(),
            };
        };

        if previous.content_hash() == Some(current_hash) {
            return ContentDiff {
                url,
                status: ChangeStatus::Unchanged,
                added_lines: vec![],
                removed_lines: vec![],
                details: String::new(),
            };
        }

        let (added_lines, removed_lines) =
            self.line_delta(previous.content().unwrap_or_default(), current.content().unwrap_or_default());
        let details = format!(
            "Content changed. Added: {} lines. Removed: {} lines.",
            added_lines.len(),
            removed_lines.len()
        );

        ContentDiff {
            url,
            status: ChangeStatus::Changed,
            added_lines,
            removed_lines,
            details,
        }
    }

    /// Lines of `new` absent anywhere in `old`, and lines of `old` absent anywhere in `new`.
    ///
    /// Order-insensitive: reordering alone yields two empty lists.
    pub fn line_delta(&self, old: &str, new: &str) -> (Vec<String>, Vec<String>) {
        let old_lines: Vec<&str> = old.split('\n').collect();
        let new_lines: Vec<&str> = new.split('\n').collect();
        let old_set: HashSet<&str> = old_lines.iter().copied().collect();
        let new_set: HashSet<&str> = new_lines.iter().copied().collect();

        let added = new_lines
            .iter()
            .filter(|line| !old_set.contains(*line))
            .map(|line| line.to_string())
            .collect();
        let removed = old_lines
            .iter()
            .filter(|line| !new_set.contains(*line))
            .map(|line| line.to_string())
            .collect();

        (added, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn captured(content: &str) -> PageRecord {
        PageRecord::captured("key".into(), "https://example.com", content.to_string(), Utc::now())
    }

    fn failed() -> PageRecord {
        PageRecord::failed("key".into(), "https://example.com", "net::ERR_FAILED".into(), Utc::now())
    }

    #[test]
    fn test_absent_previous_is_new() {
        let diff = ContentDiffer::new().diff(None, &captured("A"));
        assert_eq!(diff.status, ChangeStatus::New);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_changed_reports_line_sets() {
        let diff = ContentDiffer::new().diff(Some(&captured("A\nB\nC")), &captured("A\nC\nD"));
        assert_eq!(diff.status, ChangeStatus::Changed);
        assert_eq!(diff.added_lines, vec!["D"]);
        assert_eq!(diff.removed_lines, vec!["B"]);
        assert_eq!(diff.details, "Content changed. Added: 1 lines. Removed: 1 lines.");
    }

    #[test]
    fn test_equal_hash_is_unchanged() {
        let diff = ContentDiffer::new().diff(Some(&captured("A\nB")), &captured("A\nB"));
        assert_eq!(diff.status, ChangeStatus::Unchanged);
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_reordering_is_changed_without_line_delta() {
        let diff = ContentDiffer::new().diff(Some(&captured("A\nB")), &captured("B\nA"));
        assert_eq!(diff.status, ChangeStatus::Changed);
        assert!(diff.added_lines.is_empty());
        assert!(diff.removed_lines.is_empty());
    }

    #[test]
    fn test_current_failure_is_error() {
        let diff = ContentDiffer::new().diff(Some(&captured("A")), &failed());
        assert_eq!(diff.status, ChangeStatus::Error);
        assert!(diff.details.contains("net::ERR_FAILED"));
    }

    #[test]
    fn test_previous_failure_counts_as_absent() {
        let diff = ContentDiffer::new().diff(Some(&failed()), &captured("A"));
        assert_eq!(diff.status, ChangeStatus::New);
    }

    #[test]
    fn test_duplicate_added_lines_are_kept() {
        let (added, removed) = ContentDiffer::new().line_delta("A", "A\nX\nX");
        assert_eq!(added, vec!["X", "X"]);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ChangeStatus::Unchanged.to_string(), "UNCHANGED");
        assert_eq!(serde_json::to_value(ChangeStatus::New).unwrap(), "NEW");
    }
}
