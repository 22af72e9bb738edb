use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::{DocwatchError, Result};
use super::differ::{ChangeStatus, ContentDiff};
use super::monitor::RunOutcome;
use super::snapshot::write_json_atomically;

/// Lines shown from each of the added/removed lists
const PREVIEW_LINES: usize = 5;

/// What happened to the change batch file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeBatchWrite {
    /// Records written
    Written(usize),
    /// Non-first run without changes: an explicit empty array
    Emptied,
    /// First run: a leftover file was deleted
    RemovedStale,
    /// First run with nothing to remove
    Skipped,
}

pub struct ReportBuilder {
    changes_file: PathBuf,
}

impl ReportBuilder {
    pub fn new(changes_file: impl Into<PathBuf>) -> Self {
        Self {
            changes_file: changes_file.into(),
        }
    }

    /// Persist the change batch; first runs never leave a batch behind
    pub fn write_change_batch(&self, outcome: &RunOutcome) -> Result<ChangeBatchWrite> {
        let path = &self.changes_file;

        if outcome.first_run {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| DocwatchError::persistence(path, e))?;
                info!("Removed stale change batch {}", path.display());
                return Ok(ChangeBatchWrite::RemovedStale);
            }
            return Ok(ChangeBatchWrite::Skipped);
        }

        write_json_atomically(path, &outcome.change_batch)?;

        if outcome.change_batch.is_empty() {
            info!("No changes; cleared {}", path.display());
            Ok(ChangeBatchWrite::Emptied)
        } else {
            info!("Wrote {} changed records to {}", outcome.change_batch.len(), path.display());
            Ok(ChangeBatchWrite::Written(outcome.change_batch.len()))
        }
    }

    /// Human-readable report, one entry per URL in processing order
    pub fn render(&self, diffs: &[ContentDiff], elapsed: Duration) -> String {
        let mut out = String::new();

        out.push_str("==== Scrape Report ====\n");
        for diff in diffs {
            let _ = writeln!(out, "- {}: {}", diff.url, diff.status);
            match diff.status {
                ChangeStatus::Changed => {
                    let _ = writeln!(out, "  {}", diff.details);
                    if !diff.added_lines.is_empty() {
                        let _ = writeln!(out, "  Added lines: {:?}", preview(&diff.added_lines));
                    }
                    if !diff.removed_lines.is_empty() {
                        let _ = writeln!(out, "  Removed lines: {:?}", preview(&diff.removed_lines));
                    }
                }
                ChangeStatus::New | ChangeStatus::Error => {
                    let _ = writeln!(out, "  {}", diff.details);
                }
                ChangeStatus::Unchanged => {}
            }
        }
        out.push_str("=======================\n");
        let _ = writeln!(out, "Scrape completed in {:.2} seconds.", elapsed.as_secs_f64());

        out
    }
}

fn preview(lines: &[String]) -> &[String] {
    &lines[..lines.len().min(PREVIEW_LINES)]
}
