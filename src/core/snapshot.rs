use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::KeyScheme;
use crate::error::{DocwatchError, Result};
use super::hasher;

/// Persisted state of one monitored URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Key under which this record is stored; older files omit it
    #[serde(default)]
    pub identity_key: String,

    /// Older files keyed by URL omit it
    #[serde(default)]
    pub url: String,

    /// Unix epoch when the file did not record one
    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub outcome: PageOutcome,
}

/// Exactly one of captured content or a failure message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageOutcome {
    Captured(CapturedPage),
    Failed(FailedPage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPage {
    pub content: String,
    pub hash: String,
    #[serde(default)]
    pub content_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPage {
    #[serde(alias = "error")]
    pub error_message: String,
}

impl PageRecord {
    pub fn captured(identity_key: String, url: &str, content: String, timestamp: DateTime<Utc>) -> Self {
        let hash = hasher::content_hash(&content);
        let content_length = content.chars().count();

        Self {
            identity_key,
            url: url.to_string(),
            timestamp,
            outcome: PageOutcome::Captured(CapturedPage {
                content,
                hash,
                content_length,
            }),
        }
    }

    pub fn failed(identity_key: String, url: &str, error_message: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity_key,
            url: url.to_string(),
            timestamp,
            outcome: PageOutcome::Failed(FailedPage { error_message }),
        }
    }

    pub fn captured_page(&self) -> Option<&CapturedPage> {
        match &self.outcome {
            PageOutcome::Captured(page) => Some(page),
            PageOutcome::Failed(_) => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.captured_page().map(|page| page.content.as_str())
    }

    /// Content hash; `None` for error records
    pub fn content_hash(&self) -> Option<&str> {
        self.captured_page().map(|page| page.hash.as_str())
    }

    /// Fill fields older snapshot files left out, given the key the record was stored under
    fn fill_missing(&mut self, key: &str) {
        if self.identity_key.is_empty() {
            self.identity_key = key.to_string();
        }
        if self.url.is_empty() {
            self.url = key.to_string();
        }
        if let PageOutcome::Captured(page) = &mut self.outcome {
            if page.content_length == 0 {
                page.content_length = page.content.chars().count();
            }
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Failed(failed) => Some(&failed.error_message),
            PageOutcome::Captured(_) => None,
        }
    }
}

impl KeyScheme {
    /// Identity key for `url` under this scheme
    pub fn key_for(&self, url: &str) -> String {
        match self {
            KeyScheme::Url => url.to_string(),
            KeyScheme::UrlHash => hasher::url_hash(url),
        }
    }
}

/// All records of one run, keyed by identity key
pub type SnapshotSet = BTreeMap<String, PageRecord>;

/// Loads and replaces the snapshot file
pub struct SnapshotStore {
    path: PathBuf,
    scheme: KeyScheme,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, scheme: KeyScheme) -> Self {
        Self {
            path: path.into(),
            scheme,
        }
    }

    /// Previous run's records; empty when no snapshot exists (first run)
    pub fn load(&self) -> Result<SnapshotSet> {
        if !self.path.exists() {
            debug!("No snapshot at {}, treating as first run", self.path.display());
            return Ok(SnapshotSet::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| DocwatchError::persistence(&self.path, e))?;
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| DocwatchError::persistence(&self.path, format!("corrupt snapshot: {}", e)))?;

        // A record that can't be read is dropped; its URL comes back as NEW.
        let mut snapshots = SnapshotSet::new();
        for (key, value) in raw {
            match serde_json::from_value::<PageRecord>(value) {
                Ok(mut record) => {
                    record.fill_missing(&key);
                    snapshots.insert(key, record);
                }
                Err(e) => warn!("Dropping unreadable snapshot record '{}': {}", key, e),
            }
        }

        let foreign = snapshots
            .iter()
            .filter(|(key, record)| self.scheme.key_for(&record.url) != **key)
            .count();
        if foreign > 0 {
            warn!(
                "{} snapshot records use a different key scheme; those URLs will be reported as NEW",
                foreign
            );
        }

        info!("Loaded {} snapshot records from {}", snapshots.len(), self.path.display());
        Ok(snapshots)
    }

    /// Replace the persisted snapshot with `snapshots`
    pub fn save(&self, snapshots: &SnapshotSet) -> Result<()> {
        write_json_atomically(&self.path, snapshots)?;
        info!("Saved {} snapshot records to {}", snapshots.len(), self.path.display());
        Ok(())
    }
}

/// Pretty-print `value` to a temporary file next to `path`, then rename it over `path`.
pub(crate) fn write_json_atomically<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| DocwatchError::persistence(path, e))?;

    let json = serde_json::to_string_pretty(value).map_err(|e| DocwatchError::persistence(path, e))?;

    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(|e| DocwatchError::persistence(path, e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| DocwatchError::persistence(path, e))?;
    file.persist(path)
        .map_err(|e| DocwatchError::persistence(path, e.error))?;

    Ok(())
}
