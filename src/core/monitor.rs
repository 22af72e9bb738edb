use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, KeyScheme, MockConfig};
use crate::error::Result;
use super::differ::{ChangeStatus, ContentDiff, ContentDiffer};
use super::normalizer::ContentNormalizer;
use super::page::PageSession;
use super::snapshot::{PageRecord, SnapshotSet};

/// Fixed content substituted for one URL, bypassing the page entirely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOverride {
    pub url: String,
    pub content: String,
}

impl MockOverride {
    /// Resolve the override from the process environment
    pub fn from_env(mock: &MockConfig, urls: &[String]) -> Option<Self> {
        let active = std::env::var(&mock.env_var).map(|v| v == "1").unwrap_or(false);
        Self::resolve(active, mock, urls)
    }

    pub fn resolve(active: bool, mock: &MockConfig, urls: &[String]) -> Option<Self> {
        if !active {
            return None;
        }

        urls.get(mock.url_index).map(|url| Self {
            url: url.clone(),
            content: mock.content.clone(),
        })
    }
}

/// Everything a run produced, before persistence
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// True when the previous snapshot set was empty
    pub first_run: bool,

    /// Replacement snapshot set, one record per configured URL
    pub snapshots: SnapshotSet,

    /// Per-URL results in processing order
    pub diffs: Vec<ContentDiff>,

    /// NEW/CHANGED records; always empty on a first run
    pub change_batch: Vec<PageRecord>,
}

impl RunOutcome {
    pub fn count(&self, status: ChangeStatus) -> usize {
        self.diffs.iter().filter(|d| d.status == status).count()
    }
}

/// Processes the configured URLs one after another on a single page
pub struct Monitor {
    urls: Vec<String>,
    scheme: KeyScheme,
    normalizer: ContentNormalizer,
    differ: ContentDiffer,
    mock: Option<MockOverride>,
}

impl Monitor {
    pub fn new(config: &Config, mock: Option<MockOverride>) -> Self {
        Self {
            urls: config.monitor.urls.clone(),
            scheme: config.monitor.key_scheme,
            normalizer: ContentNormalizer::new(&config.normalizer),
            differ: ContentDiffer::new(),
            mock,
        }
    }

    /// Run every URL against `previous`. Per-URL failures become ERROR records;
    /// fatal errors abort the run.
    pub async fn run(&self, page: &mut dyn PageSession, previous: &SnapshotSet) -> Result<RunOutcome> {
        let first_run = previous.is_empty();
        let mut snapshots = SnapshotSet::new();
        let mut diffs = Vec::with_capacity(self.urls.len());
        let mut change_batch = Vec::new();

        if first_run {
            info!("No previous snapshots: establishing baseline");
        }

        for url in &self.urls {
            let started = Instant::now();
            let key = self.scheme.key_for(url);

            let record = match self.capture(page, url).await {
                Ok(content) => {
                    info!(url = %url, "Captured {} chars in {}ms", content.chars().count(), started.elapsed().as_millis());
                    PageRecord::captured(key.clone(), url, content, Utc::now())
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(url = %url, "Failed in {}ms: {}", started.elapsed().as_millis(), e);
                    PageRecord::failed(key.clone(), url, e.to_string(), Utc::now())
                }
            };

            let diff = self.differ.diff(previous.get(&key), &record);
            if diff.has_changes() && !first_run {
                change_batch.push(record.clone());
            }

            diffs.push(diff);
            snapshots.insert(key, record);
        }

        Ok(RunOutcome {
            first_run,
            snapshots,
            diffs,
            change_batch,
        })
    }

    /// Normalized content of one URL
    pub async fn capture(&self, page: &mut dyn PageSession, url: &str) -> Result<String> {
        if let Some(mock) = self.mock.as_ref().filter(|m| m.url == url) {
            info!(url = %url, "Using mock content");
            return Ok(mock.content.clone());
        }

        page.navigate(url).await?;
        self.normalizer.normalize(page).await
    }
}
