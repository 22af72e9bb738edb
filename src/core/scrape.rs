use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use regex::Regex;
use reqwest::Url;

use crate::config::KeyScheme;
use crate::error::{DocwatchError, Result};
use super::snapshot::{write_json_atomically, PageRecord};

/// Where a one-off scrape result goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeOutput {
    File,
    Console,
}

/// Writes single-page results in the same record shape the monitor persists
pub struct ScrapeWriter {
    output_dir: PathBuf,
    scheme: KeyScheme,
    unsafe_chars: Regex,
}

impl ScrapeWriter {
    pub fn new(output_dir: impl Into<PathBuf>, scheme: KeyScheme) -> Self {
        Self {
            output_dir: output_dir.into(),
            scheme,
            unsafe_chars: Regex::new(r"[^A-Za-z0-9_\-.]").expect("valid filename regex"),
        }
    }

    /// `<host><path>.json` with unsafe characters replaced; failures get an `error_` prefix
    pub fn file_name(&self, url: &Url, failed: bool) -> String {
        let stem = format!(
            "{}{}{}",
            if failed { "error_" } else { "" },
            url.host_str().unwrap_or_default(),
            url.path()
        );
        format!("{}.json", self.unsafe_chars.replace_all(&stem, "_"))
    }

    /// Record for `url`: trimmed content, or the failure message
    pub fn record(&self, url: &str, captured: Result<String>) -> PageRecord {
        let key = self.scheme.key_for(url);
        match captured {
            Ok(content) => PageRecord::captured(key, url, content.trim().to_string(), Utc::now()),
            Err(e) => PageRecord::failed(key, url, e.to_string(), Utc::now()),
        }
    }

    pub fn write_file(&self, url: &Url, record: &PageRecord) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(self.file_name(url, record.error_message().is_some()));
        write_json_atomically(&path, record)?;
        Ok(path)
    }

    /// JSON for stdout: the bare record, or `{key: record}` for hashed keys
    pub fn console_json(&self, record: &PageRecord) -> Result<String> {
        let json = match self.scheme {
            KeyScheme::Url => serde_json::to_string_pretty(record)?,
            KeyScheme::UrlHash => {
                let wrapped: BTreeMap<&str, &PageRecord> =
                    BTreeMap::from([(record.identity_key.as_str(), record)]);
                serde_json::to_string_pretty(&wrapped)?
            }
        };
        Ok(json)
    }

    /// Print `record` as JSON; failures go to `err`, everything else to `out`
    pub fn emit_console<'a>(&self, record: &PageRecord, out: &'a mut dyn Write, err: &'a mut dyn Write) -> Result<()> {
        let json = self.console_json(record)?;
        let stream = if record.error_message().is_some() { err } else { out };
        writeln!(stream, "{}", json).map_err(DocwatchError::from)
    }
}
