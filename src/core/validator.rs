use std::collections::HashSet;

use reqwest::Url;

use crate::config::Config;
use crate::error::{DocwatchError, Result};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn collected errors into a single configuration error
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(DocwatchError::Configuration(self.errors.join("; ")))
        }
    }
}

/// Checks run configuration before any browser work starts
pub struct ConfigValidator<'a> {
    config: &'a Config,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let monitor = &self.config.monitor;

        if monitor.urls.is_empty() {
            result.errors.push("monitor.urls is empty".to_string());
        }

        let mut seen = HashSet::new();
        for url in &monitor.urls {
            if let Err(e) = validate_target_url(url) {
                result.errors.push(e.to_string());
            }
            if !seen.insert(url.as_str()) {
                result.errors.push(format!("duplicate URL {}", url));
            }
        }

        if monitor.snapshot_file == monitor.changes_file {
            result
                .errors
                .push("monitor.snapshot_file and monitor.changes_file must differ".to_string());
        }

        if !monitor.urls.is_empty() && self.config.mock.url_index >= monitor.urls.len() {
            result.errors.push(format!(
                "mock.url_index {} is out of range for {} URLs",
                self.config.mock.url_index,
                monitor.urls.len()
            ));
        }

        let normalizer = &self.config.normalizer;
        if normalizer.content_selector.trim().is_empty() {
            result.errors.push("normalizer.content_selector is empty".to_string());
        }
        if normalizer.max_per_selector > normalizer.max_fallback_expansions {
            result.warnings.push(format!(
                "normalizer.max_per_selector ({}) exceeds max_fallback_expansions ({})",
                normalizer.max_per_selector, normalizer.max_fallback_expansions
            ));
        }

        result
    }
}

/// A monitored URL must be absolute http(s)
pub fn validate_target_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| DocwatchError::Configuration(format!("invalid URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(DocwatchError::Configuration(format!(
            "invalid URL '{}': only http(s) URLs with a host can be monitored",
            raw
        ))),
    }
}
