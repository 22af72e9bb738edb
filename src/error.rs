use std::time::Duration;

use thiserror::Error;

/// Main error type for Docwatch operations
#[derive(Error, Debug)]
pub enum DocwatchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Persistence error for {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("DevTools command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocwatchError {
    /// Fatal errors abort the whole run; everything else is confined to one URL.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DocwatchError::Configuration(_)
                | DocwatchError::Persistence { .. }
                | DocwatchError::Io(_)
                | DocwatchError::Serialization(_)
        )
    }

    pub(crate) fn persistence(path: &std::path::Path, reason: impl ToString) -> Self {
        DocwatchError::Persistence {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(DocwatchError::Configuration("bad url".into()).is_fatal());
        assert!(DocwatchError::persistence(std::path::Path::new("a.json"), "corrupt").is_fatal());
        assert!(!DocwatchError::Extraction("no body".into()).is_fatal());
        assert!(!DocwatchError::Navigation {
            url: "https://example.com".into(),
            reason: "net::ERR_NAME_NOT_RESOLVED".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_navigation_message_names_url() {
        let err = DocwatchError::Navigation {
            url: "https://example.com/help".into(),
            reason: "timeout".into(),
        };
        assert_eq!(err.to_string(), "Navigation to https://example.com/help failed: timeout");
    }
}
