use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DocwatchError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Monitored pages and state files
    pub monitor: MonitorConfig,

    /// Content normalization settings
    pub normalizer: NormalizerConfig,

    /// Browser connection settings
    pub browser: BrowserConfig,

    /// Deterministic content override for diff validation
    pub mock: MockConfig,

    /// Single-page scrape output
    pub scrape: ScrapeConfig,
}

/// How a URL is turned into the key of its snapshot record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyScheme {
    /// The URL itself
    Url,
    /// SHA-1 hex digest of the URL
    UrlHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Name of the monitored document set
    pub name: String,

    /// URLs to process, in report order
    pub urls: Vec<String>,

    /// Snapshot file carried between runs
    pub snapshot_file: PathBuf,

    /// Change batch export (NEW/CHANGED records of non-first runs)
    pub changes_file: PathBuf,

    /// Identity key scheme shared by load and save
    pub key_scheme: KeyScheme,
}

/// Which normalization pipeline to run on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationStrategy {
    /// Strip chrome and read the content region
    ChromeOnly,
    /// Strip chrome, dismiss cookie overlays, expand and flatten collapsible sections
    ExpandSections,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub strategy: NormalizationStrategy,

    /// Structural deny-list removed before any text is read
    pub chrome_selectors: Vec<String>,

    /// Primary content region
    pub content_selector: String,

    /// Whole-document fallback region
    pub document_selector: String,

    /// Cookie overlay dismiss triggers, in priority order.
    /// A trailing `:has-text("...")` restricts the match to elements containing that text.
    pub cookie_triggers: Vec<String>,

    /// Headers of collapsible sections
    pub section_header_selector: String,

    /// Generic disclosure markers swept when no section headers are found
    pub fallback_selectors: Vec<String>,

    pub section_settle_ms: u64,
    pub fallback_settle_ms: u64,
    pub cookie_settle_ms: u64,

    /// Cap on activations during the fallback sweep
    pub max_fallback_expansions: usize,

    /// Cap on elements taken from each fallback selector
    pub max_per_selector: usize,

    /// Keywords marking in-page breadcrumb/help lines kept ahead of the sections
    pub breadcrumb_keywords: Vec<String>,

    /// Breadcrumb lines must be shorter than this many characters
    pub breadcrumb_max_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// DevTools HTTP endpoint
    pub endpoint: String,

    /// Chromium binary to launch headless; connect to `endpoint` when unset
    pub executable: Option<PathBuf>,

    pub navigation_timeout_secs: u64,

    pub startup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Environment variable that activates the override when set to "1"
    pub env_var: String,

    /// Index into `monitor.urls` of the overridden URL
    pub url_index: usize,

    /// Content returned for the overridden URL
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Directory for single-page file output
    pub output_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: "agegodoc".to_string(),
            urls: [
                "https://www.agego.com/verification-methods",
                "https://www.agego.com/verification-methods/selfie",
                "https://www.agego.com/verification-methods/credit-card",
                "https://www.agego.com/verification-methods/digital-id",
                "https://www.agego.com/about-us",
                "https://www.agego.com/help-about-agego",
                "https://www.agego.com/help-verification-methods",
                "https://www.agego.com/help-verification-failed",
                "https://www.agego.com/help-privacy-protection",
                "https://www.agego.com/help-general-questions",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            snapshot_file: PathBuf::from("outputs/agegodoc_snapshots.json"),
            changes_file: PathBuf::from("outputs/agegodoc_changed.json"),
            key_scheme: KeyScheme::UrlHash,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            strategy: NormalizationStrategy::ExpandSections,
            chrome_selectors: strings(&[
                "nav",
                "header",
                "footer",
                ".nav-header",
                ".navbar",
                ".site-header",
                ".main-nav",
                ".navigation",
                ".menu",
                ".site-nav",
                "[role=\"navigation\"]",
                ".sidebar",
                ".side-menu",
                ".drawer",
                ".drawer-menu",
                "#onetrust-consent-sdk",
                ".cookie-banner",
                ".cookie-consent",
            ]),
            content_selector: "main".to_string(),
            document_selector: "body".to_string(),
            cookie_triggers: strings(&[
                "button:has-text(\"Reject All\")",
                "button:has-text(\"Accept All\")",
                "button:has-text(\"OK\")",
                "#onetrust-reject-all-handler",
                ".cookie-banner button",
            ]),
            section_header_selector: ".MuiAccordionSummary-root".to_string(),
            fallback_selectors: strings(&[
                "details summary",
                "[aria-expanded=\"false\"]",
                "button[aria-expanded=\"false\"]",
                ".accordion-toggle",
                ".collapsible-header",
            ]),
            section_settle_ms: 800,
            fallback_settle_ms: 500,
            cookie_settle_ms: 1000,
            max_fallback_expansions: 15,
            max_per_selector: 5,
            breadcrumb_keywords: strings(&["Back to", "Questions", "Help"]),
            breadcrumb_max_len: 100,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9222".to_string(),
            executable: None,
            navigation_timeout_secs: 30,
            startup_timeout_secs: 15,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            env_var: "MOCK_CONTENT".to_string(),
            url_index: 0,
            content: "MOCKED CONTENT FOR TESTING CHANGE DETECTION".to_string(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs/scraped_results"),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DocwatchError::Configuration(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DocwatchError::Configuration(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Err(DocwatchError::Configuration(format!(
                        "config file not found: {}",
                        p.as_ref().display()
                    )))
                }
            }
            None => {
                let candidates = ["Docwatch.toml", "docwatch.toml", ".docwatch.toml"];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
