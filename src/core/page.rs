//! The page interaction surface the normalizer drives.
//!
//! Everything that touches a rendered page goes through [`PageSession`], so the
//! normalizer and the monitor run can be exercised against an in-memory page in
//! tests and against a DevTools-driven browser in production.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::Result;

/// Opaque handle to an element found on the current page.
///
/// Handles are only valid until the next navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// How to find elements on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Plain CSS selector
    Css(String),
    /// CSS selector restricted to elements whose text contains `text` (case-insensitive)
    CssWithText { css: String, text: String },
}

impl Locator {
    /// Parse `css` or `css:has-text("text")`.
    pub fn parse(raw: &str) -> Self {
        match has_text_pattern().captures(raw.trim()) {
            Some(caps) => Locator::CssWithText {
                css: caps[1].trim().to_string(),
                text: caps[2].to_string(),
            },
            None => Locator::Css(raw.trim().to_string()),
        }
    }

    pub fn css(&self) -> &str {
        match self {
            Locator::Css(css) => css,
            Locator::CssWithText { css, .. } => css,
        }
    }

    /// Text filter, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Locator::Css(_) => None,
            Locator::CssWithText { text, .. } => Some(text),
        }
    }
}

fn has_text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^(.*?):has-text\("(.*)"\)$"#).expect("Invalid has-text regex"))
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "{}", css),
            Locator::CssWithText { css, text } => write!(f, "{}:has-text(\"{}\")", css, text),
        }
    }
}

/// A single page, used strictly sequentially.
#[async_trait]
pub trait PageSession: Send {
    /// Load `url`, discarding all previous DOM state and element handles
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Detach every element matching `selector`; returns how many were removed
    async fn remove_all(&mut self, selector: &str) -> Result<usize>;

    /// All elements matching `locator`, in document order
    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>>;

    /// Rendered text of the element itself
    async fn inner_text(&mut self, element: ElementRef) -> Result<String>;

    /// Rendered text of the element's immediate container
    async fn container_text(&mut self, element: ElementRef) -> Result<String>;

    /// Rendered text of the first element matching `selector`, or `None` when absent
    async fn region_text(&mut self, selector: &str) -> Result<Option<String>>;

    /// Whether the element is visible and enabled
    async fn is_interactable(&mut self, element: ElementRef) -> Result<bool>;

    async fn click(&mut self, element: ElementRef) -> Result<()>;

    async fn wait(&mut self, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_selector() {
        let locator = Locator::parse("#onetrust-reject-all-handler");
        assert_eq!(locator, Locator::Css("#onetrust-reject-all-handler".to_string()));
        assert_eq!(locator.text(), None);
    }

    #[test]
    fn test_parse_has_text_selector() {
        let locator = Locator::parse("button:has-text(\"Reject All\")");
        assert_eq!(locator.css(), "button");
        assert_eq!(locator.text(), Some("Reject All"));
        assert_eq!(locator.to_string(), "button:has-text(\"Reject All\")");
    }

    #[test]
    fn test_has_text_pattern_is_compiled_once() {
        let first = has_text_pattern();
        Locator::parse("a:has-text(\"x\")");
        assert!(std::ptr::eq(first, has_text_pattern()));
    }

    #[test]
    fn test_parse_descendant_selector_is_plain() {
        let locator = Locator::parse(".cookie-banner button");
        assert_eq!(locator.css(), ".cookie-banner button");
        assert!(locator.text().is_none());
    }
}
