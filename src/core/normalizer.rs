//! Turns a rendered page into canonical, order-stable text.
//!
//! Chrome (navigation, headers, footers, cookie banners) is removed first. With
//! [`NormalizationStrategy::ExpandSections`] every collapsible section is then
//! expanded one at a time and flattened into a `header` line followed by a
//! single `body` line, so that text hidden behind accordions takes part in
//! change detection. Normalizing the same page state twice yields the same text.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{NormalizationStrategy, NormalizerConfig};
use crate::error::{DocwatchError, Result};
use super::page::{ElementRef, Locator, PageSession};

/// One expanded collapsible section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: String,
    pub body: String,
}

/// Why a section contributed nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyHeader,
    Unreadable(String),
    ActivationFailed(String),
    HeaderNotInScope,
    EmptyBody,
    NotInteractable,
}

/// Result of trying to capture one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionCapture {
    Captured(Section),
    Skipped(SkipReason),
}

pub struct ContentNormalizer {
    config: NormalizerConfig,
    cookie_triggers: Vec<Locator>,
}

impl ContentNormalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        let cookie_triggers = config.cookie_triggers.iter().map(|t| Locator::parse(t)).collect();

        Self {
            config: config.clone(),
            cookie_triggers,
        }
    }

    /// Normalize the page currently loaded in `page`
    pub async fn normalize(&self, page: &mut dyn PageSession) -> Result<String> {
        self.strip_chrome(page).await;

        if self.config.strategy == NormalizationStrategy::ChromeOnly {
            return self.base_content(page).await;
        }

        self.dismiss_cookie_overlay(page).await;
        let base = self.base_content(page).await?;

        let mut sections = self.expand_sections(page).await;
        if sections.is_empty() {
            sections = self.sweep_fallback(page).await;
        }

        if sections.is_empty() {
            return Ok(base);
        }

        Ok(self.assemble(&base, &sections))
    }

    async fn strip_chrome(&self, page: &mut dyn PageSession) {
        for selector in &self.config.chrome_selectors {
            match page.remove_all(selector).await {
                Ok(0) => {}
                Ok(count) => debug!("Removed {} '{}' elements", count, selector),
                Err(e) => warn!("Failed to remove '{}': {}", selector, e),
            }
        }
    }

    /// Click the first dismiss trigger present; absence of all of them is fine.
    async fn dismiss_cookie_overlay(&self, page: &mut dyn PageSession) {
        for trigger in &self.cookie_triggers {
            let Ok(found) = page.find_all(trigger).await else {
                continue;
            };
            let Some(&button) = found.first() else {
                continue;
            };

            match page.click(button).await {
                Ok(()) => {
                    debug!("Dismissed cookie overlay via {}", trigger);
                    page.wait(Duration::from_millis(self.config.cookie_settle_ms)).await;
                    return;
                }
                Err(e) => debug!("Cookie trigger {} not clickable: {}", trigger, e),
            }
        }
    }

    /// Text of the content region, else of the whole document
    async fn base_content(&self, page: &mut dyn PageSession) -> Result<String> {
        if let Some(text) = page.region_text(&self.config.content_selector).await? {
            return Ok(text);
        }

        page.region_text(&self.config.document_selector)
            .await?
            .ok_or_else(|| DocwatchError::Extraction("page has no readable content region".to_string()))
    }

    /// Expand each section header in document order, reading text scoped to its container
    async fn expand_sections(&self, page: &mut dyn PageSession) -> Vec<Section> {
        let locator = Locator::Css(self.config.section_header_selector.clone());
        let headers = match page.find_all(&locator).await {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Section discovery failed: {}", e);
                return vec![];
            }
        };

        let mut sections = Vec::new();
        for (index, header) in headers.into_iter().enumerate() {
            match self.capture_section(page, header).await {
                SectionCapture::Captured(section) => sections.push(section),
                SectionCapture::Skipped(reason) => debug!("Skipped section #{}: {:?}", index, reason),
            }
        }

        sections
    }

    async fn capture_section(&self, page: &mut dyn PageSession, header: ElementRef) -> SectionCapture {
        let label = match page.inner_text(header).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => return SectionCapture::Skipped(SkipReason::Unreadable(e.to_string())),
        };
        if label.is_empty() {
            return SectionCapture::Skipped(SkipReason::EmptyHeader);
        }

        if let Err(e) = page.click(header).await {
            return SectionCapture::Skipped(SkipReason::ActivationFailed(e.to_string()));
        }
        page.wait(Duration::from_millis(self.config.section_settle_ms)).await;

        let scoped = match page.container_text(header).await {
            Ok(text) => text,
            Err(e) => return SectionCapture::Skipped(SkipReason::Unreadable(e.to_string())),
        };

        match section_body(&scoped, &label) {
            Some(body) if !body.is_empty() => SectionCapture::Captured(Section { header: label, body }),
            Some(_) => SectionCapture::Skipped(SkipReason::EmptyBody),
            None => SectionCapture::Skipped(SkipReason::HeaderNotInScope),
        }
    }

    /// Bounded sweep over generic disclosure markers, capturing page-text deltas
    async fn sweep_fallback(&self, page: &mut dyn PageSession) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut expanded = 0usize;

        for selector in &self.config.fallback_selectors {
            if expanded >= self.config.max_fallback_expansions {
                break;
            }

            let elements = match page.find_all(&Locator::Css(selector.clone())).await {
                Ok(elements) => elements,
                Err(e) => {
                    debug!("Fallback selector '{}' failed: {}", selector, e);
                    continue;
                }
            };

            for element in elements.into_iter().take(self.config.max_per_selector) {
                if expanded >= self.config.max_fallback_expansions {
                    break;
                }

                match self.capture_disclosure(page, element).await {
                    Ok(capture) => {
                        if activated(&capture) {
                            expanded += 1;
                        }
                        match capture {
                            SectionCapture::Captured(section) => sections.push(section),
                            SectionCapture::Skipped(reason) => {
                                debug!("Skipped disclosure '{}': {:?}", selector, reason)
                            }
                        }
                    }
                    Err(e) => debug!("Disclosure '{}' failed: {}", selector, e),
                }
            }
        }

        sections
    }

    /// Failures before the click surface as `Err`; later ones as a skip.
    async fn capture_disclosure(&self, page: &mut dyn PageSession, element: ElementRef) -> Result<SectionCapture> {
        if !page.is_interactable(element).await? {
            return Ok(SectionCapture::Skipped(SkipReason::NotInteractable));
        }

        let label = page.inner_text(element).await?.trim().to_string();
        let before = self.base_content(page).await?;

        if let Err(e) = page.click(element).await {
            return Ok(SectionCapture::Skipped(SkipReason::ActivationFailed(e.to_string())));
        }
        page.wait(Duration::from_millis(self.config.fallback_settle_ms)).await;

        let after = match self.base_content(page).await {
            Ok(text) => text,
            Err(e) => return Ok(SectionCapture::Skipped(SkipReason::Unreadable(e.to_string()))),
        };

        if label.is_empty() {
            return Ok(SectionCapture::Skipped(SkipReason::EmptyHeader));
        }

        Ok(SectionCapture::Captured(Section {
            header: label,
            body: text_delta(&before, &after),
        }))
    }

    /// Breadcrumb lines, a blank separator, then each distinct section as `header` + `body`
    pub fn assemble(&self, base: &str, sections: &[Section]) -> String {
        let headers: HashSet<&str> = sections.iter().map(|s| s.header.as_str()).collect();

        let breadcrumbs: Vec<&str> = non_empty_lines(base)
            .filter(|line| self.is_breadcrumb(line, &headers))
            .collect();

        let mut out: Vec<&str> = breadcrumbs;
        if !out.is_empty() {
            out.push("");
        }

        let mut seen = HashSet::new();
        for section in sections {
            if !seen.insert(section.header.as_str()) {
                continue;
            }
            out.push(&section.header);
            if !section.body.trim().is_empty() {
                out.push(&section.body);
            }
        }

        out.join("\n")
    }

    fn is_breadcrumb(&self, line: &str, headers: &HashSet<&str>) -> bool {
        !line.ends_with('?')
            && !headers.contains(line)
            && line.chars().count() < self.config.breadcrumb_max_len
            && self.config.breadcrumb_keywords.iter().any(|k| line.contains(k.as_str()))
    }
}

/// Whether the element was actually clicked, which counts toward the sweep cap
fn activated(capture: &SectionCapture) -> bool {
    !matches!(
        capture,
        SectionCapture::Skipped(SkipReason::NotInteractable) | SectionCapture::Skipped(SkipReason::ActivationFailed(_))
    )
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(str::trim).filter(|line| !line.is_empty())
}

/// Body of the section labelled `label` within its container's text.
///
/// `None` when the label line is not found; otherwise every following non-empty
/// line joined with single spaces.
pub fn section_body(scoped: &str, label: &str) -> Option<String> {
    let lines: Vec<&str> = non_empty_lines(scoped).collect();
    let start = lines.iter().position(|line| *line == label)?;

    Some(lines[start + 1..].join(" ").trim().to_string())
}

/// Non-empty lines of `after` not present in `before`, in order
pub fn text_delta(before: &str, after: &str) -> String {
    let seen: HashSet<&str> = non_empty_lines(before).collect();

    non_empty_lines(after)
        .filter(|line| !seen.contains(line))
        .collect::<Vec<_>>()
        .join("\n")
}
