//! In-memory page for exercising the normalizer and the monitor run.
//!
//! A [`FakeDocument`] is a tree of nodes. Each node lists the selectors it
//! answers to verbatim, carries its own visible text, and optionally text that
//! becomes visible once it has been clicked. Rendered text of a node is its
//! own text, then its revealed text, then its children's rendered text.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{DocwatchError, Result};
use super::page::{ElementRef, Locator, PageSession};

pub const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct FakeNode {
    parent: Option<usize>,
    selectors: Vec<String>,
    text: String,
    revealed: String,
    expanded: bool,
    fail_click: bool,
    interactable: bool,
    removed: bool,
}

#[derive(Debug, Clone)]
pub struct FakeDocument {
    nodes: Vec<FakeNode>,
}

impl FakeDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![FakeNode {
                parent: None,
                selectors: vec!["body".to_string()],
                text: String::new(),
                revealed: String::new(),
                expanded: false,
                fail_click: false,
                interactable: true,
                removed: false,
            }],
        }
    }

    /// A document whose only content region holds `text`
    pub fn with_main(text: &str) -> Self {
        let mut doc = Self::new();
        doc.add(ROOT, &["nav"], "Home\nProducts\nHelp");
        doc.add(ROOT, &["main"], text);
        doc
    }

    pub fn add(&mut self, parent: usize, selectors: &[&str], text: &str) -> usize {
        self.nodes.push(FakeNode {
            parent: Some(parent),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text: text.to_string(),
            revealed: String::new(),
            expanded: false,
            fail_click: false,
            interactable: true,
            removed: false,
        });
        self.nodes.len() - 1
    }

    /// A node showing `label` that reveals `hidden` once clicked
    pub fn add_toggle(&mut self, parent: usize, selectors: &[&str], label: &str, hidden: &str) -> usize {
        let id = self.add(parent, selectors, label);
        self.nodes[id].revealed = hidden.to_string();
        id
    }

    pub fn fail_clicks(&mut self, id: usize) {
        self.nodes[id].fail_click = true;
    }

    pub fn set_interactable(&mut self, id: usize, interactable: bool) {
        self.nodes[id].interactable = interactable;
    }

    pub fn set_root_text(&mut self, text: &str) {
        self.nodes[ROOT].text = text.to_string();
    }

    /// Make the document root unreachable by any region selector
    pub fn remove_root_selectors(&mut self) {
        self.nodes[ROOT].selectors.clear();
    }

    pub fn find_first(&self, selector: &str) -> Option<usize> {
        self.document_order()
            .into_iter()
            .find(|id| self.nodes[*id].selectors.iter().any(|s| s == selector))
    }

    fn children(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == Some(id) && !node.removed)
            .map(|(child, _)| child)
    }

    /// Attached node ids in pre-order
    fn document_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            if self.nodes[id].removed {
                continue;
            }
            order.push(id);
            let children: Vec<usize> = self.children(id).collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    fn is_attached(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.nodes.get(node_id) else {
                return false;
            };
            if node.removed {
                return false;
            }
            current = node.parent;
        }
        true
    }

    fn render(&self, id: usize) -> String {
        let node = &self.nodes[id];
        let mut parts: Vec<String> = Vec::new();
        if !node.text.is_empty() {
            parts.push(node.text.clone());
        }
        if node.expanded && !node.revealed.is_empty() {
            parts.push(node.revealed.clone());
        }
        for child in self.children(id) {
            let rendered = self.render(child);
            if !rendered.is_empty() {
                parts.push(rendered);
            }
        }
        parts.join("\n")
    }

    fn matches(&self, id: usize, locator: &Locator) -> bool {
        let node = &self.nodes[id];
        if !node.selectors.iter().any(|s| s == locator.css()) {
            return false;
        }
        match locator.text() {
            Some(text) => node.text.to_lowercase().contains(&text.to_lowercase()),
            None => true,
        }
    }
}

impl Default for FakeDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// A page session over a fixed set of fake documents
#[derive(Debug, Default)]
pub struct FakePage {
    site: HashMap<String, FakeDocument>,
    failing: HashSet<String>,
    current: Option<FakeDocument>,
    navigations: Vec<String>,
    clicks: Vec<usize>,
    waited: Duration,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, document: FakeDocument) -> Self {
        self.site.insert(url.to_string(), document);
        self
    }

    pub fn with_failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Node ids clicked since creation, in order
    pub fn clicks(&self) -> &[usize] {
        &self.clicks
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }

    fn document(&self) -> Result<&FakeDocument> {
        self.current
            .as_ref()
            .ok_or_else(|| DocwatchError::Browser("no page loaded".to_string()))
    }

    fn node(&self, element: ElementRef) -> Result<usize> {
        let document = self.document()?;
        let id = element.0 as usize;
        if document.is_attached(id) {
            Ok(id)
        } else {
            Err(DocwatchError::Browser(format!("stale element {}", id)))
        }
    }
}

#[async_trait]
impl PageSession for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigations.push(url.to_string());
        self.current = None;

        if self.failing.contains(url) {
            return Err(DocwatchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }

        match self.site.get(url) {
            Some(document) => {
                self.current = Some(document.clone());
                Ok(())
            }
            None => Err(DocwatchError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    async fn remove_all(&mut self, selector: &str) -> Result<usize> {
        let document = self
            .current
            .as_mut()
            .ok_or_else(|| DocwatchError::Browser("no page loaded".to_string()))?;
        let locator = Locator::Css(selector.to_string());

        let targets: Vec<usize> = document
            .document_order()
            .into_iter()
            .filter(|id| document.matches(*id, &locator))
            .collect();
        for id in &targets {
            document.nodes[*id].removed = true;
        }
        Ok(targets.len())
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let document = self.document()?;
        Ok(document
            .document_order()
            .into_iter()
            .filter(|id| document.matches(*id, locator))
            .map(|id| ElementRef(id as u64))
            .collect())
    }

    async fn inner_text(&mut self, element: ElementRef) -> Result<String> {
        let id = self.node(element)?;
        Ok(self.document()?.nodes[id].text.clone())
    }

    async fn container_text(&mut self, element: ElementRef) -> Result<String> {
        let id = self.node(element)?;
        let document = self.document()?;
        let parent = document.nodes[id].parent.unwrap_or(ROOT);
        Ok(document.render(parent))
    }

    async fn region_text(&mut self, selector: &str) -> Result<Option<String>> {
        let document = self.document()?;
        Ok(document
            .find_first(selector)
            .map(|id| document.render(id)))
    }

    async fn is_interactable(&mut self, element: ElementRef) -> Result<bool> {
        let id = self.node(element)?;
        Ok(self.document()?.nodes[id].interactable)
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let id = self.node(element)?;
        let document = self
            .current
            .as_mut()
            .ok_or_else(|| DocwatchError::Browser("no page loaded".to_string()))?;

        if document.nodes[id].fail_click {
            return Err(DocwatchError::Browser(format!("element {} is not clickable", id)));
        }
        document.nodes[id].expanded = true;
        self.clicks.push(id);
        Ok(())
    }

    async fn wait(&mut self, duration: Duration) {
        self.waited += duration;
    }
}
