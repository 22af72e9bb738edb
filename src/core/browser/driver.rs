//! [`PageSession`] over a DevTools page target.
//!
//! DOM access goes through `Runtime.evaluate`. Elements handed out by
//! `find_all` are kept in an in-page registry (`window.__docwatch`) and
//! addressed by index; a navigation replaces the window and so the registry.
//! Clicks are real mouse events dispatched at the element's centre.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{DocwatchError, Result};
use crate::core::page::{ElementRef, Locator, PageSession};
use super::cdp::CdpClient;

const REGISTRY: &str = "window.__docwatch";

pub struct CdpPage {
    client: CdpClient,
    navigation_timeout: Duration,
}

impl CdpPage {
    pub async fn attach(ws_url: &str, navigation_timeout: Duration) -> Result<Self> {
        let client = CdpClient::connect(ws_url).await?;
        client.send("Page.enable", json!({})).await?;
        client.send("Runtime.enable", json!({})).await?;

        Ok(Self {
            client,
            navigation_timeout,
        })
    }

    /// Evaluate `expression` and return its JSON value
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .client
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| exception.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception");
            return Err(DocwatchError::Browser(format!("script failed: {}", message)));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn evaluate_string(&self, expression: &str) -> Result<String> {
        match self.evaluate(expression).await? {
            Value::String(text) => Ok(text),
            other => Err(DocwatchError::Browser(format!("expected text, got {}", other))),
        }
    }

    async fn mouse(&self, kind: &str, x: f64, y: f64) -> Result<()> {
        self.client
            .send(
                "Input.dispatchMouseEvent",
                json!({ "type": kind, "x": x, "y": y, "button": "left", "clickCount": 1 }),
            )
            .await?;
        Ok(())
    }
}

/// JS expression for a registered element; throws if the handle is stale
fn element_expr(element: ElementRef) -> String {
    format!(
        "(() => {{ const el = ({REGISTRY} || [])[{id}]; \
         if (!el || !el.isConnected) throw new Error('stale element {id}'); return el; }})()",
        id = element.0
    )
}

fn find_all_script(locator: &Locator) -> String {
    let css = json!(locator.css());
    let text = json!(locator.text().map(str::to_lowercase));
    format!(
        "(() => {{ const reg = ({REGISTRY} = {REGISTRY} || []); const text = {text}; \
         return Array.from(document.querySelectorAll({css})) \
           .filter(el => text === null || (el.innerText || '').toLowerCase().includes(text)) \
           .map(el => {{ reg.push(el); return reg.length - 1; }}); }})()"
    )
}

#[async_trait]
impl PageSession for CdpPage {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client.drain_events();

        let result = self
            .client
            .send("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| DocwatchError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            return Err(DocwatchError::Navigation {
                url: url.to_string(),
                reason: error_text.to_string(),
            });
        }

        self.client
            .wait_for_event("Page.domContentEventFired", self.navigation_timeout)
            .await
            .map_err(|e| DocwatchError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn remove_all(&mut self, selector: &str) -> Result<usize> {
        let script = format!(
            "(() => {{ const els = document.querySelectorAll({}); els.forEach(el => el.remove()); return els.length; }})()",
            json!(selector)
        );
        Ok(self.evaluate(&script).await?.as_u64().unwrap_or(0) as usize)
    }

    async fn find_all(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let value = self.evaluate(&find_all_script(locator)).await?;

        Ok(value
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_u64).map(ElementRef).collect())
            .unwrap_or_default())
    }

    async fn inner_text(&mut self, element: ElementRef) -> Result<String> {
        self.evaluate_string(&format!("{}.innerText", element_expr(element)))
            .await
    }

    async fn container_text(&mut self, element: ElementRef) -> Result<String> {
        let script = format!(
            "(() => {{ const el = {}; return (el.parentElement || el).innerText; }})()",
            element_expr(element)
        );
        self.evaluate_string(&script).await
    }

    async fn region_text(&mut self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
            json!(selector)
        );

        match self.evaluate(&script).await? {
            Value::String(text) => Ok(Some(text)),
            _ => Ok(None),
        }
    }

    async fn is_interactable(&mut self, element: ElementRef) -> Result<bool> {
        let script = format!(
            "(() => {{ const el = {}; const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none' && !el.disabled; }})()",
            element_expr(element)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; el.scrollIntoView({{ block: 'center' }}); const r = el.getBoundingClientRect(); \
             return [r.x + r.width / 2, r.y + r.height / 2, r.width, r.height]; }})()",
            element_expr(element)
        );
        let geometry = self.evaluate(&script).await?;
        let (x, y) = click_point(&geometry)?;

        self.mouse("mousePressed", x, y).await?;
        self.mouse("mouseReleased", x, y).await
    }

    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Centre point from `[cx, cy, width, height]`; zero-size elements can't be clicked
fn click_point(geometry: &Value) -> Result<(f64, f64)> {
    let numbers: Vec<f64> = geometry
        .as_array()
        .map(|values| values.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();

    match numbers.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => Ok((*x, *y)),
        [_, _, width, height] => Err(DocwatchError::Browser(format!(
            "element has no clickable area ({}x{})",
            width, height
        ))),
        _ => Err(DocwatchError::Browser(format!("unexpected element geometry: {}", geometry))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_point_uses_centre() {
        assert_eq!(click_point(&json!([150.0, 40.5, 300.0, 81.0])).unwrap(), (150.0, 40.5));
    }

    #[test]
    fn test_click_point_rejects_zero_size() {
        let err = click_point(&json!([0.0, 0.0, 0.0, 20.0])).unwrap_err();
        assert!(err.to_string().contains("no clickable area"));
    }

    #[test]
    fn test_click_point_rejects_garbage() {
        assert!(click_point(&Value::Null).is_err());
    }

    #[test]
    fn test_find_all_script_escapes_selector() {
        let script = find_all_script(&Locator::Css("[aria-expanded=\"false\"]".into()));
        assert!(script.contains(r#"document.querySelectorAll("[aria-expanded=\"false\"]")"#));
        assert!(script.contains("const text = null;"));
    }

    #[test]
    fn test_find_all_script_lowercases_text_filter() {
        let script = find_all_script(&Locator::parse("button:has-text(\"Reject All\")"));
        assert!(script.contains(r#"document.querySelectorAll("button")"#));
        assert!(script.contains(r#"const text = "reject all";"#));
    }

    #[test]
    fn test_element_expr_addresses_registry() {
        let expr = element_expr(ElementRef(7));
        assert!(expr.contains("window.__docwatch"));
        assert!(expr.contains("[7]"));
    }
}
