//! Browser capability surface.
//!
//! Scraping and screenshot code talks to pages only through [`PageDriver`],
//! so the heuristics that depend on the channel markup can be exercised with
//! fixture pages instead of a live browser. [`chrome`] provides the real
//! implementation over headless Chromium.

pub mod chrome;
mod wait;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub use chrome::{ChromeLauncher, ChromeSettings};
pub use wait::{pause, wait_until, WaitOptions, WaitTimeout};

/// Polling interval for selector waits.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("page query failed: {0}")]
    Page(String),
}

/// How far a navigation must progress before it counts as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// The `load` event fired.
    Load,
    /// The document is parsed (`readyState` left `loading`). Looser, used as
    /// a fallback when full loads keep timing out.
    DomReady,
}

/// A page region in CSS pixels, document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Clip {
    /// Grow the region by `padding` on every side, clamping the origin at 0.
    #[must_use]
    pub fn padded(self, padding: f64) -> Self {
        let x = (self.x - padding).max(0.0).round();
        let y = (self.y - padding).max(0.0).round();
        Self {
            x,
            y,
            width: padding.mul_add(2.0, self.width).round(),
            height: padding.mul_add(2.0, self.height).round(),
        }
    }

    #[must_use]
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Operations the scraper needs from a browser tab.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and wait for `load`, failing after `timeout`.
    async fn navigate(&self, url: &str, load: LoadState, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Evaluate a script in the page and return its JSON result
    /// (`Value::Null` for `undefined`).
    async fn evaluate_json(&self, script: &str) -> Result<Value, BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    /// PNG of the given region, or of the viewport when `clip` is `None`.
    async fn screenshot(&self, clip: Option<Clip>) -> Result<Vec<u8>, BrowserError>;

    async fn title(&self) -> Result<Option<String>, BrowserError>;

    async fn current_url(&self) -> Result<Option<String>, BrowserError>;

    /// Wait until `selector` matches an element.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let script = selector_present_script(selector);
        let script = script.as_str();
        wait_until(WaitOptions::new(timeout, SELECTOR_POLL_INTERVAL), || async move {
            matches!(self.evaluate_json(script).await, Ok(Value::Bool(true)))
        })
        .await
        .map_err(|e| BrowserError::Timeout {
            what: format!("selector {selector}"),
            after: e.0,
        })
    }

    /// Release the tab and whatever browser process backs it.
    async fn close(&self) {}
}

/// Source of fresh pages. Each call yields an independent browser session.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, BrowserError>;
}

/// Evaluate a script and deserialize its result.
///
/// # Errors
///
/// Returns an error if evaluation fails or the result has the wrong shape.
pub async fn evaluate<T: DeserializeOwned>(
    page: &dyn PageDriver,
    script: &str,
) -> Result<T, BrowserError> {
    let value = page.evaluate_json(script).await?;
    serde_json::from_value(value).map_err(|e| BrowserError::Script(e.to_string()))
}

/// `!!document.querySelector(<selector>)` with the selector safely quoted.
#[must_use]
pub fn selector_present_script(selector: &str) -> String {
    format!("!!document.querySelector({})", js_string(selector))
}

/// Quote a string as a JavaScript literal.
#[must_use]
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
