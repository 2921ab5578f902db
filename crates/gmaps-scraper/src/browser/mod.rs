//! Browser capability abstraction.
//!
//! The crawl only needs a narrow slice of what a browser can do: navigate,
//! evaluate script, check element visibility, click, read the page and issue
//! a GET from inside the page's session. [`BrowserPage`] captures exactly
//! that, so the crawl can be driven by Chromium in production and by a
//! scripted double in tests.

pub mod chromium;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use chromium::ChromiumLauncher;

/// Polling interval for [`BrowserPage::wait_for_visible`].
const VISIBILITY_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out after {waited_ms}ms waiting for {what}")]
    Timeout { waited_ms: u64, what: String },

    #[error("script evaluation failed: {0}")]
    Evaluate(String),

    #[error("in-page request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("browser session is closed")]
    Closed,

    #[error("failed to shut down browser: {0}")]
    Shutdown(String),
}

impl BrowserError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Timeout { .. })
    }

    pub(crate) fn timeout(waited: Duration, what: impl Into<String>) -> Self {
        BrowserError::Timeout {
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            what: what.into(),
        }
    }
}

/// How to find elements on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Locator::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css={selector}"),
            Locator::XPath(expression) => write!(f, "xpath={expression}"),
        }
    }
}

/// Status and body of a GET issued from inside the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Settings applied when a browser session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub lang: String,
    pub user_agent: String,
    pub chrome_path: Option<PathBuf>,
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launches a browser and opens the single page the crawl will drive.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BrowserError>;
}

/// One page inside a live browser session.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigates to `url` and waits for the DOM content to load.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Evaluates a script expression, awaiting it if it yields a promise.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Whether any element matching `locator` is currently rendered.
    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError>;

    /// Clicks the first element matching `locator`. Returns `false` when
    /// nothing matches.
    async fn click_first(&self, locator: &Locator) -> Result<bool, BrowserError>;

    /// Waits until the page stops issuing requests.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Issues a GET with the session's cookies and returns status and body.
    async fn http_get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, BrowserError>;

    /// Tears down the page and its browser. Safe to call more than once.
    async fn close(&self) -> Result<(), BrowserError>;

    /// Polls [`is_visible`](Self::is_visible) until it holds or `timeout`
    /// passes. Probe failures other than [`BrowserError::Closed`] count as
    /// "not yet visible", since they are expected while a page is swapping
    /// documents.
    async fn wait_for_visible(&self, locator: &Locator, timeout: Duration) -> Result<(), BrowserError> {
        let started = tokio::time::Instant::now();
        loop {
            match self.is_visible(locator).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(BrowserError::Closed) => return Err(BrowserError::Closed),
                Err(err) => tracing::trace!(locator = %locator, error = %err, "visibility probe failed"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(BrowserError::timeout(elapsed, locator.to_string()));
            }
            tokio::time::sleep(VISIBILITY_POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }
}
