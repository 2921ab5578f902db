//! Scripted [`BrowserPage`] double for crawl and pagination tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::scripts;
use crate::browser::{
    BrowserError, BrowserLauncher, BrowserPage, HttpResponse, LaunchOptions, Locator,
};

#[derive(Default)]
struct State {
    current_url: String,
    visited: Vec<String>,
    redirects: HashMap<String, String>,
    failing_urls: HashSet<String>,
    pages: HashMap<String, String>,
    consent_visible: bool,
    feed_visible: bool,
    feed_hidden_after_consent: bool,
    clicks_error_after_landing: bool,
    failing_url_reads: usize,
    end_marker_after_scrolls: Option<usize>,
    heights: VecDeque<Option<u64>>,
    link_batches: VecDeque<Vec<String>>,
    scrolls: usize,
    clicks: Vec<Locator>,
    network_idle_waits: usize,
    http_responses: VecDeque<HttpResponse>,
    http_requests: Vec<String>,
    closes: usize,
}

/// A page whose DOM answers are scripted up front.
///
/// Queued scroll heights and link batches are consumed one per read; the
/// last entry repeats once the queue is down to one. Clones share state.
#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<State>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn show_feed(&self) {
        self.state().feed_visible = true;
    }

    pub fn show_consent(&self) {
        self.state().consent_visible = true;
    }

    /// Consent handling succeeds but the results feed never renders.
    pub fn keep_feed_hidden_after_consent(&self) {
        self.state().feed_hidden_after_consent = true;
    }

    /// Clicks take effect, then report a destroyed execution context the
    /// way a click that starts a navigation does.
    pub fn error_clicks_after_landing(&self) {
        self.state().clicks_error_after_landing = true;
    }

    /// The next `reads` calls to `current_url` fail.
    pub fn fail_url_reads(&self, reads: usize) {
        self.state().failing_url_reads = reads;
    }

    pub fn show_end_marker_after(&self, scrolls: usize) {
        self.state().end_marker_after_scrolls = Some(scrolls);
    }

    pub fn redirect(&self, from: &str, to: &str) {
        self.state().redirects.insert(from.to_string(), to.to_string());
    }

    pub fn fail_navigation_to(&self, url: &str) {
        self.state().failing_urls.insert(url.to_string());
    }

    pub fn serve_html(&self, url: &str, html: impl Into<String>) {
        self.state().pages.insert(url.to_string(), html.into());
    }

    pub fn push_height(&self, height: Option<u64>) {
        self.state().heights.push_back(height);
    }

    pub fn push_links(&self, links: Vec<String>) {
        self.state().link_batches.push_back(links);
    }

    pub fn push_http_response(&self, status: u16, body: String) {
        self.state().http_responses.push_back(HttpResponse { status, body });
    }

    pub fn scroll_count(&self) -> usize {
        self.state().scrolls
    }

    pub fn visited(&self) -> Vec<String> {
        self.state().visited.clone()
    }

    pub fn clicks(&self) -> Vec<Locator> {
        self.state().clicks.clone()
    }

    pub fn network_idle_waits(&self) -> usize {
        self.state().network_idle_waits
    }

    pub fn http_requests(&self) -> Vec<String> {
        self.state().http_requests.clone()
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }
}

fn next_or_last<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state();
        state.visited.push(url.to_string());
        if state.failing_urls.contains(url) {
            return Err(BrowserError::timeout(timeout, format!("navigation to {url}")));
        }
        let landed = state.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        state.current_url = landed;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let mut state = self.state();
        let value = if script == scripts::SCROLL_FEED_TO_BOTTOM {
            state.scrolls += 1;
            json!(true)
        } else if script == scripts::FEED_SCROLL_HEIGHT {
            json!(next_or_last(&mut state.heights).flatten())
        } else if script == scripts::FEED_PLACE_LINKS {
            json!(next_or_last(&mut state.link_batches).unwrap_or_default())
        } else {
            Value::Null
        };
        Ok(value)
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let state = self.state();
        let visible = if *locator == *scripts::CONSENT_CONTROL || *locator == *scripts::CONSENT_ACCEPT {
            state.consent_visible
        } else if *locator == *scripts::RESULTS_FEED {
            state.feed_visible
        } else if *locator == *scripts::END_OF_LIST {
            state
                .end_marker_after_scrolls
                .is_some_and(|after| state.scrolls >= after)
        } else {
            false
        };
        Ok(visible)
    }

    async fn click_first(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let mut state = self.state();
        state.clicks.push(locator.clone());
        let hit = state.consent_visible
            && (*locator == *scripts::CONSENT_ACCEPT || *locator == *scripts::CONSENT_CONTROL);
        if hit {
            state.consent_visible = false;
            state.feed_visible = !state.feed_hidden_after_consent;
        }
        if state.clicks_error_after_landing {
            return Err(BrowserError::Evaluate(
                "Execution context was destroyed".to_string(),
            ));
        }
        Ok(hit)
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> Result<(), BrowserError> {
        self.state().network_idle_waits += 1;
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let state = self.state();
        Ok(state.pages.get(&state.current_url).cloned().unwrap_or_default())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let mut state = self.state();
        if state.failing_url_reads > 0 {
            state.failing_url_reads -= 1;
            return Err(BrowserError::Evaluate("Cannot find context".to_string()));
        }
        Ok(state.current_url.clone())
    }

    async fn http_get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, BrowserError> {
        let mut state = self.state();
        state.http_requests.push(url.to_string());
        state.http_responses.pop_front().ok_or_else(|| BrowserError::Http {
            url: url.to_string(),
            reason: "no scripted response".to_string(),
        })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state().closes += 1;
        Ok(())
    }
}

/// Hands out clones of one [`FakePage`], or fails every launch.
pub struct FakeLauncher {
    page: Option<FakePage>,
    launches: Mutex<Vec<LaunchOptions>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Some(page),
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            page: None,
            launches: Mutex::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchOptions> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BrowserError> {
        self.launches.lock().unwrap().push(options.clone());
        match &self.page {
            Some(page) => Ok(Box::new(page.clone())),
            None => Err(BrowserError::Launch("no browser in tests".to_string())),
        }
    }
}
