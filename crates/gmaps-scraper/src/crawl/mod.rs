//! Drives one browser page through a whole search.
//!
//! ```text
//! search page ─▶ consent race ─▶ feed wait ─┬─▶ scroll discovery ─▶ per-place loop
//!                                           ├─▶ single place ─────────┘
//!                                           └─▶ no results (empty)
//! ```
//!
//! Everything runs sequentially on one page. Link discovery finishes before
//! the first place is visited, and a place's reviews are fetched before its
//! HTML is captured.

pub mod scripts;
pub mod scroll;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use gmaps_core::{AppConfig, PlaceRecord, ScrapeRequest};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::rngs::StdRng;
use serde_json::Value;

use crate::browser::{BrowserError, BrowserPage};
use crate::error::ScraperError;
use crate::extract::extract_place_data;
use crate::pagination::{extract_feature_id, PaginationSettings, ReviewPaginator};
use crate::retry::{race_with_escalation, Race, RacePolicy};

pub use scroll::{ScrollOutcome, ScrollTracker};

/// Unreserved characters stay literal in the search query.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const RESULTS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timing and limits for a crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSettings {
    pub base_url: String,
    pub navigation_timeout: Duration,
    /// Pause after the search page loads, before looking for consent.
    pub settle_delay: Duration,
    pub consent: RacePolicy,
    /// How long to wait for the network to quiet down after consent.
    pub consent_idle_timeout: Duration,
    pub feed_timeout: Duration,
    pub scroll_pause: Duration,
    pub max_idle_cycles: u32,
    pub place_pause: Duration,
    pub pagination: PaginationSettings,
}

impl From<&AppConfig> for CrawlSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            settle_delay: Duration::from_secs(2),
            consent: RacePolicy::new(
                config.consent_attempts,
                Duration::from_secs(config.consent_base_timeout_secs),
            ),
            consent_idle_timeout: Duration::from_secs(config.consent_base_timeout_secs),
            feed_timeout: Duration::from_secs(config.feed_timeout_secs),
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            max_idle_cycles: config.scroll_max_idle_cycles,
            place_pause: Duration::from_millis(config.place_pause_ms),
            pagination: PaginationSettings::from(config),
        }
    }
}

/// What the feed wait found.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedState {
    Ready,
    /// The search resolved straight to one place page.
    SinglePlace(String),
    Missing,
}

/// Links discovered for a query and the places extracted from them.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    pub links: Vec<String>,
    pub places: Vec<PlaceRecord>,
}

/// Runs the search, discovery and extraction steps on one page.
pub struct CrawlController<'p> {
    page: &'p dyn BrowserPage,
    settings: &'p CrawlSettings,
    rng: StdRng,
}

impl<'p> CrawlController<'p> {
    #[must_use]
    pub fn new(page: &'p dyn BrowserPage, settings: &'p CrawlSettings, rng: StdRng) -> Self {
        Self {
            page,
            settings,
            rng,
        }
    }

    /// Crawls `request` to completion.
    ///
    /// Failures confined to one place are logged and skipped. A missing
    /// results feed yields an empty output.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Browser`] when the search page cannot be loaded.
    /// - [`ScraperError::Consent`] when neither the consent dialog nor the
    ///   results appear within the retry budget.
    pub async fn run(&mut self, request: &ScrapeRequest) -> Result<CrawlOutput, ScraperError> {
        let search_url = search_url(&self.settings.base_url, &request.query, &request.lang);
        tracing::info!(query = %request.query, url = %search_url, "opening search");
        self.page
            .goto(&search_url, self.settings.navigation_timeout)
            .await?;
        tokio::time::sleep(self.settings.settle_delay).await;

        self.handle_consent().await?;

        let links = match self.await_feed().await? {
            FeedState::Ready => self.discover_links(request.max_places).await,
            FeedState::SinglePlace(url) => {
                tracing::info!(url = %url, "search resolved to a single place");
                vec![url]
            }
            FeedState::Missing => {
                tracing::warn!(query = %request.query, "results feed not found, returning no places");
                return Ok(CrawlOutput::default());
            }
        };

        let places = self.scrape_places(&links, request.extract_reviews).await;
        Ok(CrawlOutput { links, places })
    }

    /// Races the consent dialog against the results and clicks through the
    /// dialog when it wins.
    async fn handle_consent(&self) -> Result<(), ScraperError> {
        let page = self.page;
        let winner = race_with_escalation(
            &self.settings.consent,
            |timeout| page.wait_for_visible(&scripts::CONSENT_CONTROL, timeout),
            |timeout| wait_for_results(page, timeout),
        )
        .await
        .map_err(|exhausted| ScraperError::Consent {
            attempts: exhausted.attempts,
        })?;

        if winner == Race::Second {
            tracing::debug!("no consent dialog");
            return Ok(());
        }

        // Accepting usually navigates, so a click can fail after it landed.
        match tolerate(page.click_first(&scripts::CONSENT_ACCEPT).await, "consent accept click")? {
            Some(true) => tracing::info!("accepted consent dialog"),
            Some(false) => {
                tracing::info!("no accept control, clicking first consent control");
                match tolerate(page.click_first(&scripts::CONSENT_CONTROL).await, "consent control click")? {
                    Some(false) => tracing::warn!("consent dialog vanished before it could be clicked"),
                    Some(true) | None => {}
                }
            }
            None => {}
        }

        if let Err(err) = page
            .wait_for_network_idle(self.settings.consent_idle_timeout)
            .await
        {
            tracing::warn!(error = %err, "network did not settle after consent");
        }
        Ok(())
    }

    async fn await_feed(&self) -> Result<FeedState, ScraperError> {
        let url = tolerate(self.page.current_url().await, "current url")?.unwrap_or_default();
        if is_place_url(&url)
            && !tolerate(self.page.is_visible(&scripts::RESULTS_FEED).await, "feed visibility")?
                .unwrap_or_default()
        {
            return Ok(FeedState::SinglePlace(url));
        }

        match self
            .page
            .wait_for_visible(&scripts::RESULTS_FEED, self.settings.feed_timeout)
            .await
        {
            Ok(()) => Ok(FeedState::Ready),
            Err(err) if err.is_timeout() => {
                let url = tolerate(self.page.current_url().await, "current url")?.unwrap_or_default();
                if is_place_url(&url) {
                    Ok(FeedState::SinglePlace(url))
                } else {
                    Ok(FeedState::Missing)
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Scrolls the feed until the place limit, the end marker or a stall.
    ///
    /// A page error mid-scroll ends discovery with the links found so far.
    async fn discover_links(&self, max_places: Option<usize>) -> Vec<String> {
        let initial_height = match self.page.evaluate(scripts::FEED_SCROLL_HEIGHT).await {
            Ok(value) => value.as_u64(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read feed height");
                None
            }
        };
        let mut tracker = ScrollTracker::new(initial_height, max_places, self.settings.max_idle_cycles);

        loop {
            let outcome = match self.scroll_cycle(&mut tracker).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(error = %err, links = tracker.links().len(), "scrolling failed, keeping links found so far");
                    break;
                }
            };
            tracing::debug!(links = tracker.links().len(), ?outcome, "scroll cycle");
            match outcome {
                ScrollOutcome::Continue => {}
                ScrollOutcome::LimitReached => {
                    tracing::info!(max_places = ?max_places, "reached place limit");
                    break;
                }
                ScrollOutcome::EndOfList => {
                    tracing::info!("reached end of results list");
                    break;
                }
                ScrollOutcome::Stalled => {
                    tracing::info!("feed stopped growing");
                    break;
                }
            }
        }

        let links = tracker.into_links();
        tracing::info!(links = links.len(), "link discovery finished");
        links
    }

    async fn scroll_cycle(&self, tracker: &mut ScrollTracker) -> Result<ScrollOutcome, BrowserError> {
        self.page.evaluate(scripts::SCROLL_FEED_TO_BOTTOM).await?;
        tokio::time::sleep(self.settings.scroll_pause).await;

        let links = string_list(self.page.evaluate(scripts::FEED_PLACE_LINKS).await?);
        let height = self.page.evaluate(scripts::FEED_SCROLL_HEIGHT).await?.as_u64();
        let end_visible = self.page.is_visible(&scripts::END_OF_LIST).await?;
        Ok(tracker.observe(height, links, end_visible))
    }

    async fn scrape_places(&mut self, links: &[String], extract_reviews: bool) -> Vec<PlaceRecord> {
        let mut places = Vec::with_capacity(links.len());
        for (index, link) in links.iter().enumerate() {
            tracing::info!(current = index + 1, total = links.len(), link = %link, "processing place");
            match self.scrape_place(link, extract_reviews).await {
                Ok(place) => places.push(place),
                Err(ScraperError::Browser(BrowserError::Closed)) => {
                    tracing::error!(link = %link, "browser closed mid-crawl, stopping");
                    break;
                }
                Err(err) => tracing::warn!(link = %link, error = %err, "skipping place"),
            }
            tokio::time::sleep(self.settings.place_pause).await;
        }
        places
    }

    async fn scrape_place(&mut self, link: &str, extract_reviews: bool) -> Result<PlaceRecord, ScraperError> {
        self.page
            .goto(link, self.settings.navigation_timeout)
            .await?;

        let raw_reviews = if extract_reviews {
            match extract_feature_id(link) {
                Some(feature_id) => {
                    ReviewPaginator::new(self.page, &self.settings.pagination)
                        .fetch_all(&feature_id, &mut self.rng)
                        .await
                }
                None => {
                    tracing::debug!(link = %link, "no feature id in link, skipping reviews");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let html = self.page.content().await?;
        let mut place = extract_place_data(&html, &raw_reviews, &mut self.rng).ok_or_else(|| {
            ScraperError::Extraction {
                url: link.to_string(),
            }
        })?;
        place.link = Some(link.to_string());
        Ok(place)
    }
}

/// Polls until the results feed is visible or the page has become a single
/// place page.
async fn wait_for_results(page: &dyn BrowserPage, timeout: Duration) -> Result<(), BrowserError> {
    let started = tokio::time::Instant::now();
    loop {
        let feed_visible = tolerate(page.is_visible(&scripts::RESULTS_FEED).await, "feed visibility")?
            .unwrap_or_default();
        if feed_visible
            || tolerate(page.current_url().await, "current url")?
                .is_some_and(|url| is_place_url(&url))
        {
            return Ok(());
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(BrowserError::timeout(elapsed, "results"));
        }
        tokio::time::sleep(RESULTS_POLL_INTERVAL.min(timeout - elapsed)).await;
    }
}

/// Passes a closed session through and logs any other page failure,
/// returning `None` in its place. Probes hit while the page swaps documents
/// are expected to fail now and then.
fn tolerate<T>(result: Result<T, BrowserError>, what: &str) -> Result<Option<T>, BrowserError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(BrowserError::Closed) => Err(BrowserError::Closed),
        Err(err) => {
            tracing::warn!(what, error = %err, "page call failed, continuing");
            Ok(None)
        }
    }
}

#[must_use]
pub fn search_url(base_url: &str, query: &str, lang: &str) -> String {
    format!(
        "{base_url}/maps/search/?q={}&hl={}",
        utf8_percent_encode(query, QUERY_ENCODE_SET),
        utf8_percent_encode(lang, QUERY_ENCODE_SET)
    )
}

fn is_place_url(url: &str) -> bool {
    url.contains(scripts::PLACE_PATH_MARKER)
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
