//! Review pagination through the Maps `listugcposts` RPC.
//!
//! The endpoint pages with an opaque continuation token. The first request
//! sends an empty token; each response carries the next one, and an absent
//! or empty token means the listing is exhausted.
//!
//! ## Request
//!
//! ```text
//! GET {base}/maps/rpc/listugcposts?authuser=0&hl=en&pb=!1m6!1s{feature_id}...!2s{token}!5m2!1s{request_id}...
//! ```
//!
//! `!` separates fields in `pb` and must reach the server unescaped.
//!
//! ## Response
//!
//! ```text
//! )]}'
//! [null, "<next token>", [<raw review>, <raw review>, ...], ...]
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use gmaps_core::AppConfig;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use regex::Regex;

use crate::browser::BrowserPage;
use crate::envelope::FRAMING_MARKER;
use crate::error::ScraperError;
use crate::reviews::RawReviewEntry;
use crate::tree::TreeValue;

pub const RPC_PATH: &str = "/maps/rpc/listugcposts";

/// Length of the per-request identifier embedded in `pb`.
pub const REQUEST_ID_LEN: usize = 21;
const REQUEST_ID_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Characters of `pb` left as-is; everything else is percent-encoded.
const PB_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static FEATURE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!1s(0x[0-9a-f]+:0x[0-9a-f]+)").expect("valid regex"));

const TOKEN_INDEX: usize = 1;
const REVIEWS_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSettings {
    /// Scheme and host the RPC path is appended to, without trailing slash.
    pub base_url: String,
    pub page_size: u32,
    pub max_pages: u32,
    /// Pagination stops once more than this many entries are collected.
    pub max_entries: usize,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub request_timeout: Duration,
}

impl From<&AppConfig> for PaginationSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            page_size: config.review_page_size,
            max_pages: config.review_max_pages,
            max_entries: config.review_max_entries,
            jitter_min_ms: config.review_jitter_min_ms,
            jitter_max_ms: config.review_jitter_max_ms,
            request_timeout: Duration::from_secs(config.navigation_timeout_secs),
        }
    }
}

/// One decoded RPC response.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    pub reviews: Vec<RawReviewEntry>,
    /// `None` when this was the last page.
    pub next_token: Option<String>,
}

/// Walks the review listing of one place through the page's session.
pub struct ReviewPaginator<'p> {
    page: &'p dyn BrowserPage,
    settings: &'p PaginationSettings,
}

impl<'p> ReviewPaginator<'p> {
    #[must_use]
    pub fn new(page: &'p dyn BrowserPage, settings: &'p PaginationSettings) -> Self {
        Self { page, settings }
    }

    /// Collects raw review entries for `feature_id` until the listing ends,
    /// the page cap is hit or more than `max_entries` are held.
    ///
    /// A failed request or undecodable response ends pagination early; the
    /// entries gathered so far are still returned.
    pub async fn fetch_all<R>(&self, feature_id: &str, rng: &mut R) -> Vec<RawReviewEntry>
    where
        R: Rng + ?Sized,
    {
        let mut collected: Vec<RawReviewEntry> = Vec::new();
        let mut token = String::new();

        for page_index in 0..self.settings.max_pages {
            if page_index > 0 {
                let delay = rng.random_range(self.settings.jitter_min_ms..=self.settings.jitter_max_ms);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let page = match self.fetch_page(feature_id, &token, rng).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(
                        feature_id,
                        page = page_index + 1,
                        collected = collected.len(),
                        error = %err,
                        "review pagination failed, keeping partial results"
                    );
                    break;
                }
            };

            collected.extend(page.reviews);
            let Some(next) = page.next_token else {
                break;
            };
            if collected.len() > self.settings.max_entries {
                break;
            }
            token = next;
        }

        tracing::debug!(feature_id, reviews = collected.len(), "review pagination finished");
        collected
    }

    /// Requests and decodes a single page.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Browser`] when the in-page request fails.
    /// - [`ScraperError::UnexpectedStatus`] for a non-2xx response.
    /// - [`ScraperError::FramingMissing`] / [`ScraperError::Deserialize`] when
    ///   the body is not a framed JSON document.
    pub async fn fetch_page<R>(
        &self,
        feature_id: &str,
        token: &str,
        rng: &mut R,
    ) -> Result<ReviewPage, ScraperError>
    where
        R: Rng + ?Sized,
    {
        let request_id = generate_request_id(rng);
        let url = review_rpc_url(
            &self.settings.base_url,
            feature_id,
            self.settings.page_size,
            token,
            &request_id,
        );

        let response = self.page.http_get(&url, self.settings.request_timeout).await?;
        if !response.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: response.status,
                url,
            });
        }
        parse_review_page(&response.body, &url)
    }
}

/// Random request identifier of [`REQUEST_ID_LEN`] URL-safe characters.
pub fn generate_request_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..REQUEST_ID_LEN)
        .map(|_| char::from(REQUEST_ID_ALPHABET[rng.random_range(0..REQUEST_ID_ALPHABET.len())]))
        .collect()
}

/// The `!`-delimited `pb` value before URL encoding.
#[must_use]
pub fn build_pb(feature_id: &str, page_size: u32, token: &str, request_id: &str) -> String {
    format!(
        "!1m6!1s{feature_id}!6m4!4m1!1e1!4m1!1e3!2m2!1i{page_size}!2s{token}\
         !5m2!1s{request_id}!7e81!8m9!2b1!3b1!5b1!7b1!12m4!1b1!2b1!4m1!1e1!11m0!13m1!1e1"
    )
}

#[must_use]
pub fn review_rpc_url(
    base_url: &str,
    feature_id: &str,
    page_size: u32,
    token: &str,
    request_id: &str,
) -> String {
    let pb = build_pb(feature_id, page_size, token, request_id);
    let encoded = utf8_percent_encode(&pb, PB_ENCODE_SET);
    format!("{base_url}{RPC_PATH}?authuser=0&hl=en&pb={encoded}")
}

/// Decodes an RPC response body.
///
/// # Errors
///
/// Returns [`ScraperError::FramingMissing`] when the body does not start with
/// the framing marker and [`ScraperError::Deserialize`] when the rest is not
/// JSON.
pub fn parse_review_page(body: &str, url: &str) -> Result<ReviewPage, ScraperError> {
    let json = body
        .strip_prefix(FRAMING_MARKER)
        .ok_or_else(|| ScraperError::FramingMissing {
            url: url.to_string(),
        })?
        .trim_start();
    let tree = TreeValue::parse(json).map_err(|source| ScraperError::Deserialize {
        context: format!("review page {url}"),
        source,
    })?;

    let reviews = tree
        .at(&[REVIEWS_INDEX])
        .and_then(TreeValue::as_list)
        .map(|items| items.iter().cloned().map(RawReviewEntry::new).collect())
        .unwrap_or_default();
    let next_token = tree
        .at(&[TOKEN_INDEX])
        .and_then(TreeValue::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(ReviewPage {
        reviews,
        next_token,
    })
}

/// The `0x…:0x…` feature id embedded in a place link.
#[must_use]
pub fn extract_feature_id(link: &str) -> Option<String> {
    FEATURE_ID_RE
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
