pub mod browser;
pub mod crawl;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod pagination;
pub mod retry;
pub mod reviews;
pub mod tree;

pub use browser::{BrowserError, BrowserLauncher, BrowserPage, ChromiumLauncher, LaunchOptions};
pub use crawl::{CrawlController, CrawlOutput, CrawlSettings};
pub use envelope::decode_place_blob;
pub use error::ScraperError;
pub use extract::{extract_place_data, extract_place_fields};
pub use pagination::{PaginationSettings, ReviewPaginator};
pub use reviews::{process_and_select_reviews, RawReviewEntry};
pub use tree::TreeValue;

use gmaps_core::{AppConfig, PlaceRecord, ScrapeRequest};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Browser options for `request` under `config`.
#[must_use]
pub fn launch_options(request: &ScrapeRequest, config: &AppConfig) -> LaunchOptions {
    LaunchOptions {
        headless: request.headless,
        lang: request.lang.clone(),
        user_agent: config.user_agent.clone(),
        chrome_path: config.chrome_path.clone(),
    }
}

/// Runs a full scrape in a fresh Chromium session.
///
/// # Errors
///
/// Returns [`ScraperError`] when the browser cannot start, the search page
/// does not load or the consent step never resolves.
pub async fn scrape(
    request: &ScrapeRequest,
    config: &AppConfig,
) -> Result<Vec<PlaceRecord>, ScraperError> {
    let settings = CrawlSettings::from(config);
    scrape_with(
        &ChromiumLauncher,
        request,
        &launch_options(request, config),
        &settings,
        StdRng::from_os_rng(),
    )
    .await
}

/// Runs a full scrape on a page from `launcher`.
///
/// The browser is closed on every path once launched; a failed close is
/// logged and does not mask the crawl result.
///
/// # Errors
///
/// See [`scrape`].
pub async fn scrape_with(
    launcher: &dyn BrowserLauncher,
    request: &ScrapeRequest,
    options: &LaunchOptions,
    settings: &CrawlSettings,
    rng: StdRng,
) -> Result<Vec<PlaceRecord>, ScraperError> {
    let page = launcher.launch(options).await?;

    let result = CrawlController::new(page.as_ref(), settings, rng)
        .run(request)
        .await;

    if let Err(err) = page.close().await {
        tracing::warn!(error = %err, "failed to close browser");
    }

    let output = result.inspect_err(|err| {
        tracing::error!(query = %request.query, error = %err, "scrape failed");
    })?;
    tracing::info!(
        query = %request.query,
        links = output.links.len(),
        places = output.places.len(),
        "scrape finished"
    );
    Ok(output.places)
}
