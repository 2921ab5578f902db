use serde::{Deserialize, Serialize};

/// Parameters for a single scrape run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    /// Free-text search, e.g. `"coffee shops in Lisbon"`.
    pub query: String,
    /// Stop discovering links once this many are known. `None` scrapes
    /// everything the feed yields.
    pub max_places: Option<usize>,
    /// Interface language passed to the search page and review RPC.
    pub lang: String,
    pub headless: bool,
    pub extract_reviews: bool,
}

impl ScrapeRequest {
    /// Builds a request with the documented defaults: English, headless,
    /// reviews enabled, no place cap.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_places: None,
            lang: "en".to_string(),
            headless: true,
            extract_reviews: true,
        }
    }
}
