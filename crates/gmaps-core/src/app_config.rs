use std::path::PathBuf;

/// Process-wide settings for a scrape run, read from `GMAPS_*` environment
/// variables. See [`crate::config::load_app_config`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// Origin used for both the search page and the review RPC.
    pub base_url: String,
    pub user_agent: String,
    /// Explicit Chromium binary. `None` lets the launcher discover one.
    pub chrome_path: Option<PathBuf>,
    pub navigation_timeout_secs: u64,
    pub feed_timeout_secs: u64,
    pub scroll_pause_ms: u64,
    pub scroll_max_idle_cycles: u32,
    pub place_pause_ms: u64,
    pub consent_attempts: u32,
    pub consent_base_timeout_secs: u64,
    pub review_page_size: u32,
    pub review_max_pages: u32,
    pub review_max_entries: usize,
    pub review_jitter_min_ms: u64,
    pub review_jitter_max_ms: u64,
}
