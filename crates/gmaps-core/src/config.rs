use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable has a default, so the only failure mode is a value that
/// does not parse or violates a range constraint.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("GMAPS_LOG_LEVEL", "info");
    let base_url = or_default("GMAPS_BASE_URL", "https://www.google.com")
        .trim_end_matches('/')
        .to_string();
    let user_agent = or_default("GMAPS_USER_AGENT", DEFAULT_USER_AGENT);
    let chrome_path = lookup("GMAPS_CHROME_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let navigation_timeout_secs = parse_u64("GMAPS_NAVIGATION_TIMEOUT_SECS", "30")?;
    let feed_timeout_secs = parse_u64("GMAPS_FEED_TIMEOUT_SECS", "25")?;
    let scroll_pause_ms = parse_u64("GMAPS_SCROLL_PAUSE_MS", "1500")?;
    let scroll_max_idle_cycles = parse_u32("GMAPS_SCROLL_MAX_IDLE_CYCLES", "5")?;
    let place_pause_ms = parse_u64("GMAPS_PLACE_PAUSE_MS", "500")?;
    let consent_attempts = parse_u32("GMAPS_CONSENT_ATTEMPTS", "3")?;
    let consent_base_timeout_secs = parse_u64("GMAPS_CONSENT_BASE_TIMEOUT_SECS", "5")?;
    let review_page_size = parse_u32("GMAPS_REVIEW_PAGE_SIZE", "20")?;
    let review_max_pages = parse_u32("GMAPS_REVIEW_MAX_PAGES", "20")?;
    let review_max_entries = parse_usize("GMAPS_REVIEW_MAX_ENTRIES", "300")?;
    let review_jitter_min_ms = parse_u64("GMAPS_REVIEW_JITTER_MIN_MS", "800")?;
    let review_jitter_max_ms = parse_u64("GMAPS_REVIEW_JITTER_MAX_MS", "1800")?;

    if consent_attempts == 0 {
        return Err(invalid(
            "GMAPS_CONSENT_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    if scroll_max_idle_cycles == 0 {
        return Err(invalid(
            "GMAPS_SCROLL_MAX_IDLE_CYCLES",
            "must be at least 1".to_string(),
        ));
    }
    if review_jitter_min_ms > review_jitter_max_ms {
        return Err(invalid(
            "GMAPS_REVIEW_JITTER_MIN_MS",
            format!("{review_jitter_min_ms} exceeds GMAPS_REVIEW_JITTER_MAX_MS ({review_jitter_max_ms})"),
        ));
    }

    Ok(AppConfig {
        log_level,
        base_url,
        user_agent,
        chrome_path,
        navigation_timeout_secs,
        feed_timeout_secs,
        scroll_pause_ms,
        scroll_max_idle_cycles,
        place_pause_ms,
        consent_attempts,
        consent_base_timeout_secs,
        review_page_size,
        review_max_pages,
        review_max_entries,
        review_jitter_min_ms,
        review_jitter_max_ms,
    })
}
