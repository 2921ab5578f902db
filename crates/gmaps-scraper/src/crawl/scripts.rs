//! Page scripts and element locators used by the crawl.

use std::sync::LazyLock;

use crate::browser::Locator;

pub const FEED_SELECTOR: &str = r#"[role="feed"]"#;

/// Scrolls the results feed to its current bottom.
pub const SCROLL_FEED_TO_BOTTOM: &str = r#"(() => {
  const feed = document.querySelector('[role="feed"]');
  if (!feed) return false;
  feed.scrollTop = feed.scrollHeight;
  return true;
})()"#;

/// Scroll extent of the results feed, or `null` when it is gone.
pub const FEED_SCROLL_HEIGHT: &str = r#"(() => {
  const feed = document.querySelector('[role="feed"]');
  return feed ? feed.scrollHeight : null;
})()"#;

/// Absolute hrefs of every place link currently rendered in the feed.
pub const FEED_PLACE_LINKS: &str = r#"Array.from(
  document.querySelectorAll('[role="feed"] a[href*="/maps/place/"]')
).map(a => a.href)"#;

/// Any consent dialog control, accept or reject.
pub static CONSENT_CONTROL: LazyLock<Locator> = LazyLock::new(|| {
    Locator::xpath(
        "//button[.//span[contains(text(), 'Accept all') or contains(text(), 'Reject all')]]",
    )
});

pub static CONSENT_ACCEPT: LazyLock<Locator> =
    LazyLock::new(|| Locator::xpath("//button[.//span[contains(text(), 'Accept all')]]"));

pub static RESULTS_FEED: LazyLock<Locator> = LazyLock::new(|| Locator::css(FEED_SELECTOR));

pub static END_OF_LIST: LazyLock<Locator> = LazyLock::new(|| {
    Locator::xpath(r#"//span[contains(text(), "You've reached the end of the list.")]"#)
});

/// Path segment that identifies a single place page.
pub const PLACE_PATH_MARKER: &str = "/maps/place/";
