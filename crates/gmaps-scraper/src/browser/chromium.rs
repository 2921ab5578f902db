//! Chromium-backed [`BrowserPage`] using chromiumoxide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{BrowserError, BrowserLauncher, BrowserPage, HttpResponse, LaunchOptions, Locator};

/// How long the resource count must hold still before the network counts as idle.
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Extra time the outer guard allows an in-page fetch beyond its own abort timer.
const FETCH_GRACE: Duration = Duration::from_secs(2);

const NETWORK_PROBE: &str =
    "[document.readyState, performance.getEntriesByType('resource').length]";

/// Launches a local Chromium through the DevTools protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumLauncher;

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let config = browser_config(options)?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "devtools handler event failed");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!(error = %close_err, "failed to close browser after page setup error");
                }
                if let Err(wait_err) = browser.wait().await {
                    tracing::warn!(error = %wait_err, "failed to reap browser process");
                }
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open page: {err}")));
            }
        };

        tracing::debug!(headless = options.headless, lang = %options.lang, "browser launched");

        Ok(Box::new(ChromiumPage {
            page,
            browser: Mutex::new(Some(browser)),
            handler: handler_task,
            closed: AtomicBool::new(false),
        }))
    }
}

fn browser_config(options: &LaunchOptions) -> Result<BrowserConfig, BrowserError> {
    let mut builder = BrowserConfig::builder()
        .window_size(1366, 900)
        .arg(format!("--lang={}", options.lang))
        .arg(format!("--user-agent={}", options.user_agent))
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-blink-features=AutomationControlled");
    if !options.headless {
        builder = builder.with_head();
    }
    if let Some(path) = &options.chrome_path {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(BrowserError::Launch)
}

/// The single page of a launched Chromium. Owns the browser process.
pub struct ChromiumPage {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    closed: AtomicBool,
}

impl ChromiumPage {
    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    /// Returns `(ready_state_complete, resource_count)`.
    async fn network_probe(&self) -> Result<(bool, u64), BrowserError> {
        let value = self.evaluate(NETWORK_PROBE).await?;
        let complete = value.get(0).and_then(Value::as_str) == Some("complete");
        let resources = value.get(1).and_then(Value::as_u64).unwrap_or(0);
        Ok((complete, resources))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(BrowserError::timeout(timeout, format!("navigation to {url}"))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.ensure_open()?;
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(BrowserError::Evaluate)?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let value = self.evaluate(&visibility_script(locator)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click_first(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let value = self.evaluate(&click_script(locator)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), BrowserError> {
        let started = Instant::now();
        let mut last_count: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            match self.network_probe().await {
                Ok((complete, count)) => {
                    if last_count != Some(count) {
                        last_count = Some(count);
                        stable_since = Instant::now();
                    } else if complete && stable_since.elapsed() >= NETWORK_IDLE_WINDOW {
                        return Ok(());
                    }
                }
                Err(BrowserError::Closed) => return Err(BrowserError::Closed),
                Err(err) => {
                    tracing::trace!(error = %err, "network probe failed");
                    last_count = None;
                }
            }

            if started.elapsed() >= timeout {
                return Err(BrowserError::timeout(started.elapsed(), "network idle"));
            }
            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Evaluate(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn http_get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, BrowserError> {
        let script = fetch_script(url, timeout);
        let value = match tokio::time::timeout(timeout + FETCH_GRACE, self.evaluate(&script)).await {
            Ok(Ok(value)) => value,
            Ok(Err(BrowserError::Closed)) => return Err(BrowserError::Closed),
            Ok(Err(err)) => {
                return Err(BrowserError::Http {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(_) => return Err(BrowserError::timeout(timeout, format!("GET {url}"))),
        };
        serde_json::from_value(value).map_err(|e| BrowserError::Http {
            url: url.to_string(),
            reason: format!("malformed fetch result: {e}"),
        })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Shutdown(e.to_string()));
        if let Err(err) = browser.wait().await {
            tracing::warn!(error = %err, "failed to reap browser process");
        }
        self.handler.abort();
        closed
    }
}

/// Quotes `text` as a JavaScript string literal.
fn js_string(text: &str) -> String {
    Value::String(text.to_owned()).to_string()
}

/// Expression evaluating to an array of the elements matching `locator`.
fn elements_expr(locator: &Locator) -> String {
    match locator {
        Locator::Css(selector) => {
            format!("Array.from(document.querySelectorAll({}))", js_string(selector))
        }
        Locator::XPath(expression) => format!(
            "(() => {{ const snap = document.evaluate({}, document, null, \
             XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; \
             for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i)); \
             return out; }})()",
            js_string(expression)
        ),
    }
}

fn visibility_script(locator: &Locator) -> String {
    format!(
        "{}.some(el => {{ const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
         return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})",
        elements_expr(locator)
    )
}

fn click_script(locator: &Locator) -> String {
    format!(
        "(() => {{ const el = {}[0]; if (!el) return false; el.click(); return true; }})()",
        elements_expr(locator)
    )
}

fn fetch_script(url: &str, timeout: Duration) -> String {
    format!(
        "(async () => {{ const controller = new AbortController(); \
         const timer = setTimeout(() => controller.abort(), {timeout_ms}); \
         try {{ const res = await fetch({url}, {{ credentials: 'include', signal: controller.signal }}); \
         return {{ status: res.status, body: await res.text() }}; }} \
         finally {{ clearTimeout(timer); }} }})()",
        timeout_ms = timeout.as_millis(),
        url = js_string(url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_quoted_as_js_strings() {
        let expr = elements_expr(&Locator::xpath("//span[contains(text(), \"You've reached\")]"));
        assert!(expr.contains(r#"document.evaluate("//span[contains(text(), \"You've reached\")]""#));

        let css = elements_expr(&Locator::css("[role=\"feed\"]"));
        assert_eq!(css, r#"Array.from(document.querySelectorAll("[role=\"feed\"]"))"#);
    }

    #[test]
    fn fetch_script_embeds_url_and_timeout() {
        let script = fetch_script("https://www.google.com/maps/rpc/listugcposts?pb=!1m6", Duration::from_secs(15));
        assert!(script.contains(r#"fetch("https://www.google.com/maps/rpc/listugcposts?pb=!1m6""#));
        assert!(script.contains("controller.abort(), 15000"));
        assert!(script.contains("credentials: 'include'"));
    }

    #[test]
    fn headful_config_builds() {
        let options = LaunchOptions {
            headless: false,
            lang: "pt".to_string(),
            user_agent: "test-agent".to_string(),
            chrome_path: Some("/usr/bin/chromium".into()),
        };
        assert!(browser_config(&options).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn launches_and_reads_a_data_url() {
        let options = LaunchOptions {
            headless: true,
            lang: "en".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            chrome_path: None,
        };
        let page = ChromiumLauncher.launch(&options).await.expect("launch");
        page.goto(
            "data:text/html,<div role=feed><a href='/maps/place/x'>x</a></div>",
            Duration::from_secs(10),
        )
        .await
        .expect("goto");

        assert!(page.is_visible(&Locator::css("[role=\"feed\"]")).await.expect("probe"));
        let count = page.evaluate("document.querySelectorAll('a').length").await.expect("eval");
        assert_eq!(count, serde_json::json!(1));
        assert!(page.content().await.expect("content").contains("role=\"feed\""));

        page.close().await.expect("close");
        assert!(matches!(page.content().await, Err(BrowserError::Closed)));
        page.close().await.expect("second close is a no-op");
    }
}
