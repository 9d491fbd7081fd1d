//! Headless-browser fallback extractor.

use crate::error::{NewsroomError, Result};
use crate::extract::html_extractor::{extract_from_html, FallbackExtractor};
use crate::extract::browser_pool::BrowserPool;
use crate::resilience::UserAgentRotator;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Common Dutch cookie-consent button selectors, tried best-effort.
const COOKIE_CONSENT_SELECTORS: &[&str] = &[
    "#didomi-notice-agree-button",
    "button[aria-label='Accepteren']",
    "button#onetrust-accept-btn-handler",
    ".cmpboxbtnyes",
];

const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
window.chrome = { runtime: {} };
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) => (
  parameters.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : originalQuery(parameters)
);
"#;

pub struct BrowserExtractor {
    pool: Arc<BrowserPool>,
    rotator: Arc<UserAgentRotator>,
    /// Caps concurrent browser operations independently of the pool size.
    concurrency: Arc<Semaphore>,
    page_timeout: Duration,
    wait_after_load_ms: u64,
}

impl BrowserExtractor {
    pub fn new(
        pool: Arc<BrowserPool>,
        rotator: Arc<UserAgentRotator>,
        max_concurrent: usize,
        page_timeout: Duration,
        wait_after_load_ms: u64,
    ) -> Self {
        Self {
            pool,
            rotator,
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
            page_timeout,
            wait_after_load_ms,
        }
    }

    async fn extract_impl(&self, url: &str, source: &str) -> Result<String> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|_| NewsroomError::RemoteError("browser extractor semaphore closed".into()))?;

        let pooled = self.pool.acquire().await?;
        let result = self.run_extraction(&pooled.browser, url, source).await;
        self.pool.release(pooled);
        result
    }

    async fn run_extraction(
        &self,
        browser: &chromiumoxide::Browser,
        url: &str,
        source: &str,
    ) -> Result<String> {
        let page = tokio::time::timeout(self.page_timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| NewsroomError::Timeout(format!("page open timed out for {url}")))?
            .map_err(|e| NewsroomError::RemoteError(format!("page open failed: {e}")))?;

        page.evaluate_on_new_document(STEALTH_SCRIPT)
            .await
            .map_err(|e| NewsroomError::RemoteError(format!("stealth injection failed: {e}")))?;

        let ua = self.rotator.next();
        page.set_user_agent(ua)
            .await
            .map_err(|e| NewsroomError::RemoteError(format!("set UA failed: {e}")))?;
        page.set_viewport(chromiumoxide::page::Viewport {
            width: 1920,
            height: 1080,
            ..Default::default()
        })
        .await
        .map_err(|e| NewsroomError::RemoteError(format!("set viewport failed: {e}")))?;

        let navigate = NavigateParams::new(url);
        tokio::time::timeout(self.page_timeout, page.goto(navigate))
            .await
            .map_err(|_| NewsroomError::Timeout(format!("navigation timed out for {url}")))?
            .map_err(|e| NewsroomError::RemoteError(format!("navigation failed: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| NewsroomError::RemoteError(format!("wait for load failed: {e}")))?;

        let jitter_ms = rand::thread_rng().gen_range(0..1000);
        tokio::time::sleep(Duration::from_millis(self.wait_after_load_ms + jitter_ms)).await;

        for selector in COOKIE_CONSENT_SELECTORS {
            if let Ok(el) = page.find_element(selector).await {
                let _ = el.click().await;
                break;
            }
        }

        let _ = page
            .evaluate("window.scrollTo(0, document.body.scrollHeight / 2)")
            .await;

        let html = page
            .content()
            .await
            .map_err(|e| NewsroomError::RemoteError(format!("content read failed: {e}")))?;

        Ok(extract_from_html(&html, source))
    }
}

#[async_trait::async_trait]
impl FallbackExtractor for BrowserExtractor {
    async fn extract(&self, url: &str, source: &str) -> Result<String> {
        self.extract_impl(url, source).await
    }
}
