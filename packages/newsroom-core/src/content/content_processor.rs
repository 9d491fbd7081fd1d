//! Periodic content extraction backfill: pulls articles that still need
//! their body extracted and runs them through `HtmlExtractor` with bounded
//! parallelism.

use crate::error::Result;
use crate::extract::HtmlExtractor;
use crate::repository::ArticleRepository;
use crate::resilience::RateLimiter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const MAX_CONCURRENT_EXTRACTIONS: usize = 3;
const DEFAULT_BATCH_SIZE: i64 = 25;
const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ContentProcessorStats {
    pub extracted: u64,
    pub failed: u64,
}

pub struct ContentProcessor {
    articles: Arc<ArticleRepository>,
    extractor: Arc<HtmlExtractor>,
    rate_limiter: Arc<RateLimiter>,
    running: AtomicBool,
    total_extracted: AtomicU64,
    total_failed: AtomicU64,
}

impl ContentProcessor {
    pub fn new(articles: Arc<ArticleRepository>, extractor: Arc<HtmlExtractor>, rate_limiter: Arc<RateLimiter>) -> Arc<Self> {
        Arc::new(Self {
            articles,
            extractor,
            rate_limiter,
            running: AtomicBool::new(false),
            total_extracted: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        })
    }

    /// Cumulative extraction tally since process start.
    pub fn get_content_extraction_stats(&self) -> ContentProcessorStats {
        ContentProcessorStats {
            extracted: self.total_extracted.load(Ordering::Relaxed),
            failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move { this.run_loop().await });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_loop(self: Arc<Self>) {
        info!("content processor started");
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.run_once(DEFAULT_BATCH_SIZE).await {
                warn!(error = %e, "content extraction batch failed");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        info!("content processor stopped");
    }

    /// Extracts up to `limit` pending articles, at most
    /// [`MAX_CONCURRENT_EXTRACTIONS`] in flight at once. A single article's
    /// failure is logged and skipped; it never aborts the rest of the batch.
    pub async fn run_once(&self, limit: i64) -> Result<ContentProcessorStats> {
        let pending = self.articles.get_articles_needing_content(limit).await?;
        if pending.is_empty() {
            return Ok(ContentProcessorStats::default());
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_EXTRACTIONS));
        let mut handles = Vec::with_capacity(pending.len());

        for (id, url, source) in pending {
            let semaphore = semaphore.clone();
            let articles = self.articles.clone();
            let extractor = self.extractor.clone();
            let rate_limiter = self.rate_limiter.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let domain = url::Url::parse(&url).ok().and_then(|u| u.host_str().map(str::to_string));
                if let Some(domain) = domain {
                    rate_limiter.wait(&domain, tokio::time::sleep(Duration::from_secs(10))).await;
                }

                match extractor.extract(&url, &source).await {
                    Ok(content) if !content.is_empty() => {
                        articles.update_content(id, &content).await.is_ok()
                    }
                    Ok(_) => {
                        debug!(article_id = %id, "extraction returned no content");
                        false
                    }
                    Err(e) => {
                        debug!(article_id = %id, error = %e, "content extraction failed");
                        false
                    }
                }
            }));
        }

        let mut extracted = 0u64;
        let mut failed = 0u64;
        for handle in handles {
            match handle.await {
                Ok(true) => extracted += 1,
                _ => failed += 1,
            }
        }

        self.total_extracted.fetch_add(extracted, Ordering::Relaxed);
        self.total_failed.fetch_add(failed, Ordering::Relaxed);

        info!(extracted, failed, "content extraction batch finished");
        Ok(ContentProcessorStats { extracted, failed })
    }
}
