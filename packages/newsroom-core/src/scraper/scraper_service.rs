//! Scraper service: per-source protocol, all-sources fan-out, retry wrapper.

use crate::error::{NewsroomError, Result};
use crate::feeds::rss::fetch_feed;
use crate::repository::{ArticleRepository, JobRepository, ScraperStats};
use crate::resilience::{CircuitBreakerManager, RateLimiter, RobotsChecker};
use crate::scraper::backoff::{retry_with_backoff, RetryPolicy};
use crate::types::{ScrapingJob, Source};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

const RATE_LIMIT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
const CIRCUIT_BREAKER_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MAX_CONCURRENT_SOURCES: usize = 3;

pub struct ScraperService {
    client: reqwest::Client,
    articles: Arc<ArticleRepository>,
    jobs: Arc<JobRepository>,
    rate_limiter: Arc<RateLimiter>,
    robots: Arc<RobotsChecker>,
    circuit_breakers: Arc<CircuitBreakerManager>,
    enable_robots_check: bool,
    enable_duplicate_detection: bool,
}

pub struct ScrapeOutcome {
    pub job: ScrapingJob,
    pub inserted: u64,
}

impl ScraperService {
    pub fn new(
        client: reqwest::Client,
        articles: Arc<ArticleRepository>,
        jobs: Arc<JobRepository>,
        rate_limiter: Arc<RateLimiter>,
        robots: Arc<RobotsChecker>,
        circuit_breakers: Arc<CircuitBreakerManager>,
        enable_robots_check: bool,
        enable_duplicate_detection: bool,
    ) -> Self {
        Self {
            client,
            articles,
            jobs,
            rate_limiter,
            robots,
            circuit_breakers,
            enable_robots_check,
            enable_duplicate_detection,
        }
    }

    /// Fixed protocol: record job, robots check, domain resolution,
    /// rate-limit wait, circuit-breaker-wrapped RSS fetch, draft
    /// construction, one dedup call, one batched insert, job completion.
    pub async fn scrape_source(&self, source: &Source, feed_url: &str) -> Result<ScrapeOutcome> {
        let mut job = ScrapingJob::new(&source.name);
        job.start();
        let _ = self.jobs.record(&job).await;

        if self.enable_robots_check && !self.robots.is_allowed(feed_url).await {
            job.fail("robots.txt disallows this feed");
            let _ = self.jobs.record(&job).await;
            return Err(NewsroomError::ValidationError(format!(
                "robots.txt disallows {feed_url}"
            )));
        }

        let domain = resolve_domain(feed_url);

        let domain = match domain {
            Ok(d) => d,
            Err(e) => {
                job.fail(e.to_string());
                let _ = self.jobs.record(&job).await;
                return Err(e);
            }
        };

        let waited = self
            .rate_limiter
            .wait(&domain, tokio::time::sleep(RATE_LIMIT_WAIT_TIMEOUT))
            .await;
        if !waited {
            job.fail("rate limiter wait timed out");
            let _ = self.jobs.record(&job).await;
            return Err(NewsroomError::Timeout(format!(
                "rate limiter wait timed out for {domain}"
            )));
        }

        let client = self.client.clone();
        let feed_url_owned = feed_url.to_string();
        let source_name = source.name.clone();
        let fetch_result = self
            .circuit_breakers
            .call(&source.name, CIRCUIT_BREAKER_THRESHOLD, CIRCUIT_BREAKER_TIMEOUT, || async move {
                fetch_feed(&client, &feed_url_owned, &source_name).await
            })
            .await;

        let drafts = match fetch_result {
            Ok(drafts) => drafts,
            Err(e) => {
                job.fail(e.to_string());
                let _ = self.jobs.record(&job).await;
                return Err(e);
            }
        };

        let filtered = if self.enable_duplicate_detection {
            let urls: Vec<String> = drafts
                .iter()
                .map(|d| d.url.clone())
                .filter(|u| !u.is_empty())
                .collect();
            let exists = self.articles.exists_by_url_batch(&urls).await?;
            drafts
                .into_iter()
                .filter(|d| !d.url.is_empty() && !exists.get(&d.url).copied().unwrap_or(false))
                .collect::<Vec<_>>()
        } else {
            drafts.into_iter().filter(|d| !d.url.is_empty()).collect()
        };

        let (inserted, storage_errors) = self.insert_filtered(&filtered).await;

        if storage_errors == 0 {
            job.complete(inserted as u32);
        } else {
            job.complete_partial(inserted as u32, format!("{storage_errors} article(s) failed to store"));
        }
        let _ = self.jobs.record(&job).await;

        Ok(ScrapeOutcome { job, inserted })
    }

    /// Inserts in one batched statement when possible; falls back to
    /// per-article inserts only when the batch itself fails, so a handful of
    /// bad rows can't take the whole job down. `DuplicateKey` is expected
    /// (a row landed concurrently between the dedup check and this insert)
    /// and is never counted as a storage error.
    async fn insert_filtered(&self, filtered: &[crate::types::ArticleCreate]) -> (u64, u32) {
        if filtered.is_empty() {
            return (0, 0);
        }

        match self.articles.create_batch(filtered).await {
            Ok(inserted) => (inserted, 0),
            Err(e) => {
                tracing::warn!(error = %e, "batched insert failed, falling back to per-article inserts");
                let mut inserted = 0u64;
                let mut errors = 0u32;
                for draft in filtered {
                    match self.articles.create(draft).await {
                        Ok(_) => inserted += 1,
                        Err(NewsroomError::DuplicateKey(_)) => {}
                        Err(e) => {
                            tracing::warn!(url = %draft.url, error = %e, "failed to store scraped article");
                            errors += 1;
                        }
                    }
                }
                (inserted, errors)
            }
        }
    }

    /// Concurrent per-source scraping, hard cap 3. A failing source does not
    /// cancel its siblings.
    pub async fn scrape_all_sources(&self, sources: &[(Source, String)]) -> Vec<Result<ScrapeOutcome>> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_SOURCES));
        let mut handles = Vec::with_capacity(sources.len());

        for (source, feed_url) in sources {
            let semaphore = semaphore.clone();
            let source = source.clone();
            let feed_url = feed_url.clone();
            let this = self.clone_refs();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                this.scrape_source(&source, &feed_url).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push(Err(NewsroomError::RemoteError(format!("scrape task panicked: {e}")))),
            }
        }
        results
    }

    /// Up to `policy.attempts` attempts with exponential backoff and ±20%
    /// jitter, starting at 5s. Rate-limit-classified errors use a 3x
    /// multiplier. Honors cancellation.
    pub async fn scrape_with_retry(
        &self,
        source: &Source,
        feed_url: &str,
        attempts: u32,
        cancel: impl std::future::Future<Output = ()>,
    ) -> Result<ScrapeOutcome> {
        let policy = RetryPolicy::new(attempts, Duration::from_secs(5), 2.0, Duration::from_secs(5 * 60))
            .with_rate_limit_multiplier(3.0);

        retry_with_backoff(policy, cancel, |_attempt| self.scrape_source(source, feed_url)).await
    }

    /// Run counts over the last `hours` hours, across all sources.
    pub async fn get_scraper_stats(&self, hours: i32) -> Result<ScraperStats> {
        self.jobs.get_stats(hours).await
    }

    fn clone_refs(&self) -> Self {
        Self {
            client: self.client.clone(),
            articles: self.articles.clone(),
            jobs: self.jobs.clone(),
            rate_limiter: self.rate_limiter.clone(),
            robots: self.robots.clone(),
            circuit_breakers: self.circuit_breakers.clone(),
            enable_robots_check: self.enable_robots_check,
            enable_duplicate_detection: self.enable_duplicate_detection,
        }
    }
}

fn resolve_domain(feed_url: &str) -> Result<String> {
    Url::parse(feed_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .ok_or_else(|| NewsroomError::ValidationError(format!("invalid feed url: {feed_url}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_domain_extracts_host() {
        assert_eq!(resolve_domain("https://nos.nl/rss").unwrap(), "nos.nl");
    }

    #[test]
    fn resolve_domain_rejects_unparseable_urls() {
        assert!(resolve_domain("not a url").is_err());
    }
}
