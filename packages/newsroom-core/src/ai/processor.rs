//! Background AI processor: adaptive polling interval, a small worker pool,
//! and a graceful-degradation state machine that backs off when the
//! provider is unhealthy.

use crate::ai::enrichment_service::EnrichmentService;
use crate::error::Result;
use crate::market::TickerEnricher;
use crate::repository::ArticleRepository;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

const OVERALL_DEADLINE: Duration = Duration::from_secs(5 * 60);
const MAX_WORKERS: usize = 4;
const DEGRADE_THRESHOLD: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(30);
const BACKOFF_MAX: Duration = Duration::from_secs(10 * 60);

/// Explicit state machine rather than a bare failure counter: each state
/// carries the data the next transition needs (how many consecutive
/// failures, or how long we're already backing off), so the `tick` loop
/// never has to reconstruct it from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Health {
    Healthy,
    Degrading { consecutive_failures: u32 },
    BackingOff { since_failures: u32 },
}

/// `0` pending -> 10min, `<10` -> 5min, `<50` -> 2min, else 1min.
fn adaptive_interval(pending: i64) -> Duration {
    if pending == 0 {
        Duration::from_secs(10 * 60)
    } else if pending < 10 {
        Duration::from_secs(5 * 60)
    } else if pending < 50 {
        Duration::from_secs(2 * 60)
    } else {
        Duration::from_secs(60)
    }
}

fn backoff_for(since_failures: u32) -> Duration {
    let ms = BACKOFF_BASE.as_millis() as u64 * 2u64.saturating_pow(since_failures.saturating_sub(DEGRADE_THRESHOLD));
    Duration::from_millis(ms).min(BACKOFF_MAX)
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ProcessorRunOutcome {
    pub processed: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    pub runs: u64,
    pub articles_processed: u64,
    pub articles_failed: u64,
    pub last_run_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub current_interval: Duration,
    pub consecutive_errors: u32,
    pub backoff: Option<Duration>,
}

pub struct AiProcessor {
    enrichment: Arc<EnrichmentService>,
    articles: Arc<ArticleRepository>,
    ticker_enricher: Arc<TickerEnricher>,
    running: AtomicBool,
    trigger: Notify,
    health: Mutex<Health>,
    stats_runs: AtomicU32,
    stats_processed: AtomicU32,
    stats_failed: AtomicU32,
    last_run: Mutex<Option<DateTime<Utc>>>,
    last_run_error: Mutex<Option<String>>,
    current_interval: Mutex<Duration>,
}

impl AiProcessor {
    pub fn new(
        enrichment: Arc<EnrichmentService>,
        articles: Arc<ArticleRepository>,
        ticker_enricher: Arc<TickerEnricher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            enrichment,
            articles,
            ticker_enricher,
            running: AtomicBool::new(false),
            trigger: Notify::new(),
            health: Mutex::new(Health::Healthy),
            stats_runs: AtomicU32::new(0),
            stats_processed: AtomicU32::new(0),
            stats_failed: AtomicU32::new(0),
            last_run: Mutex::new(None),
            last_run_error: Mutex::new(None),
            current_interval: Mutex::new(adaptive_interval(0)),
        })
    }

    pub async fn stats(&self) -> ProcessorStats {
        let health = *self.health.lock().await;
        let (consecutive_errors, backoff) = match health {
            Health::Healthy => (0, None),
            Health::Degrading { consecutive_failures } => (consecutive_failures, None),
            Health::BackingOff { since_failures } => (since_failures, Some(backoff_for(since_failures))),
        };
        ProcessorStats {
            runs: self.stats_runs.load(Ordering::Relaxed) as u64,
            articles_processed: self.stats_processed.load(Ordering::Relaxed) as u64,
            articles_failed: self.stats_failed.load(Ordering::Relaxed) as u64,
            last_run_error: self.last_run_error.lock().await.clone(),
            last_run: *self.last_run.lock().await,
            current_interval: *self.current_interval.lock().await,
            consecutive_errors,
            backoff,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Single-instance lock: a second `start` on an already-running processor
    /// is a no-op rather than spawning a competing loop.
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

    /// Wakes the loop immediately instead of waiting out the current
    /// adaptive interval.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    async fn run_loop(self: Arc<Self>) {
        info!("AI processor started");
        while self.running.load(Ordering::SeqCst) {
            let interval = {
                let health = *self.health.lock().await;
                match health {
                    Health::BackingOff { since_failures } => backoff_for(since_failures),
                    _ => {
                        let pending = self.count_pending().await.unwrap_or(0);
                        adaptive_interval(pending)
                    }
                }
            };
            *self.current_interval.lock().await = interval;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.trigger.notified() => {}
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.run_once().await;
        }
        info!("AI processor stopped");
    }

    async fn count_pending(&self) -> Result<i64> {
        let ids = self.articles.get_pending_article_ids(200).await?;
        Ok(ids.len() as i64)
    }

    /// Runs the same pipeline as the background loop's tick, immediately,
    /// and returns the aggregate result to the caller instead of only
    /// updating the cumulative stats counters.
    pub async fn manual_trigger(&self) -> ProcessorRunOutcome {
        self.run_once().await
    }

    /// One processing pass with a hard 5 minute deadline, regardless of how
    /// much work remains in the queue at that point.
    pub async fn run_once(&self) -> ProcessorRunOutcome {
        self.stats_runs.fetch_add(1, Ordering::Relaxed);
        *self.last_run.lock().await = Some(Utc::now());
        let deadline = tokio::time::sleep(OVERALL_DEADLINE);
        tokio::pin!(deadline);

        let batch = match self.articles.get_articles_needing_ai(200).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to load articles needing AI enrichment");
                *self.last_run_error.lock().await = Some(e.to_string());
                self.record_failure().await;
                return ProcessorRunOutcome { processed: 0, failed: 0 };
            }
        };

        if batch.is_empty() {
            *self.last_run_error.lock().await = None;
            self.record_success().await;
            return ProcessorRunOutcome { processed: 0, failed: 0 };
        }

        let worker_count = MAX_WORKERS.min(batch.len()).max(1);
        let (tx, rx) = mpsc::channel(batch.len());
        for item in batch {
            let _ = tx.send(item).await;
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx = rx.clone();
            let enrichment = self.enrichment.clone();
            handles.push(tokio::spawn(async move {
                let mut processed = 0u32;
                let mut failed = 0u32;
                let mut succeeded_ids = Vec::new();
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some((id, title, summary)) = next else { break };
                    match enrichment.process_one(id, &title, &summary).await {
                        Ok(()) => {
                            processed += 1;
                            succeeded_ids.push(id);
                        }
                        Err(e) => {
                            debug!(article_id = %id, error = %e, "worker failed to enrich article");
                            failed += 1;
                        }
                    }
                }
                (processed, failed, succeeded_ids)
            }));
        }

        let mut total_processed = 0u32;
        let mut total_failed = 0u32;
        let mut succeeded_ids = Vec::new();
        let mut last_error: Option<String> = None;
        let joined = futures::future::join_all(handles);
        tokio::select! {
            results = joined => {
                for result in results {
                    if let Ok((processed, failed, ids)) = result {
                        total_processed += processed;
                        total_failed += failed;
                        succeeded_ids.extend(ids);
                    }
                }
            }
            _ = &mut deadline => {
                warn!("AI processor run exceeded its deadline, remaining work deferred to the next run");
                last_error = Some("run exceeded its deadline".to_string());
            }
        }

        self.stats_processed.fetch_add(total_processed, Ordering::Relaxed);
        self.stats_failed.fetch_add(total_failed, Ordering::Relaxed);

        if !succeeded_ids.is_empty() {
            self.enrich_tickers(&succeeded_ids).await;
        }

        *self.last_run_error.lock().await = last_error;

        if total_failed > 0 && total_processed == 0 {
            self.record_failure().await;
        } else {
            self.record_success().await;
        }

        ProcessorRunOutcome { processed: total_processed, failed: total_failed }
    }

    /// Final pipeline stage: re-fetches each just-enriched article (so the
    /// ticker entities it needs are populated) and resolves every stock
    /// symbol mentioned across the whole batch with one market-data call.
    async fn enrich_tickers(&self, ids: &[uuid::Uuid]) {
        let mut batch = Vec::with_capacity(ids.len());
        for id in ids {
            match self.articles.get_by_id(*id).await {
                Ok(article) => batch.push((*id, article)),
                Err(e) => debug!(article_id = %id, error = %e, "could not reload article for ticker enrichment"),
            }
        }
        if batch.is_empty() {
            return;
        }
        if let Err(e) = self.ticker_enricher.enrich_batch(&batch).await {
            warn!(error = %e, "ticker enrichment failed for this batch");
        }
    }

    async fn record_success(&self) {
        let mut health = self.health.lock().await;
        *health = Health::Healthy;
    }

    async fn record_failure(&self) {
        let mut health = self.health.lock().await;
        *health = match *health {
            Health::Healthy => Health::Degrading { consecutive_failures: 1 },
            Health::Degrading { consecutive_failures } if consecutive_failures + 1 < DEGRADE_THRESHOLD => {
                Health::Degrading { consecutive_failures: consecutive_failures + 1 }
            }
            Health::Degrading { consecutive_failures } => Health::BackingOff { since_failures: consecutive_failures + 1 },
            Health::BackingOff { since_failures } => Health::BackingOff { since_failures: since_failures + 1 },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_interval_matches_pending_bands() {
        assert_eq!(adaptive_interval(0), Duration::from_secs(600));
        assert_eq!(adaptive_interval(5), Duration::from_secs(300));
        assert_eq!(adaptive_interval(49), Duration::from_secs(120));
        assert_eq!(adaptive_interval(50), Duration::from_secs(60));
    }

    #[test]
    fn backoff_grows_but_is_capped() {
        let first = backoff_for(DEGRADE_THRESHOLD);
        let later = backoff_for(DEGRADE_THRESHOLD + 10);
        assert!(first < later);
        assert!(later <= BACKOFF_MAX);
    }

    #[tokio::test]
    async fn health_transitions_from_healthy_through_degrading_to_backing_off() {
        let mut health = Health::Healthy;
        for _ in 0..DEGRADE_THRESHOLD {
            health = match health {
                Health::Healthy => Health::Degrading { consecutive_failures: 1 },
                Health::Degrading { consecutive_failures } if consecutive_failures + 1 < DEGRADE_THRESHOLD => {
                    Health::Degrading { consecutive_failures: consecutive_failures + 1 }
                }
                Health::Degrading { consecutive_failures } => Health::BackingOff { since_failures: consecutive_failures + 1 },
                Health::BackingOff { since_failures } => Health::BackingOff { since_failures: since_failures + 1 },
            };
        }
        assert!(matches!(health, Health::BackingOff { .. }));
    }
}
