//! Shared application state, injected into handlers via `Extension`.

use newsroom_core::ai::{AiProcessor, AiProviderClient, EnrichmentService};
use newsroom_core::content::ContentProcessor;
use newsroom_core::market::TickerEnricher;
use newsroom_core::repository::{ArticleRepository, JobRepository};
use newsroom_core::resilience::{CircuitBreakerManager, RateLimiter, ResponseCache, RobotsChecker};
use newsroom_core::scraper::ScraperService;
use newsroom_core::Config;
use marketdata_client::MarketDataClient;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub articles: Arc<ArticleRepository>,
    pub jobs: Arc<JobRepository>,
    pub scraper: Arc<ScraperService>,
    pub ai_provider: Arc<AiProviderClient>,
    pub enrichment_service: Arc<EnrichmentService>,
    pub ai_processor: Arc<AiProcessor>,
    pub content_processor: Arc<ContentProcessor>,
    pub ticker_enricher: Arc<TickerEnricher>,
    pub market_data: Arc<MarketDataClient>,
    pub rate_limiter: Arc<RateLimiter>,
    pub robots: Arc<RobotsChecker>,
    pub circuit_breakers: Arc<CircuitBreakerManager>,
    /// External Redis-like cache for list/search/analytics responses. `None`
    /// when no external cache is configured; callers fall back to hitting
    /// the repository directly.
    pub response_cache: Option<Arc<dyn ResponseCache>>,
}

impl AppState {
    /// Reads a cached JSON response, if an external cache is configured and
    /// the key is present.
    pub async fn read_cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.response_cache.as_ref()?.get(key).await?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Populates the external cache with a JSON-serialized response, if one
    /// is configured. A no-op otherwise.
    pub async fn write_cached<T: serde::Serialize>(&self, key: &str, value: &T, ttl: std::time::Duration) {
        let Some(cache) = self.response_cache.as_ref() else { return };
        if let Ok(bytes) = serde_json::to_vec(value) {
            cache.set(key, bytes, ttl).await;
        }
    }
}
