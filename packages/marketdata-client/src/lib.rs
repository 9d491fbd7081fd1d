//! Minimal REST client for a stock quote / market data provider.
//!
//! Every public method is cache-first: a hit never reaches the network, and
//! every miss is written back with an endpoint-specific TTL. [`get_multiple_quotes`]
//! is the one method the AI enrichment pipeline actually depends on for its
//! one-batch-call guarantee; the others exist for completeness and follow the
//! same shape.
//!
//! [`get_multiple_quotes`]: MarketDataClient::get_multiple_quotes

mod cache;
pub mod error;
pub mod types;

pub use error::{MarketDataError, Result};
pub use types::{
    AnalystRating, HistoricalBar, MarketMover, PriceTarget, SectorPerformance, StockNews,
    StockQuote,
};

use cache::TtlCache;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use types::RawQuote;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const MAX_FALLBACK_CONCURRENCY: usize = 5;

const QUOTE_TTL: Duration = Duration::from_secs(5 * 60);
const HISTORICAL_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const NEWS_TTL: Duration = Duration::from_secs(15 * 60);
const MOVERS_TTL: Duration = Duration::from_secs(5 * 60);
const RATINGS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const PRICE_TARGET_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SECTOR_TTL: Duration = Duration::from_secs(15 * 60);

type DirectRateLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Cache-fronted client for a quote/fundamentals provider.
///
/// One instance is meant to be shared (behind an `Arc`) across the whole
/// process; the rate limiter and caches are only useful if every caller goes
/// through the same client.
pub struct MarketDataClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    limiter: Arc<DirectRateLimiter>,
    quotes: TtlCache<StockQuote>,
    historical: TtlCache<Vec<HistoricalBar>>,
    news: TtlCache<Vec<StockNews>>,
    movers: TtlCache<Vec<MarketMover>>,
    ratings: TtlCache<AnalystRating>,
    price_targets: TtlCache<PriceTarget>,
    sectors: TtlCache<Vec<SectorPerformance>>,
}

impl MarketDataClient {
    /// `rate_limit_per_minute` becomes a token source emitting one permit
    /// every `60s / rate_limit_per_minute`.
    pub fn new(api_key: impl Into<String>, rate_limit_per_minute: u32) -> Self {
        Self::with_base_url(api_key, rate_limit_per_minute, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        rate_limit_per_minute: u32,
        base_url: String,
    ) -> Self {
        let rpm = NonZeroU32::new(rate_limit_per_minute).unwrap_or(nonzero!(60u32));
        let quota = Quota::per_minute(rpm);
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url,
            limiter: Arc::new(RateLimiter::direct(quota)),
            quotes: TtlCache::new(),
            historical: TtlCache::new(),
            news: TtlCache::new(),
            movers: TtlCache::new(),
            ratings: TtlCache::new(),
            price_targets: TtlCache::new(),
            sectors: TtlCache::new(),
        }
    }

    /// Single-symbol quote: cache, then a rate-limited provider call, then cache write.
    pub async fn get_quote(&self, symbol: &str) -> Result<StockQuote> {
        let symbol = symbol.to_uppercase();
        if let Some(cached) = self.quotes.get(&symbol) {
            return Ok(cached);
        }

        self.limiter.until_ready().await;
        let raw: Vec<RawQuote> = self.get_json(&format!("/quote/{symbol}")).await?;
        let quote = raw
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::Parse(format!("no quote returned for {symbol}")))?
            .into_quote(Utc::now());

        self.quotes.set(symbol, quote.clone(), QUOTE_TTL);
        Ok(quote)
    }

    /// Fetch quotes for many symbols with exactly one provider call whenever
    /// possible. Falls back to a bounded per-symbol fan-out only if the
    /// provider rejects the batch request as a restricted feature.
    pub async fn get_multiple_quotes(&self, symbols: &[String]) -> Result<HashMap<String, StockQuote>> {
        let mut wanted: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        wanted.sort();
        wanted.dedup();

        if wanted.is_empty() {
            return Ok(HashMap::new());
        }

        let mut result = self.quotes.get_many(&wanted);
        let missing: Vec<String> = wanted
            .into_iter()
            .filter(|s| !result.contains_key(s))
            .collect();

        if missing.is_empty() {
            return Ok(result);
        }

        match self.batch_fetch_quotes(&missing).await {
            Ok(fetched) => {
                for (symbol, quote) in fetched {
                    self.quotes.set(symbol.clone(), quote.clone(), QUOTE_TTL);
                    result.insert(symbol, quote);
                }
            }
            Err(MarketDataError::FeatureRestricted(_)) => {
                let fetched = self.fallback_fetch_quotes(&missing).await;
                for (symbol, quote) in fetched {
                    self.quotes.set(symbol.clone(), quote.clone(), QUOTE_TTL);
                    result.insert(symbol, quote);
                }
            }
            Err(e) => return Err(e),
        }

        Ok(result)
    }

    async fn batch_fetch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, StockQuote>> {
        self.limiter.until_ready().await;
        let joined = symbols.join(",");
        let raw: Vec<RawQuote> = self.get_json(&format!("/quote?symbol={joined}")).await?;
        let now = Utc::now();
        Ok(raw
            .into_iter()
            .map(|q| {
                let quote = q.into_quote(now);
                (quote.symbol.clone(), quote)
            })
            .collect())
    }

    /// Per-symbol fan-out used only when the batch endpoint is unavailable.
    /// Bounded to [`MAX_FALLBACK_CONCURRENCY`] concurrent requests and still
    /// honors the shared rate limiter for every individual call.
    async fn fallback_fetch_quotes(&self, symbols: &[String]) -> HashMap<String, StockQuote> {
        stream::iter(symbols.iter().cloned())
            .map(|symbol| async move {
                match self.get_quote(&symbol).await {
                    Ok(quote) => Some((symbol, quote)),
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "fallback quote fetch failed");
                        None
                    }
                }
            })
            .buffer_unordered(MAX_FALLBACK_CONCURRENCY)
            .filter_map(|r| async move { r })
            .collect()
            .await
    }

    pub async fn get_historical(&self, symbol: &str) -> Result<Vec<HistoricalBar>> {
        let symbol = symbol.to_uppercase();
        if let Some(cached) = self.historical.get(&symbol) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let bars: Vec<HistoricalBar> = self
            .get_json(&format!("/historical-price-full/{symbol}"))
            .await?;
        self.historical.set(symbol, bars.clone(), HISTORICAL_TTL);
        Ok(bars)
    }

    pub async fn get_news(&self, symbol: &str) -> Result<Vec<StockNews>> {
        let symbol = symbol.to_uppercase();
        if let Some(cached) = self.news.get(&symbol) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let items: Vec<StockNews> = self.get_json(&format!("/stock_news?tickers={symbol}")).await?;
        self.news.set(symbol, items.clone(), NEWS_TTL);
        Ok(items)
    }

    pub async fn get_gainers(&self) -> Result<Vec<MarketMover>> {
        self.get_movers("gainers", "/stock_market/gainers").await
    }

    pub async fn get_losers(&self) -> Result<Vec<MarketMover>> {
        self.get_movers("losers", "/stock_market/losers").await
    }

    async fn get_movers(&self, cache_key: &str, path: &str) -> Result<Vec<MarketMover>> {
        if let Some(cached) = self.movers.get(cache_key) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let items: Vec<MarketMover> = self.get_json(path).await?;
        self.movers.set(cache_key, items.clone(), MOVERS_TTL);
        Ok(items)
    }

    pub async fn get_analyst_ratings(&self, symbol: &str) -> Result<AnalystRating> {
        let symbol = symbol.to_uppercase();
        if let Some(cached) = self.ratings.get(&symbol) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let ratings: Vec<AnalystRating> = self
            .get_json(&format!("/rating/{symbol}"))
            .await?;
        let rating = ratings
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::Parse(format!("no rating returned for {symbol}")))?;
        self.ratings.set(symbol, rating.clone(), RATINGS_TTL);
        Ok(rating)
    }

    pub async fn get_price_target(&self, symbol: &str) -> Result<PriceTarget> {
        let symbol = symbol.to_uppercase();
        if let Some(cached) = self.price_targets.get(&symbol) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let targets: Vec<PriceTarget> = self
            .get_json(&format!("/price-target-consensus/{symbol}"))
            .await?;
        let target = targets
            .into_iter()
            .next()
            .ok_or_else(|| MarketDataError::Parse(format!("no price target for {symbol}")))?;
        self.price_targets.set(symbol, target.clone(), PRICE_TARGET_TTL);
        Ok(target)
    }

    pub async fn get_sector_performance(&self) -> Result<Vec<SectorPerformance>> {
        const KEY: &str = "sectors";
        if let Some(cached) = self.sectors.get(KEY) {
            return Ok(cached);
        }
        self.limiter.until_ready().await;
        let sectors: Vec<SectorPerformance> = self.get_json("/sectors-performance").await?;
        self.sectors.set(KEY, sectors.clone(), SECTOR_TTL);
        Ok(sectors)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let url = format!("{}{}{}apikey={}", self.base_url, path, separator, self.api_key);

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.as_u16() == 403 || body.to_lowercase().contains("premium") {
                return Err(MarketDataError::FeatureRestricted(body));
            }
            return Err(MarketDataError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_zero_rate_to_nonzero_default() {
        // 0 rate_limit_per_minute must not panic the quota constructor.
        let _client = MarketDataClient::new("key", 0);
    }
}
