use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use newsroom_core::repository::ScraperStats;
use newsroom_core::resilience::BreakerStats;
use newsroom_core::types::Source;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScrapeSourceRequest {
    pub source: Source,
    pub feed_url: String,
}

#[derive(Debug, Serialize)]
pub struct ScrapeSourceResponse {
    pub inserted: u64,
    pub job_status: String,
}

pub async fn scrape_source(
    Extension(state): Extension<AppState>,
    Json(req): Json<ScrapeSourceRequest>,
) -> Result<Json<ScrapeSourceResponse>, StatusCode> {
    if !req.source.is_valid() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let outcome = state
        .scraper
        .scrape_source(&req.source, &req.feed_url)
        .await
        .map_err(|_| StatusCode::BAD_GATEWAY)?;

    Ok(Json(ScrapeSourceResponse {
        inserted: outcome.inserted,
        job_status: format!("{:?}", outcome.job.status),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ScrapeAllRequest {
    pub sources: Vec<ScrapeSourceRequest>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeAllResponse {
    pub total_inserted: u64,
    pub failures: u32,
}

pub async fn scrape_all_sources(
    Extension(state): Extension<AppState>,
    Json(req): Json<ScrapeAllRequest>,
) -> Json<ScrapeAllResponse> {
    let pairs: Vec<(Source, String)> = req.sources.into_iter().map(|r| (r.source, r.feed_url)).collect();
    let results = state.scraper.scrape_all_sources(&pairs).await;

    let mut total_inserted = 0u64;
    let mut failures = 0u32;
    for result in results {
        match result {
            Ok(outcome) => total_inserted += outcome.inserted,
            Err(_) => failures += 1,
        }
    }

    Json(ScrapeAllResponse { total_inserted, failures })
}

#[derive(Debug, Serialize)]
pub struct ScraperHealthResponse {
    pub rate_limiter_delay_ms: u64,
}

pub async fn get_scraper_health(Extension(state): Extension<AppState>) -> Json<ScraperHealthResponse> {
    Json(ScraperHealthResponse {
        rate_limiter_delay_ms: state.rate_limiter.delay().as_millis() as u64,
    })
}

#[derive(Debug, Deserialize)]
pub struct ScraperStatsQuery {
    pub hours: Option<i32>,
}

pub async fn get_scraper_stats(
    Extension(state): Extension<AppState>,
    Query(params): Query<ScraperStatsQuery>,
) -> Result<Json<ScraperStats>, StatusCode> {
    state
        .scraper
        .get_scraper_stats(params.hours.unwrap_or(24))
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// One breaker's state/counters/timestamps, keyed by source.
pub async fn get_circuit_breaker(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
) -> Result<Json<BreakerStats>, StatusCode> {
    state.circuit_breakers.stats(&key).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Every breaker the manager has tripped or admitted through, keyed by source.
pub async fn get_circuit_breakers(Extension(state): Extension<AppState>) -> Json<HashMap<String, BreakerStats>> {
    Json(state.circuit_breakers.all_stats().await)
}
