use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use newsroom_core::ai::{EnrichmentOutcome, ProcessorRunOutcome};
use newsroom_core::types::AiEnrichment;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessArticleRequest {
    pub id: Uuid,
}

/// Loads the article server-side instead of trusting a caller-supplied
/// title/content, so this can't be used to overwrite arbitrary enrichment
/// with attacker-chosen text and respects the already-processed skip.
pub async fn process_article(
    Extension(state): Extension<AppState>,
    Json(req): Json<ProcessArticleRequest>,
) -> Result<StatusCode, StatusCode> {
    state
        .enrichment_service
        .process_article(req.id)
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Runs one processing pass immediately and returns its aggregate result,
/// rather than only waking the background loop.
pub async fn manual_trigger(Extension(state): Extension<AppState>) -> Json<ProcessorRunOutcome> {
    Json(state.ai_processor.manual_trigger().await)
}

#[derive(Debug, Deserialize)]
pub struct ProcessPendingQuery {
    pub limit: Option<i64>,
}

pub async fn process_pending(
    Extension(state): Extension<AppState>,
    Query(params): Query<ProcessPendingQuery>,
) -> Result<Json<EnrichmentOutcome>, StatusCode> {
    state
        .enrichment_service
        .process_pending(params.limit.unwrap_or(50).min(200))
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn get_enrichment(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<AiEnrichment>>, StatusCode> {
    state
        .enrichment_service
        .get_enrichment(id)
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Deserialize)]
pub struct RetryFailedQuery {
    pub limit: Option<i64>,
}

pub async fn retry_failed(
    Extension(state): Extension<AppState>,
    Query(params): Query<RetryFailedQuery>,
) -> Result<Json<EnrichmentOutcome>, StatusCode> {
    state
        .enrichment_service
        .retry_failed(params.limit.unwrap_or(50).min(200))
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Serialize)]
pub struct AiStatsResponse {
    pub runs: u64,
    pub articles_processed: u64,
    pub articles_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub running: bool,
    pub last_run: Option<chrono::DateTime<chrono::Utc>>,
    pub last_run_error: Option<String>,
    pub current_interval_secs: u64,
    pub consecutive_errors: u32,
    pub backoff_secs: Option<u64>,
}

pub async fn get_stats(Extension(state): Extension<AppState>) -> Json<AiStatsResponse> {
    let stats = state.ai_processor.stats().await;
    Json(AiStatsResponse {
        runs: stats.runs,
        articles_processed: stats.articles_processed,
        articles_failed: stats.articles_failed,
        cache_hits: state.ai_provider.cache_hit_count(),
        cache_misses: state.ai_provider.cache_miss_count(),
        running: state.ai_processor.is_running(),
        last_run: stats.last_run,
        last_run_error: stats.last_run_error,
        current_interval_secs: stats.current_interval.as_secs(),
        consecutive_errors: stats.consecutive_errors,
        backoff_secs: stats.backoff.map(|d| d.as_secs()),
    })
}
