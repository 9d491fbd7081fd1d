use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use newsroom_core::content::ContentProcessorStats;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractContentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ExtractContentResponse {
    pub extracted: u64,
    pub failed: u64,
}

pub async fn extract_content(
    Extension(state): Extension<AppState>,
    Query(params): Query<ExtractContentQuery>,
) -> Result<Json<ExtractContentResponse>, StatusCode> {
    let stats = state
        .content_processor
        .run_once(params.limit.unwrap_or(25))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(ExtractContentResponse { extracted: stats.extracted, failed: stats.failed }))
}

pub async fn get_content_extraction_stats(Extension(state): Extension<AppState>) -> Json<ContentProcessorStats> {
    Json(state.content_processor.get_content_extraction_stats())
}
