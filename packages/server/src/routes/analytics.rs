use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use newsroom_core::types::Article;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::state::AppState;

/// Analytics aggregates move slower than the article stream itself, so they
/// tolerate a longer TTL than the list/search cache.
const ANALYTICS_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentimentAggregateEntry {
    pub category: String,
    pub avg_sentiment: f64,
    pub article_count: i64,
}

pub async fn get_sentiment_aggregate(
    Extension(state): Extension<AppState>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<Vec<SentimentAggregateEntry>>, StatusCode> {
    let days = params.days.unwrap_or(7);
    let cache_key = format!("analytics:sentiment:{days}");
    if let Some(cached) = state.read_cached(&cache_key).await {
        return Ok(Json(cached));
    }

    let rows = state
        .articles
        .sentiment_aggregate(days)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let entries: Vec<SentimentAggregateEntry> = rows
        .into_iter()
        .map(|(category, avg_sentiment, article_count)| SentimentAggregateEntry {
            category,
            avg_sentiment,
            article_count,
        })
        .collect();

    state.write_cached(&cache_key, &entries, ANALYTICS_CACHE_TTL).await;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct TrendingKeywordsQuery {
    pub days: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendingKeywordEntry {
    pub keyword: String,
    pub occurrences: i64,
}

pub async fn get_trending_keywords(
    Extension(state): Extension<AppState>,
    Query(params): Query<TrendingKeywordsQuery>,
) -> Result<Json<Vec<TrendingKeywordEntry>>, StatusCode> {
    let days = params.days.unwrap_or(7);
    let limit = params.limit.unwrap_or(20);
    let cache_key = format!("analytics:trending-keywords:{days}:{limit}");
    if let Some(cached) = state.read_cached(&cache_key).await {
        return Ok(Json(cached));
    }

    let rows = state
        .articles
        .trending_keywords(days, limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let entries: Vec<TrendingKeywordEntry> = rows
        .into_iter()
        .map(|(keyword, occurrences)| TrendingKeywordEntry { keyword, occurrences })
        .collect();

    state.write_cached(&cache_key, &entries, ANALYTICS_CACHE_TTL).await;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct EntityArticlesQuery {
    pub limit: Option<i64>,
}

pub async fn get_articles_by_entity(
    Extension(state): Extension<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<EntityArticlesQuery>,
) -> Result<Json<Vec<Article>>, StatusCode> {
    let limit = params.limit.unwrap_or(50).min(200);
    let cache_key = format!("analytics:entity:{entity}:{limit}");
    if let Some(cached) = state.read_cached(&cache_key).await {
        return Ok(Json(cached));
    }

    let articles = state
        .articles
        .articles_by_entity(&entity, limit)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    state.write_cached(&cache_key, &articles, ANALYTICS_CACHE_TTL).await;
    Ok(Json(articles))
}
