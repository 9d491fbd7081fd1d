use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use newsroom_core::repository::ArticleFilter;
use newsroom_core::types::Article;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::state::AppState;

const LIST_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    pub source: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListArticlesResponse {
    pub articles: Vec<Article>,
    pub total: i64,
}

/// Checks the external response cache before falling back to the
/// repository; populates the cache on a miss.
pub async fn list_articles(
    Extension(state): Extension<AppState>,
    Query(params): Query<ListArticlesQuery>,
) -> Result<Json<ListArticlesResponse>, StatusCode> {
    let mut filter = ArticleFilter::new();
    filter.source = params.source;
    filter.limit = params.limit.unwrap_or(50).min(200);
    filter.offset = params.offset.unwrap_or(0);

    let cache_key = format!(
        "articles:list:{}:{}:{}",
        filter.source.as_deref().unwrap_or(""),
        filter.limit,
        filter.offset
    );
    if let Some(cached) = state.read_cached(&cache_key).await {
        return Ok(Json(cached));
    }

    let (articles, total) = state
        .articles
        .list_light(&filter)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = ListArticlesResponse { articles, total };
    state.write_cached(&cache_key, &response, LIST_CACHE_TTL).await;
    Ok(Json(response))
}

pub async fn get_article(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, StatusCode> {
    state
        .articles
        .get_by_id(id)
        .await
        .map(Json)
        .map_err(|e| match e {
            newsroom_core::NewsroomError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        })
}

#[derive(Debug, Deserialize)]
pub struct SearchArticlesQuery {
    pub q: String,
    pub source: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn search_articles(
    Extension(state): Extension<AppState>,
    Query(params): Query<SearchArticlesQuery>,
) -> Result<Json<ListArticlesResponse>, StatusCode> {
    let mut filter = ArticleFilter::new();
    filter.source = params.source;
    filter.limit = params.limit.unwrap_or(50).min(200);
    filter.offset = params.offset.unwrap_or(0);

    let cache_key = format!(
        "articles:search:{}:{}:{}:{}",
        params.q,
        filter.source.as_deref().unwrap_or(""),
        filter.limit,
        filter.offset
    );
    if let Some(cached) = state.read_cached(&cache_key).await {
        return Ok(Json(cached));
    }

    let (articles, total) = state
        .articles
        .search_light(&filter, &params.q)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let response = ListArticlesResponse { articles, total };
    state.write_cached(&cache_key, &response, LIST_CACHE_TTL).await;
    Ok(Json(response))
}
