use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use marketdata_client::StockQuote;
use serde::Deserialize;
use std::collections::HashMap;

use crate::state::AppState;

pub async fn get_quote(
    Extension(state): Extension<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<StockQuote>, StatusCode> {
    state
        .market_data
        .get_quote(&symbol)
        .await
        .map(Json)
        .map_err(|_| StatusCode::BAD_GATEWAY)
}

#[derive(Debug, Deserialize)]
pub struct BatchQuotesQuery {
    pub symbols: String,
}

pub async fn get_batch_quotes(
    Extension(state): Extension<AppState>,
    Query(params): Query<BatchQuotesQuery>,
) -> Result<Json<HashMap<String, StockQuote>>, StatusCode> {
    let symbols: Vec<String> = params.symbols.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect();
    state
        .market_data
        .get_multiple_quotes(&symbols)
        .await
        .map(Json)
        .map_err(|_| StatusCode::BAD_GATEWAY)
}
