use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: DatabaseHealth,
    scraper_circuit_breakers_reset: bool,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Checks database connectivity only; the scraper/AI/content loops report
/// their own health via `/stats` once they have run at least once.
pub async fn health_handler(Extension(state): Extension<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_health = match tokio::time::timeout(std::time::Duration::from_secs(5), sqlx::query("SELECT 1").execute(&state.db_pool)).await {
        Ok(Ok(_)) => DatabaseHealth { status: "ok".to_string(), error: None },
        Ok(Err(e)) => DatabaseHealth { status: "error".to_string(), error: Some(e.to_string()) },
        Err(_) => DatabaseHealth { status: "error".to_string(), error: Some("query timeout".to_string()) },
    };

    let healthy = db_health.status == "ok";
    let status_code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            database: db_health,
            scraper_circuit_breakers_reset: false,
        }),
    )
}
