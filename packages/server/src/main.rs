//! HTTP API and process entrypoint for the news aggregator.

mod routes;
mod state;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Extension, Router,
};
use marketdata_client::MarketDataClient;
use newsroom_core::ai::{AiOptions, AiProcessor, AiProviderClient, EnrichmentService};
use newsroom_core::content::ContentProcessor;
use newsroom_core::extract::{BrowserExtractor, BrowserPool, FallbackExtractor, HtmlExtractor};
use newsroom_core::market::TickerEnricher;
use newsroom_core::repository::{ArticleRepository, JobRepository};
use newsroom_core::resilience::{CircuitBreakerManager, RateLimiter, RobotsChecker, UserAgentRotator};
use newsroom_core::scraper::ScraperService;
use newsroom_core::Config;
use openai_client::OpenAIClient;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,newsroom_core=debug,server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    tracing::info!("Starting news aggregator server");

    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    let openai_api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
    let market_data_api_key = std::env::var("MARKET_DATA_API_KEY").unwrap_or_default();
    let port: u16 = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);

    let config = Arc::new(Config::balanced().with_openai_api_key(openai_api_key.clone()).with_market_data_api_key(market_data_api_key.clone()));

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.scraper.timeout_seconds))
        .build()
        .context("Failed to build HTTP client")?;

    let articles = Arc::new(ArticleRepository::new(pool.clone()));
    let jobs = Arc::new(JobRepository::new(pool.clone()));

    let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs(config.scraper.rate_limit_seconds)));
    let robots = Arc::new(RobotsChecker::new(http_client.clone(), "newsroom-aggregator-bot/1.0"));
    let circuit_breakers = Arc::new(CircuitBreakerManager::new());

    let scraper = Arc::new(ScraperService::new(
        http_client.clone(),
        articles.clone(),
        jobs.clone(),
        rate_limiter.clone(),
        robots.clone(),
        circuit_breakers.clone(),
        config.scraper.enable_robots_check,
        config.scraper.enable_duplicate_detection,
    ));

    let rotator = Arc::new(UserAgentRotator::with_defaults());
    let mut html_extractor = HtmlExtractor::new(http_client.clone(), rotator.clone());
    if config.scraper.enable_browser_scraping {
        match BrowserPool::new(config.scraper.browser_pool_size).await {
            Ok(browser_pool) => {
                let browser_extractor: Arc<dyn FallbackExtractor> = Arc::new(BrowserExtractor::new(
                    browser_pool,
                    rotator.clone(),
                    config.scraper.browser_max_concurrent,
                    Duration::from_secs(config.scraper.browser_timeout_seconds),
                    config.scraper.browser_wait_after_load_ms,
                ));
                html_extractor = html_extractor.with_fallback(browser_extractor);
            }
            Err(e) => tracing::warn!(error = %e, "browser pool unavailable, falling back to HTML-only extraction"),
        }
    }
    let html_extractor = Arc::new(html_extractor);

    let content_processor = ContentProcessor::new(articles.clone(), html_extractor.clone(), rate_limiter.clone());
    content_processor.start();

    let openai_client = OpenAIClient::new(openai_api_key);
    let ai_provider = Arc::new(AiProviderClient::new(openai_client));
    let ai_options = AiOptions::from(&config.ai);
    let enrichment_service = Arc::new(EnrichmentService::new(ai_provider.clone(), articles.clone(), ai_options));

    let market_data = Arc::new(MarketDataClient::new(market_data_api_key, config.market_data.rate_limit_per_minute));
    let ticker_enricher = Arc::new(TickerEnricher::new(market_data.clone(), articles.clone()));

    let ai_processor = AiProcessor::new(enrichment_service.clone(), articles.clone(), ticker_enricher.clone());
    if config.ai.ai_enabled && config.ai.ai_async_processing {
        ai_processor.start();
    }

    let app_state = AppState {
        db_pool: pool,
        config,
        articles,
        jobs,
        scraper,
        ai_provider,
        enrichment_service,
        ai_processor,
        content_processor,
        ticker_enricher,
        market_data,
        rate_limiter,
        robots,
        circuit_breakers,
        // No external Redis-like cache is wired up: connecting to one is
        // out of scope here, same as the database pool setup above. List,
        // search, and analytics handlers fall back to the repository.
        response_cache: None,
    };

    let app = Router::new()
        .route("/health", get(routes::health_handler))
        .route("/articles", get(routes::list_articles))
        .route("/articles/search", get(routes::search_articles))
        .route("/articles/:id", get(routes::get_article))
        .route("/scraper/source", post(routes::scrape_source))
        .route("/scraper/all", post(routes::scrape_all_sources))
        .route("/scraper/health", get(routes::get_scraper_health))
        .route("/scraper/stats", get(routes::get_scraper_stats))
        .route("/scraper/circuit-breakers", get(routes::get_circuit_breakers))
        .route("/scraper/circuit-breakers/:key", get(routes::get_circuit_breaker))
        .route("/ai/process", post(routes::process_article))
        .route("/ai/trigger", post(routes::manual_trigger))
        .route("/ai/pending", post(routes::process_pending))
        .route("/ai/stats", get(routes::get_stats))
        .route("/ai/retry", post(routes::retry_failed))
        .route("/ai/enrichment/:id", get(routes::get_enrichment))
        .route("/content/extract", post(routes::extract_content))
        .route("/content/stats", get(routes::get_content_extraction_stats))
        .route("/market/quote/:symbol", get(routes::get_quote))
        .route("/market/quotes", get(routes::get_batch_quotes))
        .route("/analytics/sentiment", get(routes::get_sentiment_aggregate))
        .route("/analytics/trending-keywords", get(routes::get_trending_keywords))
        .route("/analytics/entities/:entity", get(routes::get_articles_by_entity))
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(&addr).await.context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
