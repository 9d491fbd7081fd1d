//! Typed configuration, with named profiles for common deployment shapes.
//!
//! Loading from the environment is the `server` binary's job; this module
//! only defines the shape and the four named profiles.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub target_sites: Vec<String>,
    pub rate_limit_seconds: u64,
    pub max_concurrent: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub schedule_interval_min: u64,
    pub enable_browser_scraping: bool,
    pub browser_pool_size: usize,
    pub browser_timeout_seconds: u64,
    pub browser_wait_after_load_ms: u64,
    pub browser_fallback_only: bool,
    pub browser_max_concurrent: usize,
    pub enable_full_content_extraction: bool,
    pub content_batch_size: usize,
    pub enable_robots_check: bool,
    pub enable_duplicate_detection: bool,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub ai_enabled: bool,
    pub ai_async_processing: bool,
    pub ai_batch_size: usize,
    pub ai_process_interval: Duration,
    pub enable_sentiment: bool,
    pub enable_entities: bool,
    pub enable_categories: bool,
    pub enable_keywords: bool,
    pub enable_summary: bool,
    pub openai_model: String,
    pub openai_api_key: String,
    pub openai_max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub provider: String,
    pub api_key: String,
    pub cache_ttl_seconds: u64,
    pub rate_limit_per_minute: u32,
    pub enable_cache: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub ai: AiConfig,
    pub market_data: MarketDataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::balanced()
    }
}

impl Config {
    /// Aggressive timing, minimal safety margins. Useful for local iteration
    /// against a small set of known-friendly sources.
    pub fn fast() -> Self {
        Self {
            scraper: ScraperConfig {
                target_sites: Vec::new(),
                rate_limit_seconds: 1,
                max_concurrent: 3,
                timeout_seconds: 10,
                retry_attempts: 2,
                schedule_interval_min: 5,
                enable_browser_scraping: false,
                browser_pool_size: 2,
                browser_timeout_seconds: 15,
                browser_wait_after_load_ms: 500,
                browser_fallback_only: true,
                browser_max_concurrent: 2,
                enable_full_content_extraction: true,
                content_batch_size: 20,
                enable_robots_check: true,
                enable_duplicate_detection: true,
            },
            ai: AiConfig {
                ai_enabled: true,
                ai_async_processing: true,
                ai_batch_size: 10,
                ai_process_interval: Duration::from_secs(60),
                enable_sentiment: true,
                enable_entities: true,
                enable_categories: true,
                enable_keywords: true,
                enable_summary: false,
                openai_model: "gpt-4o-mini".to_string(),
                openai_api_key: String::new(),
                openai_max_tokens: 1024,
            },
            market_data: MarketDataConfig {
                provider: "fmp".to_string(),
                api_key: String::new(),
                cache_ttl_seconds: 300,
                rate_limit_per_minute: 120,
                enable_cache: true,
            },
        }
    }

    /// The default profile: reasonable timing for a production deployment
    /// against a moderate number of sources.
    pub fn balanced() -> Self {
        Self {
            scraper: ScraperConfig {
                target_sites: Vec::new(),
                rate_limit_seconds: 3,
                max_concurrent: 3,
                timeout_seconds: 30,
                retry_attempts: 3,
                schedule_interval_min: 15,
                enable_browser_scraping: true,
                browser_pool_size: 3,
                browser_timeout_seconds: 30,
                browser_wait_after_load_ms: 1500,
                browser_fallback_only: true,
                browser_max_concurrent: 2,
                enable_full_content_extraction: true,
                content_batch_size: 30,
                enable_robots_check: true,
                enable_duplicate_detection: true,
            },
            ai: AiConfig {
                ai_enabled: true,
                ai_async_processing: true,
                ai_batch_size: 10,
                ai_process_interval: Duration::from_secs(5 * 60),
                enable_sentiment: true,
                enable_entities: true,
                enable_categories: true,
                enable_keywords: true,
                enable_summary: true,
                openai_model: "gpt-4o-mini".to_string(),
                openai_api_key: String::new(),
                openai_max_tokens: 2048,
            },
            market_data: MarketDataConfig {
                provider: "fmp".to_string(),
                api_key: String::new(),
                cache_ttl_seconds: 300,
                rate_limit_per_minute: 60,
                enable_cache: true,
            },
        }
    }

    /// Wider timeouts, more retries, full browser extraction enabled by
    /// default. For sources known to be slow or heavily scripted.
    pub fn deep() -> Self {
        let mut cfg = Self::balanced();
        cfg.scraper.timeout_seconds = 60;
        cfg.scraper.retry_attempts = 5;
        cfg.scraper.browser_fallback_only = false;
        cfg.scraper.browser_wait_after_load_ms = 3000;
        cfg.scraper.content_batch_size = 50;
        cfg.ai.ai_batch_size = 10;
        cfg.ai.openai_max_tokens = 4096;
        cfg
    }

    /// Wide rate-limit margins and low concurrency. For sources that are
    /// known to be sensitive to scraping load.
    pub fn conservative() -> Self {
        let mut cfg = Self::balanced();
        cfg.scraper.rate_limit_seconds = 10;
        cfg.scraper.max_concurrent = 1;
        cfg.scraper.browser_max_concurrent = 1;
        cfg.scraper.content_batch_size = 10;
        cfg.ai.ai_batch_size = 5;
        cfg.ai.ai_process_interval = Duration::from_secs(10 * 60);
        cfg.market_data.rate_limit_per_minute = 20;
        cfg
    }

    pub fn with_target_sites(mut self, sites: Vec<String>) -> Self {
        self.scraper.target_sites = sites;
        self
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.ai.openai_api_key = key.into();
        self
    }

    pub fn with_market_data_api_key(mut self, key: impl Into<String>) -> Self {
        self.market_data.api_key = key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_profile_widens_timeouts_relative_to_balanced() {
        let balanced = Config::balanced();
        let deep = Config::deep();
        assert!(deep.scraper.timeout_seconds > balanced.scraper.timeout_seconds);
        assert!(deep.scraper.retry_attempts > balanced.scraper.retry_attempts);
        assert!(!deep.scraper.browser_fallback_only);
    }

    #[test]
    fn conservative_profile_lowers_concurrency() {
        let conservative = Config::conservative();
        assert_eq!(conservative.scraper.max_concurrent, 1);
        assert!(conservative.scraper.rate_limit_seconds >= 10);
    }

    #[test]
    fn builder_methods_are_chainable() {
        let cfg = Config::balanced()
            .with_target_sites(vec!["nos.nl".to_string()])
            .with_openai_api_key("sk-test")
            .with_market_data_api_key("fmp-test");
        assert_eq!(cfg.scraper.target_sites, vec!["nos.nl".to_string()]);
        assert_eq!(cfg.ai.openai_api_key, "sk-test");
        assert_eq!(cfg.market_data.api_key, "fmp-test");
    }
}
