//! Source data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub domain: String,
    pub rss_feed_url: Option<String>,
    pub use_rss: bool,
    pub use_dynamic: bool,
    pub is_active: bool,
    pub rate_limit_seconds: u64,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_articles_scraped: u64,
}

impl Source {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            rss_feed_url: None,
            use_rss: true,
            use_dynamic: false,
            is_active: true,
            rate_limit_seconds: 3,
            last_scraped_at: None,
            consecutive_failures: 0,
            total_articles_scraped: 0,
        }
    }

    /// At least one of use_rss/use_dynamic must be true.
    pub fn is_valid(&self) -> bool {
        self.use_rss || self.use_dynamic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_source_uses_rss() {
        let s = Source::new("NOS", "nos.nl");
        assert!(s.is_valid());
    }

    #[test]
    fn source_with_neither_mode_is_invalid() {
        let mut s = Source::new("NOS", "nos.nl");
        s.use_rss = false;
        s.use_dynamic = false;
        assert!(!s.is_valid());
    }
}
