//! User-agent rotator.
//!
//! Per DESIGN.md's open-question decision, there is no silent fallback to a
//! fixed default string: an empty pool is a misconfiguration and panics at
//! construction, fail-fast posture toward invalid
//! setup rather than degrading to an identifiable default.

use rand::seq::SliceRandom;
use rand::thread_rng;

pub struct UserAgentRotator {
    pool: Vec<String>,
}

impl UserAgentRotator {
    pub fn new(pool: Vec<String>) -> Self {
        assert!(!pool.is_empty(), "UserAgentRotator requires a non-empty pool");
        Self { pool }
    }

    /// A reasonable default pool of common desktop browser UAs.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
        ])
    }

    pub fn next(&self) -> &str {
        self.pool
            .choose(&mut thread_rng())
            .expect("pool is non-empty by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "non-empty")]
    fn empty_pool_panics() {
        UserAgentRotator::new(vec![]);
    }

    #[test]
    fn next_always_returns_from_pool() {
        let rotator = UserAgentRotator::with_defaults();
        for _ in 0..20 {
            let ua = rotator.next();
            assert!(rotator.pool.iter().any(|p| p == ua));
        }
    }
}
