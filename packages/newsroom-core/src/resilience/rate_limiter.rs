//! Per-domain rate limiter.
//!
//! Generalizes `RateLimitedCrawler`'s single-`governor`-limiter-per-crawler
//! shape to one limiter keyed by domain, so unrelated domains never block
//! each other while same-domain callers serialize.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;

/// Blocks callers for the same domain until `delay` has elapsed since the
/// last access to that domain. Different domains never block each other.
pub struct RateLimiter {
    delay: Mutex<Duration>,
    last_access: AsyncMutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            last_access: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Mutate the delay at runtime; affects all subsequent `wait` calls.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn delay(&self) -> Duration {
        *self.delay.lock().unwrap()
    }

    /// Blocks until `delay` has elapsed since the last access for `domain`,
    /// then records this access. If `cancel` resolves first, returns without
    /// recording an access (so a cancelled waiter doesn't push back the next
    /// caller's window).
    pub async fn wait(&self, domain: &str, cancel: impl std::future::Future<Output = ()>) -> bool {
        tokio::select! {
            _ = self.wait_inner(domain) => true,
            _ = cancel => false,
        }
    }

    async fn wait_inner(&self, domain: &str) {
        // Hold the map lock only long enough to read the last-access time;
        // the actual sleep happens outside the lock so other domains are
        // never blocked by this one's wait. last_access is only updated
        // after the sleep completes, so a waiter that loses the race against
        // `cancel` in `wait()` is dropped mid-sleep and never records an
        // access, matching the "cancel without updating last-access"
        // contract.
        let sleep_for = {
            let map = self.last_access.lock().await;
            let now = Instant::now();
            let delay = self.delay();
            match map.get(domain) {
                Some(last) => delay.saturating_sub(now.duration_since(*last)),
                None => Duration::ZERO,
            }
        };
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }
        let mut map = self.last_access.lock().await;
        map.insert(domain.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn same_domain_calls_serialize() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait("nos.nl", pending()).await;
        limiter.wait("nos.nl", pending()).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn different_domains_do_not_block_each_other() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        limiter.wait("nos.nl", pending()).await;
        let start = Instant::now();
        limiter.wait("nu.nl", pending()).await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn cancellation_wins_against_a_still_running_wait() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        limiter.wait("nos.nl", pending()).await;
        // The next wait for the same domain needs ~200ms; an immediately
        // ready cancel future must win the race deterministically.
        let completed = limiter.wait("nos.nl", std::future::ready(())).await;
        assert!(!completed);
    }

    #[tokio::test]
    async fn cancelled_wait_does_not_update_last_access() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        limiter.wait("nos.nl", pending()).await;
        // A cancelled wait must not push back the domain's window: a
        // subsequent real wait should still only need the remainder of the
        // original 200ms delay, not a fresh 200ms measured from the
        // cancelled attempt.
        let _ = limiter.wait("nos.nl", std::future::ready(())).await;
        let start = Instant::now();
        limiter.wait("nos.nl", pending()).await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn delay_is_runtime_mutable() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.set_delay(Duration::from_secs(5));
        assert_eq!(limiter.delay(), Duration::from_secs(5));
    }
}
