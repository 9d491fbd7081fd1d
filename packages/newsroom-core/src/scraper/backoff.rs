//! Single retry/backoff utility shared by the scraper service and the AI
//! provider client, so the two don't grow divergent retry policies.

use crate::error::{NewsroomError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    /// Multiplies the computed delay when the error classifies as rate-limit.
    pub rate_limit_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            attempts,
            base,
            multiplier,
            max,
            rate_limit_multiplier: 1.0,
        }
    }

    pub fn with_rate_limit_multiplier(mut self, m: f64) -> Self {
        self.rate_limit_multiplier = m;
        self
    }

    fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base_ms = self.base.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let max_ms = self.max.as_millis() as f64;
        let mut ms = base_ms.min(max_ms);
        if rate_limited {
            ms = (ms * self.rate_limit_multiplier).min(max_ms);
        }
        // +/- 20% jitter
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis((ms * jitter) as u64)
    }
}

/// Runs `f` up to `policy.attempts` times, classifying each error via
/// [`NewsroomError::is_retryable`]. `Cancelled` propagates immediately without
/// consuming an attempt. Non-retryable errors also propagate immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: RetryPolicy,
    cancel: impl Future<Output = ()>,
    mut f: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    tokio::pin!(cancel);
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            r = f(attempt) => r,
            _ = &mut cancel => return Err(NewsroomError::Cancelled),
        };

        match result {
            Ok(v) => return Ok(v),
            Err(NewsroomError::Cancelled) => return Err(NewsroomError::Cancelled),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(e);
                }
                let rate_limited = matches!(e, NewsroomError::RateLimited(_));
                let delay = policy.delay_for(attempt - 1, rate_limited);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut cancel => return Err(NewsroomError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<i32> = retry_with_backoff(policy, pending(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_surfaces_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<i32> = retry_with_backoff(policy, pending(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(NewsroomError::RemoteError("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let result: Result<i32> = retry_with_backoff(policy, pending(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(NewsroomError::ValidationError("bad input".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
