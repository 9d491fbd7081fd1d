//! Keyed circuit breaker manager.

use crate::error::{NewsroomError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<&State> for BreakerState {
    fn from(state: &State) -> Self {
        match state {
            State::Closed => BreakerState::Closed,
            State::Open => BreakerState::Open,
            State::HalfOpen => BreakerState::HalfOpen,
        }
    }
}

/// Inspectable snapshot of one breaker's state, counters, and timestamps.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakerStats {
    pub state: BreakerState,
    pub failures: u32,
    pub threshold: u32,
    /// Milliseconds since the breaker tripped open, if it's open or
    /// half-open; `None` while closed.
    pub opened_for_ms: Option<u64>,
}

struct Breaker {
    state: State,
    failures: u32,
    threshold: u32,
    timeout: Duration,
    opened_at: Option<Instant>,
    /// Exactly one half-open probe may be in flight at a time.
    half_open_probe_in_flight: bool,
}

impl Breaker {
    fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            state: State::Closed,
            failures: 0,
            threshold,
            timeout,
            opened_at: None,
            half_open_probe_in_flight: false,
        }
    }

    /// Decide whether a call may proceed right now, transitioning
    /// open -> half-open when the timeout has elapsed.
    fn admit(&mut self) -> bool {
        match self.state {
            State::Closed => true,
            State::Open => {
                let elapsed = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.timeout && !self.half_open_probe_in_flight {
                    self.state = State::HalfOpen;
                    self.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            State::HalfOpen => false, // a probe is already in flight
        }
    }

    fn on_success(&mut self) {
        match self.state {
            State::Closed => {
                self.failures = self.failures.saturating_sub(1);
            }
            State::HalfOpen => {
                self.state = State::Closed;
                self.failures = 0;
                self.half_open_probe_in_flight = false;
                self.opened_at = None;
            }
            State::Open => {}
        }
    }

    fn on_failure(&mut self) {
        match self.state {
            State::Closed => {
                self.failures += 1;
                if self.failures >= self.threshold {
                    self.state = State::Open;
                    self.opened_at = Some(Instant::now());
                }
            }
            State::HalfOpen => {
                self.state = State::Open;
                self.opened_at = Some(Instant::now());
                self.half_open_probe_in_flight = false;
            }
            State::Open => {}
        }
    }

    fn reset(&mut self) {
        self.state = State::Closed;
        self.failures = 0;
        self.opened_at = None;
        self.half_open_probe_in_flight = false;
    }

    fn stats(&self) -> BreakerStats {
        BreakerStats {
            state: BreakerState::from(&self.state),
            failures: self.failures,
            threshold: self.threshold,
            opened_for_ms: self.opened_at.map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

/// Keyed circuit breakers, one per source/key, in-process mutex-protected.
pub struct CircuitBreakerManager {
    breakers: Mutex<HashMap<String, Breaker>>,
}

impl CircuitBreakerManager {
    pub fn new() -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `f` under the named breaker. Never invokes `f` while the breaker
    /// is open; a short-circuit returns `NewsroomError::RemoteError` without
    /// calling `f` at all.
    pub async fn call<F, Fut, T>(
        &self,
        key: &str,
        threshold: u32,
        timeout: Duration,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admitted = {
            let mut breakers = self.breakers.lock().await;
            let breaker = breakers
                .entry(key.to_string())
                .or_insert_with(|| Breaker::new(threshold, timeout));
            breaker.admit()
        };

        if !admitted {
            return Err(NewsroomError::RemoteError(format!(
                "circuit breaker open for {key}"
            )));
        }

        match f().await {
            Ok(value) => {
                let mut breakers = self.breakers.lock().await;
                if let Some(breaker) = breakers.get_mut(key) {
                    breaker.on_success();
                }
                Ok(value)
            }
            Err(e) => {
                let mut breakers = self.breakers.lock().await;
                if let Some(breaker) = breakers.get_mut(key) {
                    breaker.on_failure();
                }
                Err(e)
            }
        }
    }

    pub async fn reset(&self, key: &str) {
        let mut breakers = self.breakers.lock().await;
        if let Some(breaker) = breakers.get_mut(key) {
            breaker.reset();
        }
    }

    /// Snapshot of one breaker's state/counters/timestamps. `None` if `key`
    /// has never been called through `call()`.
    pub async fn stats(&self, key: &str) -> Option<BreakerStats> {
        let breakers = self.breakers.lock().await;
        breakers.get(key).map(Breaker::stats)
    }

    /// Snapshot of every breaker the manager has ever seen, keyed by source.
    pub async fn all_stats(&self) -> HashMap<String, BreakerStats> {
        let breakers = self.breakers.lock().await;
        breakers.iter().map(|(k, b)| (k.clone(), b.stats())).collect()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn failing() -> Result<()> {
        Err(NewsroomError::RemoteError("boom".into()))
    }

    async fn succeeding() -> Result<()> {
        Ok(())
    }

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let mgr = CircuitBreakerManager::new();
        for _ in 0..5 {
            let _ = mgr.call("nos.nl", 5, Duration::from_secs(300), failing).await;
        }
        // 6th call must short-circuit without calling f.
        let result = mgr.call("nos.nl", 5, Duration::from_secs(300), failing).await;
        assert!(matches!(result, Err(NewsroomError::RemoteError(_))));
    }

    #[tokio::test]
    async fn half_open_probe_after_timeout_then_closes_on_success() {
        let mgr = CircuitBreakerManager::new();
        for _ in 0..5 {
            let _ = mgr.call("nos.nl", 5, Duration::from_millis(10), failing).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = mgr.call("nos.nl", 5, Duration::from_millis(10), succeeding).await;
        assert!(result.is_ok());
        // breaker should now be closed: a fresh failure shouldn't open it
        // immediately (needs `threshold` consecutive failures again).
        let _ = mgr.call("nos.nl", 5, Duration::from_millis(10), failing).await;
        let result = mgr.call("nos.nl", 5, Duration::from_millis(10), succeeding).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn manual_reset_closes_an_open_breaker() {
        let mgr = CircuitBreakerManager::new();
        for _ in 0..5 {
            let _ = mgr.call("nos.nl", 5, Duration::from_secs(300), failing).await;
        }
        mgr.reset("nos.nl").await;
        let result = mgr.call("nos.nl", 5, Duration::from_secs(300), succeeding).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn different_keys_are_independent() {
        let mgr = CircuitBreakerManager::new();
        for _ in 0..5 {
            let _ = mgr.call("nos.nl", 5, Duration::from_secs(300), failing).await;
        }
        let result = mgr.call("nu.nl", 5, Duration::from_secs(300), succeeding).await;
        assert!(result.is_ok());
    }
}
