//! Trait boundary for the external, Redis-like response cache collaborator.
//!
//! Connection setup for a concrete backend lives outside this crate; callers
//! hand in whatever implements this trait (or nothing, if no external cache
//! is configured). Kept separate from the in-process TTL caches owned by the
//! AI provider client and market data client, which exist regardless of
//! whether an external cache is wired up.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    async fn delete_pattern(&self, pattern: &str);
    async fn scan(&self, pattern: &str) -> Vec<String>;
}
