pub mod cache;
pub mod circuit_breaker;
pub mod rate_limiter;
pub mod response_cache;
pub mod robots;
pub mod user_agent;

pub use cache::TtlCache;
pub use circuit_breaker::{BreakerStats, CircuitBreakerManager};
pub use rate_limiter::RateLimiter;
pub use response_cache::ResponseCache;
pub use robots::RobotsChecker;
pub use user_agent::UserAgentRotator;
