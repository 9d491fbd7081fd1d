//! Crate-level error type.
//!
//! Every public method in this crate returns [`Result<T>`]. Lower-level
//! typed errors (e.g. [`marketdata_client::MarketDataError`]) convert into
//! this one at the boundary via `#[from]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NewsroomError {
    /// The calling context was cancelled. Never retried by this layer.
    #[error("operation cancelled")]
    Cancelled,

    /// A suspension point exceeded its deadline. Retryable by the wrapping layer.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The remote side asked us to slow down. Retryable with extended backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Input failed validation. Not retryable.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A unique-key conflict on insert. Expected and silently counted by callers.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A remote response could not be parsed. Recorded, not retried here.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A remote call failed for a reason worth retrying with backoff.
    #[error("remote error: {0}")]
    RemoteError(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    MarketData(#[from] marketdata_client::MarketDataError),
}

pub type Result<T> = std::result::Result<T, NewsroomError>;

impl NewsroomError {
    /// Whether this error kind is worth retrying.
    /// Used by the shared backoff utility's classifier.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NewsroomError::Timeout(_)
                | NewsroomError::RateLimited(_)
                | NewsroomError::RemoteError(_)
                | NewsroomError::Http(_)
        )
    }
}
