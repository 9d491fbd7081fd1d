use thiserror::Error;

/// Errors returned by the market data client.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("market data config error: {0}")]
    Config(String),

    #[error("market data network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("market data API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("market data response parse error: {0}")]
    Parse(String),

    /// The provider rejected a batch/endpoint as requiring a higher tier.
    /// Callers should fall back to a per-symbol strategy on this variant.
    #[error("market data feature requires a higher plan: {0}")]
    FeatureRestricted(String),
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
