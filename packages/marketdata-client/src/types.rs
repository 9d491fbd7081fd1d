use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stock quote, as persisted onto an article's `stock_data` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<u64>,
    pub market_cap: Option<u64>,
    pub bid: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

/// Raw quote object as returned by the provider's `/quote` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(rename = "changesPercentage", default)]
    pub change_percent: f64,
    pub volume: Option<u64>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<u64>,
    pub bid: Option<f64>,
    pub open: Option<f64>,
    #[serde(rename = "dayHigh")]
    pub day_high: Option<f64>,
    #[serde(rename = "dayLow")]
    pub day_low: Option<f64>,
}

impl RawQuote {
    pub(crate) fn into_quote(self, now: DateTime<Utc>) -> StockQuote {
        StockQuote {
            symbol: self.symbol,
            name: self.name,
            price: self.price,
            change: self.change,
            change_percent: self.change_percent,
            volume: self.volume,
            market_cap: self.market_cap,
            bid: self.bid,
            open: self.open,
            high: self.day_high,
            low: self.day_low,
            last_updated: now,
        }
    }
}

/// One bar of historical price data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A news item mentioning a ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockNews {
    pub symbol: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
    pub site: Option<String>,
}

/// A gainer/loser entry from the market movers endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMover {
    pub symbol: String,
    pub name: Option<String>,
    pub change: f64,
    #[serde(rename = "changesPercentage")]
    pub change_percent: f64,
    pub price: f64,
}

/// An analyst rating/consensus summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystRating {
    pub symbol: String,
    pub rating: Option<String>,
    #[serde(rename = "ratingScore")]
    pub rating_score: Option<f64>,
}

/// An analyst price target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTarget {
    pub symbol: String,
    #[serde(rename = "targetConsensus")]
    pub target_consensus: Option<f64>,
    #[serde(rename = "targetHigh")]
    pub target_high: Option<f64>,
    #[serde(rename = "targetLow")]
    pub target_low: Option<f64>,
}

/// Aggregate performance for one market sector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorPerformance {
    pub sector: String,
    #[serde(rename = "changesPercentage")]
    pub change_percent: String,
}
