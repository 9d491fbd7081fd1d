//! Ticker enrichment: for a batch of already AI-enriched
//! articles, resolve every stock ticker mentioned anywhere in the batch with
//! exactly one market data call, then fan each quote back out to the
//! articles that actually mention it.

use crate::error::Result;
use crate::repository::ArticleRepository;
use crate::types::Article;
use indexmap::IndexMap;
use marketdata_client::{MarketDataClient, StockQuote};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct TickerEnricher {
    market_data: Arc<MarketDataClient>,
    articles: Arc<ArticleRepository>,
}

impl TickerEnricher {
    pub fn new(market_data: Arc<MarketDataClient>, articles: Arc<ArticleRepository>) -> Self {
        Self { market_data, articles }
    }

    /// Skips the market data call entirely when no article in the batch
    /// mentions a ticker.
    pub async fn enrich_batch(&self, batch: &[(Uuid, Article)]) -> Result<u32> {
        let mut unique_symbols: HashSet<String> = HashSet::new();
        for (_, article) in batch {
            if let Some(enrichment) = &article.ai_enrichment {
                for ticker in &enrichment.entities.stock_tickers {
                    unique_symbols.insert(ticker.symbol.to_uppercase());
                }
            }
        }

        if unique_symbols.is_empty() {
            debug!("no stock tickers in batch, skipping market data call");
            return Ok(0);
        }

        let symbols: Vec<String> = unique_symbols.into_iter().collect();
        let quotes = self.market_data.get_multiple_quotes(&symbols).await?;

        let mut updated = 0u32;
        for (id, article) in batch {
            let Some(enrichment) = &article.ai_enrichment else { continue };
            if enrichment.entities.stock_tickers.is_empty() {
                continue;
            }

            let mut own: IndexMap<String, StockQuote> = IndexMap::new();
            for ticker in &enrichment.entities.stock_tickers {
                let symbol = ticker.symbol.to_uppercase();
                if let Some(quote) = quotes.get(&symbol) {
                    own.insert(symbol, quote.clone());
                }
            }

            if own.is_empty() {
                continue;
            }

            match self.articles.update_stock_data(*id, &own).await {
                Ok(()) => updated += 1,
                Err(e) => warn!(article_id = %id, error = %e, "failed to persist stock data"),
            }
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AiEnrichment, Entities, SentimentLabel, StockTicker};

    fn ticker(symbol: &str) -> StockTicker {
        StockTicker { symbol: symbol.to_string(), name: None, exchange: None }
    }

    #[test]
    fn union_of_tickers_across_batch_is_deduplicated() {
        let mut set = HashSet::new();
        let enrichments = vec![
            AiEnrichment {
                sentiment: 0.0,
                sentiment_label: SentimentLabel::Neutral,
                categories: IndexMap::new(),
                entities: Entities { stock_tickers: vec![ticker("ASML"), ticker("shell")], ..Default::default() },
                keywords: vec![],
                summary: None,
            },
            AiEnrichment {
                sentiment: 0.0,
                sentiment_label: SentimentLabel::Neutral,
                categories: IndexMap::new(),
                entities: Entities { stock_tickers: vec![ticker("ASML")], ..Default::default() },
                keywords: vec![],
                summary: None,
            },
        ];
        for e in &enrichments {
            for t in &e.entities.stock_tickers {
                set.insert(t.symbol.to_uppercase());
            }
        }
        assert_eq!(set.len(), 2);
        assert!(set.contains("ASML"));
        assert!(set.contains("SHELL"));
    }
}
