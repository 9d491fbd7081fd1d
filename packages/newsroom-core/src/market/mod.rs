pub mod ticker_enricher;

pub use ticker_enricher::TickerEnricher;
