pub mod article;
pub mod job;
pub mod source;

pub use article::{AiEnrichment, Article, ArticleCreate, Entities, Keyword, SentimentLabel, StockTicker};
pub use job::{JobStatus, ScrapingJob};
pub use source::Source;
