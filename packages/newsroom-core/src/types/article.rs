//! Article data model.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use marketdata_client::StockQuote;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// `>0.2` positive, `<-0.2` negative, else neutral. Exact ties go to neutral.
    pub fn from_score(score: f64) -> Self {
        if score > 0.2 {
            SentimentLabel::Positive
        } else if score < -0.2 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entities {
    pub persons: HashSet<String>,
    pub organizations: HashSet<String>,
    pub locations: HashSet<String>,
    pub stock_tickers: Vec<StockTicker>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockTicker {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiEnrichment {
    pub sentiment: f64,
    pub sentiment_label: SentimentLabel,
    pub categories: IndexMap<String, f64>,
    pub entities: Entities,
    pub keywords: Vec<Keyword>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub url: String,
    pub content_hash: String,

    pub title: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub source: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub image_url: Option<String>,

    pub content: String,
    pub content_extracted: bool,
    pub content_extracted_at: Option<DateTime<Utc>>,

    pub ai_processed: bool,
    pub ai_processed_at: Option<DateTime<Utc>>,
    pub ai_enrichment: Option<AiEnrichment>,
    pub ai_error: Option<String>,

    pub stock_data: IndexMap<String, StockQuote>,
    pub stock_data_updated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// sha256(title|url), matching the hash the repository computes on insert.
    pub fn compute_content_hash(title: &str, url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// True iff the sentiment label matches the score under the rule in
    /// Only meaningful once ai_enrichment is populated.
    pub fn sentiment_label_is_consistent(&self) -> bool {
        match &self.ai_enrichment {
            Some(e) => SentimentLabel::from_score(e.sentiment) == e.sentiment_label,
            None => true,
        }
    }

    /// content_extracted=false must imply content="" and content_extracted_at=None.
    pub fn content_invariant_holds(&self) -> bool {
        if !self.content_extracted {
            self.content.is_empty() && self.content_extracted_at.is_none()
        } else {
            true
        }
    }

    /// ai_processed=true iff enrichment fields populated OR ai_error is non-empty.
    pub fn ai_processed_invariant_holds(&self) -> bool {
        if self.ai_processed {
            self.ai_enrichment.is_some() || self.ai_error.is_some()
        } else {
            self.ai_enrichment.is_none() && self.ai_error.is_none()
        }
    }
}

/// Draft record produced by the RSS fetch step, before insertion.
#[derive(Debug, Clone)]
pub struct ArticleCreate {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub source: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub keywords: Vec<String>,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_label_boundaries() {
        assert_eq!(SentimentLabel::from_score(0.21), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.21), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = Article::compute_content_hash("Title", "https://nos.nl/a");
        let b = Article::compute_content_hash("Title", "https://nos.nl/a");
        let c = Article::compute_content_hash("Other", "https://nos.nl/a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
