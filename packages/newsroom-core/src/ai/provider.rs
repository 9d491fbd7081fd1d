//! AI provider client: turns raw article text into structured enrichment.
//!
//! Wraps `openai_client::OpenAIClient::chat_completion` with: a JSON
//! tolerance layer for imperfect model output, sum-type normalization for
//! heterogeneous entity/category shapes, a 24h content cache, and a shared
//! retry utility.

use crate::error::{NewsroomError, Result};
use crate::resilience::TtlCache;
use crate::scraper::backoff::{retry_with_backoff, RetryPolicy};
use crate::types::{AiEnrichment, Entities, Keyword, SentimentLabel, StockTicker};
use indexmap::IndexMap;
use openai_client::types::{strip_code_blocks, ChatRequest, Message};
use openai_client::OpenAIClient;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

const CACHE_CAPACITY: usize = 2000;
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const BATCH_LIMIT: usize = 10;
const SINGLE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BATCH_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AiOptions {
    pub model: String,
    pub max_tokens: u32,
    pub enable_sentiment: bool,
    pub enable_entities: bool,
    pub enable_categories: bool,
    pub enable_keywords: bool,
    pub enable_summary: bool,
}

impl From<&crate::config::AiConfig> for AiOptions {
    fn from(cfg: &crate::config::AiConfig) -> Self {
        Self {
            model: cfg.openai_model.clone(),
            max_tokens: cfg.openai_max_tokens,
            enable_sentiment: cfg.enable_sentiment,
            enable_entities: cfg.enable_entities,
            enable_categories: cfg.enable_categories,
            enable_keywords: cfg.enable_keywords,
            enable_summary: cfg.enable_summary,
        }
    }
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            enable_sentiment: true,
            enable_entities: true,
            enable_categories: true,
            enable_keywords: true,
            enable_summary: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    sentiment: Option<f64>,
    #[serde(default)]
    categories: Option<Value>,
    #[serde(default)]
    entities: Option<RawEntities>,
    #[serde(default)]
    keywords: Option<Vec<RawKeyword>>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKeyword {
    word: String,
    score: f64,
}

#[derive(Debug, Deserialize, Default)]
struct RawEntities {
    #[serde(default)]
    persons: Option<Value>,
    #[serde(default)]
    organizations: Option<Value>,
    #[serde(default)]
    locations: Option<Value>,
    #[serde(default)]
    stock_tickers: Option<Vec<StockTicker>>,
}

pub struct AiProviderClient {
    client: OpenAIClient,
    cache: TtlCache<AiEnrichment>,
}

impl AiProviderClient {
    pub fn new(client: OpenAIClient) -> Self {
        Self {
            client,
            cache: TtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.cache.hit_count()
    }

    pub fn cache_miss_count(&self) -> u64 {
        self.cache.miss_count()
    }

    fn cache_key(title: &str, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(b"|");
        hasher.update(content.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..32].to_string()
    }

    /// Single-article enrichment with a content cache in front of the call.
    pub async fn process_article(&self, title: &str, content: &str, options: &AiOptions) -> Result<AiEnrichment> {
        let key = Self::cache_key(title, content);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let prompt = build_single_prompt(title, content, options);
        let raw = self.complete_with_retry(&prompt, options, SINGLE_REQUEST_TIMEOUT).await?;
        let enrichment = parse_single_response(&raw, options)?;

        self.cache.insert(key, enrichment.clone());
        Ok(enrichment)
    }

    /// Batch enrichment, up to [`BATCH_LIMIT`] articles per call. Response
    /// array order matches input order.
    pub async fn process_articles_batch(
        &self,
        articles: &[(String, String)],
        options: &AiOptions,
    ) -> Result<Vec<Result<AiEnrichment>>> {
        if articles.len() > BATCH_LIMIT {
            return Err(NewsroomError::ValidationError(format!(
                "batch of {} exceeds the {} article limit",
                articles.len(),
                BATCH_LIMIT
            )));
        }
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = vec![None; articles.len()];
        let mut to_fetch = Vec::new();
        for (idx, (title, content)) in articles.iter().enumerate() {
            let key = Self::cache_key(title, content);
            if let Some(cached) = self.cache.get(&key) {
                results[idx] = Some(Ok(cached));
            } else {
                to_fetch.push(idx);
            }
        }

        if !to_fetch.is_empty() {
            let prompt = build_batch_prompt(&to_fetch.iter().map(|&i| &articles[i]).collect::<Vec<_>>(), options);
            let raw = self.complete_with_retry(&prompt, options, BATCH_REQUEST_TIMEOUT).await?;
            let parsed = parse_batch_response(&raw, to_fetch.len(), options);

            for (slot, idx) in to_fetch.iter().enumerate() {
                match parsed.get(slot) {
                    Some(Ok(enrichment)) => {
                        let (title, content) = &articles[*idx];
                        self.cache.insert(Self::cache_key(title, content), enrichment.clone());
                        results[*idx] = Some(Ok(enrichment.clone()));
                    }
                    Some(Err(e)) => results[*idx] = Some(Err(clone_error(e))),
                    None => {
                        results[*idx] = Some(Err(NewsroomError::ParseError(
                            "batch response shorter than request".to_string(),
                        )))
                    }
                }
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }

    /// Retries on rate-limit/timeout/5xx classifications, exponential
    /// 1s/2s/4s, max 3 attempts, cancellable.
    async fn complete_with_retry(&self, prompt: &str, options: &AiOptions, timeout: Duration) -> Result<String> {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), 2.0, Duration::from_secs(4));
        let model = options.model.clone();
        let max_tokens = options.max_tokens;

        retry_with_backoff(policy, std::future::pending(), |_attempt| {
            let prompt = prompt.to_string();
            let model = model.clone();
            async move {
                let request = ChatRequest::new(model)
                    .message(Message::system(SYSTEM_PROMPT))
                    .message(Message::user(prompt))
                    .temperature(0.0)
                    .max_tokens(max_tokens);

                let response = tokio::time::timeout(timeout, self.client.chat_completion(request))
                    .await
                    .map_err(|_| NewsroomError::Timeout("AI provider request timed out".to_string()))?;

                response.map(|r| r.content).map_err(classify_openai_error)
            }
        })
        .await
    }
}

const SYSTEM_PROMPT: &str = "You are a news analysis assistant. Respond with exactly one JSON object or array and nothing else: no markdown code fences, no prose before or after.";

fn build_single_prompt(title: &str, content: &str, options: &AiOptions) -> String {
    format!(
        "Analyze this Dutch news article and return a single JSON object with fields: {}.\n\nTitle: {title}\nContent: {content}",
        requested_fields(options)
    )
}

fn build_batch_prompt(articles: &[&(String, String)], options: &AiOptions) -> String {
    let items: Vec<String> = articles
        .iter()
        .enumerate()
        .map(|(i, (title, content))| format!("{{\"index\": {i}, \"title\": {title:?}, \"content\": {content:?}}}"))
        .collect();
    format!(
        "Analyze each of these {} Dutch news articles and return a JSON array, in the same order, of objects with fields: {}.\n\nArticles: [{}]",
        articles.len(),
        requested_fields(options),
        items.join(", ")
    )
}

fn requested_fields(options: &AiOptions) -> String {
    let mut fields = Vec::new();
    if options.enable_sentiment {
        fields.push("sentiment (float -1 to 1)");
    }
    if options.enable_categories {
        fields.push("categories (object mapping category name to confidence 0-1)");
    }
    if options.enable_entities {
        fields.push("entities (object with persons, organizations, locations, stock_tickers arrays)");
    }
    if options.enable_keywords {
        fields.push("keywords (array of {word, score})");
    }
    if options.enable_summary {
        fields.push("summary (string)");
    }
    fields.join(", ")
}

fn parse_single_response(raw: &str, options: &AiOptions) -> Result<AiEnrichment> {
    let value = tolerant_parse(raw)?;
    normalize(&value, options)
}

fn parse_batch_response(raw: &str, expected: usize, options: &AiOptions) -> Vec<Result<AiEnrichment>> {
    let value = match tolerant_parse(raw) {
        Ok(v) => v,
        Err(e) => return (0..expected).map(|_| Err(clone_error(&e))).collect(),
    };

    let Some(array) = value.as_array() else {
        return (0..expected)
            .map(|_| Err(NewsroomError::ParseError("expected a JSON array for batch response".to_string())))
            .collect();
    };

    (0..expected)
        .map(|i| match array.get(i) {
            Some(v) => normalize(v, options),
            None => Err(NewsroomError::ParseError(format!("missing batch entry at index {i}"))),
        })
        .collect()
}

/// Strips markdown fences first (reusing the pattern
/// `openai_client::types::strip_code_blocks` already establishes), then
/// repairs missing commas between a closing token and the next `"key":` if
/// the first parse attempt fails.
fn tolerant_parse(raw: &str) -> Result<Value> {
    let stripped = strip_code_blocks(raw);
    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }

    let repaired = repair_missing_commas(stripped);
    serde_json::from_str::<Value>(&repaired)
        .map_err(|e| NewsroomError::ParseError(format!("unparseable AI response: {e}")))
}

fn repair_missing_commas(input: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"([\]\}"0-9])(\s+)("[A-Za-z0-9_]+"\s*:)"#).unwrap());
    re.replace_all(input, "$1,$2$3").to_string()
}

fn normalize(value: &Value, options: &AiOptions) -> Result<AiEnrichment> {
    let raw: RawResponse = serde_json::from_value(value.clone())
        .map_err(|e| NewsroomError::ParseError(format!("malformed enrichment shape: {e}")))?;

    let sentiment = if options.enable_sentiment { raw.sentiment.unwrap_or(0.0) } else { 0.0 };
    let sentiment_label = SentimentLabel::from_score(sentiment);

    let categories = if options.enable_categories {
        normalize_categories(raw.categories.as_ref())
    } else {
        IndexMap::new()
    };

    let entities = if options.enable_entities {
        normalize_entities(raw.entities.unwrap_or_default())
    } else {
        Entities::default()
    };

    let keywords = if options.enable_keywords {
        raw.keywords
            .unwrap_or_default()
            .into_iter()
            .map(|k| Keyword { word: k.word, score: k.score })
            .collect()
    } else {
        Vec::new()
    };

    let summary = if options.enable_summary { raw.summary } else { None };

    Ok(AiEnrichment {
        sentiment,
        sentiment_label,
        categories,
        entities,
        keywords,
        summary,
    })
}

/// Accepts a mapping (`{"politics": 0.9}`) or an array of category name
/// strings (weighted equally at `1/n`).
fn normalize_categories(value: Option<&Value>) -> IndexMap<String, f64> {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|score| (k.clone(), score)))
            .collect(),
        Some(Value::Array(items)) if !items.is_empty() => {
            let weight = 1.0 / items.len() as f64;
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| (s.to_string(), weight))
                .collect()
        }
        _ => IndexMap::new(),
    }
}

/// Accepts `["Mark Rutte", ...]` or `[{"name": "Mark Rutte"}, ...]` (also
/// tolerating a `value` key instead of `name`).
fn normalize_string_set(value: Option<&Value>) -> HashSet<String> {
    let Some(Value::Array(items)) = value else {
        return HashSet::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("value"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        })
        .collect()
}

fn normalize_entities(raw: RawEntities) -> Entities {
    Entities {
        persons: normalize_string_set(raw.persons.as_ref()),
        organizations: normalize_string_set(raw.organizations.as_ref()),
        locations: normalize_string_set(raw.locations.as_ref()),
        stock_tickers: raw.stock_tickers.unwrap_or_default(),
    }
}

fn classify_openai_error(e: openai_client::OpenAIError) -> NewsroomError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        NewsroomError::RateLimited(message)
    } else if lower.contains("timeout") {
        NewsroomError::Timeout(message)
    } else if lower.contains("500") || lower.contains("502") || lower.contains("503") {
        NewsroomError::RemoteError(message)
    } else {
        NewsroomError::RemoteError(message)
    }
}

fn clone_error(e: &NewsroomError) -> NewsroomError {
    NewsroomError::ParseError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence_before_parsing() {
        let raw = "```json\n{\"sentiment\": 0.5}\n```";
        let value = tolerant_parse(raw).unwrap();
        assert_eq!(value["sentiment"], 0.5);
    }

    #[test]
    fn repairs_missing_comma_between_object_fields() {
        let raw = r#"{"sentiment": 0.5 "summary": "ok"}"#;
        let value = tolerant_parse(raw).unwrap();
        assert_eq!(value["summary"], "ok");
    }

    #[test]
    fn truly_unparseable_input_yields_parse_error() {
        let raw = "this is not json at all {{{";
        assert!(tolerant_parse(raw).is_err());
    }

    #[test]
    fn categories_mapping_form_preserved() {
        let value = serde_json::json!({"politiek": 0.8, "economie": 0.3});
        let categories = normalize_categories(Some(&value));
        assert_eq!(categories.get("politiek"), Some(&0.8));
    }

    #[test]
    fn categories_array_form_gets_equal_weight() {
        let value = serde_json::json!(["politiek", "economie"]);
        let categories = normalize_categories(Some(&value));
        assert_eq!(categories.get("politiek"), Some(&0.5));
        assert_eq!(categories.get("economie"), Some(&0.5));
    }

    #[test]
    fn entities_accept_string_and_object_shapes_merged() {
        let value = serde_json::json!(["Mark Rutte", {"name": "Dilan Yesilgoz"}, {"value": "Frans Timmermans"}]);
        let set = normalize_string_set(Some(&value));
        assert!(set.contains("Mark Rutte"));
        assert!(set.contains("Dilan Yesilgoz"));
        assert!(set.contains("Frans Timmermans"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn normalize_full_response_produces_consistent_sentiment_label() {
        let value = serde_json::json!({
            "sentiment": 0.6,
            "categories": {"politiek": 0.9},
            "entities": {"persons": ["Mark Rutte"], "organizations": [], "locations": [], "stock_tickers": []},
            "keywords": [{"word": "verkiezingen", "score": 0.7}],
            "summary": "Korte samenvatting."
        });
        let options = AiOptions::default();
        let enrichment = normalize(&value, &options).unwrap();
        assert_eq!(enrichment.sentiment_label, SentimentLabel::Positive);
        assert!(enrichment.entities.persons.contains("Mark Rutte"));
        assert_eq!(enrichment.keywords[0].word, "verkiezingen");
    }

    #[test]
    fn disabled_toggles_are_not_populated() {
        let value = serde_json::json!({"sentiment": 0.9, "summary": "should be ignored"});
        let mut options = AiOptions::default();
        options.enable_summary = false;
        let enrichment = normalize(&value, &options).unwrap();
        assert!(enrichment.summary.is_none());
    }
}
