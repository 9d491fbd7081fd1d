//! Article repository. Raw `sqlx::query` + manual `Row::get()`
//! construction, matching `PostgresStorage`'s convention (no live database is
//! available to check a `query!` macro against at write time).

use crate::error::{NewsroomError, Result};
use crate::types::{Article, ArticleCreate};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

/// Strips invalid UTF-8 byte sequences before any write of a free-text field.
fn sanitize_utf8(s: &str) -> String {
    s.chars().filter(|c| *c != '\u{FFFD}').collect()
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub source: Option<String>,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub sort_field: String,
    pub sort_ascending: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ArticleFilter {
    pub fn new() -> Self {
        Self {
            sort_field: "published".to_string(),
            sort_ascending: false,
            limit: 50,
            offset: 0,
            ..Default::default()
        }
    }
}

pub struct ArticleRepository {
    pool: PgPool,
}

impl ArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a single article. Fails with `DuplicateKey` on a unique
    /// violation (url or content_hash).
    pub async fn create(&self, draft: &ArticleCreate) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let title = sanitize_utf8(&draft.title);
        let content_hash = Article::compute_content_hash(&title, &draft.url);

        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, url, content_hash, title, summary, published, source, author, category, keywords, image_url, content, content_extracted, ai_processed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, '', false, false, now(), now())
            "#,
        )
        .bind(id)
        .bind(&draft.url)
        .bind(&content_hash)
        .bind(&title)
        .bind(draft.summary.as_ref().map(|s| sanitize_utf8(s)))
        .bind(draft.published)
        .bind(&draft.source)
        .bind(draft.author.as_ref().map(|s| sanitize_utf8(s)))
        .bind(draft.category.as_ref().map(|s| sanitize_utf8(s)))
        .bind(&draft.keywords)
        .bind(&draft.image_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(NewsroomError::DuplicateKey(draft.url.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// One batched INSERT with `ON CONFLICT (url) DO NOTHING`. Returns the
    /// number of rows actually inserted (duplicates silently skipped).
    pub async fn create_batch(&self, drafts: &[ArticleCreate]) -> Result<u64> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(drafts.len());
        let mut urls = Vec::with_capacity(drafts.len());
        let mut hashes = Vec::with_capacity(drafts.len());
        let mut titles = Vec::with_capacity(drafts.len());
        let mut summaries = Vec::with_capacity(drafts.len());
        let mut published = Vec::with_capacity(drafts.len());
        let mut sources = Vec::with_capacity(drafts.len());
        let mut authors = Vec::with_capacity(drafts.len());
        let mut categories = Vec::with_capacity(drafts.len());
        let mut keywords = Vec::with_capacity(drafts.len());
        let mut image_urls = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let title = sanitize_utf8(&draft.title);
            let hash = Article::compute_content_hash(&title, &draft.url);
            ids.push(Uuid::new_v4());
            urls.push(draft.url.clone());
            hashes.push(hash);
            titles.push(title);
            summaries.push(draft.summary.as_ref().map(|s| sanitize_utf8(s)));
            published.push(draft.published);
            sources.push(draft.source.clone());
            authors.push(draft.author.as_ref().map(|s| sanitize_utf8(s)));
            categories.push(draft.category.as_ref().map(|s| sanitize_utf8(s)));
            // Bound as one jsonb array per row (`keywords[]::jsonb[]`) rather
            // than a flat text[], since UNNEST flattens a 2D array across
            // both dimensions instead of yielding one sub-array per output
            // row; the SELECT list below re-expands each row's jsonb back
            // into the `keywords` text[] column.
            let words: Vec<serde_json::Value> = draft.keywords.iter().cloned().map(serde_json::Value::String).collect();
            keywords.push(serde_json::Value::Array(words));
            image_urls.push(draft.image_url.clone());
        }

        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, url, content_hash, title, summary, published, source, author, category, keywords, image_url, content, content_extracted, ai_processed, created_at, updated_at)
            SELECT t.id, t.url, t.content_hash, t.title, t.summary, t.published, t.source, t.author, t.category,
                   ARRAY(SELECT jsonb_array_elements_text(t.keywords))::text[], t.image_url, '', false, false, now(), now()
            FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[], $6::timestamptz[], $7::text[], $8::text[], $9::text[], $10::jsonb[], $11::text[]
            ) AS t(id, url, content_hash, title, summary, published, source, author, category, keywords, image_url)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(&ids)
        .bind(&urls)
        .bind(&hashes)
        .bind(&titles)
        .bind(&summaries)
        .bind(&published)
        .bind(&sources)
        .bind(&authors)
        .bind(&categories)
        .bind(&keywords)
        .bind(&image_urls)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// One statement checking all URLs against the table; any URL not found
    /// defaults to `false`.
    pub async fn exists_by_url_batch(&self, urls: &[String]) -> Result<HashMap<String, bool>> {
        let mut result: HashMap<String, bool> = urls.iter().map(|u| (u.clone(), false)).collect();
        if urls.is_empty() {
            return Ok(result);
        }

        let rows = sqlx::query("SELECT url FROM articles WHERE url = ANY($1)")
            .bind(urls)
            .fetch_all(&self.pool)
            .await?;

        for row in rows {
            let url: String = row.get("url");
            result.insert(url, true);
        }

        Ok(result)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| NewsroomError::NotFound(id.to_string()))?;

        row_to_article(&row)
    }

    /// Sets content, marks extracted, bumps updated_at. Sanitizes UTF-8 first.
    pub async fn update_content(&self, id: Uuid, content: &str) -> Result<()> {
        let sanitized = sanitize_utf8(content);
        let result = sqlx::query(
            "UPDATE articles SET content = $1, content_extracted = true, content_extracted_at = now(), updated_at = now() WHERE id = $2",
        )
        .bind(&sanitized)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NewsroomError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// IDs where content is missing and a URL is present, newest first.
    pub async fn get_articles_needing_content(&self, limit: i64) -> Result<Vec<(Uuid, String, String)>> {
        let rows = sqlx::query(
            "SELECT id, url, source FROM articles WHERE content_extracted = false AND url != '' ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("url"), row.get("source")))
            .collect())
    }

    /// Articles with content extracted, never AI-processed. Oldest first so
    /// the queue drains in arrival order. Backs the normal processing queue
    /// (background loop and `process_pending`); does not include articles
    /// that already failed once (see `get_articles_needing_retry`). Returns
    /// (id, title, summary) — the provider is fed the summary, not the full
    /// scraped body.
    pub async fn get_articles_needing_ai(&self, limit: i64) -> Result<Vec<(Uuid, String, String)>> {
        let rows = sqlx::query(
            "SELECT id, title, COALESCE(summary, '') AS summary FROM articles \
             WHERE content_extracted = true AND ai_processed = false \
             ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("title"), row.get("summary")))
            .collect())
    }

    /// Articles previously AI-processed with a recorded error, eligible for
    /// a retry pass. Oldest failure first. Distinct from
    /// `get_articles_needing_ai`: this is the set `retry_failed` targets,
    /// not the set the normal queue drains. Returns (id, title, summary).
    pub async fn get_articles_needing_retry(&self, limit: i64) -> Result<Vec<(Uuid, String, String)>> {
        let rows = sqlx::query(
            "SELECT id, title, COALESCE(summary, '') AS summary FROM articles \
             WHERE content_extracted = true AND ai_processed = true AND ai_error IS NOT NULL \
             ORDER BY ai_processed_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("id"), row.get("title"), row.get("summary")))
            .collect())
    }

    /// Persists a successful enrichment. `ai_processed` is set true alongside
    /// the populated fields so the ai_processed invariant always holds.
    pub async fn update_ai_enrichment(&self, id: Uuid, enrichment: &crate::types::AiEnrichment) -> Result<()> {
        let categories = serde_json::to_value(&enrichment.categories)?;
        let entities = serde_json::to_value(&enrichment.entities)?;
        let keywords = serde_json::to_value(&enrichment.keywords)?;

        let result = sqlx::query(
            r#"
            UPDATE articles SET
                ai_processed = true,
                ai_processed_at = now(),
                ai_sentiment = $1,
                ai_sentiment_label = $2,
                ai_categories = $3,
                ai_entities = $4,
                ai_keywords = $5,
                ai_summary = $6,
                ai_error = NULL,
                updated_at = now()
            WHERE id = $7
            "#,
        )
        .bind(enrichment.sentiment)
        .bind(format!("{:?}", enrichment.sentiment_label).to_lowercase())
        .bind(categories)
        .bind(entities)
        .bind(keywords)
        .bind(&enrichment.summary)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NewsroomError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Marks a permanent enrichment failure. `ai_processed` is still set true:
    /// the invariant treats a recorded error as a terminal outcome, not a
    /// pending one.
    pub async fn mark_ai_error(&self, id: Uuid, error: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE articles SET ai_processed = true, ai_processed_at = now(), ai_error = $1, updated_at = now() WHERE id = $2",
        )
        .bind(sanitize_utf8(error))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(NewsroomError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Persists fetched ticker quotes onto an article.
    pub async fn update_stock_data(
        &self,
        id: Uuid,
        stock_data: &indexmap::IndexMap<String, marketdata_client::StockQuote>,
    ) -> Result<()> {
        let value = serde_json::to_value(stock_data)?;
        sqlx::query("UPDATE articles SET stock_data = $1, stock_data_updated_at = now(), updated_at = now() WHERE id = $2")
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Without `content` — used for list/search views that never need the
    /// full body.
    pub async fn list_light(&self, filter: &ArticleFilter) -> Result<(Vec<Article>, i64)> {
        self.query_articles(filter, None, false).await
    }

    /// Same predicate as `list_light`, plus a full-text match against title
    /// and content; still omits `content` from the returned rows.
    pub async fn search_light(&self, filter: &ArticleFilter, query: &str) -> Result<(Vec<Article>, i64)> {
        self.query_articles(filter, Some(query), false).await
    }

    /// Same as `list_light`, with `content` included. Only call this when
    /// full bodies are actually needed.
    pub async fn list(&self, filter: &ArticleFilter) -> Result<(Vec<Article>, i64)> {
        self.query_articles(filter, None, true).await
    }

    /// Same as `search_light`, with `content` included.
    pub async fn search(&self, filter: &ArticleFilter, query: &str) -> Result<(Vec<Article>, i64)> {
        self.query_articles(filter, Some(query), true).await
    }

    async fn query_articles(
        &self,
        filter: &ArticleFilter,
        text_query: Option<&str>,
        with_content: bool,
    ) -> Result<(Vec<Article>, i64)> {
        let sort_field = sanitize_sort_field(&filter.sort_field);
        let sort_dir = if filter.sort_ascending { "ASC" } else { "DESC" };
        let content_col = if with_content { "content" } else { "'' AS content" };

        let predicate = "($1::text IS NULL OR source = $1) \
            AND ($2::text IS NULL OR category = $2) \
            AND ($3::text IS NULL OR keywords @> ARRAY[$3]::text[]) \
            AND ($4::timestamptz IS NULL OR published >= $4) \
            AND ($5::text IS NULL OR title ILIKE '%' || $5 || '%' OR content ILIKE '%' || $5 || '%')";

        let select = format!(
            "SELECT id, url, content_hash, title, summary, published, source, author, category, keywords, \
             image_url, {content_col}, content_extracted, content_extracted_at, ai_processed, ai_processed_at, \
             ai_sentiment, ai_sentiment_label, ai_categories, ai_entities, ai_keywords, ai_summary, ai_error, \
             stock_data, stock_data_updated_at, created_at, updated_at \
             FROM articles WHERE {predicate} ORDER BY {sort_field} {sort_dir} LIMIT $6 OFFSET $7"
        );

        let rows = sqlx::query(&select)
            .bind(&filter.source)
            .bind(&filter.category)
            .bind(&filter.keyword)
            .bind(filter.since)
            .bind(text_query)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;

        let articles: Result<Vec<Article>> = rows.iter().map(row_to_article).collect();
        let articles = articles?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM articles WHERE {predicate}"))
            .bind(&filter.source)
            .bind(&filter.category)
            .bind(&filter.keyword)
            .bind(filter.since)
            .bind(text_query)
            .fetch_one(&self.pool)
            .await?;

        Ok((articles, count))
    }

    /// Ids of articles still owed an AI pass: never processed, or processed
    /// with a recorded error and eligible for retry. Union of
    /// `get_articles_needing_ai`'s and `get_articles_needing_retry`'s
    /// predicates, without the title/summary payload — used for queue-depth
    /// counts such as the processor's adaptive interval, which should
    /// reflect the full backlog the loop could work through, not just the
    /// never-attempted subset.
    pub async fn get_pending_article_ids(&self, limit: i64) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT id FROM articles WHERE content_extracted = true \
             AND (ai_processed = false OR (ai_processed = true AND ai_error IS NOT NULL)) \
             ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    /// Average sentiment and article count per category, over articles
    /// enriched within the last `days` days.
    pub async fn sentiment_aggregate(&self, days: i32) -> Result<Vec<(String, f64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT cat.key AS category, AVG(a.ai_sentiment) AS avg_sentiment, COUNT(*) AS article_count
            FROM articles a, jsonb_object_keys(a.ai_categories) AS cat(key)
            WHERE a.ai_processed = true AND a.ai_sentiment IS NOT NULL
              AND a.ai_processed_at >= now() - ($1 || ' days')::interval
            GROUP BY cat.key
            ORDER BY article_count DESC
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("category"), row.get("avg_sentiment"), row.get("article_count")))
            .collect())
    }

    /// Top keywords by occurrence count over the last `days` days.
    pub async fn trending_keywords(&self, days: i32, limit: i64) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT kw.value AS keyword, COUNT(*) AS occurrences
            FROM articles a, jsonb_array_elements_text(
                CASE WHEN jsonb_typeof(a.ai_keywords) = 'array' THEN a.ai_keywords ELSE '[]'::jsonb END
            ) AS kw(value)
            WHERE a.ai_processed_at >= now() - ($1 || ' days')::interval
            GROUP BY kw.value
            ORDER BY occurrences DESC
            LIMIT $2
            "#,
        )
        .bind(days)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.get("keyword"), row.get("occurrences"))).collect())
    }

    /// Articles mentioning a named entity, across persons/organizations/
    /// locations, newest first.
    pub async fn articles_by_entity(&self, entity: &str, limit: i64) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT id, url, content_hash, title, summary, published, source, author, category, keywords,
                   image_url, '' AS content, content_extracted, content_extracted_at, ai_processed, ai_processed_at,
                   ai_sentiment, ai_sentiment_label, ai_categories, ai_entities, ai_keywords, ai_summary, ai_error,
                   stock_data, stock_data_updated_at, created_at, updated_at
            FROM articles
            WHERE ai_entities -> 'persons' @> to_jsonb($1::text)
               OR ai_entities -> 'organizations' @> to_jsonb($1::text)
               OR ai_entities -> 'locations' @> to_jsonb($1::text)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(entity)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_article).collect()
    }
}

/// Whitelists sort columns so `filter.sort_field` can never be used to
/// inject arbitrary SQL via the formatted `ORDER BY` clause.
fn sanitize_sort_field(field: &str) -> &'static str {
    match field {
        "created_at" => "created_at",
        "title" => "title",
        "source" => "source",
        _ => "published",
    }
}

fn row_to_article(row: &sqlx::postgres::PgRow) -> Result<Article> {
    use crate::types::{AiEnrichment, Entities, SentimentLabel};

    let ai_processed: bool = row.get("ai_processed");
    let ai_sentiment: Option<f64> = row.try_get("ai_sentiment").ok();
    let ai_enrichment = ai_sentiment.map(|sentiment| AiEnrichment {
        sentiment,
        sentiment_label: SentimentLabel::from_score(sentiment),
        categories: row
            .try_get::<Option<serde_json::Value>, _>("ai_categories")
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        entities: row
            .try_get::<Option<serde_json::Value>, _>("ai_entities")
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_else(Entities::default),
        keywords: row
            .try_get::<Option<serde_json::Value>, _>("ai_keywords")
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        summary: row.try_get("ai_summary").ok(),
    });

    Ok(Article {
        id: row.get("id"),
        url: row.get("url"),
        content_hash: row.get("content_hash"),
        title: row.get("title"),
        summary: row.try_get("summary").ok(),
        published: row.try_get("published").ok(),
        source: row.get("source"),
        author: row.try_get("author").ok(),
        category: row.try_get("category").ok(),
        keywords: row.try_get("keywords").unwrap_or_default(),
        image_url: row.try_get("image_url").ok(),
        content: row.try_get("content").unwrap_or_default(),
        content_extracted: row.get("content_extracted"),
        content_extracted_at: row.try_get("content_extracted_at").ok(),
        ai_processed,
        ai_processed_at: row.try_get("ai_processed_at").ok(),
        ai_enrichment,
        ai_error: row.try_get("ai_error").ok(),
        stock_data: row
            .try_get::<Option<serde_json::Value>, _>("stock_data")
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        stock_data_updated_at: row.try_get("stock_data_updated_at").ok(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_utf8_strips_replacement_characters() {
        let s = "hello\u{FFFD}world";
        assert_eq!(sanitize_utf8(s), "helloworld");
    }

    #[test]
    fn sanitize_utf8_leaves_clean_text_untouched() {
        let s = "Kabinet valt na Kamerdebat";
        assert_eq!(sanitize_utf8(s), s);
    }
}
