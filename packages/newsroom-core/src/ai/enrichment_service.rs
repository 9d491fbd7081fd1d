//! Per-article and batch-optimized AI enrichment.

use crate::ai::provider::{AiOptions, AiProviderClient};
use crate::error::Result;
use crate::repository::ArticleRepository;
use crate::types::AiEnrichment;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const BATCH_CHUNK_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EnrichmentOutcome {
    pub succeeded: u32,
    pub failed: u32,
}

pub struct EnrichmentService {
    provider: Arc<AiProviderClient>,
    articles: Arc<ArticleRepository>,
    options: AiOptions,
}

impl EnrichmentService {
    pub fn new(provider: Arc<AiProviderClient>, articles: Arc<ArticleRepository>, options: AiOptions) -> Self {
        Self { provider, articles, options }
    }

    /// Enriches a single article and persists the result. Both success and
    /// permanent failure set `ai_processed = true` so the invariant in
    /// `Article::ai_processed_invariant_holds` always holds after this call.
    pub async fn process_one(&self, id: Uuid, title: &str, summary: &str) -> Result<()> {
        match self.provider.process_article(title, summary, &self.options).await {
            Ok(enrichment) => self.articles.update_ai_enrichment(id, &enrichment).await,
            Err(e) => {
                warn!(article_id = %id, error = %e, "AI enrichment failed, recording as terminal error");
                self.articles.mark_ai_error(id, &e.to_string()).await
            }
        }
    }

    /// Enriches up to [`BATCH_CHUNK_SIZE`] articles in one provider call.
    /// The "saved N calls" accounting below counts only articles that were
    /// both returned successfully by the provider AND persisted without
    /// error, never the raw chunk size: a batch that partially fails did not
    /// actually save that many round trips.
    pub async fn process_batch_optimized(&self, articles: &[(Uuid, String, String)]) -> Result<EnrichmentOutcome> {
        let mut succeeded = 0u32;
        let mut failed = 0u32;

        for chunk in articles.chunks(BATCH_CHUNK_SIZE) {
            let pairs: Vec<(String, String)> = chunk.iter().map(|(_, title, summary)| (title.clone(), summary.clone())).collect();
            let results = self.provider.process_articles_batch(&pairs, &self.options).await?;

            for ((id, _, _), result) in chunk.iter().zip(results.into_iter()) {
                match result {
                    Ok(enrichment) => match self.articles.update_ai_enrichment(*id, &enrichment).await {
                        Ok(()) => succeeded += 1,
                        Err(e) => {
                            warn!(article_id = %id, error = %e, "failed to persist AI enrichment");
                            failed += 1;
                        }
                    },
                    Err(e) => {
                        warn!(article_id = %id, error = %e, "AI enrichment failed for batch member");
                        if self.articles.mark_ai_error(*id, &e.to_string()).await.is_err() {
                            failed += 1;
                        } else {
                            failed += 1;
                        }
                    }
                }
            }
        }

        if succeeded > 1 {
            tracing::debug!(
                saved_calls = succeeded - 1,
                "batch enrichment saved round trips versus per-article calls"
            );
        }

        Ok(EnrichmentOutcome { succeeded, failed })
    }

    /// Returns the stored enrichment for an article, if it has one.
    pub async fn get_enrichment(&self, id: Uuid) -> Result<Option<AiEnrichment>> {
        Ok(self.articles.get_by_id(id).await?.ai_enrichment)
    }

    /// Loads the article by id and enriches it. An article that already
    /// completed successfully (`ai_processed` with no `ai_error`) is skipped;
    /// this is the only retry path, so a prior terminal failure is always
    /// eligible for another attempt.
    pub async fn process_article(&self, id: Uuid) -> Result<()> {
        let article = self.articles.get_by_id(id).await?;
        if article.ai_processed && article.ai_error.is_none() {
            return Ok(());
        }
        let summary = article.summary.unwrap_or_default();
        self.process_one(article.id, &article.title, &summary).await
    }

    /// Processes up to `limit` never-yet-processed articles once,
    /// synchronously, via the batch-optimized path. Unlike
    /// `AiProcessor::manual_trigger`, which repeats this pattern across
    /// chunks until the queue drains or the run deadline fires, this handles
    /// exactly one bounded batch and returns.
    pub async fn process_pending(&self, limit: i64) -> Result<EnrichmentOutcome> {
        let batch = self.articles.get_articles_needing_ai(limit).await?;
        self.process_batch_optimized(&batch).await
    }

    /// Re-runs enrichment for up to `limit` articles that already failed
    /// once, via the batch-optimized path. Targets a disjoint set of
    /// articles from `process_pending`: this never touches articles that
    /// have not been attempted yet.
    pub async fn retry_failed(&self, limit: i64) -> Result<EnrichmentOutcome> {
        let batch = self.articles.get_articles_needing_retry(limit).await?;
        self.process_batch_optimized(&batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_totals_add_up() {
        let outcome = EnrichmentOutcome { succeeded: 7, failed: 3 };
        assert_eq!(outcome.succeeded + outcome.failed, 10);
    }
}
