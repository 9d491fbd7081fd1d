//! ScrapingJob persistence.

use crate::error::Result;
use crate::types::{JobStatus, ScrapingJob};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScraperStats {
    pub total_runs: i64,
    pub completed: i64,
    pub failed: i64,
    pub partial_success: i64,
    pub articles_inserted: u64,
}

pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Best-effort: a failure to record a job must never block the scrape
    /// itself, so callers should log and continue rather than propagate.
    pub async fn record(&self, job: &ScrapingJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraping_jobs (id, source, status, started_at, completed_at, article_count, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                article_count = EXCLUDED.article_count,
                error = EXCLUDED.error
            "#,
        )
        .bind(job.id)
        .bind(&job.source)
        .bind(status_str(&job.status))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.article_count as i32)
        .bind(&job.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Aggregate run counts over the last `hours` hours, across all sources.
    pub async fn get_stats(&self, hours: i32) -> Result<ScraperStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'partial_success') AS partial,
                COALESCE(SUM(article_count), 0) AS articles_inserted
            FROM scraping_jobs
            WHERE started_at >= now() - ($1 || ' hours')::interval
            "#,
        )
        .bind(hours)
        .fetch_one(&self.pool)
        .await?;

        Ok(ScraperStats {
            total_runs: row.get("total"),
            completed: row.get("completed"),
            failed: row.get("failed"),
            partial_success: row.get("partial"),
            articles_inserted: row.get::<i64, _>("articles_inserted") as u64,
        })
    }

    pub async fn get_recent(&self, source: &str, limit: i64) -> Result<Vec<ScrapingJob>> {
        let rows = sqlx::query(
            "SELECT id, source, status, started_at, completed_at, article_count, error FROM scraping_jobs WHERE source = $1 ORDER BY started_at DESC NULLS LAST LIMIT $2",
        )
        .bind(source)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ScrapingJob {
                id: row.get("id"),
                source: row.get("source"),
                status: status_from_str(&row.get::<String, _>("status")),
                started_at: row.try_get("started_at").ok(),
                completed_at: row.try_get("completed_at").ok(),
                article_count: row.get::<i32, _>("article_count") as u32,
                error: row.try_get("error").ok(),
            })
            .collect())
    }
}

fn status_str(status: &JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::PartialSuccess => "partial_success",
    }
}

fn status_from_str(s: &str) -> JobStatus {
    match s {
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "partial_success" => JobStatus::PartialSuccess,
        _ => JobStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::PartialSuccess,
        ] {
            let s = status_str(&status);
            assert_eq!(status_from_str(s), status);
        }
    }
}
