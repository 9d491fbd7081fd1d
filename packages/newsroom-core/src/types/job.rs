//! ScrapingJob data model.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Some articles stored, some failed. Treated as a terminal success for
    /// scheduling purposes but distinct for observability.
    PartialSuccess,
}

#[derive(Debug, Clone)]
pub struct ScrapingJob {
    pub id: Uuid,
    pub source: String,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub article_count: u32,
    pub error: Option<String>,
}

impl ScrapingJob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            article_count: 0,
            error: None,
        }
    }

    pub fn start(&mut self) {
        debug_assert!(self.status == JobStatus::Pending, "terminal states never re-enter running");
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, article_count: u32) {
        self.status = JobStatus::Completed;
        self.article_count = article_count;
        self.completed_at = Some(Utc::now());
    }

    pub fn complete_partial(&mut self, article_count: u32, error: impl Into<String>) {
        self.status = JobStatus::PartialSuccess;
        self.article_count = article_count;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::PartialSuccess
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_pending_running_completed() {
        let mut job = ScrapingJob::new("nos.nl");
        assert_eq!(job.status, JobStatus::Pending);
        job.start();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());
        job.complete(3);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.article_count, 3);
        assert!(job.is_terminal());
    }

    #[test]
    fn failed_job_records_error_and_is_terminal() {
        let mut job = ScrapingJob::new("nos.nl");
        job.start();
        job.fail("robots disallowed");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("robots disallowed"));
        assert!(job.is_terminal());
    }
}
