//! Structured job logging.

use reel_models::{JobId, JobRecord, JobStatus};
use tracing::{error, info, Span};

/// Lifecycle events for one job, all carrying `job_id` and `operation`.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    pub fn log_start(&self, record: &JobRecord) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            user_id = %record.user_id,
            source_url = %record.source_url,
            resumed_from = %record.status,
            "Job started"
        );
    }

    pub fn log_stage(&self, stage: JobStatus, progress: u8) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            stage = %stage,
            progress,
            "Job entered stage"
        );
    }

    /// Terminal outcome: the video URL or the recorded failure.
    pub fn log_outcome(&self, record: &JobRecord) {
        match (&record.video_url, &record.error_message) {
            (Some(url), _) => info!(
                job_id = %self.job_id,
                operation = self.operation,
                video_url = %url,
                "Job completed"
            ),
            (None, error) => error!(
                job_id = %self.job_id,
                operation = self.operation,
                progress = record.progress,
                error = error.as_deref().unwrap_or("unknown"),
                "Job failed"
            ),
        }
    }

    /// Span instrumenting the job's task.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "generate_video");
        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "generate_video");
    }
}
