//! Read-only status projection for pollers.

use reel_models::{JobId, JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

/// What the status API returns for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusView {
    /// Synthetic payload for a job whose first write has not landed yet.
    pub fn placeholder(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            video_url: None,
            error: None,
        }
    }

    /// Project a record, or the placeholder when it is missing.
    pub fn from_lookup(job_id: &JobId, record: Option<&JobRecord>) -> Self {
        record.map(Self::from).unwrap_or_else(|| Self::placeholder(job_id))
    }
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.to_string(),
            status: record.status,
            progress: record.progress,
            video_url: record.video_url.clone(),
            error: record.error_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_pending() {
        let id = JobId::from_string("job-1");
        let view = JobStatusView::from_lookup(&id, None);
        assert_eq!(view.status, JobStatus::Pending);
        assert_eq!(view.progress, 0);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["jobId"], "job-1");
        assert_eq!(json["status"], "pending");
        assert!(json.get("videoUrl").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_record_projects_error() {
        let mut record = JobRecord::new("u", "https://shop.example/p/1");
        record.transition(JobStatus::Scraping).unwrap();
        record.fail("scraping: PermanentProviderError: blocked").unwrap();

        let view = JobStatusView::from_lookup(&record.job_id, Some(&record));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["progress"], 10);
        assert_eq!(json["error"], "scraping: PermanentProviderError: blocked");
    }
}
