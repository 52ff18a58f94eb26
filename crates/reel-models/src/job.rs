//! Job identifiers and the durable job record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::product::ProductSnapshot;
use crate::status::{media_progress, JobStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger row for one video generation job.
///
/// Status only moves forward and progress never decreases. `video_url` is
/// set exclusively by [`JobRecord::complete`] and `error_message`
/// exclusively by [`JobRecord::fail`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_id: String,
    pub source_url: String,
    pub status: JobStatus,
    pub progress: u8,

    /// Primary preview image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_snapshot: Option<ProductSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Retries consumed, keyed by stage name
    #[serde(default)]
    pub retries: BTreeMap<String, u32>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh pending job.
    pub fn new(user_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self::with_id(JobId::new(), user_id, source_url)
    }

    pub fn with_id(job_id: JobId, user_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            user_id: user_id.into(),
            source_url: source_url.into(),
            status: JobStatus::Pending,
            progress: 0,
            product_url: None,
            product_snapshot: None,
            video_url: None,
            error_message: None,
            retries: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to the next non-terminal status.
    ///
    /// `Completed` and `Failed` go through [`complete`](Self::complete) and
    /// [`fail`](Self::fail) so their payload fields stay consistent.
    pub fn transition(&mut self, to: JobStatus) -> ModelResult<()> {
        if to.is_terminal() || !self.status.can_transition_to(to) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if let Some(base) = to.base_progress() {
            self.bump_progress(base);
        }
        self.touch();
        Ok(())
    }

    /// Record scene readiness while generating media.
    ///
    /// Returns `true` if progress moved.
    pub fn record_media_progress(&mut self, ready: usize, total: usize) -> bool {
        if self.status != JobStatus::GeneratingMedia {
            return false;
        }
        let before = self.progress;
        self.bump_progress(media_progress(ready, total));
        if self.progress != before {
            self.touch();
            true
        } else {
            false
        }
    }

    /// Store the scraped product. Written once; later calls are ignored.
    pub fn record_snapshot(&mut self, snapshot: ProductSnapshot) -> bool {
        if self.product_snapshot.is_some() {
            return false;
        }
        self.product_url = snapshot.primary_image().map(str::to_string);
        self.product_snapshot = Some(snapshot);
        self.touch();
        true
    }

    /// Finish successfully. Only legal from `uploading`.
    pub fn complete(&mut self, video_url: impl Into<String>) -> ModelResult<()> {
        let video_url = video_url.into();
        if video_url.trim().is_empty() {
            return Err(ModelError::validation("video_url must not be empty"));
        }
        if !self.status.can_transition_to(JobStatus::Completed) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: JobStatus::Completed,
            });
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.video_url = Some(video_url);
        self.error_message = None;
        self.touch();
        Ok(())
    }

    /// Stop with an error. Progress stays frozen.
    pub fn fail(&mut self, message: impl Into<String>) -> ModelResult<()> {
        if !self.status.can_transition_to(JobStatus::Failed) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
        self.video_url = None;
        self.touch();
        Ok(())
    }

    /// Add retries consumed by `stage`.
    pub fn add_retries(&mut self, stage: JobStatus, count: u32) {
        if count == 0 {
            return;
        }
        *self.retries.entry(stage.as_str().to_string()).or_default() += count;
    }

    pub fn retries_for(&self, stage: JobStatus) -> u32 {
        self.retries.get(stage.as_str()).copied().unwrap_or(0)
    }

    fn bump_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
