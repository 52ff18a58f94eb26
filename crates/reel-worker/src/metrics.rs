//! Job and pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};

use crate::error::ErrorKind;
use reel_models::JobStatus;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "reel_jobs_submitted_total";
    pub const JOBS_RESUMED_TOTAL: &str = "reel_jobs_resumed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const PROVIDER_RETRIES_TOTAL: &str = "reel_provider_retries_total";
    pub const STAGE_DURATION_SECONDS: &str = "reel_stage_duration_seconds";
    pub const SCENES_READY_TOTAL: &str = "reel_scenes_ready_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_resumed(stage: JobStatus) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::JOBS_RESUMED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(stage: JobStatus, kind: ErrorKind) {
    let labels = [
        ("stage", stage.as_str().to_string()),
        ("kind", kind.as_str().to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_retries(stage: JobStatus, retries: u32) {
    if retries == 0 {
        return;
    }
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::PROVIDER_RETRIES_TOTAL, &labels).increment(u64::from(retries));
}

pub fn record_stage_duration(stage: JobStatus, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_scene_ready() {
    counter!(names::SCENES_READY_TOTAL).increment(1);
}
