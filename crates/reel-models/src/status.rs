//! Job status state machine and progress derivation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Lifecycle status of a video generation job.
///
/// Statuses only move forward. `Failed` is reachable from every
/// non-terminal status; every other status has exactly one successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created, nothing started yet
    #[default]
    Pending,
    /// Fetching the product listing
    Scraping,
    /// Drafting the scene plan
    Scripting,
    /// Per-scene media generation in flight
    GeneratingMedia,
    /// Rendering the final video
    Compositing,
    /// Pushing the rendered file to storage
    Uploading,
    /// Video available at `video_url`
    Completed,
    /// Job stopped with `error_message`
    Failed,
}

impl JobStatus {
    /// All statuses in pipeline order.
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Scraping,
        JobStatus::Scripting,
        JobStatus::GeneratingMedia,
        JobStatus::Compositing,
        JobStatus::Uploading,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scraping => "scraping",
            JobStatus::Scripting => "scripting",
            JobStatus::GeneratingMedia => "generating_media",
            JobStatus::Compositing => "compositing",
            JobStatus::Uploading => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// The status entered when this one succeeds.
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Pending => Some(JobStatus::Scraping),
            JobStatus::Scraping => Some(JobStatus::Scripting),
            JobStatus::Scripting => Some(JobStatus::GeneratingMedia),
            JobStatus::GeneratingMedia => Some(JobStatus::Compositing),
            JobStatus::Compositing => Some(JobStatus::Uploading),
            JobStatus::Uploading => Some(JobStatus::Completed),
            JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    /// Whether `to` is a legal forward move from this status.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == JobStatus::Failed || self.next() == Some(to)
    }

    /// Progress reported on entry to this status.
    ///
    /// Returns `None` for `Failed`, whose progress stays where it was.
    pub fn base_progress(&self) -> Option<u8> {
        match self {
            JobStatus::Pending => Some(0),
            JobStatus::Scraping => Some(10),
            JobStatus::Scripting => Some(20),
            JobStatus::GeneratingMedia => Some(20),
            JobStatus::Compositing => Some(90),
            JobStatus::Uploading => Some(95),
            JobStatus::Completed => Some(100),
            JobStatus::Failed => None,
        }
    }
}

/// Progress while in `generating_media`: `20 + 70 * ready / total`.
pub fn media_progress(ready: usize, total: usize) -> u8 {
    if total == 0 {
        return 20;
    }
    let ready = ready.min(total);
    (20 + (70 * ready) / total) as u8
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::validation(format!("unknown job status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_chain_reaches_completed() {
        let mut status = JobStatus::Pending;
        let mut hops = 0;
        while let Some(next) = status.next() {
            assert!(status.can_transition_to(next));
            status = next;
            hops += 1;
        }
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(hops, 6);
    }

    #[test]
    fn test_no_regression_or_skip() {
        assert!(!JobStatus::Scripting.can_transition_to(JobStatus::Scraping));
        assert!(!JobStatus::Scraping.can_transition_to(JobStatus::Compositing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Uploading.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_base_progress_is_monotonic_along_chain() {
        let chain = &JobStatus::ALL[..7];
        let values: Vec<u8> = chain.iter().filter_map(|s| s.base_progress()).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(JobStatus::Failed.base_progress(), None);
    }

    #[test]
    fn test_media_progress() {
        assert_eq!(media_progress(0, 3), 20);
        assert_eq!(media_progress(1, 3), 43);
        assert_eq!(media_progress(3, 3), 90);
        assert_eq!(media_progress(5, 3), 90);
        assert_eq!(media_progress(0, 0), 20);
    }

    #[test]
    fn test_serde_and_parse() {
        let json = serde_json::to_string(&JobStatus::GeneratingMedia).unwrap();
        assert_eq!(json, "\"generating_media\"");
        assert_eq!("uploading".parse::<JobStatus>().unwrap(), JobStatus::Uploading);
        assert!("bogus".parse::<JobStatus>().is_err());
    }
}
