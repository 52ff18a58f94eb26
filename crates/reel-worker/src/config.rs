//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_models::{AssetRequirements, JobStatus};

/// Orchestrator and scene pipeline settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum scenes generating media at once within a job
    pub max_scene_parallel: usize,
    /// Root for per-job working directories
    pub work_dir: PathBuf,
    pub scrape_timeout: Duration,
    pub script_timeout: Duration,
    /// Ceiling for the whole media fan-out
    pub media_timeout: Duration,
    pub composite_timeout: Duration,
    pub upload_timeout: Duration,
    /// Delay between motion status polls
    pub motion_poll_interval: Duration,
    /// Wall-clock budget for one motion request
    pub motion_poll_budget: Duration,
    pub avatar_required: bool,
    pub motion_required: bool,
    /// First backoff delay of the retry policies
    pub retry_base_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_scene_parallel: 4,
            work_dir: PathBuf::from("/tmp/reel"),
            scrape_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(90),
            media_timeout: Duration::from_secs(600),
            composite_timeout: Duration::from_secs(300),
            upload_timeout: Duration::from_secs(120),
            motion_poll_interval: Duration::from_secs(4),
            motion_poll_budget: Duration::from_secs(180),
            avatar_required: false,
            motion_required: true,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_scene_parallel: env_parse("WORKER_MAX_SCENE_PARALLEL", defaults.max_scene_parallel).max(1),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            scrape_timeout: env_secs("WORKER_SCRAPE_TIMEOUT_SECS", 30),
            script_timeout: env_secs("WORKER_SCRIPT_TIMEOUT_SECS", 90),
            media_timeout: env_secs("WORKER_MEDIA_TIMEOUT_SECS", 600),
            composite_timeout: env_secs("WORKER_COMPOSITE_TIMEOUT_SECS", 300),
            upload_timeout: env_secs("WORKER_UPLOAD_TIMEOUT_SECS", 120),
            motion_poll_interval: env_secs("MOTION_POLL_INTERVAL_SECS", 4),
            motion_poll_budget: env_secs("MOTION_POLL_BUDGET_SECS", 180),
            avatar_required: env_parse("WORKER_AVATAR_REQUIRED", defaults.avatar_required),
            motion_required: env_parse("WORKER_MOTION_REQUIRED", defaults.motion_required),
            retry_base_delay: defaults.retry_base_delay,
        }
    }

    /// Wall-clock ceiling for the work done in `stage`.
    pub fn stage_timeout(&self, stage: JobStatus) -> Option<Duration> {
        match stage {
            JobStatus::Scraping => Some(self.scrape_timeout),
            JobStatus::Scripting => Some(self.script_timeout),
            JobStatus::GeneratingMedia => Some(self.media_timeout),
            JobStatus::Compositing => Some(self.composite_timeout),
            JobStatus::Uploading => Some(self.upload_timeout),
            JobStatus::Pending | JobStatus::Completed | JobStatus::Failed => None,
        }
    }

    pub fn requirements(&self) -> AssetRequirements {
        AssetRequirements {
            avatar_required: self.avatar_required,
            motion_required: self.motion_required,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_parse(key, default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_scene_parallel, 4);
        assert_eq!(config.motion_poll_interval, Duration::from_secs(4));
        assert_eq!(config.motion_poll_budget, Duration::from_secs(180));
        assert!(config.motion_required);
        assert!(!config.avatar_required);
    }

    #[test]
    fn test_stage_timeouts() {
        let config = WorkerConfig::default();
        assert_eq!(config.stage_timeout(JobStatus::Pending), None);
        assert_eq!(config.stage_timeout(JobStatus::Scraping), Some(Duration::from_secs(30)));
        assert_eq!(
            config.stage_timeout(JobStatus::GeneratingMedia),
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.stage_timeout(JobStatus::Completed), None);
    }
}
