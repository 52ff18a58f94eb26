//! Worker error types and the job failure taxonomy.

use std::fmt;

use reel_ledger::LedgerError;
use reel_media::MediaError;
use reel_models::{JobStatus, ModelError};
use reel_providers::{ProviderError, ProviderErrorKind};
use reel_storage::StorageError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input URL or unusable script; never retried
    Validation,
    /// Timeout, 5xx or rate limit after the retry budget
    TransientProvider,
    /// 4xx or rejected credentials
    PermanentProvider,
    /// Compositor failure
    Render,
    /// Object store or ledger write failure after retries
    Storage,
    /// Cancelled by a user or shutdown
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::TransientProvider => "TransientProviderError",
            ErrorKind::PermanentProvider => "PermanentProviderError",
            ErrorKind::Render => "RenderError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::Cancelled => "CancellationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure raised inside one stage.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {detail}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, detail)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "job cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// Prefix the detail, e.g. with the scene and asset it concerns.
    pub fn context(mut self, prefix: impl fmt::Display) -> Self {
        self.detail = format!("{}: {}", prefix, self.detail);
        self
    }
}

impl From<ModelError> for StageError {
    fn from(e: ModelError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<ProviderError> for StageError {
    fn from(e: ProviderError) -> Self {
        let kind = match e.kind() {
            ProviderErrorKind::Validation => ErrorKind::Validation,
            ProviderErrorKind::Transient => ErrorKind::TransientProvider,
            ProviderErrorKind::Permanent => ErrorKind::PermanentProvider,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<MediaError> for StageError {
    fn from(e: MediaError) -> Self {
        if e.is_cancelled() {
            return Self::cancelled();
        }
        Self::new(ErrorKind::Render, e.detail())
    }
}

impl From<StorageError> for StageError {
    fn from(e: StorageError) -> Self {
        Self::new(ErrorKind::Storage, e.to_string())
    }
}

impl From<LedgerError> for StageError {
    fn from(e: LedgerError) -> Self {
        Self::new(ErrorKind::Storage, format!("ledger write failed: {}", e))
    }
}

/// Stage-tagged failure recorded as a job's `error_message`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage}: {kind}: {detail}")]
pub struct JobFailure {
    pub stage: JobStatus,
    pub kind: ErrorKind,
    pub detail: String,
}

impl JobFailure {
    pub fn new(stage: JobStatus, error: StageError) -> Self {
        Self {
            stage,
            kind: error.kind,
            detail: error.detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_format() {
        let failure = JobFailure::new(
            JobStatus::GeneratingMedia,
            StageError::new(ErrorKind::TransientProvider, "HTTP 503: busy").context("scene 2 motion"),
        );
        assert_eq!(
            failure.to_string(),
            "generating_media: TransientProviderError: scene 2 motion: HTTP 503: busy"
        );
    }

    #[test]
    fn test_provider_classification() {
        let e: StageError = ProviderError::from_http_status(503, "busy").into();
        assert_eq!(e.kind, ErrorKind::TransientProvider);
        let e: StageError = ProviderError::from_http_status(429, "slow down").into();
        assert_eq!(e.kind, ErrorKind::TransientProvider);
        let e: StageError = ProviderError::from_http_status(401, "bad key").into();
        assert_eq!(e.kind, ErrorKind::PermanentProvider);
        let e: StageError = ProviderError::validation("empty plan").into();
        assert_eq!(e.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_media_classification() {
        let e: StageError = MediaError::invalid_input("zero-length audio").into();
        assert_eq!(e.kind, ErrorKind::Render);
        let e: StageError = MediaError::Cancelled.into();
        assert!(e.is_cancelled());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::Cancelled.to_string(), "CancellationError");
        assert_eq!(ErrorKind::Storage.to_string(), "StorageError");
    }
}
