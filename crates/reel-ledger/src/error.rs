//! Ledger error types.

use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Corrupt record for job {job_id}: {message}")]
    Corrupt { job_id: String, message: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a write may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::ConnectionFailed(_) => true,
            LedgerError::Redis(e) => {
                e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
            }
            LedgerError::Config(_) | LedgerError::Corrupt { .. } | LedgerError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LedgerError::connection_failed("reset").is_retryable());
        assert!(!LedgerError::config("bad url").is_retryable());
        assert!(!LedgerError::Corrupt {
            job_id: "j".into(),
            message: "eof".into()
        }
        .is_retryable());
    }
}
