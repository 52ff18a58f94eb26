//! Provider error types.

use reel_models::ModelError;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Coarse classification used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Bad input; retrying cannot help.
    Validation,
    /// Timeout, 5xx, rate limit, network blip.
    Transient,
    /// 4xx, rejected credentials, unusable response.
    Permanent,
}

/// Errors that can occur while talking to external providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Provider unavailable: {0}")]
    Transient(String),

    #[error("Provider rejected request: {0}")]
    Permanent(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map an HTTP error status to an error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            429 => Self::RateLimited(msg),
            408 | 500..=599 => Self::Transient(format!("HTTP {status}: {msg}")),
            _ => Self::Permanent(format!("HTTP {status}: {msg}")),
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::Validation(_) => ProviderErrorKind::Validation,
            ProviderError::Transient(_) | ProviderError::RateLimited(_) => {
                ProviderErrorKind::Transient
            }
            // A 2xx body that does not decode will not decode on resend either
            ProviderError::Network(e) if e.is_builder() || e.is_decode() => {
                ProviderErrorKind::Permanent
            }
            ProviderError::Network(_) => ProviderErrorKind::Transient,
            ProviderError::Permanent(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::Config(_)
            | ProviderError::Json(_) => ProviderErrorKind::Permanent,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ProviderErrorKind::Transient
    }
}

impl From<ModelError> for ProviderError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => Self::Validation(msg),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_http_status(429, "slow down").is_retryable());
        assert!(ProviderError::from_http_status(503, "down").is_retryable());
        assert!(ProviderError::from_http_status(408, "timeout").is_retryable());
        assert!(!ProviderError::from_http_status(400, "bad").is_retryable());
        assert!(!ProviderError::from_http_status(401, "creds").is_retryable());
        assert_eq!(
            ProviderError::from_http_status(404, "gone").kind(),
            ProviderErrorKind::Permanent
        );
    }

    #[test]
    fn test_model_validation_maps_to_validation() {
        let err: ProviderError = ModelError::validation("empty plan").into();
        assert_eq!(err.kind(), ProviderErrorKind::Validation);
    }
}
