//! Model error types.

use thiserror::Error;

use crate::status::JobStatus;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Asset already attached: scene {index} {kind}")]
    AssetAlreadyAttached { index: usize, kind: &'static str },
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
