//! Axum HTTP API for ReelForge.
//!
//! This crate provides:
//! - Job submission, status polling and cancellation endpoints
//! - Source URL validation against internal and metadata hosts
//! - Per-IP rate limiting, security headers and request IDs
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
