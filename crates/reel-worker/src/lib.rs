//! Video job orchestration for ReelForge.
//!
//! This crate provides:
//! - The [`Orchestrator`] state machine that drives a job from submission
//!   to `completed` or `failed`
//! - The [`ScenePipeline`] fan-out that generates every scene's media
//!   under a concurrency cap
//! - Retry, polling and cancellation primitives shared by both

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod poll;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


pub use cancel::CancelToken;
pub use config::WorkerConfig;
pub use error::{ErrorKind, JobFailure, StageError, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{CancelOutcome, JobContext, Orchestrator, Services};
pub use pipeline::{MediaProviders, PipelineSettings, ScenePipeline};
pub use poll::{poll_until, PollError};
pub use retry::{RetryCounter, RetryError, RetryPolicy};
