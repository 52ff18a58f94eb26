//! Object storage for rendered videos.
//!
//! This crate provides:
//! - The [`ObjectStore`] seam used by the orchestrator's upload stage
//! - A Cloudflare R2 implementation over the S3 API
//! - An in-memory store for tests and local runs
//! - Deterministic object keys so retried uploads overwrite

pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{validate_key, video_key};
pub use memory::MemoryStore;
pub use store::{ObjectBody, ObjectStore};
