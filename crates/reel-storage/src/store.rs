//! Object store abstraction.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Payload of an upload.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Durable blob store returning public URLs.
///
/// `put` is idempotent per key: writing the same key again overwrites. It
/// only returns once the store has acknowledged the write.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, body: ObjectBody, key: &str, content_type: &str) -> StorageResult<String>;

    /// Connectivity check for readiness probes.
    async fn check(&self) -> StorageResult<()>;
}
