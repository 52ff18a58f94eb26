//! Job ledger abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use reel_models::{JobId, JobRecord};
use tracing::info;

use crate::config::{LedgerBackend, LedgerConfig};
use crate::error::LedgerResult;
use crate::memory::MemoryLedger;
use crate::redis_ledger::RedisLedger;

/// Durable store of record for job rows.
///
/// Writes are scoped to one job's row and are last-writer-wins; no
/// operation spans more than one job.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Upsert the full row.
    async fn put(&self, record: &JobRecord) -> LedgerResult<()>;

    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>>;

    /// Most recently created job for a user.
    async fn latest_for_user(&self, user_id: &str) -> LedgerResult<Option<JobRecord>>;

    /// Jobs not yet in a terminal status.
    async fn list_active(&self) -> LedgerResult<Vec<JobRecord>>;

    /// Reachability check for readiness probes.
    async fn ping(&self) -> LedgerResult<()>;
}

/// Build the ledger selected by `config`.
pub fn connect(config: &LedgerConfig) -> LedgerResult<Arc<dyn JobLedger>> {
    match config.backend {
        LedgerBackend::Redis => {
            info!(prefix = %config.key_prefix, "Using Redis job ledger");
            Ok(Arc::new(RedisLedger::new(config)?))
        }
        LedgerBackend::Memory => {
            info!("Using in-memory job ledger");
            Ok(Arc::new(MemoryLedger::new()))
        }
    }
}
