//! In-process job ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reel_models::{JobId, JobRecord};
use tokio::sync::RwLock;

use crate::error::LedgerResult;
use crate::ledger::JobLedger;

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<JobId, JobRecord>,
    /// Every row written, in write order; only kept when `keep_history`
    history: HashMap<JobId, Vec<JobRecord>>,
    keep_history: bool,
}

/// Ledger held in memory. Rows are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that also keeps every written version of each row.
    ///
    /// Memory grows with every write; meant for tests that inspect
    /// progress over time.
    pub fn with_history() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                keep_history: true,
                ..Inner::default()
            })),
        }
    }

    /// Every version of a row that was written, oldest first.
    ///
    /// Empty unless built with [`MemoryLedger::with_history`].
    pub async fn history(&self, job_id: &JobId) -> Vec<JobRecord> {
        self.inner
            .read()
            .await
            .history
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobLedger for MemoryLedger {
    async fn put(&self, record: &JobRecord) -> LedgerResult<()> {
        let mut inner = self.inner.write().await;
        if inner.keep_history {
            inner
                .history
                .entry(record.job_id.clone())
                .or_default()
                .push(record.clone());
        }
        inner.rows.insert(record.job_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>> {
        Ok(self.inner.read().await.rows.get(job_id).cloned())
    }

    async fn latest_for_user(&self, user_id: &str) -> LedgerResult<Option<JobRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rows
            .values()
            .filter(|r| r.user_id == user_id)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.job_id.cmp(&b.job_id))
            })
            .cloned())
    }

    async fn list_active(&self) -> LedgerResult<Vec<JobRecord>> {
        let inner = self.inner.read().await;
        let mut active: Vec<JobRecord> = inner
            .rows
            .values()
            .filter(|r| !r.is_terminal())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }

    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }
}
