//! Redis-backed job ledger.
//!
//! Layout under the configured prefix:
//! - `{prefix}:job:{job_id}`: the row as JSON
//! - `{prefix}:user:{user_id}`: sorted set of job ids scored by creation time
//! - `{prefix}:active`: set of job ids not yet terminal

use async_trait::async_trait;
use redis::AsyncCommands;
use reel_models::{JobId, JobRecord};
use tracing::{debug, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::JobLedger;

pub struct RedisLedger {
    client: redis::Client,
    prefix: String,
}

impl RedisLedger {
    pub fn new(config: &LedgerConfig) -> LedgerResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            prefix: config.key_prefix.clone(),
        })
    }

    pub fn from_env() -> LedgerResult<Self> {
        Self::new(&LedgerConfig::from_env()?)
    }

    pub fn job_key(&self, job_id: &JobId) -> String {
        format!("{}:job:{}", self.prefix, job_id)
    }

    pub fn user_key(&self, user_id: &str) -> String {
        format!("{}:user:{}", self.prefix, user_id)
    }

    pub fn active_key(&self) -> String {
        format!("{}:active", self.prefix)
    }

    async fn connection(&self) -> LedgerResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LedgerError::connection_failed(e.to_string()))
    }

    fn decode(job_id: &str, payload: &str) -> LedgerResult<JobRecord> {
        serde_json::from_str(payload).map_err(|e| LedgerError::Corrupt {
            job_id: job_id.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl JobLedger for RedisLedger {
    async fn put(&self, record: &JobRecord) -> LedgerResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(record)?;
        let job_id = record.job_id.as_str();
        let score = record.created_at.timestamp_millis();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(self.job_key(&record.job_id), payload)
            .ignore()
            .zadd(self.user_key(&record.user_id), job_id, score)
            .ignore();
        if record.is_terminal() {
            pipe.srem(self.active_key(), job_id).ignore();
        } else {
            pipe.sadd(self.active_key(), job_id).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        debug!(
            job_id = %record.job_id,
            status = %record.status,
            progress = record.progress,
            "Ledger row written"
        );
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.job_key(job_id)).await?;
        payload
            .map(|p| Self::decode(job_id.as_str(), &p))
            .transpose()
    }

    async fn latest_for_user(&self, user_id: &str) -> LedgerResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.zrevrange(self.user_key(user_id), 0, 0).await?;
        match ids.into_iter().next() {
            Some(id) => self.get(&JobId::from_string(id)).await,
            None => Ok(None),
        }
    }

    async fn list_active(&self) -> LedgerResult<Vec<JobRecord>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn.smembers(self.active_key()).await?;

        let mut active = Vec::with_capacity(ids.len());
        for id in ids {
            let payload: Option<String> = conn.get(format!("{}:job:{}", self.prefix, id)).await?;
            match payload {
                Some(p) => match Self::decode(&id, &p) {
                    Ok(record) if !record.is_terminal() => active.push(record),
                    Ok(_) => {
                        conn.srem::<_, _, ()>(self.active_key(), &id).await?;
                    }
                    Err(e) => warn!(job_id = %id, error = %e, "Skipping unreadable ledger row"),
                },
                None => {
                    conn.srem::<_, _, ()>(self.active_key(), &id).await?;
                }
            }
        }
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }

    async fn ping(&self) -> LedgerResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::JobStatus;

    fn ledger() -> RedisLedger {
        let config = LedgerConfig {
            key_prefix: "reel-test".to_string(),
            ..Default::default()
        };
        RedisLedger::new(&config).unwrap()
    }

    #[test]
    fn test_key_layout() {
        let ledger = ledger();
        let id = JobId::from_string("abc");
        assert_eq!(ledger.job_key(&id), "reel-test:job:abc");
        assert_eq!(ledger.user_key("u1"), "reel-test:user:u1");
        assert_eq!(ledger.active_key(), "reel-test:active");
    }

    #[test]
    fn test_decode_corrupt_row() {
        let err = RedisLedger::decode("abc", "{not json").unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { .. }));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn test_round_trip_against_redis() {
        let ledger = ledger();
        let mut record = JobRecord::new("redis-user", "https://shop.example/p/1");
        ledger.put(&record).await.unwrap();
        assert!(ledger
            .list_active()
            .await
            .unwrap()
            .iter()
            .any(|r| r.job_id == record.job_id));

        record.fail("scraping: PermanentProviderError: blocked").unwrap();
        ledger.put(&record).await.unwrap();

        let stored = ledger.get(&record.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        let latest = ledger.latest_for_user("redis-user").await.unwrap().unwrap();
        assert_eq!(latest.job_id, record.job_id);
        assert!(!ledger
            .list_active()
            .await
            .unwrap()
            .iter()
            .any(|r| r.job_id == record.job_id));
    }
}
