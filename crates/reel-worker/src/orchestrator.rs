//! Job orchestrator.
//!
//! Owns the job state machine:
//!
//! ```text
//! pending -> scraping -> scripting -> generating_media -> compositing -> uploading -> completed
//!     \__________\____________\______________\_________________\____________\______-> failed
//! ```
//!
//! Each job runs on its own task. [`Orchestrator::advance`] executes the
//! entry action of the current status, persists the result and either
//! moves one step forward or fails the job. Re-entering a status after a
//! restart recomputes missing in-memory artifacts without regressing the
//! persisted status.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use reel_ledger::{JobLedger, LedgerError};
use reel_media::{CompositionRequest, Compositor, RenderedVideo};
use reel_models::{JobId, JobRecord, JobStatus, ProductSnapshot, SceneAsset, ScenePlan};
use reel_providers::scraper::parse_source_url;
use reel_providers::{ProductScraper, ProviderError, ScriptGenerator};
use reel_storage::{video_key, ObjectBody, ObjectStore, StorageError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use crate::cancel::CancelToken;
use crate::config::WorkerConfig;
use crate::error::{ErrorKind, JobFailure, StageError, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{MediaProviders, PipelineSettings, ScenePipeline};
use crate::retry::{RetryCounter, RetryError, RetryPolicy};

const OPERATION: &str = "generate_video";

/// Adapters the orchestrator drives, each built from its own config.
#[derive(Clone)]
pub struct Services {
    pub scraper: Arc<dyn ProductScraper>,
    pub script: Arc<dyn ScriptGenerator>,
    pub media: MediaProviders,
    pub compositor: Arc<dyn Compositor>,
    pub store: Arc<dyn ObjectStore>,
    pub ledger: Arc<dyn JobLedger>,
}

/// In-memory artifacts carried between stages of one run.
///
/// Lost on restart; stages that need a missing artifact rebuild it.
#[derive(Debug, Default)]
pub struct JobContext {
    plan: Option<ScenePlan>,
    scenes: Option<Vec<SceneAsset>>,
    rendered: Option<RenderedVideo>,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal,
    NotFound,
}

struct Inner {
    scraper: Arc<dyn ProductScraper>,
    script: Arc<dyn ScriptGenerator>,
    pipeline: ScenePipeline,
    compositor: Arc<dyn Compositor>,
    store: Arc<dyn ObjectStore>,
    ledger: Arc<dyn JobLedger>,
    config: WorkerConfig,
    provider_retry: RetryPolicy,
    storage_retry: RetryPolicy,
    running: Mutex<HashMap<JobId, CancelToken>>,
}

/// Drives jobs from submission to a terminal status.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(services: Services, config: WorkerConfig) -> Self {
        let pipeline = ScenePipeline::new(services.media, PipelineSettings::from_config(&config));
        Self {
            inner: Arc::new(Inner {
                scraper: services.scraper,
                script: services.script,
                pipeline,
                compositor: services.compositor,
                store: services.store,
                ledger: services.ledger,
                provider_retry: RetryPolicy::provider().with_base_delay(config.retry_base_delay),
                storage_retry: RetryPolicy::storage().with_base_delay(config.retry_base_delay),
                config,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn ledger(&self) -> &Arc<dyn JobLedger> {
        &self.inner.ledger
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    /// Record a new job and start it in the background.
    pub async fn submit(&self, source_url: &str, user_id: &str) -> WorkerResult<JobId> {
        if user_id.trim().is_empty() {
            return Err(WorkerError::validation("user id must not be empty"));
        }
        let record = JobRecord::new(user_id.trim(), source_url.trim());
        self.persist(&record).await?;

        metrics::record_job_submitted();
        info!(job_id = %record.job_id, user_id = %record.user_id, "Job submitted");

        let job_id = record.job_id.clone();
        self.spawn(record);
        Ok(job_id)
    }

    /// Restart every non-terminal job found in the ledger.
    pub async fn resume_active(&self) -> WorkerResult<usize> {
        let active = self.inner.ledger.list_active().await?;
        let mut resumed = 0;
        for record in active {
            let status = record.status;
            let job_id = record.job_id.clone();
            if self.spawn(record) {
                metrics::record_job_resumed(status);
                info!(job_id = %job_id, stage = %status, "Resuming job");
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    /// Cancel a job.
    ///
    /// A job running here is signalled and fails at its next suspension
    /// point. An orphaned non-terminal row is failed directly.
    pub async fn cancel(&self, job_id: &JobId) -> WorkerResult<CancelOutcome> {
        if let Some(token) = self.running_token(job_id) {
            if token.cancel() {
                info!(job_id = %job_id, "Cancelling running job");
                return Ok(CancelOutcome::Cancelled);
            }
            info!(job_id = %job_id, "Job already uploaded, cancel refused");
            return Ok(CancelOutcome::AlreadyTerminal);
        }

        match self.inner.ledger.get(job_id).await? {
            None => Ok(CancelOutcome::NotFound),
            Some(record) if record.is_terminal() => Ok(CancelOutcome::AlreadyTerminal),
            Some(mut record) => {
                let stage = record.status;
                self.fail(&mut record, stage, StageError::cancelled()).await;
                Ok(CancelOutcome::Cancelled)
            }
        }
    }

    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.running_token(job_id).is_some()
    }

    pub fn running_jobs(&self) -> usize {
        self.running_map().len()
    }

    /// Drive `record` to a terminal status.
    pub async fn run(&self, mut record: JobRecord, cancel: CancelToken) -> JobRecord {
        let logger = JobLogger::new(&record.job_id, OPERATION);
        logger.log_start(&record);

        let mut ctx = JobContext::default();
        while !record.is_terminal() {
            logger.log_stage(record.status, record.progress);
            self.advance(&mut record, &mut ctx, &cancel).await;
        }

        if record.status == JobStatus::Completed {
            metrics::record_job_completed();
        }
        logger.log_outcome(&record);

        self.running_map().remove(&record.job_id);
        self.cleanup_work_dir(&record.job_id).await;
        record
    }

    /// Execute the current status's entry action and persist the outcome.
    ///
    /// Terminal records are left untouched and nothing is written.
    pub async fn advance(
        &self,
        record: &mut JobRecord,
        ctx: &mut JobContext,
        cancel: &CancelToken,
    ) -> JobStatus {
        if record.is_terminal() {
            debug!(job_id = %record.job_id, status = %record.status, "Job already terminal");
            return record.status;
        }

        let stage = record.status;
        let started = Instant::now();
        let retries = RetryCounter::new();
        let result = self.execute(stage, record, ctx, cancel, &retries).await;

        record.add_retries(stage, retries.get());
        metrics::record_retries(stage, retries.get());
        metrics::record_stage_duration(stage, started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                if let Err(e) = self.persist(record).await {
                    if record.is_terminal() {
                        error!(job_id = %record.job_id, error = %e, "Failed to persist terminal status");
                    } else {
                        self.fail(record, stage, e.into()).await;
                    }
                }
            }
            Err(e) => self.fail(record, stage, e).await,
        }
        record.status
    }

    async fn execute(
        &self,
        stage: JobStatus,
        record: &mut JobRecord,
        ctx: &mut JobContext,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<(), StageError> {
        match stage {
            JobStatus::Pending => {
                parse_source_url(&record.source_url)?;
                record.transition(JobStatus::Scraping)?;
            }
            JobStatus::Scraping => {
                self.ensure_snapshot(record, cancel, retries).await?;
                record.transition(JobStatus::Scripting)?;
            }
            JobStatus::Scripting => {
                self.ensure_plan(record, ctx, cancel, retries).await?;
                record.transition(JobStatus::GeneratingMedia)?;
            }
            JobStatus::GeneratingMedia => {
                let scenes = self.generate_media(record, ctx, cancel, retries).await?;
                ctx.scenes = Some(scenes);
                record.transition(JobStatus::Compositing)?;
            }
            JobStatus::Compositing => {
                let rendered = self.render(record, ctx, cancel, retries).await?;
                ctx.rendered = Some(rendered);
                record.transition(JobStatus::Uploading)?;
            }
            JobStatus::Uploading => {
                let rendered = match ctx.rendered.take() {
                    Some(rendered) => rendered,
                    None => self.render(record, ctx, cancel, retries).await?,
                };
                let video_url = self.upload(&record.job_id, &rendered, cancel, retries).await?;
                if !cancel.seal() {
                    return Err(StageError::cancelled());
                }
                record.complete(video_url)?;
            }
            JobStatus::Completed | JobStatus::Failed => {}
        }
        Ok(())
    }

    /// Run `work` under the stage's wall-clock ceiling, ending early on
    /// cancellation.
    async fn staged<T>(
        &self,
        stage: JobStatus,
        cancel: &CancelToken,
        work: impl Future<Output = Result<T, StageError>>,
    ) -> Result<T, StageError> {
        let bounded = async {
            match self.inner.config.stage_timeout(stage) {
                Some(ceiling) => match tokio::time::timeout(ceiling, work).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::new(
                        ErrorKind::TransientProvider,
                        format!("{} exceeded its {:?} ceiling", stage, ceiling),
                    )),
                },
                None => work.await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageError::cancelled()),
            result = bounded => result,
        }
    }

    async fn provider_call<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        retries: &RetryCounter,
        f: F,
    ) -> Result<T, StageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.inner
            .provider_retry
            .run(operation, cancel, retries, ProviderError::is_retryable, f)
            .await
            .map_err(|e| match e {
                RetryError::Failed(err) => StageError::from(err).context(operation),
                RetryError::Cancelled => StageError::cancelled(),
            })
    }

    async fn ensure_snapshot(
        &self,
        record: &mut JobRecord,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<ProductSnapshot, StageError> {
        if let Some(snapshot) = &record.product_snapshot {
            return Ok(snapshot.clone());
        }

        let scraper = &self.inner.scraper;
        let url = record.source_url.clone();
        let snapshot = self
            .staged(
                JobStatus::Scraping,
                cancel,
                self.provider_call("scrape", cancel, retries, || scraper.scrape(&url)),
            )
            .await?;

        debug!(
            job_id = %record.job_id,
            title = %snapshot.title,
            images = snapshot.images.len(),
            "Product scraped"
        );
        record.record_snapshot(snapshot.clone());
        Ok(snapshot)
    }

    async fn ensure_plan(
        &self,
        record: &mut JobRecord,
        ctx: &mut JobContext,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<ScenePlan, StageError> {
        if let Some(plan) = &ctx.plan {
            return Ok(plan.clone());
        }

        let snapshot = self.ensure_snapshot(record, cancel, retries).await?;
        let script = &self.inner.script;
        let plan = self
            .staged(
                JobStatus::Scripting,
                cancel,
                self.provider_call("script", cancel, retries, || script.generate(&snapshot)),
            )
            .await?;
        if plan.is_empty() {
            return Err(StageError::validation("script generator returned no scenes"));
        }
        if !plan.within_target_band() {
            warn!(
                job_id = %record.job_id,
                estimated_seconds = plan.estimated_total_seconds(),
                "Scene plan outside the 20-50s target band"
            );
        }

        info!(job_id = %record.job_id, scenes = plan.len(), "Scene plan ready");
        ctx.plan = Some(plan.clone());
        Ok(plan)
    }

    async fn generate_media(
        &self,
        record: &mut JobRecord,
        ctx: &mut JobContext,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<Vec<SceneAsset>, StageError> {
        if let Some(scenes) = ctx.scenes.take() {
            return Ok(scenes);
        }

        let plan = self.ensure_plan(record, ctx, cancel, retries).await?;
        let snapshot = self.ensure_snapshot(record, cancel, retries).await?;
        let work_dir = self.work_dir(&record.job_id);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| StageError::new(ErrorKind::Render, format!("work dir: {}", e)))?;

        let job_id = record.job_id.clone();
        let total = plan.len();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let media = self.staged(
            JobStatus::GeneratingMedia,
            cancel,
            self.inner
                .pipeline
                .run(&job_id, &plan, &snapshot, &work_dir, cancel, retries, tx),
        );
        tokio::pin!(media);

        let scenes = loop {
            tokio::select! {
                result = &mut media => break result?,
                Some(ready) = rx.recv() => {
                    if record.record_media_progress(ready, total) {
                        self.persist_progress(record).await;
                    }
                }
            }
        };
        while let Ok(ready) = rx.try_recv() {
            record.record_media_progress(ready, total);
        }
        Ok(scenes)
    }

    async fn render(
        &self,
        record: &mut JobRecord,
        ctx: &mut JobContext,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<RenderedVideo, StageError> {
        let scenes = self.generate_media(record, ctx, cancel, retries).await?;
        let request = CompositionRequest {
            job_id: record.job_id.to_string(),
            work_dir: self.work_dir(&record.job_id),
            scenes,
        };
        let compositor = &self.inner.compositor;
        let rendered = self
            .staged(JobStatus::Compositing, cancel, async {
                compositor
                    .compose(request, cancel.receiver())
                    .await
                    .map_err(StageError::from)
            })
            .await?;

        info!(
            job_id = %record.job_id,
            duration = rendered.duration_seconds,
            size_bytes = rendered.size_bytes,
            "Video composited"
        );
        Ok(rendered)
    }

    /// Push the render to its deterministic key; retries overwrite.
    async fn upload(
        &self,
        job_id: &JobId,
        rendered: &RenderedVideo,
        cancel: &CancelToken,
        retries: &RetryCounter,
    ) -> Result<String, StageError> {
        let key = video_key(job_id);
        let store = &self.inner.store;
        let put = async {
            self.inner
                .storage_retry
                .run("upload", cancel, retries, StorageError::is_retryable, || {
                    store.put(ObjectBody::File(rendered.path.clone()), &key, "video/mp4")
                })
                .await
                .map_err(|e| match e {
                    RetryError::Failed(err) => StageError::from(err).context("upload"),
                    RetryError::Cancelled => StageError::cancelled(),
                })
        };
        let url = self.staged(JobStatus::Uploading, cancel, put).await?;
        info!(job_id = %job_id, key = %key, url = %url, "Video uploaded");
        Ok(url)
    }

    async fn fail(&self, record: &mut JobRecord, stage: JobStatus, error: StageError) {
        let failure = JobFailure::new(stage, error);
        if let Err(e) = record.fail(failure.to_string()) {
            warn!(job_id = %record.job_id, error = %e, "Job already terminal, failure not recorded");
            return;
        }
        metrics::record_job_failed(stage, failure.kind);
        warn!(
            job_id = %record.job_id,
            stage = %stage,
            kind = %failure.kind,
            error = %failure.detail,
            "Job failed"
        );
        if let Err(e) = self.persist(record).await {
            error!(job_id = %record.job_id, error = %e, "Failed to persist job failure");
        }
    }

    /// Upsert the row with the storage retry budget.
    ///
    /// Never tied to a job's cancel token so failures are still recorded.
    async fn persist(&self, record: &JobRecord) -> Result<(), LedgerError> {
        let ledger = &self.inner.ledger;
        self.inner
            .storage_retry
            .run(
                "ledger write",
                &CancelToken::new(),
                &RetryCounter::new(),
                LedgerError::is_retryable,
                || ledger.put(record),
            )
            .await
            .map_err(|e| match e {
                RetryError::Failed(err) => err,
                RetryError::Cancelled => LedgerError::connection_failed("ledger write cancelled"),
            })
    }

    async fn persist_progress(&self, record: &JobRecord) {
        if let Err(e) = self.inner.ledger.put(record).await {
            warn!(job_id = %record.job_id, progress = record.progress, error = %e, "Progress write failed");
        }
    }

    /// Register a cancel token and start the job's task.
    ///
    /// Returns `false` if the job is already running here.
    fn spawn(&self, record: JobRecord) -> bool {
        let token = CancelToken::new();
        if !self.track(&record.job_id, token.clone()) {
            return false;
        }

        let span = JobLogger::new(&record.job_id, OPERATION).span();
        let this = self.clone();
        tokio::spawn(
            async move {
                this.run(record, token).await;
            }
            .instrument(span),
        );
        true
    }

    fn running_map(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancelToken>> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `token` as the running job's signal unless one exists.
    pub(crate) fn track(&self, job_id: &JobId, token: CancelToken) -> bool {
        let mut running = self.running_map();
        if running.contains_key(job_id) {
            return false;
        }
        running.insert(job_id.clone(), token);
        true
    }

    fn running_token(&self, job_id: &JobId) -> Option<CancelToken> {
        self.running_map().get(job_id).cloned()
    }

    fn work_dir(&self, job_id: &JobId) -> PathBuf {
        self.inner.config.work_dir.join(job_id.as_str())
    }

    async fn cleanup_work_dir(&self, job_id: &JobId) {
        let dir = self.work_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job_id, dir = %dir.display(), "Removed work dir"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %job_id, dir = %dir.display(), error = %e, "Failed to remove work dir"),
        }
    }
}
