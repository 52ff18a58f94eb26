//! Scene media pipeline.
//!
//! Fans out one task per scene, bounded by a semaphore. Each scene drives
//! its providers concurrently: speech, optional avatar, queued motion
//! video and the text overlay. Fan-in re-sorts by scene index. The first
//! unrecoverable scene failure aborts every other scene.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reel_media::OverlayRenderer;
use reel_models::{
    AssetKind, AssetRef, AssetRequirements, JobId, ProductSnapshot, Scene, SceneAsset, ScenePlan,
};
use reel_providers::{
    AvatarRenderer, MotionGenerator, MotionRequest, MotionStatus, ProviderError, ProviderResult,
    SpeechSynthesizer,
};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use crate::cancel::CancelToken;
use crate::config::WorkerConfig;
use crate::error::{ErrorKind, StageError};
use crate::metrics;
use crate::poll::{poll_until, PollError};
use crate::retry::{RetryCounter, RetryError, RetryPolicy};

/// Per-scene media adapters.
#[derive(Clone)]
pub struct MediaProviders {
    pub tts: Arc<dyn SpeechSynthesizer>,
    /// `None` when no avatar service is configured
    pub avatar: Option<Arc<dyn AvatarRenderer>>,
    pub motion: Arc<dyn MotionGenerator>,
    pub overlay: Arc<dyn OverlayRenderer>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_parallel: usize,
    pub requirements: AssetRequirements,
    pub provider_retry: RetryPolicy,
    pub poll_interval: Duration,
    pub poll_budget: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_parallel: config.max_scene_parallel.max(1),
            requirements: config.requirements(),
            provider_retry: RetryPolicy::provider().with_base_delay(config.retry_base_delay),
            poll_interval: config.motion_poll_interval,
            poll_budget: config.motion_poll_budget,
        }
    }
}

/// Produces one render-ready [`SceneAsset`] per scene.
#[derive(Clone)]
pub struct ScenePipeline {
    providers: Arc<MediaProviders>,
    settings: Arc<PipelineSettings>,
}

impl ScenePipeline {
    pub fn new(providers: MediaProviders, settings: PipelineSettings) -> Self {
        Self {
            providers: Arc::new(providers),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Generate media for every scene of `plan`.
    ///
    /// Sends the number of ready scenes on `progress` each time one
    /// finishes. Returns assets sorted by index.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        job_id: &JobId,
        plan: &ScenePlan,
        product: &ProductSnapshot,
        work_dir: &Path,
        cancel: &CancelToken,
        retries: &RetryCounter,
        progress: mpsc::UnboundedSender<usize>,
    ) -> Result<Vec<SceneAsset>, StageError> {
        let total = plan.len();
        if total == 0 {
            return Err(StageError::validation("scene plan is empty"));
        }

        info!(
            job_id = %job_id,
            scenes = total,
            max_parallel = self.settings.max_parallel,
            "Generating scene media"
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel));
        let mut tasks = JoinSet::new();

        for scene in plan.scenes() {
            let worker = SceneWorker {
                providers: Arc::clone(&self.providers),
                settings: Arc::clone(&self.settings),
                cancel: cancel.clone(),
                retries: retries.clone(),
                work_dir: work_dir.to_path_buf(),
            };
            let scene = scene.clone();
            let still = product.image_for_scene(scene.index).map(str::to_string);
            let semaphore = Arc::clone(&semaphore);
            let span = tracing::info_span!("scene", job_id = %job_id, scene = scene.index);

            tasks.spawn(
                async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = worker.cancel.cancelled() => return Err(StageError::cancelled()),
                        permit = semaphore.acquire_owned() => {
                            permit.map_err(|_| StageError::cancelled())?
                        }
                    };
                    worker.generate(scene, still).await
                }
                .instrument(span),
            );
        }

        let mut ready = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let error = match joined {
                Ok(Ok(asset)) => {
                    debug!(job_id = %job_id, scene = asset.index, "Scene render-ready");
                    ready.push(asset);
                    metrics::record_scene_ready();
                    let _ = progress.send(ready.len());
                    continue;
                }
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => StageError::cancelled(),
                Err(e) => StageError::new(ErrorKind::PermanentProvider, format!("scene task panicked: {}", e)),
            };
            warn!(
                job_id = %job_id,
                error = %error,
                pending = tasks.len(),
                "Scene failed, aborting remaining scenes"
            );
            tasks.abort_all();
            return Err(error);
        }

        ready.sort_by_key(|asset| asset.index);
        Ok(ready)
    }
}

/// Everything one scene task needs, owned so it can be spawned.
struct SceneWorker {
    providers: Arc<MediaProviders>,
    settings: Arc<PipelineSettings>,
    cancel: CancelToken,
    retries: RetryCounter,
    work_dir: PathBuf,
}

impl SceneWorker {
    async fn generate(&self, scene: Scene, still: Option<String>) -> Result<SceneAsset, StageError> {
        // Without a product image there is nothing to animate; the scene
        // falls back to a solid background.
        let requirements = AssetRequirements {
            motion_required: self.settings.requirements.motion_required && still.is_some(),
            ..self.settings.requirements
        };

        let (audio, avatar, motion, overlay) = tokio::try_join!(
            self.audio(&scene),
            self.avatar(&scene, requirements.avatar_required),
            self.motion(&scene, still.as_deref(), requirements.motion_required),
            self.overlay(&scene),
        )?;

        let mut asset = SceneAsset::new(scene.index, scene.duration_estimate_seconds)
            .with_still_image(still.map(AssetRef::url));
        for (kind, slot) in [
            (AssetKind::Audio, audio),
            (AssetKind::AvatarVideo, avatar),
            (AssetKind::MotionVideo, motion),
            (AssetKind::OverlayImage, overlay),
        ] {
            if let Some(value) = slot {
                asset.attach(kind, value)?;
            }
        }

        let missing = requirements.missing(&asset);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(AssetKind::as_str).collect();
            return Err(StageError::new(
                ErrorKind::PermanentProvider,
                format!("scene {} missing required {}", scene.index, names.join(", ")),
            ));
        }
        Ok(asset)
    }

    /// One provider call under the retry policy.
    async fn call<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, StageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        self.settings
            .provider_retry
            .run(operation, &self.cancel, &self.retries, ProviderError::is_retryable, f)
            .await
            .map_err(|e| match e {
                RetryError::Failed(err) => StageError::from(err).context(operation),
                RetryError::Cancelled => StageError::cancelled(),
            })
    }

    async fn audio(&self, scene: &Scene) -> Result<Option<AssetRef>, StageError> {
        let operation = format!("scene {} tts", scene.index);
        let tts = &self.providers.tts;
        self.call(&operation, || tts.synthesize(&scene.spoken_text))
            .await
            .map(Some)
    }

    async fn avatar(&self, scene: &Scene, required: bool) -> Result<Option<AssetRef>, StageError> {
        let Some(avatar) = self.providers.avatar.as_ref() else {
            return Ok(None);
        };
        let operation = format!("scene {} avatar", scene.index);
        match self.call(&operation, || avatar.render(&scene.spoken_text)).await {
            Ok(video) => Ok(Some(video)),
            Err(e) if required || e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(scene = scene.index, error = %e, "Avatar unavailable, rendering without picture-in-picture");
                Ok(None)
            }
        }
    }

    async fn motion(
        &self,
        scene: &Scene,
        still: Option<&str>,
        required: bool,
    ) -> Result<Option<AssetRef>, StageError> {
        let Some(image_url) = still else {
            debug!(scene = scene.index, "No product image, skipping motion video");
            return Ok(None);
        };
        let request = MotionRequest {
            scene_index: scene.index,
            image_url: image_url.to_string(),
            prompt: scene.visual_cue.clone(),
            duration_seconds: scene.duration_estimate_seconds,
        };
        match self.generate_motion(&request).await {
            Ok(video) => Ok(Some(video)),
            Err(e) if required || e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(scene = scene.index, error = %e, "Motion video unavailable, using pan/zoom");
                Ok(None)
            }
        }
    }

    /// Submit, poll until terminal, and resubmit once if the first request
    /// does not produce a video.
    async fn generate_motion(&self, request: &MotionRequest) -> Result<AssetRef, StageError> {
        let operation = format!("scene {} motion", request.scene_index);
        let motion = &self.providers.motion;
        let mut resubmitted = false;

        loop {
            let handle = self.call(&operation, || motion.submit(request)).await?;
            debug!(scene = request.scene_index, handle = %handle, "Motion request queued");

            let worker = self;
            let op = operation.as_str();
            let handle_ref = &handle;
            let outcome = poll_until(
                self.settings.poll_interval,
                self.settings.poll_budget,
                &self.cancel,
                || async move {
                    match worker.call(op, || motion.status(handle_ref)).await? {
                        MotionStatus::Pending => Ok(None),
                        MotionStatus::Completed(video) => Ok(Some(Ok(video))),
                        MotionStatus::Failed(reason) => Ok(Some(Err(reason))),
                    }
                },
            )
            .await;

            let failure = match outcome {
                Ok(Ok(video)) => return Ok(video),
                Ok(Err(reason)) => StageError::new(
                    ErrorKind::PermanentProvider,
                    format!("{}: generation failed: {}", operation, reason),
                ),
                Err(PollError::BudgetExceeded { elapsed, polls }) => StageError::new(
                    ErrorKind::TransientProvider,
                    format!(
                        "{}: still pending after {:.0}s and {} polls",
                        operation,
                        elapsed.as_secs_f64(),
                        polls
                    ),
                ),
                Err(PollError::Failed(e)) => return Err(e),
                Err(PollError::Cancelled) => return Err(StageError::cancelled()),
            };

            if resubmitted {
                return Err(failure);
            }
            warn!(
                scene = request.scene_index,
                handle = %handle,
                error = %failure,
                "Motion request did not finish, resubmitting once"
            );
            resubmitted = true;
            self.retries.add(1);
        }
    }

    async fn overlay(&self, scene: &Scene) -> Result<Option<AssetRef>, StageError> {
        self.providers
            .overlay
            .render(scene.index, &scene.spoken_text, &self.work_dir, self.cancel.receiver())
            .await
            .map(Some)
            .map_err(|e| StageError::from(e).context(format!("scene {} overlay", scene.index)))
    }
}
