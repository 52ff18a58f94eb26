//! Scripted doubles for orchestrator tests.
//!
//! Every double counts its calls and can be told to fail. Nothing here
//! touches the network or FFmpeg.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reel_ledger::{JobLedger, MemoryLedger};
use reel_media::{CompositionRequest, Compositor, MediaError, MediaResult, OverlayRenderer, RenderedVideo};
use reel_models::{AssetKind, AssetRef, JobId, JobRecord, ProductSnapshot, ScenePlan};
use reel_providers::{
    AvatarRenderer, MotionGenerator, MotionHandle, MotionRequest, MotionStatus, ProductScraper,
    ProviderError, ProviderResult, ScriptGenerator, SpeechSynthesizer,
};
use reel_storage::{MemoryStore, ObjectBody, ObjectStore, StorageError, StorageResult};
use tokio::sync::watch;

use crate::config::WorkerConfig;
use crate::orchestrator::{Orchestrator, Services};
use crate::pipeline::MediaProviders;

/// How an injected failure is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transient,
    Permanent,
}

/// Failure schedule for a double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Fail the next `n` calls, then succeed
    Times(u32, FaultKind),
    Always(FaultKind),
}

#[derive(Debug, Default)]
struct FaultInjector(Mutex<Fault>);

impl FaultInjector {
    fn set(&self, fault: Fault) {
        *lock(&self.0) = fault;
    }

    /// Which failure, if any, the current call should see.
    fn take(&self) -> Option<FaultKind> {
        let mut fault = lock(&self.0);
        match *fault {
            Fault::None => None,
            Fault::Always(kind) => Some(kind),
            Fault::Times(0, _) => {
                *fault = Fault::None;
                None
            }
            Fault::Times(n, kind) => {
                *fault = if n == 1 { Fault::None } else { Fault::Times(n - 1, kind) };
                Some(kind)
            }
        }
    }

    fn check(&self, operation: &str) -> ProviderResult<()> {
        match self.take() {
            None => Ok(()),
            Some(FaultKind::Transient) => Err(ProviderError::from_http_status(
                503,
                format!("{} unavailable", operation),
            )),
            Some(FaultKind::Permanent) => Err(ProviderError::from_http_status(
                403,
                format!("{} rejected", operation),
            )),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A product with two images and a price.
pub fn sample_product() -> ProductSnapshot {
    ProductSnapshot {
        title: "Trail Runner 2".to_string(),
        price: Some("$89.00".to_string()),
        description: "Lightweight running shoe with a grippy sole.".to_string(),
        images: vec![
            "https://cdn.shop.example/img/front.jpg".to_string(),
            "https://cdn.shop.example/img/side.jpg".to_string(),
        ],
    }
}

/// Text spoken in scene `index` of [`FakeScriptGenerator::with_scenes`].
pub fn scene_text(index: usize) -> String {
    format!("Line for scene {}", index)
}

pub struct FakeScraper {
    snapshot: ProductSnapshot,
    faults: FaultInjector,
    calls: AtomicUsize,
}

impl FakeScraper {
    pub fn new(snapshot: ProductSnapshot) -> Self {
        Self {
            snapshot,
            faults: FaultInjector::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductScraper for FakeScraper {
    async fn scrape(&self, _source_url: &str) -> ProviderResult<ProductSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.faults.check("scraper")?;
        Ok(self.snapshot.clone())
    }
}

/// Replies with fixed JSON, validated like a real model reply.
pub struct FakeScriptGenerator {
    reply: Mutex<String>,
    faults: FaultInjector,
    calls: AtomicUsize,
}

impl FakeScriptGenerator {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Mutex::new(reply.into()),
            faults: FaultInjector::default(),
            calls: AtomicUsize::new(0),
        }
    }

    /// `count` scenes of 8 seconds each.
    pub fn with_scenes(count: usize) -> Self {
        Self::with_reply(plan_reply(count))
    }

    pub fn set_reply(&self, reply: impl Into<String>) {
        *lock(&self.reply) = reply.into();
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// JSON reply describing `count` scenes.
pub fn plan_reply(count: usize) -> String {
    let scenes: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"visual_cue": "Close-up shot {}", "text": "{}", "duration_est": 8}}"#,
                i,
                scene_text(i)
            )
        })
        .collect();
    format!(r#"{{"scenes": [{}]}}"#, scenes.join(","))
}

#[async_trait]
impl ScriptGenerator for FakeScriptGenerator {
    async fn generate(&self, _product: &ProductSnapshot) -> ProviderResult<ScenePlan> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.faults.check("script")?;
        let reply = lock(&self.reply).clone();
        Ok(ScenePlan::from_json(&reply)?)
    }
}

/// Speech double. Per-text delays make scenes finish out of order.
#[derive(Default)]
pub struct FakeTts {
    faults: FaultInjector,
    calls: AtomicUsize,
    delays: Mutex<HashMap<String, Duration>>,
    completed: Mutex<Vec<String>>,
}

impl FakeTts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn set_delay(&self, text: impl Into<String>, delay: Duration) {
        lock(&self.delays).insert(text.into(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts in the order their synthesis finished.
    pub fn completion_order(&self) -> Vec<String> {
        lock(&self.completed).clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> ProviderResult<AssetRef> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = lock(&self.delays).get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.faults.check("tts")?;
        lock(&self.completed).push(text.to_string());
        Ok(AssetRef::bytes(b"ID3fake-mp3".to_vec(), "mp3"))
    }
}

#[derive(Default)]
pub struct FakeAvatar {
    faults: FaultInjector,
    calls: AtomicUsize,
}

impl FakeAvatar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvatarRenderer for FakeAvatar {
    async fn render(&self, _text: &str) -> ProviderResult<AssetRef> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.faults.check("avatar")?;
        Ok(AssetRef::url(format!("https://avatar.example/renders/{}.mp4", n)))
    }
}

/// Queue/poll motion double.
///
/// Requests complete after a fixed number of polls unless their scene is
/// marked stuck, in which case they stay pending forever.
pub struct FakeMotion {
    faults: FaultInjector,
    polls_to_complete: u32,
    stuck: Mutex<HashSet<usize>>,
    submits: Mutex<HashMap<usize, u32>>,
    polls: Mutex<HashMap<String, u32>>,
    next_id: AtomicUsize,
}

impl Default for FakeMotion {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FakeMotion {
    pub fn new(polls_to_complete: u32) -> Self {
        Self {
            faults: FaultInjector::default(),
            polls_to_complete,
            stuck: Mutex::new(HashSet::new()),
            submits: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    /// Requests for `scene` never leave the queue.
    pub fn stick(&self, scene: usize) {
        lock(&self.stuck).insert(scene);
    }

    pub fn submits_for(&self, scene: usize) -> u32 {
        lock(&self.submits).get(&scene).copied().unwrap_or(0)
    }

    pub fn total_submits(&self) -> u32 {
        lock(&self.submits).values().sum()
    }

    pub fn total_polls(&self) -> u32 {
        lock(&self.polls).values().sum()
    }

    fn scene_of(handle: &MotionHandle) -> Option<usize> {
        handle.as_str().split('-').nth(1)?.parse().ok()
    }
}

#[async_trait]
impl MotionGenerator for FakeMotion {
    async fn submit(&self, request: &MotionRequest) -> ProviderResult<MotionHandle> {
        self.faults.check("motion")?;
        *lock(&self.submits).entry(request.scene_index).or_default() += 1;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MotionHandle(format!("req-{}-{}", request.scene_index, id)))
    }

    async fn status(&self, handle: &MotionHandle) -> ProviderResult<MotionStatus> {
        let polls = {
            let mut polls = lock(&self.polls);
            let count = polls.entry(handle.to_string()).or_default();
            *count += 1;
            *count
        };
        let stuck = Self::scene_of(handle).is_some_and(|scene| lock(&self.stuck).contains(&scene));
        if stuck || polls < self.polls_to_complete {
            return Ok(MotionStatus::Pending);
        }
        Ok(MotionStatus::Completed(AssetRef::url(format!(
            "https://motion.example/{}.mp4",
            handle
        ))))
    }
}

/// Returns a small in-memory PNG stand-in.
#[derive(Default)]
pub struct FakeOverlay {
    calls: AtomicUsize,
}

impl FakeOverlay {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OverlayRenderer for FakeOverlay {
    async fn render(
        &self,
        _index: usize,
        text: &str,
        _work_dir: &Path,
        _cancel: watch::Receiver<bool>,
    ) -> MediaResult<AssetRef> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(MediaError::invalid_input("overlay text is empty"));
        }
        Ok(AssetRef::bytes(b"\x89PNGfake".to_vec(), "png"))
    }
}

/// One call received by [`RecordingCompositor`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionCall {
    pub job_id: String,
    pub indices: Vec<usize>,
    pub with_avatar: Vec<bool>,
    pub with_motion: Vec<bool>,
}

/// Records what it was asked to render and writes a stub file.
#[derive(Default)]
pub struct RecordingCompositor {
    calls: Mutex<Vec<CompositionCall>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingCompositor {
    pub fn calls(&self) -> Vec<CompositionCall> {
        lock(&self.calls).clone()
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.fail_with) = Some(message.into());
    }
}

#[async_trait]
impl Compositor for RecordingCompositor {
    async fn compose(
        &self,
        request: CompositionRequest,
        _cancel: watch::Receiver<bool>,
    ) -> MediaResult<RenderedVideo> {
        lock(&self.calls).push(CompositionCall {
            job_id: request.job_id.clone(),
            indices: request.scenes.iter().map(|s| s.index).collect(),
            with_avatar: request
                .scenes
                .iter()
                .map(|s| s.get(AssetKind::AvatarVideo).is_some())
                .collect(),
            with_motion: request
                .scenes
                .iter()
                .map(|s| s.get(AssetKind::MotionVideo).is_some())
                .collect(),
        });
        if let Some(message) = lock(&self.fail_with).clone() {
            return Err(MediaError::invalid_input(message));
        }

        tokio::fs::create_dir_all(&request.work_dir).await?;
        let path = request.work_dir.join("final.mp4");
        tokio::fs::write(&path, b"fake mp4 payload").await?;
        let scene_durations: Vec<f64> = request
            .scenes
            .iter()
            .map(|s| s.duration_estimate_seconds)
            .collect();
        Ok(RenderedVideo {
            path,
            duration_seconds: scene_durations.iter().sum(),
            size_bytes: 16,
            scene_durations,
        })
    }
}

/// Memory store that can be told to fail uploads.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    faults: Arc<FaultInjector>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_fault(&self, fault: Fault) {
        self.faults.set(fault);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, body: ObjectBody, key: &str, content_type: &str) -> StorageResult<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.faults.take() {
            None => self.inner.put(body, key, content_type).await,
            Some(FaultKind::Transient) => Err(StorageError::upload_failed("503 slow down")),
            Some(FaultKind::Permanent) => Err(StorageError::InvalidKey(key.to_string())),
        }
    }

    async fn check(&self) -> StorageResult<()> {
        self.inner.check().await
    }
}

/// Worker config with millisecond timings.
pub fn fast_config(work_dir: PathBuf) -> WorkerConfig {
    WorkerConfig {
        max_scene_parallel: 4,
        work_dir,
        scrape_timeout: Duration::from_secs(5),
        script_timeout: Duration::from_secs(5),
        media_timeout: Duration::from_secs(5),
        composite_timeout: Duration::from_secs(5),
        upload_timeout: Duration::from_secs(5),
        motion_poll_interval: Duration::from_millis(2),
        motion_poll_budget: Duration::from_secs(2),
        avatar_required: false,
        motion_required: true,
        retry_base_delay: Duration::from_millis(1),
    }
}

/// All doubles wired together.
///
/// Adjust `config` or the doubles, then call [`TestHarness::orchestrator`].
pub struct TestHarness {
    pub scraper: Arc<FakeScraper>,
    pub script: Arc<FakeScriptGenerator>,
    pub tts: Arc<FakeTts>,
    pub avatar: Arc<FakeAvatar>,
    pub motion: Arc<FakeMotion>,
    pub overlay: Arc<FakeOverlay>,
    pub compositor: Arc<RecordingCompositor>,
    pub store: FlakyStore,
    pub ledger: MemoryLedger,
    pub config: WorkerConfig,
    /// Wire the avatar double into the pipeline
    pub with_avatar: bool,
}

impl TestHarness {
    pub fn new(scene_count: usize) -> Self {
        Self::with_product(sample_product(), scene_count)
    }

    pub fn with_product(product: ProductSnapshot, scene_count: usize) -> Self {
        let work_dir = std::env::temp_dir().join(format!("reel-test-{}", JobId::new()));
        Self {
            scraper: Arc::new(FakeScraper::new(product)),
            script: Arc::new(FakeScriptGenerator::with_scenes(scene_count)),
            tts: Arc::new(FakeTts::new()),
            avatar: Arc::new(FakeAvatar::new()),
            motion: Arc::new(FakeMotion::default()),
            overlay: Arc::new(FakeOverlay::default()),
            compositor: Arc::new(RecordingCompositor::default()),
            store: FlakyStore::new(MemoryStore::default()),
            ledger: MemoryLedger::with_history(),
            config: fast_config(work_dir),
            with_avatar: false,
        }
    }

    pub fn services(&self) -> Services {
        let avatar: Option<Arc<dyn AvatarRenderer>> = if self.with_avatar {
            Some(self.avatar.clone())
        } else {
            None
        };
        Services {
            scraper: self.scraper.clone(),
            script: self.script.clone(),
            media: MediaProviders {
                tts: self.tts.clone(),
                avatar,
                motion: self.motion.clone(),
                overlay: self.overlay.clone(),
            },
            compositor: self.compositor.clone(),
            store: Arc::new(self.store.clone()),
            ledger: Arc::new(self.ledger.clone()),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.services(), self.config.clone())
    }

    /// Poll the ledger until the job is terminal and its task has exited.
    ///
    /// Panics after five seconds.
    pub async fn wait_for_terminal(&self, orchestrator: &Orchestrator, job_id: &JobId) -> JobRecord {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(Some(record)) = self.ledger.get(job_id).await {
                if record.is_terminal() && !orchestrator.is_running(job_id) {
                    return record;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("job {} did not reach a terminal status", job_id);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll the ledger until the job reaches `status`. Panics after five seconds.
    pub async fn wait_for_status(&self, job_id: &JobId, status: reel_models::JobStatus) -> JobRecord {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(Some(record)) = self.ledger.get(job_id).await {
                if record.status == status {
                    return record;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("job {} never reached {}", job_id, status);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}
