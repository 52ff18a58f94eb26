//! Adapter seams used by the orchestrator.

use async_trait::async_trait;
use reel_models::{AssetRef, ProductSnapshot, ScenePlan};

use crate::error::ProviderResult;

/// Fetches and normalizes a product listing.
#[async_trait]
pub trait ProductScraper: Send + Sync {
    async fn scrape(&self, source_url: &str) -> ProviderResult<ProductSnapshot>;
}

/// Turns a product into a validated scene plan.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, product: &ProductSnapshot) -> ProviderResult<ScenePlan>;
}

/// Synchronous text-to-speech render.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> ProviderResult<AssetRef>;
}

/// Synchronous talking-avatar render.
#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    async fn render(&self, text: &str) -> ProviderResult<AssetRef>;
}

/// Input for one motion generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    pub scene_index: usize,
    pub image_url: String,
    pub prompt: String,
    pub duration_seconds: f64,
}

/// Opaque handle returned on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionHandle(pub String);

impl MotionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MotionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a queued motion request.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionStatus {
    Pending,
    Completed(AssetRef),
    Failed(String),
}

impl MotionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MotionStatus::Pending)
    }
}

/// Queue/poll image-to-video generation.
#[async_trait]
pub trait MotionGenerator: Send + Sync {
    async fn submit(&self, request: &MotionRequest) -> ProviderResult<MotionHandle>;

    async fn status(&self, handle: &MotionHandle) -> ProviderResult<MotionStatus>;
}
