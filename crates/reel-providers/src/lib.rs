//! External collaborators of the video pipeline.
//!
//! Every adapter exposes one async request/result call behind a trait so the
//! orchestrator can be driven by real HTTP services or by test doubles:
//! - [`ProductScraper`]: listing URL to [`ProductSnapshot`](reel_models::ProductSnapshot)
//! - [`ScriptGenerator`]: product to validated [`ScenePlan`](reel_models::ScenePlan)
//! - [`SpeechSynthesizer`], [`AvatarRenderer`]: synchronous media renders
//! - [`MotionGenerator`]: queue/poll image-to-video generation

pub mod avatar;
pub mod config;
pub mod error;
mod http;
pub mod motion;
pub mod scraper;
pub mod script;
pub mod traits;
pub mod tts;

pub use avatar::HttpAvatarRenderer;
pub use config::{AvatarConfig, LlmConfig, MotionConfig, ProvidersConfig, ScraperConfig, TtsConfig};
pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use motion::HttpMotionGenerator;
pub use scraper::HtmlScraper;
pub use script::OpenAiScriptGenerator;
pub use traits::{
    AvatarRenderer, MotionGenerator, MotionHandle, MotionRequest, MotionStatus, ProductScraper,
    ScriptGenerator, SpeechSynthesizer,
};
pub use tts::ElevenLabsTts;
