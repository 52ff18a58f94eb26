//! Application state and production wiring.

use std::sync::Arc;

use reel_ledger::{JobLedger, LedgerConfig};
use reel_media::{check_ffmpeg, check_ffprobe, CompositorConfig, FfmpegCompositor, FfmpegOverlayRenderer};
use reel_providers::{
    AvatarRenderer, ElevenLabsTts, HtmlScraper, HttpAvatarRenderer, HttpMotionGenerator,
    OpenAiScriptGenerator, ProvidersConfig,
};
use reel_storage::R2Client;
use reel_worker::{MediaProviders, Orchestrator, Services, WorkerConfig};
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::middleware::ClientRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Orchestrator,
    pub ledger: Arc<dyn JobLedger>,
    pub rate_limiter: ClientRateLimiter,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: Orchestrator) -> Self {
        let ledger = Arc::clone(orchestrator.ledger());
        let rate_limiter = ClientRateLimiter::new(config.rate_limit_rps);
        Self {
            config,
            orchestrator,
            ledger,
            rate_limiter,
        }
    }

    /// Build every adapter from the environment and the orchestrator on top.
    pub async fn from_env(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let providers = ProvidersConfig::from_env();
        providers.validate()?;

        let ledger = reel_ledger::connect(&LedgerConfig::from_env()?)?;
        let store = R2Client::from_env().await?;

        let compositor_config = CompositorConfig::from_env();
        if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
            warn!(error = %e, "FFmpeg tooling missing, renders will fail");
        }

        let avatar: Option<Arc<dyn AvatarRenderer>> = match providers.avatar {
            Some(avatar) => Some(Arc::new(HttpAvatarRenderer::new(avatar)?)),
            None => {
                info!("Avatar provider not configured, rendering without picture-in-picture");
                None
            }
        };

        let services = Services {
            scraper: Arc::new(HtmlScraper::new(&providers.scraper)?),
            script: Arc::new(OpenAiScriptGenerator::new(providers.llm)?),
            media: MediaProviders {
                tts: Arc::new(ElevenLabsTts::new(providers.tts)?),
                avatar,
                motion: Arc::new(HttpMotionGenerator::new(providers.motion)?),
                overlay: Arc::new(FfmpegOverlayRenderer::new(compositor_config.clone())),
            },
            compositor: Arc::new(FfmpegCompositor::new(compositor_config)),
            store: Arc::new(store),
            ledger,
        };

        let orchestrator = Orchestrator::new(services, WorkerConfig::from_env());
        Ok(Self::new(config, orchestrator))
    }
}
