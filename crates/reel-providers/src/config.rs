//! Provider configuration.
//!
//! Each adapter receives its own config at construction; nothing reads the
//! environment after start-up.

use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

/// Listing scraper settings.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("Mozilla/5.0 (compatible; reel-scraper/", env!("CARGO_PKG_VERSION"), ")")
                .to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Text-to-speech service.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: String::new(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Talking-avatar render service.
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub base_url: String,
    pub api_key: String,
    pub avatar_id: String,
    pub timeout: Duration,
}

/// Queue-based image-to-video service.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://queue.fal.run/fal-ai/kling-video".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// All provider settings.
#[derive(Debug, Clone, Default)]
pub struct ProvidersConfig {
    pub scraper: ScraperConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    /// `None` disables avatar rendering.
    pub avatar: Option<AvatarConfig>,
    pub motion: MotionConfig,
}

impl ProvidersConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let scraper_defaults = ScraperConfig::default();
        let llm_defaults = LlmConfig::default();
        let tts_defaults = TtsConfig::default();
        let motion_defaults = MotionConfig::default();

        let avatar = match (env_opt("AVATAR_BASE_URL"), env_opt("AVATAR_API_KEY"), env_opt("AVATAR_ID")) {
            (Some(base_url), Some(api_key), Some(avatar_id)) => Some(AvatarConfig {
                base_url,
                api_key,
                avatar_id,
                timeout: env_secs("AVATAR_TIMEOUT_SECS", 300),
            }),
            _ => None,
        };

        Self {
            scraper: ScraperConfig {
                user_agent: env_or("SCRAPER_USER_AGENT", &scraper_defaults.user_agent),
                timeout: env_secs("SCRAPER_TIMEOUT_SECS", 20),
            },
            llm: LlmConfig {
                base_url: env_or("LLM_BASE_URL", &llm_defaults.base_url),
                api_key: env_or("LLM_API_KEY", ""),
                model: env_or("LLM_MODEL", &llm_defaults.model),
                timeout: env_secs("LLM_TIMEOUT_SECS", 60),
            },
            tts: TtsConfig {
                base_url: env_or("TTS_BASE_URL", &tts_defaults.base_url),
                api_key: env_or("TTS_API_KEY", ""),
                voice_id: env_or("TTS_VOICE_ID", &tts_defaults.voice_id),
                model_id: env_or("TTS_MODEL_ID", &tts_defaults.model_id),
                timeout: env_secs("TTS_TIMEOUT_SECS", 120),
            },
            avatar,
            motion: MotionConfig {
                base_url: env_or("MOTION_BASE_URL", &motion_defaults.base_url),
                api_key: env_or("MOTION_API_KEY", ""),
                timeout: env_secs("MOTION_TIMEOUT_SECS", 30),
            },
        }
    }

    /// Fail fast on missing credentials.
    pub fn validate(&self) -> ProviderResult<()> {
        let missing: Vec<&str> = [
            ("LLM_API_KEY", self.llm.api_key.is_empty()),
            ("TTS_API_KEY", self.tts.api_key.is_empty()),
            ("MOTION_API_KEY", self.motion.api_key.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::config(format!("missing {}", missing.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvidersConfig::default();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.tts.base_url, "https://api.elevenlabs.io");
        assert_eq!(config.scraper.timeout, Duration::from_secs(20));
        assert!(config.avatar.is_none());
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let err = ProvidersConfig::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LLM_API_KEY"));
        assert!(msg.contains("MOTION_API_KEY"));
    }
}
