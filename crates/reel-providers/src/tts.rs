//! ElevenLabs-style text-to-speech adapter.

use async_trait::async_trait;
use reel_models::AssetRef;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::config::TtsConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, join};
use crate::traits::SpeechSynthesizer;

/// Synchronous TTS returning MP3 bytes.
pub struct ElevenLabsTts {
    client: Client,
    config: TtsConfig,
}

impl ElevenLabsTts {
    pub fn new(config: TtsConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(config.timeout, None)?,
            config,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str) -> ProviderResult<AssetRef> {
        if text.trim().is_empty() {
            return Err(ProviderError::validation("speech text is empty"));
        }

        let url = join(
            &self.config.base_url,
            &format!(
                "v1/text-to-speech/{}?output_format=mp3_44100_128",
                urlencoding::encode(&self.config.voice_id)
            ),
        );

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": self.config.model_id,
            }))
            .send()
            .await?;
        let response = check_status("tts", response).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::transient("tts returned empty audio"));
        }

        debug!(bytes = bytes.len(), "Synthesized speech");
        Ok(AssetRef::bytes(bytes.to_vec(), "mp3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tts(server: &MockServer) -> ElevenLabsTts {
        ElevenLabsTts::new(TtsConfig {
            base_url: server.uri(),
            api_key: "xi-test".into(),
            voice_id: "voice-1".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(query_param("output_format", "mp3_44100_128"))
            .and(header("xi-api-key", "xi-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]))
            .mount(&server)
            .await;

        let audio = tts(&server).synthesize("Hello there").await.unwrap();
        assert_eq!(audio, AssetRef::bytes(vec![0xFF, 0xFB, 0x90, 0x00], "mp3"));
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("text too long"))
            .mount(&server)
            .await;

        let err = tts(&server).synthesize("Hello").await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("422"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let server = MockServer::start().await;
        let err = tts(&server).synthesize("   ").await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
