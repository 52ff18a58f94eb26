//! Talking-avatar render adapter.

use async_trait::async_trait;
use reel_models::AssetRef;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AvatarConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, join};
use crate::traits::AvatarRenderer;

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    avatar_id: &'a str,
    text: &'a str,
    background: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    video_url: Option<String>,
}

/// Single-shot avatar render; the response carries the finished video URL.
pub struct HttpAvatarRenderer {
    client: Client,
    config: AvatarConfig,
}

impl HttpAvatarRenderer {
    pub fn new(config: AvatarConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(config.timeout, None)?,
            config,
        })
    }
}

#[async_trait]
impl AvatarRenderer for HttpAvatarRenderer {
    async fn render(&self, text: &str) -> ProviderResult<AssetRef> {
        let response = self
            .client
            .post(join(&self.config.base_url, "v1/renders"))
            .bearer_auth(&self.config.api_key)
            .json(&RenderRequest {
                avatar_id: &self.config.avatar_id,
                text,
                background: "transparent",
            })
            .send()
            .await?;
        let response = check_status("avatar", response).await?;

        let body: RenderResponse = response.json().await?;
        let url = body
            .video_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ProviderError::invalid_response("avatar render has no video_url"))?;

        debug!(url = %url, "Avatar rendered");
        Ok(AssetRef::url(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn renderer(server: &MockServer) -> HttpAvatarRenderer {
        HttpAvatarRenderer::new(AvatarConfig {
            base_url: server.uri(),
            api_key: "k".into(),
            avatar_id: "anna".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_render_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/renders"))
            .and(body_partial_json(json!({"avatar_id": "anna", "text": "Hi"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"video_url": "https://cdn/a.mp4"})),
            )
            .mount(&server)
            .await;

        let asset = renderer(&server).render("Hi").await.unwrap();
        assert_eq!(asset, AssetRef::url("https://cdn/a.mp4"));
    }

    #[tokio::test]
    async fn test_missing_url_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let err = renderer(&server).render("Hi").await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
