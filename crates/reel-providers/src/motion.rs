//! Queue-based image-to-video adapter.
//!
//! Submission returns a request id; status is polled separately until the
//! provider reports a terminal state.

use async_trait::async_trait;
use reel_models::AssetRef;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MotionConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, join};
use crate::traits::{MotionGenerator, MotionHandle, MotionRequest, MotionStatus};

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    image_url: &'a str,
    prompt: &'a str,
    duration: u32,
    aspect_ratio: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    video: Option<VideoFile>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoFile {
    url: String,
}

/// HTTP queue client for motion generation.
pub struct HttpMotionGenerator {
    client: Client,
    config: MotionConfig,
}

impl HttpMotionGenerator {
    pub fn new(config: MotionConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(config.timeout, None)?,
            config,
        })
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.config.api_key)
    }
}

/// Clip lengths the provider accepts.
fn clip_seconds(duration: f64) -> u32 {
    if duration > 5.0 {
        10
    } else {
        5
    }
}

#[async_trait]
impl MotionGenerator for HttpMotionGenerator {
    async fn submit(&self, request: &MotionRequest) -> ProviderResult<MotionHandle> {
        let response = self
            .client
            .post(join(&self.config.base_url, "requests"))
            .header("Authorization", self.auth_header())
            .json(&SubmitRequest {
                image_url: &request.image_url,
                prompt: &request.prompt,
                duration: clip_seconds(request.duration_seconds),
                aspect_ratio: "9:16",
            })
            .send()
            .await?;
        let response = check_status("motion submit", response).await?;

        let body: SubmitResponse = response.json().await?;
        if body.request_id.trim().is_empty() {
            return Err(ProviderError::invalid_response("motion submit returned empty request_id"));
        }
        debug!(scene = request.scene_index, request_id = %body.request_id, "Motion request queued");
        Ok(MotionHandle(body.request_id))
    }

    async fn status(&self, handle: &MotionHandle) -> ProviderResult<MotionStatus> {
        let url = join(
            &self.config.base_url,
            &format!("requests/{}", urlencoding::encode(handle.as_str())),
        );
        let response = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let response = check_status("motion status", response).await?;

        let body: StatusResponse = response.json().await?;
        match body.status.to_ascii_uppercase().as_str() {
            "IN_QUEUE" | "IN_PROGRESS" | "QUEUED" | "PENDING" | "PROCESSING" => {
                Ok(MotionStatus::Pending)
            }
            "COMPLETED" | "SUCCEEDED" => {
                let url = body
                    .video_url
                    .or(body.video.map(|v| v.url))
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        ProviderError::invalid_response("completed motion request has no video")
                    })?;
                Ok(MotionStatus::Completed(AssetRef::url(url)))
            }
            "FAILED" | "ERROR" | "CANCELLED" => Ok(MotionStatus::Failed(
                body.error.unwrap_or_else(|| "motion generation failed".to_string()),
            )),
            other => Err(ProviderError::invalid_response(format!(
                "unknown motion status: {other}"
            ))),
        }
    }
}
