//! Scene plan generation through an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reel_models::{ProductSnapshot, ScenePlan, MAX_SCENES};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LlmConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_status, join};
use crate::traits::ScriptGenerator;

const SYSTEM_PROMPT: &str = "You write scripts for vertical short-form product videos. \
Reply with a single JSON object and nothing else.";

/// Chat completions request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Chat completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Script generator backed by a chat model in JSON mode.
pub struct OpenAiScriptGenerator {
    client: Client,
    config: LlmConfig,
}

impl OpenAiScriptGenerator {
    pub fn new(config: LlmConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: build_client(config.timeout, None)?,
            config,
        })
    }

    fn build_prompt(product: &ProductSnapshot) -> String {
        let price = product.price.as_deref().unwrap_or("not listed");
        format!(
            r#"Write a script for a 20-50 second vertical promo video.

PRODUCT:
Title: {title}
Price: {price}
Description: {description}

Return ONLY this JSON schema:
{{
  "scenes": [
    {{"visual_cue": "what the viewer sees", "text": "what the narrator says", "duration_est": 6}}
  ]
}}

Rules:
- Between 1 and {max} scenes, in playback order.
- "text" is spoken aloud and shown on screen; keep it under 20 words.
- "duration_est" is a positive number of seconds.
"#,
            title = product.title,
            description = product.description,
            max = MAX_SCENES,
        )
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiScriptGenerator {
    async fn generate(&self, product: &ProductSnapshot) -> ProviderResult<ScenePlan> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(product),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: 0.7,
        };

        info!(model = %self.config.model, "Requesting scene plan");

        let response = self
            .client
            .post(join(&self.config.base_url, "chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status("script generator", response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(format!("chat response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::validation("script generator returned no content"))?;

        let plan = ScenePlan::from_json(strip_code_fence(&content))?;

        if !plan.within_target_band() {
            warn!(
                estimated_seconds = plan.estimated_total_seconds(),
                "Scene plan outside the 20-50s target band"
            );
        }
        info!(scenes = plan.len(), "Scene plan ready");
        Ok(plan)
    }
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn product() -> ProductSnapshot {
        ProductSnapshot {
            title: "Desk Lamp".into(),
            price: Some("42 EUR".into()),
            description: "Warm light".into(),
            images: vec![],
        }
    }

    fn generator(server: &MockServer) -> OpenAiScriptGenerator {
        OpenAiScriptGenerator::new(LlmConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: "sk-test".into(),
            ..Default::default()
        })
        .unwrap()
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_generates_plan_in_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(reply(
                r#"{"scenes":[{"visual_cue":"lamp on desk","text":"Light up your nights.","duration_est":10},
                              {"visual_cue":"close-up","text":"Warm and dimmable.","duration_est":12}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let plan = generator(&server).generate(&product()).await.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.scenes()[0].spoken_text, "Light up your nights.");
    }

    #[tokio::test]
    async fn test_empty_plan_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(r#"{"scenes":[]}"#))
            .mount(&server)
            .await;

        let err = generator(&server).generate(&product()).await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = generator(&server).generate(&product()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
