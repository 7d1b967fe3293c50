//! Extractor backed by an Anthropic-style messages API.

use super::adapter::{AdapterError, ExtractionOutput, Extractor, TranscriptInput};
use super::prompt::{build_user_prompt, parse_model_json, SYSTEM_PROMPT};
use crate::discovery_store::TokenUsage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicExtractorConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-request HTTP timeout. The runner applies its own overall bound.
    pub request_timeout: Duration,
}

pub struct AnthropicExtractor {
    client: Client,
    config: AnthropicExtractorConfig,
}

impl AnthropicExtractor {
    pub fn new(config: AnthropicExtractorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Extractor for AnthropicExtractor {
    async fn extract(
        &self,
        account_name: &str,
        transcripts: &[TranscriptInput],
    ) -> Result<ExtractionOutput, AdapterError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AdapterError::permanent(
                "Extraction API key is not configured. Set ANTHROPIC_API_KEY or [extraction].api_key",
            )
        })?;

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let user_prompt = build_user_prompt(account_name, transcripts);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: &user_prompt,
            }],
        };

        info!(
            model = %self.config.model,
            transcript_count = transcripts.len(),
            account = %account_name,
            "Sending transcripts for extraction"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::transient("Extraction request timed out")
                } else {
                    AdapterError::transient(format!("Extraction request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AdapterError::transient("Extraction API rate limited the request"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Extraction API returned an error");
            let message = format!("Extraction API returned {}: {}", status.as_u16(), body);
            return Err(if status.is_server_error() {
                AdapterError::transient(message)
            } else {
                AdapterError::permanent(message)
            });
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            AdapterError::permanent(format!("Failed to decode extraction API response: {}", e))
        })?;

        let raw_text = body
            .content
            .iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text.as_deref())
            .map(str::trim)
            .ok_or_else(|| AdapterError::permanent("Extraction API response has no text content"))?
            .to_string();

        let token_usage = body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        debug!(
            input_tokens = token_usage.input_tokens,
            output_tokens = token_usage.output_tokens,
            "Received extraction response"
        );

        let payload = parse_model_json(&raw_text)?;

        Ok(ExtractionOutput {
            raw_response: raw_text,
            payload,
            model_used: body.model.unwrap_or_else(|| self.config.model.clone()),
            token_usage,
        })
    }
}

// Messages API types

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: i64,
    output_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::AdapterErrorKind;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn_api(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn extractor(base_url: String, api_key: Option<&str>) -> AnthropicExtractor {
        AnthropicExtractor::new(AnthropicExtractorConfig {
            base_url,
            model: "claude-test".to_string(),
            api_key: api_key.map(str::to_string),
            max_tokens: 4096,
            temperature: 0.2,
            request_timeout: Duration::from_secs(5),
        })
    }

    fn transcripts() -> Vec<TranscriptInput> {
        vec![TranscriptInput {
            call_id: "c1".to_string(),
            title: Some("Discovery".to_string()),
            started_at: None,
            duration_seconds: None,
            participants: vec![],
            transcript: "[Speaker 1]: our alerts are noisy".to_string(),
        }]
    }

    #[tokio::test]
    async fn test_successful_extraction() {
        async fn handler(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
            assert_eq!(headers["x-api-key"], "secret");
            assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
            assert_eq!(body["model"], "claude-test");
            assert_eq!(body["max_tokens"], 4096);
            assert_eq!(body["messages"][0]["role"], "user");
            Json(json!({
                "model": "claude-test-20250101",
                "content": [{"type": "text", "text": "```json\n{\"impact\": \"slow\"}\n```"}],
                "usage": {"input_tokens": 900, "output_tokens": 120}
            }))
        }
        let base = spawn_api(Router::new().route("/messages", post(handler))).await;

        let output = extractor(base, Some("secret"))
            .extract("Acme", &transcripts())
            .await
            .unwrap();
        assert_eq!(output.payload["impact"], "slow");
        assert_eq!(output.model_used, "claude-test-20250101");
        assert_eq!(output.token_usage.input_tokens, 900);
        assert_eq!(output.token_usage.output_tokens, 120);
        assert!(output.raw_response.starts_with("```json"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_permanent() {
        let err = extractor("http://127.0.0.1:1".to_string(), None)
            .extract("Acme", &transcripts())
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Permanent);
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_kinds() {
        let router = Router::new()
            .route(
                "/limited/messages",
                post(|| async { StatusCode::TOO_MANY_REQUESTS }),
            )
            .route(
                "/down/messages",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream") }),
            )
            .route(
                "/bad/messages",
                post(|| async { (StatusCode::BAD_REQUEST, "invalid model") }),
            );
        let base = spawn_api(router).await;

        let kind = |path: &'static str| {
            let base = base.clone();
            async move {
                extractor(format!("{}/{}", base, path), Some("k"))
                    .extract("Acme", &transcripts())
                    .await
                    .unwrap_err()
                    .kind
            }
        };
        assert_eq!(kind("limited").await, AdapterErrorKind::Transient);
        assert_eq!(kind("down").await, AdapterErrorKind::Transient);
        assert_eq!(kind("bad").await, AdapterErrorKind::Permanent);
    }

    #[tokio::test]
    async fn test_non_json_answer_keeps_raw_text() {
        let router = Router::new().route(
            "/messages",
            post(|| async {
                Json(json!({
                    "content": [{"type": "text", "text": "I could not find anything."}],
                    "usage": {"input_tokens": 10, "output_tokens": 5}
                }))
            }),
        );
        let base = spawn_api(router).await;

        let err = extractor(base, Some("k"))
            .extract("Acme", &transcripts())
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Permanent);
        assert_eq!(err.raw_response.as_deref(), Some("I could not find anything."));
    }
}
