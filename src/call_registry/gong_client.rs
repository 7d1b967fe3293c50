//! Client for a Gong-style v2 call-recording API.

use super::provider::{CallProvider, DateRange, ProviderError};
use super::retry_policy::RetryPolicy;
use crate::config::CallProviderSettings;
use crate::discovery_store::CallMetadata;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const DEFAULT_SEARCH_FROM: &str = "2020-01-01T00:00:00Z";
const ERROR_MESSAGE_MAX_CHARS: usize = 300;

pub struct GongCallProvider {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
}

impl GongCallProvider {
    pub fn new(settings: &CallProviderSettings) -> Self {
        let credentials = match (&settings.access_key, &settings.access_key_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key.clone(), secret.clone()))
            }
            _ => None,
        };
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            retry_policy: RetryPolicy::new(settings),
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
        }
    }

    fn auth_header(&self) -> Result<String, ProviderError> {
        let (key, secret) = self
            .credentials
            .as_ref()
            .ok_or(ProviderError::NotConfigured)?;
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", key, secret));
        Ok(format!("Basic {}", encoded))
    }

    /// POSTs `body` to `path`, retrying transient failures. At most
    /// `max_concurrent_requests` requests are in flight; the permit is not
    /// held while backing off.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ProviderError> {
        let auth = self.auth_header()?;
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let result = {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|e| ProviderError::Connection(e.to_string()))?;
                self.send_once(&url, &auth, body).await
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if self.retry_policy.should_retry(&err, attempt) => {
                    let wait = self.retry_policy.delay_for(&err, attempt);
                    warn!(
                        path = %path,
                        attempt = attempt + 1,
                        max_attempts = self.retry_policy.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Call provider request failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "Call provider request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(&self, url: &str, auth: &str, body: &Value) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", auth)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(ERROR_MESSAGE_MAX_CHARS).collect();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

fn search_window(range: &DateRange) -> (String, String) {
    let from = range
        .from
        .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
        .unwrap_or_else(|| DEFAULT_SEARCH_FROM.to_string());
    let to = range
        .to
        .map(|d| format!("{}T23:59:59Z", d.format("%Y-%m-%d")))
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    (from, to)
}

fn parse_started(started: Option<&str>) -> Option<i64> {
    started
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
}

#[async_trait]
impl CallProvider for GongCallProvider {
    async fn search_calls(
        &self,
        domain: &str,
        range: &DateRange,
    ) -> Result<Vec<CallMetadata>, ProviderError> {
        let domain = domain.trim().to_lowercase();
        let (from, to) = search_window(range);
        let mut matching = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": { "fromDateTime": from, "toDateTime": to },
                "contentSelector": { "exposedFields": { "parties": true } },
            });
            if let Some(cursor) = &cursor {
                body["cursor"] = json!(cursor);
            }

            let value = self.post_json("/calls/extensive", &body).await?;
            let page: ExtensiveCallsPage = serde_json::from_value(value)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            debug!(calls = page.calls.len(), "Fetched call search page");

            for call in page.calls {
                let emails: Vec<String> = call
                    .parties
                    .iter()
                    .filter_map(|p| p.email_address.as_deref())
                    .filter(|e| !e.is_empty())
                    .map(str::to_lowercase)
                    .collect();
                if !emails.iter().any(|e| e.contains(&domain)) {
                    continue;
                }
                let Some(external_id) = call.meta_data.id.filter(|id| !id.is_empty()) else {
                    continue;
                };
                matching.push(CallMetadata {
                    external_id,
                    title: call.meta_data.title,
                    started_at: parse_started(call.meta_data.started.as_deref()),
                    duration_seconds: call.meta_data.duration,
                    participant_emails: emails,
                    url: call.meta_data.url,
                });
            }

            cursor = page.records.and_then(|r| r.cursor).filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        info!(count = matching.len(), domain = %domain, "Found provider calls matching domain");
        Ok(matching)
    }

    async fn fetch_transcript(&self, external_id: &str) -> Result<String, ProviderError> {
        let body = json!({ "filter": { "callIds": [external_id] } });
        let value = self.post_json("/calls/transcript", &body).await?;
        let response: TranscriptResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let mut lines = Vec::new();
        for entry in response.call_transcripts {
            for segment in entry.transcript {
                let speaker = segment.speaker_id.as_deref().unwrap_or("Unknown");
                for sentence in segment.sentences {
                    let text = sentence.text.trim();
                    if !text.is_empty() {
                        lines.push(format!("[Speaker {}]: {}", speaker, text));
                    }
                }
            }
        }

        let text = lines.join("\n");
        info!(
            external_id = %external_id,
            characters = text.len(),
            "Fetched transcript"
        );
        Ok(text)
    }
}

// Provider API types

#[derive(Debug, Deserialize)]
struct ExtensiveCallsPage {
    #[serde(default)]
    calls: Vec<ExtensiveCall>,
    records: Option<Records>,
}

#[derive(Debug, Deserialize)]
struct Records {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensiveCall {
    #[serde(default)]
    meta_data: CallMetaData,
    #[serde(default)]
    parties: Vec<Party>,
}

#[derive(Debug, Default, Deserialize)]
struct CallMetaData {
    id: Option<String>,
    title: Option<String>,
    started: Option<String>,
    duration: Option<i64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Party {
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptResponse {
    #[serde(default)]
    call_transcripts: Vec<CallTranscript>,
}

#[derive(Debug, Deserialize)]
struct CallTranscript {
    #[serde(default)]
    transcript: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptSegment {
    speaker_id: Option<String>,
    #[serde(default)]
    sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    #[serde(default)]
    text: String,
}
