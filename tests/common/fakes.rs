//! Scriptable stand-ins for the extraction adapter and the call provider

use super::constants::*;
use async_trait::async_trait;
use discovery_analysis_server::call_registry::{CallProvider, DateRange, ProviderError};
use discovery_analysis_server::discovery_store::{CallMetadata, TokenUsage};
use discovery_analysis_server::extraction::{
    AdapterError, ExtractionOutput, Extractor, TranscriptInput,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A well-formed extraction payload whose texts all start with `tag`.
pub fn insights_payload(tag: &str) -> Value {
    json!({
        "current_challenges": format!("{tag}: manual reporting takes days"),
        "impact": format!("{tag}: two analysts lost per quarter"),
        "ideal_future_state": format!("{tag}: one dashboard for the team"),
        "everyday_metrics": format!("{tag}: hours spent on reports"),
        "core_requirements": format!("{tag}: SSO and audit log"),
        "confidence_score": 0.8,
        "evidence": {
            "current_challenges": [format!("{tag}: we rebuild the sheet every Monday")],
            "impact": [],
            "ideal_future_state": [],
            "everyday_metrics": [],
            "core_requirements": []
        }
    })
}

pub enum FakeOutcome {
    Insights(Value),
    /// Answered with this payload, which fails validation
    Malformed(Value),
    Error(AdapterError),
    /// Never answers
    Hang,
}

/// Extractor answering from a queue of outcomes. An empty queue answers with
/// a default payload.
pub struct FakeExtractor {
    outcomes: Mutex<VecDeque<FakeOutcome>>,
    delay: Duration,
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl FakeExtractor {
    pub fn new(outcomes: Vec<FakeOutcome>) -> Self {
        Self::with_delay(outcomes, Duration::from_millis(50))
    }

    pub fn with_delay(outcomes: Vec<FakeOutcome>, delay: Duration) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            delay,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        _account_name: &str,
        transcripts: &[TranscriptInput],
    ) -> Result<ExtractionOutput, AdapterError> {
        self.requests
            .lock()
            .unwrap()
            .push(transcripts.iter().map(|t| t.call_id.clone()).collect());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| FakeOutcome::Insights(insights_payload("default")));

        tokio::time::sleep(self.delay).await;
        let output = |payload: Value| ExtractionOutput {
            raw_response: payload.to_string(),
            payload,
            model_used: "fake-model".to_string(),
            token_usage: TokenUsage {
                input_tokens: 1200,
                output_tokens: 300,
            },
        };
        match outcome {
            FakeOutcome::Insights(payload) | FakeOutcome::Malformed(payload) => Ok(output(payload)),
            FakeOutcome::Error(err) => Err(err),
            FakeOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AdapterError::transient("gave up"))
            }
        }
    }
}

/// Provider with three calls on `acme.com`, two of them with transcripts.
pub struct FakeCallProvider {
    calls: Vec<CallMetadata>,
    transcripts: HashMap<String, String>,
    pub searched_domains: Mutex<Vec<String>>,
}

impl Default for FakeCallProvider {
    fn default() -> Self {
        let call = |id: &str, title: &str, started_at: i64| CallMetadata {
            external_id: id.to_string(),
            title: Some(title.to_string()),
            started_at: Some(started_at),
            duration_seconds: Some(1800),
            participant_emails: vec![
                "jane@acme.com".to_string(),
                "rep@vendor.io".to_string(),
            ],
            url: Some(format!("https://app.gong.io/call?id={}", id)),
        };
        let calls = vec![
            call(EXTERNAL_CALL_1, "Intro call", CALL_1_STARTED_AT),
            call(EXTERNAL_CALL_2, "Deep dive", CALL_2_STARTED_AT),
            call(EXTERNAL_CALL_NO_TRANSCRIPT, "No-show", CALL_3_STARTED_AT),
        ];
        let transcripts = HashMap::from([
            (
                EXTERNAL_CALL_1.to_string(),
                "[Speaker A]: Reporting is all manual.\n[Speaker B]: How long does it take?"
                    .to_string(),
            ),
            (
                EXTERNAL_CALL_2.to_string(),
                "[Speaker A]: We need SSO before anything else.".to_string(),
            ),
        ]);
        Self {
            calls,
            transcripts,
            searched_domains: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CallProvider for FakeCallProvider {
    async fn search_calls(
        &self,
        domain: &str,
        range: &DateRange,
    ) -> Result<Vec<CallMetadata>, ProviderError> {
        self.searched_domains.lock().unwrap().push(domain.to_string());
        let in_range = |call: &CallMetadata| {
            let day = call
                .started_at
                .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
                .map(|t| t.date_naive());
            match day {
                Some(day) => {
                    range.from.map_or(true, |from| day >= from)
                        && range.to.map_or(true, |to| day <= to)
                }
                None => true,
            }
        };
        Ok(self
            .calls
            .iter()
            .filter(|call| call.participant_emails.iter().any(|e| e.contains(domain)))
            .filter(|call| in_range(call))
            .cloned()
            .collect())
    }

    async fn fetch_transcript(&self, external_id: &str) -> Result<String, ProviderError> {
        Ok(self.transcripts.get(external_id).cloned().unwrap_or_default())
    }
}
