//! Records persisted by the discovery store.

use crate::extraction::{ExtractionResult, InsightField};
use serde::{Deserialize, Serialize};

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A customer engagement owning calls, analysis jobs and one value framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub id: String,
    pub account_name: String,
    pub account_domain: Option<String>,
    pub created_at: i64,
}

/// One recorded sales conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub engagement_id: String,
    pub external_id: String,
    pub title: Option<String>,
    pub started_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub participant_emails: Vec<String>,
    pub url: Option<String>,
    pub transcript: Option<String>,
    pub transcript_fetched_at: Option<i64>,
    pub selected_for_analysis: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Call {
    pub fn has_transcript(&self) -> bool {
        self.transcript.is_some()
    }
}

/// Call metadata as discovered through a provider search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallMetadata {
    pub external_id: String,
    pub title: Option<String>,
    pub started_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub participant_emails: Vec<String>,
    pub url: Option<String>,
}

/// Lifecycle state of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed, // terminal
    Failed,    // terminal
}

impl JobStatus {
    /// Returns true if this is a terminal state (Completed or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

/// One request to extract insights from a frozen set of calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub engagement_id: String,
    pub status: JobStatus,
    pub input_call_ids: Vec<String>,
    pub raw_response: Option<String>,
    pub extracted_data: Option<ExtractionResult>,
    pub error_message: Option<String>,
    pub model_used: Option<String>,
    pub token_usage: Option<TokenUsage>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl AnalysisJob {
    pub fn new_pending(engagement_id: &str, input_call_ids: Vec<String>) -> Self {
        AnalysisJob {
            id: uuid::Uuid::new_v4().to_string(),
            engagement_id: engagement_id.to_string(),
            status: JobStatus::Pending,
            input_call_ids,
            raw_response: None,
            extracted_data: None,
            error_message: None,
            model_used: None,
            token_usage: None,
            created_at: now_millis(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// What a successful execution writes onto a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub raw_response: String,
    pub extracted_data: ExtractionResult,
    pub model_used: String,
    pub token_usage: TokenUsage,
}

/// The single mutable value-framework record of an engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFramework {
    pub engagement_id: String,
    pub current_challenges: Option<String>,
    pub impact: Option<String>,
    pub ideal_future_state: Option<String>,
    pub everyday_metrics: Option<String>,
    pub core_requirements: Option<String>,
    pub ai_generated: bool,
    pub ai_confidence_score: Option<f64>,
    pub source_call_ids: Option<Vec<String>>,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ValueFramework {
    pub fn field(&self, field: InsightField) -> Option<&str> {
        match field {
            InsightField::CurrentChallenges => self.current_challenges.as_deref(),
            InsightField::Impact => self.impact.as_deref(),
            InsightField::IdealFutureState => self.ideal_future_state.as_deref(),
            InsightField::EverydayMetrics => self.everyday_metrics.as_deref(),
            InsightField::CoreRequirements => self.core_requirements.as_deref(),
        }
    }
}

/// Per-field text changes. `None` leaves a field as it is.
///
/// Used both for direct human edits and for overriding extracted values
/// when a job is applied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightFieldsPatch {
    pub current_challenges: Option<String>,
    pub impact: Option<String>,
    pub ideal_future_state: Option<String>,
    pub everyday_metrics: Option<String>,
    pub core_requirements: Option<String>,
}

impl InsightFieldsPatch {
    pub fn get(&self, field: InsightField) -> Option<&str> {
        match field {
            InsightField::CurrentChallenges => self.current_challenges.as_deref(),
            InsightField::Impact => self.impact.as_deref(),
            InsightField::IdealFutureState => self.ideal_future_state.as_deref(),
            InsightField::EverydayMetrics => self.everyday_metrics.as_deref(),
            InsightField::CoreRequirements => self.core_requirements.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        InsightField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Everything Apply writes onto a value framework in one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedInsights {
    pub current_challenges: String,
    pub impact: String,
    pub ideal_future_state: String,
    pub everyday_metrics: String,
    pub core_requirements: String,
    pub confidence_score: f64,
    pub source_call_ids: Vec<String>,
}

impl AppliedInsights {
    /// Extracted values, with any field present in `overrides` taking precedence.
    pub fn from_result(
        result: &ExtractionResult,
        overrides: Option<&InsightFieldsPatch>,
        source_call_ids: Vec<String>,
    ) -> Self {
        let pick = |field: InsightField| -> String {
            overrides
                .and_then(|o| o.get(field))
                .unwrap_or_else(|| result.field(field))
                .to_string()
        };
        AppliedInsights {
            current_challenges: pick(InsightField::CurrentChallenges),
            impact: pick(InsightField::Impact),
            ideal_future_state: pick(InsightField::IdealFutureState),
            everyday_metrics: pick(InsightField::EverydayMetrics),
            core_requirements: pick(InsightField::CoreRequirements),
            confidence_score: result.confidence_score,
            source_call_ids,
        }
    }
}
