use crate::discovery_store::TokenUsage;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// One call's transcript together with the metadata given to the model as context.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptInput {
    pub call_id: String,
    pub title: Option<String>,
    pub started_at: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub participants: Vec<String>,
    pub transcript: String,
}

/// What an extractor hands back on success. `payload` is not validated yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    pub raw_response: String,
    pub payload: Value,
    pub model_used: String,
    pub token_usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Network failure, timeout, rate limiting or a 5xx from the model API.
    Transient,
    /// Anything retrying would not fix: other 4xx, malformed responses.
    Permanent,
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterErrorKind::Transient => write!(f, "transient"),
            AdapterErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({kind})")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
    /// Model output received before the failure, if any.
    pub raw_response: Option<String>,
}

impl AdapterError {
    pub fn transient(message: impl Into<String>) -> Self {
        AdapterError {
            kind: AdapterErrorKind::Transient,
            message: message.into(),
            raw_response: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        AdapterError {
            kind: AdapterErrorKind::Permanent,
            message: message.into(),
            raw_response: None,
        }
    }

    pub fn with_raw_response(mut self, raw_response: impl Into<String>) -> Self {
        self.raw_response = Some(raw_response.into());
        self
    }
}

/// Turns call transcripts into an insight payload.
///
/// Implementations may take minutes and may fail; callers bound them with a
/// timeout.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        account_name: &str,
        transcripts: &[TranscriptInput],
    ) -> Result<ExtractionOutput, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_display_includes_kind() {
        let err = AdapterError::transient("rate limited");
        assert_eq!(err.to_string(), "rate limited (transient)");

        let err = AdapterError::permanent("bad json").with_raw_response("not json");
        assert_eq!(err.kind, AdapterErrorKind::Permanent);
        assert_eq!(err.raw_response.as_deref(), Some("not json"));
    }
}
