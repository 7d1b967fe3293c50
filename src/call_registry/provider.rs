use crate::discovery_store::CallMetadata;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the call-recording provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("Call provider credentials are not configured")]
    NotConfigured,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Network failures, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Connection(_)
            | ProviderError::Timeout
            | ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::NotConfigured | ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// Inclusive day range for a call search. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// The external call-recording service.
#[async_trait]
pub trait CallProvider: Send + Sync {
    /// Calls in `range` with at least one participant whose email contains `domain`.
    async fn search_calls(
        &self,
        domain: &str,
        range: &DateRange,
    ) -> Result<Vec<CallMetadata>, ProviderError>;

    /// Full transcript text of a call, one `[Speaker X]: text` line per sentence.
    /// Empty when the provider has no transcript.
    async fn fetch_transcript(&self, external_id: &str) -> Result<String, ProviderError>;
}
