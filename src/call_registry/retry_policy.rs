//! Retry policy for call-provider requests.
//!
//! Implements exponential backoff with configurable parameters.

use super::provider::ProviderError;
use crate::config::CallProviderSettings;
use std::time::Duration;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request, the first one included.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Cap for exponential growth.
    pub max_backoff: Duration,
    /// Multiplier applied to backoff after each attempt.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(settings: &CallProviderSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            ..Default::default()
        }
    }

    /// Backoff after the attempt numbered `attempt` (0-based) failed:
    /// `initial_backoff * multiplier^attempt`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let backoff =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(backoff.min(self.max_backoff.as_secs_f64()))
    }

    /// Whether a request whose attempt `attempt` (0-based) failed with `error`
    /// should be tried again.
    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        error.is_retryable() && attempt + 1 < self.max_attempts
    }

    /// How long to wait before the next attempt. A server-provided
    /// `Retry-After` wins when it is longer than the computed backoff.
    pub fn delay_for(&self, error: &ProviderError, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        match error {
            ProviderError::RateLimited {
                retry_after: Some(retry_after),
            } => backoff.max(*retry_after),
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}
