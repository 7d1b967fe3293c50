//! Cooperative polling of a job until it reaches a terminal state.

use super::runner::AnalysisJobRunner;
use crate::discovery_store::AnalysisJob;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Anything that can produce the current snapshot of a job.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> anyhow::Result<AnalysisJob>;
}

#[async_trait]
impl JobStatusSource for AnalysisJobRunner {
    async fn fetch_job(&self, job_id: &str) -> anyhow::Result<AnalysisJob> {
        Ok(self.get_job(job_id)?)
    }
}

/// Re-reads a job on a fixed interval while it is pending or processing.
///
/// There is no backoff and no attempt limit. Polling only reads, so dropping
/// the future or cancelling it never affects the job.
#[derive(Debug, Clone, Copy)]
pub struct StatusPoller {
    interval: Duration,
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn poll_until_terminal<S: JobStatusSource + ?Sized>(
        &self,
        source: &S,
        job_id: &str,
    ) -> anyhow::Result<AnalysisJob> {
        self.poll_with_observer(source, job_id, |_| {}).await
    }

    /// Like [`poll_until_terminal`](Self::poll_until_terminal), handing every
    /// fetched snapshot to `observer`, the terminal one included.
    pub async fn poll_with_observer<S, F>(
        &self,
        source: &S,
        job_id: &str,
        mut observer: F,
    ) -> anyhow::Result<AnalysisJob>
    where
        S: JobStatusSource + ?Sized,
        F: FnMut(&AnalysisJob) + Send,
    {
        loop {
            let job = source.fetch_job(job_id).await?;
            observer(&job);
            if job.status.is_terminal() {
                return Ok(job);
            }
            debug!(job_id = %job_id, status = ?job.status, "Job not finished yet");
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Returns `Ok(None)` as soon as `cancel` fires.
    pub async fn poll_until_terminal_or_cancelled<S: JobStatusSource + ?Sized>(
        &self,
        source: &S,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Option<AnalysisJob>> {
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            result = self.poll_until_terminal(source, job_id) => result.map(Some),
        }
    }
}
