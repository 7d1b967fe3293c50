//! Analysis job lifecycle: creation, asynchronous execution and reads.

use super::error::{AnalysisError, AnalysisResult};
use crate::discovery_store::{AnalysisJob, Call, DiscoveryStore, Engagement, JobCompletion};
use crate::extraction::{ExtractionResult, Extractor, TranscriptInput};
use crate::server::metrics;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Recorded on jobs a previous process left unfinished.
pub const INTERRUPTED_JOB_MESSAGE: &str =
    "Analysis was interrupted by a server restart before it finished";

/// Why an execution ended in `failed`.
#[derive(Debug)]
struct ExecutionFailure {
    message: String,
    raw_response: Option<String>,
}

impl ExecutionFailure {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw_response: None,
        }
    }
}

impl From<anyhow::Error> for ExecutionFailure {
    fn from(err: anyhow::Error) -> Self {
        ExecutionFailure::new(format!("Internal error: {:#}", err))
    }
}

/// Owns the job state machine. Creation is synchronous and cheap, execution
/// runs on its own tokio task and never reports errors to the creator.
#[derive(Clone)]
pub struct AnalysisJobRunner {
    store: Arc<dyn DiscoveryStore>,
    extractor: Arc<dyn Extractor>,
    extraction_timeout: Duration,
}

impl AnalysisJobRunner {
    pub fn new(
        store: Arc<dyn DiscoveryStore>,
        extractor: Arc<dyn Extractor>,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            extraction_timeout,
        }
    }

    fn engagement(&self, engagement_id: &str) -> AnalysisResult<Engagement> {
        self.store
            .get_engagement(engagement_id)?
            .ok_or_else(|| AnalysisError::engagement_not_found(engagement_id))
    }

    /// Creates a job over explicit call ids. Duplicates collapse to their
    /// first occurrence. Every call must belong to the engagement and have a
    /// transcript.
    pub fn create_job(
        &self,
        engagement_id: &str,
        input_call_ids: &[String],
    ) -> AnalysisResult<AnalysisJob> {
        self.engagement(engagement_id)?;

        let mut seen = HashSet::new();
        let call_ids: Vec<String> = input_call_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();
        if call_ids.is_empty() {
            return Err(AnalysisError::Validation(
                "No calls selected for analysis".to_string(),
            ));
        }

        for call_id in &call_ids {
            let call = self
                .store
                .get_call(call_id)?
                .filter(|c| c.engagement_id == engagement_id)
                .ok_or_else(|| {
                    AnalysisError::Validation(format!(
                        "Call {} does not belong to this engagement",
                        call_id
                    ))
                })?;
            if !call.has_transcript() {
                return Err(AnalysisError::Validation(format!(
                    "Call {} has no transcript; fetch it before analyzing",
                    call_id
                )));
            }
        }

        self.submit(AnalysisJob::new_pending(engagement_id, call_ids))
    }

    /// Creates a job over the current selection: selected calls that have a
    /// transcript, oldest first. Selected calls without a transcript are
    /// left out.
    pub fn create_job_from_selection(&self, engagement_id: &str) -> AnalysisResult<AnalysisJob> {
        self.engagement(engagement_id)?;

        let call_ids: Vec<String> = self
            .store
            .list_analyzable_calls(engagement_id)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if call_ids.is_empty() {
            return Err(AnalysisError::Validation(
                "No calls selected for analysis. Select calls with fetched transcripts first"
                    .to_string(),
            ));
        }

        self.submit(AnalysisJob::new_pending(engagement_id, call_ids))
    }

    /// Persists a pending job and schedules exactly one execution.
    fn submit(&self, job: AnalysisJob) -> AnalysisResult<AnalysisJob> {
        self.store.insert_job(&job)?;
        metrics::record_analysis_job_created();
        info!(
            job_id = %job.id,
            engagement_id = %job.engagement_id,
            call_count = job.input_call_ids.len(),
            "Created analysis job"
        );

        let runner = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            runner.execute(&job_id).await;
        });

        Ok(job)
    }

    /// Runs a pending job to a terminal state. Does nothing if the job is
    /// not pending anymore.
    pub async fn execute(&self, job_id: &str) {
        match self.store.claim_for_processing(job_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!(job_id = %job_id, "Job already claimed or finished, skipping");
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Failed to claim analysis job");
                return;
            }
        }

        metrics::set_analysis_job_running(true);
        let outcome = self.run_extraction(job_id).await;
        metrics::set_analysis_job_running(false);

        let recorded = match &outcome {
            Ok(completion) => self.store.mark_completed(job_id, completion),
            Err(failure) => {
                self.store
                    .mark_failed(job_id, &failure.message, failure.raw_response.as_deref())
            }
        };

        match (recorded, outcome) {
            (Ok(true), Ok(completion)) => {
                metrics::record_analysis_job_resolved("completed");
                info!(
                    job_id = %job_id,
                    confidence = completion.extracted_data.confidence_score,
                    "Analysis job completed"
                );
            }
            (Ok(true), Err(failure)) => {
                metrics::record_analysis_job_resolved("failed");
                warn!(job_id = %job_id, error = %failure.message, "Analysis job failed");
            }
            (Ok(false), _) => {
                warn!(job_id = %job_id, "Analysis job left processing before its result was recorded");
            }
            (Err(e), _) => {
                error!(job_id = %job_id, error = %e, "Failed to record analysis job result");
                if let Err(e) = self
                    .store
                    .mark_failed(job_id, &format!("Failed to record result: {:#}", e), None)
                {
                    error!(job_id = %job_id, error = %e, "Failed to mark analysis job as failed");
                }
            }
        }
    }

    async fn run_extraction(&self, job_id: &str) -> Result<JobCompletion, ExecutionFailure> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| ExecutionFailure::new(format!("Job {} disappeared", job_id)))?;
        let engagement = self
            .store
            .get_engagement(&job.engagement_id)?
            .ok_or_else(|| ExecutionFailure::new("Engagement no longer exists"))?;

        let mut inputs = Vec::with_capacity(job.input_call_ids.len());
        for call_id in &job.input_call_ids {
            let call = self
                .store
                .get_call(call_id)?
                .filter(|c| c.engagement_id == job.engagement_id)
                .ok_or_else(|| {
                    ExecutionFailure::new(format!("Input call {} no longer exists", call_id))
                })?;
            inputs.push(transcript_input(call).ok_or_else(|| {
                ExecutionFailure::new(format!("Input call {} has no transcript", call_id))
            })?);
        }

        let started = Instant::now();
        let extracted = tokio::time::timeout(
            self.extraction_timeout,
            self.extractor.extract(&engagement.account_name, &inputs),
        )
        .await;

        let output = match extracted {
            Err(_) => {
                return Err(ExecutionFailure::new(format!(
                    "Extraction timed out after {} seconds",
                    self.extraction_timeout.as_secs_f64()
                )))
            }
            Ok(Err(e)) => {
                return Err(ExecutionFailure {
                    message: format!("Extraction failed: {}", e),
                    raw_response: e.raw_response,
                })
            }
            Ok(Ok(output)) => output,
        };
        metrics::record_extraction(
            started.elapsed(),
            output.token_usage.input_tokens,
            output.token_usage.output_tokens,
        );

        match ExtractionResult::from_value(&output.payload) {
            Ok(extracted_data) => Ok(JobCompletion {
                raw_response: output.raw_response,
                extracted_data,
                model_used: output.model_used,
                token_usage: output.token_usage,
            }),
            Err(violation) => Err(ExecutionFailure {
                message: violation.to_string(),
                raw_response: Some(output.raw_response),
            }),
        }
    }

    pub fn get_job(&self, job_id: &str) -> AnalysisResult<AnalysisJob> {
        self.store
            .get_job(job_id)?
            .ok_or_else(|| AnalysisError::job_not_found(job_id))
    }

    /// The job, if it belongs to the engagement.
    pub fn get_engagement_job(&self, engagement_id: &str, job_id: &str) -> AnalysisResult<AnalysisJob> {
        self.engagement(engagement_id)?;
        let job = self.get_job(job_id)?;
        if job.engagement_id != engagement_id {
            return Err(AnalysisError::job_not_found(job_id));
        }
        Ok(job)
    }

    /// Newest first.
    pub fn list_jobs(&self, engagement_id: &str) -> AnalysisResult<Vec<AnalysisJob>> {
        self.engagement(engagement_id)?;
        Ok(self.store.list_jobs(engagement_id)?)
    }

    /// Fails jobs a previous process left pending or processing. Must run
    /// before any new job is created.
    pub fn recover_interrupted_jobs(&self) -> anyhow::Result<usize> {
        let failed = self.store.fail_unfinished_jobs(INTERRUPTED_JOB_MESSAGE)?;
        for job_id in &failed {
            metrics::record_analysis_job_resolved("interrupted");
            warn!(job_id = %job_id, "Marked interrupted analysis job as failed");
        }
        Ok(failed.len())
    }
}

fn transcript_input(call: Call) -> Option<TranscriptInput> {
    Some(TranscriptInput {
        transcript: call.transcript?,
        call_id: call.id,
        title: call.title,
        started_at: call.started_at,
        duration_seconds: call.duration_seconds,
        participants: call.participant_emails,
    })
}
