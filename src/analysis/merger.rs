//! Folds completed extractions into an engagement's value framework.

use super::error::{AnalysisError, AnalysisResult};
use crate::discovery_store::{
    AppliedInsights, DiscoveryStore, InsightFieldsPatch, JobStatus, ValueFramework,
    VersionedWrite,
};
use crate::server::metrics;
use anyhow::anyhow;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ValueFrameworkMerger {
    store: Arc<dyn DiscoveryStore>,
}

impl ValueFrameworkMerger {
    pub fn new(store: Arc<dyn DiscoveryStore>) -> Self {
        Self { store }
    }

    fn ensure_engagement(&self, engagement_id: &str) -> AnalysisResult<()> {
        self.store
            .get_engagement(engagement_id)?
            .map(|_| ())
            .ok_or_else(|| AnalysisError::engagement_not_found(engagement_id))
    }

    fn written(
        &self,
        engagement_id: &str,
        outcome: VersionedWrite,
        expected_version: Option<i64>,
        source: &str,
    ) -> AnalysisResult<ValueFramework> {
        match outcome {
            VersionedWrite::Written(vf) => {
                metrics::record_value_framework_write(source, "ok");
                Ok(vf)
            }
            VersionedWrite::VersionMismatch { current } => {
                metrics::record_value_framework_write(source, "conflict");
                Err(AnalysisError::version_conflict(
                    expected_version.unwrap_or_default(),
                    current,
                ))
            }
            VersionedWrite::NotFound => Err(AnalysisError::engagement_not_found(engagement_id)),
        }
    }

    pub fn get_value_framework(&self, engagement_id: &str) -> AnalysisResult<ValueFramework> {
        self.store
            .get_value_framework(engagement_id)?
            .ok_or_else(|| AnalysisError::engagement_not_found(engagement_id))
    }

    /// Overwrites all five fields with the job's extraction, present
    /// `overrides` fields taking precedence, and records provenance. Only
    /// completed jobs can be applied. With `expected_version` the write
    /// happens only if nobody wrote in between.
    pub fn apply(
        &self,
        engagement_id: &str,
        job_id: &str,
        overrides: Option<&InsightFieldsPatch>,
        expected_version: Option<i64>,
    ) -> AnalysisResult<ValueFramework> {
        self.ensure_engagement(engagement_id)?;
        let job = self
            .store
            .get_job(job_id)?
            .filter(|job| job.engagement_id == engagement_id)
            .ok_or_else(|| AnalysisError::job_not_found(job_id))?;

        if job.status != JobStatus::Completed {
            return Err(AnalysisError::InvalidState(format!(
                "Analysis job {} is {}; only completed jobs can be applied",
                job_id,
                job.status.as_db_str()
            )));
        }
        let extracted = job.extracted_data.as_ref().ok_or_else(|| {
            AnalysisError::Internal(anyhow!("Completed job {} has no extracted data", job_id))
        })?;

        let insights = AppliedInsights::from_result(extracted, overrides, job.input_call_ids.clone());
        let outcome = self
            .store
            .apply_insights(engagement_id, &insights, expected_version)?;
        let vf = self.written(engagement_id, outcome, expected_version, "apply")?;

        info!(
            engagement_id = %engagement_id,
            job_id = %job_id,
            version = vf.version,
            overridden = overrides.map(|o| !o.is_empty()).unwrap_or(false),
            "Applied analysis to value framework"
        );
        Ok(vf)
    }

    /// Direct human edit of individual fields. Provenance stays as it is.
    pub fn update_fields(
        &self,
        engagement_id: &str,
        patch: &InsightFieldsPatch,
        expected_version: Option<i64>,
    ) -> AnalysisResult<ValueFramework> {
        let outcome =
            self.store
                .update_value_framework_fields(engagement_id, patch, expected_version)?;
        self.written(engagement_id, outcome, expected_version, "edit")
    }
}
