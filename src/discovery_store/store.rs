use super::models::*;
use anyhow::Result;

pub trait EngagementStore: Send + Sync {
    /// Creates an engagement together with its empty value framework.
    fn create_engagement(
        &self,
        account_name: &str,
        account_domain: Option<&str>,
    ) -> Result<Engagement>;

    fn get_engagement(&self, id: &str) -> Result<Option<Engagement>>;
}

pub trait CallStore: Send + Sync {
    /// Inserts a call or refreshes the metadata of the call with the same
    /// external id in the engagement. Transcript and selection are kept.
    fn upsert_call(&self, engagement_id: &str, metadata: &CallMetadata) -> Result<Call>;

    fn get_call(&self, id: &str) -> Result<Option<Call>>;

    /// Newest start time first, calls without a start time last.
    fn list_calls(&self, engagement_id: &str) -> Result<Vec<Call>>;

    /// Selected calls that have a transcript, oldest start time first.
    fn list_analyzable_calls(&self, engagement_id: &str) -> Result<Vec<Call>>;

    fn set_transcript(&self, call_id: &str, transcript: &str) -> Result<Option<Call>>;

    fn set_selected(&self, call_id: &str, selected: bool) -> Result<Option<Call>>;
}

pub trait AnalysisStore: Send + Sync {
    fn insert_job(&self, job: &AnalysisJob) -> Result<()>;

    fn get_job(&self, id: &str) -> Result<Option<AnalysisJob>>;

    /// Newest first, insertion order breaking ties.
    fn list_jobs(&self, engagement_id: &str) -> Result<Vec<AnalysisJob>>;

    // === State Transitions (atomic) ===

    /// PENDING → PROCESSING. Returns false if the job was not pending.
    fn claim_for_processing(&self, id: &str) -> Result<bool>;

    /// PROCESSING → COMPLETED. Returns false if the job was not processing.
    fn mark_completed(&self, id: &str, completion: &JobCompletion) -> Result<bool>;

    /// PENDING | PROCESSING → FAILED. Returns false if the job was terminal.
    fn mark_failed(&self, id: &str, error_message: &str, raw_response: Option<&str>)
        -> Result<bool>;

    /// Fails every non-terminal job, returning their ids.
    fn fail_unfinished_jobs(&self, error_message: &str) -> Result<Vec<String>>;

    fn count_jobs_by_status(&self) -> Result<Vec<(JobStatus, usize)>>;
}

/// Outcome of a write guarded by an optional expected version.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionedWrite {
    Written(ValueFramework),
    VersionMismatch { current: i64 },
    NotFound,
}

pub trait ValueFrameworkStore: Send + Sync {
    fn get_value_framework(&self, engagement_id: &str) -> Result<Option<ValueFramework>>;

    /// Writes the present fields of `patch`. Provenance is not touched.
    fn update_value_framework_fields(
        &self,
        engagement_id: &str,
        patch: &InsightFieldsPatch,
        expected_version: Option<i64>,
    ) -> Result<VersionedWrite>;

    /// Overwrites all five fields and the provenance in one statement.
    fn apply_insights(
        &self,
        engagement_id: &str,
        insights: &AppliedInsights,
        expected_version: Option<i64>,
    ) -> Result<VersionedWrite>;
}

/// Combined trait for everything the analysis pipeline persists
pub trait DiscoveryStore: EngagementStore + CallStore + AnalysisStore + ValueFrameworkStore {}

impl<T: EngagementStore + CallStore + AnalysisStore + ValueFrameworkStore> DiscoveryStore for T {}
