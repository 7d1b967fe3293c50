use thiserror::Error;

/// Errors surfaced to callers of the analysis pipeline.
///
/// Failures while executing a job are not reported here: they are recorded on
/// the job itself.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AnalysisError {
    pub fn engagement_not_found(engagement_id: &str) -> Self {
        AnalysisError::NotFound(format!("Engagement {} not found", engagement_id))
    }

    pub fn call_not_found(call_id: &str) -> Self {
        AnalysisError::NotFound(format!("Call {} not found", call_id))
    }

    pub fn job_not_found(job_id: &str) -> Self {
        AnalysisError::NotFound(format!("Analysis job {} not found", job_id))
    }

    pub fn version_conflict(expected: i64, current: i64) -> Self {
        AnalysisError::Conflict(format!(
            "Value framework was modified concurrently (expected version {}, current {})",
            expected, current
        ))
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
