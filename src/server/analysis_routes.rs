//! Analysis jobs: creation, history, polling and applying results.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::analysis::{AnalysisJobRunner, AnalysisResult, ValueFrameworkMerger};
use crate::discovery_store::{AnalysisJob, InsightFieldsPatch, ValueFramework};
use crate::server::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct CreateAnalysisBody {
    pub call_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ApplyAnalysisBody {
    pub overrides: Option<InsightFieldsPatch>,
    pub expected_version: Option<i64>,
}

/// Starts an analysis over the currently selected calls.
async fn analyze_selection(
    State(runner): State<AnalysisJobRunner>,
    Path(id): Path<String>,
) -> AnalysisResult<impl IntoResponse> {
    let job = runner.create_job_from_selection(&id)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

async fn create_analysis(
    State(runner): State<AnalysisJobRunner>,
    Path(id): Path<String>,
    Json(body): Json<CreateAnalysisBody>,
) -> AnalysisResult<impl IntoResponse> {
    let job = runner.create_job(&id, &body.call_ids)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

async fn list_analyses(
    State(runner): State<AnalysisJobRunner>,
    Path(id): Path<String>,
) -> AnalysisResult<Json<Vec<AnalysisJob>>> {
    Ok(Json(runner.list_jobs(&id)?))
}

async fn get_analysis(
    State(runner): State<AnalysisJobRunner>,
    Path((id, job_id)): Path<(String, String)>,
) -> AnalysisResult<Json<AnalysisJob>> {
    Ok(Json(runner.get_engagement_job(&id, &job_id)?))
}

async fn apply_analysis(
    State(merger): State<ValueFrameworkMerger>,
    Path((id, job_id)): Path<(String, String)>,
    body: Option<Json<ApplyAnalysisBody>>,
) -> AnalysisResult<Json<ValueFramework>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let vf = merger.apply(
        &id,
        &job_id,
        body.overrides.as_ref(),
        body.expected_version,
    )?;
    Ok(Json(vf))
}

/// Nested under `/v1/engagements/{id}`:
/// - POST /analyze
/// - POST /analyses
/// - GET /analyses
/// - GET /analyses/{job_id}
/// - POST /analyses/{job_id}/apply
pub fn analysis_routes() -> Router<ServerState> {
    Router::new()
        .route("/{id}/analyze", post(analyze_selection))
        .route(
            "/{id}/analyses",
            get(list_analyses).post(create_analysis),
        )
        .route("/{id}/analyses/{job_id}", get(get_analysis))
        .route("/{id}/analyses/{job_id}/apply", post(apply_analysis))
}
