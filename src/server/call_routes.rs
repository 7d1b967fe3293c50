//! Call discovery, transcripts and selection.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::analysis::AnalysisResult;
use crate::call_registry::{CallRegistry, DateRange};
use crate::discovery_store::Call;
use crate::server::state::ServerState;

#[derive(Debug, Deserialize, Default)]
pub struct SearchCallsBody {
    /// Overrides the engagement's account domain.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(flatten)]
    pub range: DateRange,
}

#[derive(Debug, Deserialize)]
pub struct SelectCallBody {
    pub selected: bool,
}

async fn list_calls(
    State(registry): State<CallRegistry>,
    Path(id): Path<String>,
) -> AnalysisResult<Json<Vec<Call>>> {
    Ok(Json(registry.list_calls(&id)?))
}

async fn search_calls(
    State(registry): State<CallRegistry>,
    Path(id): Path<String>,
    Json(body): Json<SearchCallsBody>,
) -> AnalysisResult<Json<Vec<Call>>> {
    let calls = registry
        .search_calls(&id, body.domain.as_deref(), &body.range)
        .await?;
    Ok(Json(calls))
}

async fn fetch_transcript(
    State(registry): State<CallRegistry>,
    Path((id, call_id)): Path<(String, String)>,
) -> AnalysisResult<Json<Call>> {
    Ok(Json(registry.fetch_transcript(&id, &call_id).await?))
}

async fn select_call(
    State(registry): State<CallRegistry>,
    Path((id, call_id)): Path<(String, String)>,
    Json(body): Json<SelectCallBody>,
) -> AnalysisResult<Json<Call>> {
    Ok(Json(registry.set_selected(&id, &call_id, body.selected)?))
}

/// Nested under `/v1/engagements/{id}`:
/// - GET /calls
/// - POST /calls/search
/// - POST /calls/{call_id}/fetch-transcript
/// - PATCH /calls/{call_id}/select
pub fn call_routes() -> Router<ServerState> {
    Router::new()
        .route("/{id}/calls", get(list_calls))
        .route("/{id}/calls/search", post(search_calls))
        .route(
            "/{id}/calls/{call_id}/fetch-transcript",
            post(fetch_transcript),
        )
        .route("/{id}/calls/{call_id}/select", patch(select_call))
}
