//! Engagements and their value frameworks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::analysis::{AnalysisError, AnalysisResult, ValueFrameworkMerger};
use crate::discovery_store::{Engagement, InsightFieldsPatch, ValueFramework};
use crate::server::state::{GuardedDiscoveryStore, ServerState};

#[derive(Debug, Deserialize)]
pub struct CreateEngagementBody {
    pub account_name: String,
    #[serde(default)]
    pub account_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateValueFrameworkBody {
    #[serde(flatten)]
    pub fields: InsightFieldsPatch,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

async fn create_engagement(
    State(store): State<GuardedDiscoveryStore>,
    Json(body): Json<CreateEngagementBody>,
) -> AnalysisResult<impl IntoResponse> {
    let account_name = body.account_name.trim();
    if account_name.is_empty() {
        return Err(AnalysisError::Validation(
            "account_name must not be empty".to_string(),
        ));
    }
    let account_domain = body
        .account_domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());

    let engagement = store.create_engagement(account_name, account_domain)?;
    info!(engagement_id = %engagement.id, account = %engagement.account_name, "Created engagement");
    Ok((StatusCode::CREATED, Json(engagement)))
}

async fn get_engagement(
    State(store): State<GuardedDiscoveryStore>,
    Path(id): Path<String>,
) -> AnalysisResult<Json<Engagement>> {
    store
        .get_engagement(&id)?
        .map(Json)
        .ok_or_else(|| AnalysisError::engagement_not_found(&id))
}

async fn get_value_framework(
    State(merger): State<ValueFrameworkMerger>,
    Path(id): Path<String>,
) -> AnalysisResult<Json<ValueFramework>> {
    Ok(Json(merger.get_value_framework(&id)?))
}

async fn update_value_framework(
    State(merger): State<ValueFrameworkMerger>,
    Path(id): Path<String>,
    Json(body): Json<UpdateValueFrameworkBody>,
) -> AnalysisResult<Json<ValueFramework>> {
    if body.fields.is_empty() {
        return Err(AnalysisError::Validation("No fields to update".to_string()));
    }
    let vf = merger.update_fields(&id, &body.fields, body.expected_version)?;
    Ok(Json(vf))
}

/// - POST /
/// - GET /{id}
/// - GET /{id}/value-framework
/// - PATCH /{id}/value-framework
pub fn engagement_routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(create_engagement))
        .route("/{id}", get(get_engagement))
        .route(
            "/{id}/value-framework",
            get(get_value_framework).patch(update_value_framework),
        )
}
