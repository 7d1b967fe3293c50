//! HTTP mapping of [`AnalysisError`].

use crate::analysis::AnalysisError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

impl AnalysisError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalysisError::Validation(_) => StatusCode::BAD_REQUEST,
            AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::InvalidState(_) | AnalysisError::Conflict(_) => StatusCode::CONFLICT,
            AnalysisError::Provider(_) => StatusCode::BAD_GATEWAY,
            AnalysisError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AnalysisError::Internal(err) => {
                error!("Internal error while serving request: {:#}", err);
                "Internal server error".to_string()
            }
            AnalysisError::Provider(msg) => {
                warn!("Call provider failure: {}", msg);
                msg.clone()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
