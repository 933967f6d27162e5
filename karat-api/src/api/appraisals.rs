//! Appraisal endpoint
//!
//! `GET /api/appraisals/:owner/:name?folder=app/domain&request_id=...`
//!
//! Status mapping: cache hit 200 (cached or extracted JSON), cache miss
//! 202 processing, project or folder absent 404, project over the size
//! threshold 403, store/queue failure 500.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::orchestrator::{AppraisalFailure, AppraisalRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AppraisalQuery {
    /// Folder path within the project; absent or empty means root.
    #[serde(default)]
    pub folder: String,

    /// Client-supplied correlation id; generated when absent. Names the
    /// progress channel for this request.
    pub request_id: Option<String>,
}

/// GET /api/appraisals/:owner/:name
pub async fn get_appraisal(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
    Query(query): Query<AppraisalQuery>,
) -> Response {
    let request_id = query
        .request_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let request = AppraisalRequest {
        owner,
        name,
        folder: query.folder,
        request_id,
    };

    match state.orchestrator.appraise(&request).await {
        Ok(success) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            success.cached_json,
        )
            .into_response(),
        Err(failure) => failure.into_response(),
    }
}

impl IntoResponse for AppraisalFailure {
    fn into_response(self) -> Response {
        match self {
            AppraisalFailure::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "not_found", "message": message })),
            )
                .into_response(),
            AppraisalFailure::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                Json(json!({ "status": "forbidden", "message": message })),
            )
                .into_response(),
            AppraisalFailure::Processing { request_id, message } => (
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "processing",
                    "request_id": request_id,
                    "msg": message,
                })),
            )
                .into_response(),
            AppraisalFailure::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "internal_error", "message": message })),
            )
                .into_response(),
        }
    }
}
