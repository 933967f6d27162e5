//! Project registration endpoint
//!
//! `POST /api/projects` upserts a project row. Normally the table is kept
//! current by the external GitHub sync; this endpoint covers manual
//! registration and operational fixes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::projects::Project;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterProjectRequest {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub size: i64,
}

/// POST /api/projects
pub async fn register_project(
    State(state): State<AppState>,
    Json(request): Json<RegisterProjectRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if request.owner.trim().is_empty() || request.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "owner and name must be non-empty".to_string(),
        ));
    }
    if request.size < 0 {
        return Err(ApiError::BadRequest("size must be non-negative".to_string()));
    }

    let project = Project {
        owner: request.owner,
        name: request.name,
        size: request.size,
    };
    state.projects.upsert(&project).await?;

    info!(owner = %project.owner, name = %project.name, size = project.size, "Project registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "owner": project.owner, "name": project.name, "size": project.size })),
    ))
}
