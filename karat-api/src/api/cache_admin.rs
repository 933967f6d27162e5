//! Cache administration endpoints
//!
//! Thin wrappers over the cache store's `keys` and `wipe` operations.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/cache/keys
pub async fn list_keys(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let keys = state.cache.keys().await?;
    Ok(Json(json!({ "keys": keys })))
}

/// DELETE /api/cache
pub async fn wipe_cache(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = state.cache.wipe().await?;
    info!(removed, "Cache wiped");
    Ok(Json(json!({ "removed": removed })))
}
