//! karat-api: HTTP read path for appraisal results
//!
//! Serves cached appraisal JSON cache-aside: a hit is answered from the
//! cache (with subfolder extraction when requested), a miss dispatches an
//! asynchronous job and answers "processing". Progress is streamed per
//! request id over SSE.

pub mod api;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod projects;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use karat_common::cache::CacheStore;
use karat_common::config::Settings;

use crate::orchestrator::AppraisalOrchestrator;
use crate::projects::ProjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub cache: CacheStore,
    pub projects: ProjectStore,
    pub orchestrator: Arc<AppraisalOrchestrator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, settings: Settings) -> Self {
        let orchestrator = AppraisalOrchestrator::new(pool.clone(), &settings);
        Self {
            db: pool.clone(),
            settings: Arc::new(settings),
            cache: CacheStore::new(pool.clone()),
            projects: ProjectStore::new(pool),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the application router with all routes configured
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route("/api/appraisals/:owner/:name", get(api::appraisals::get_appraisal))
        .route(
            "/api/appraisals/progress/:request_id",
            get(api::progress::progress_stream),
        )
        .route("/api/cache/keys", get(api::cache_admin::list_keys))
        .route("/api/cache", delete(api::cache_admin::wipe_cache))
        .route("/api/projects", post(api::projects::register_project))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
