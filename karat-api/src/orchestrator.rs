//! Appraisal read path
//!
//! Ordered steps, each able to short-circuit with a typed failure:
//! resolve project → size-eligibility gate → cache lookup → extract on
//! hit / dispatch on miss. Steps are plain functions returning
//! `Result<_, AppraisalFailure>` chained with `?`: continue or stop,
//! nothing else crosses the component boundary.

use sqlx::SqlitePool;
use tracing::{info, warn};

use karat_common::cache::CacheStore;
use karat_common::config::Settings;
use karat_common::model::{AppraisalJob, ProjectRef};
use karat_common::queue::JobDispatcher;

use crate::extract;
use crate::projects::{Project, ProjectStore};

/// One appraisal request as seen by the read path.
#[derive(Debug, Clone)]
pub struct AppraisalRequest {
    pub owner: String,
    pub name: String,
    /// Requested folder path; empty means project root.
    pub folder: String,
    /// Correlation id: names the progress channel and the queued job.
    pub request_id: String,
}

/// Successful read: the response body is already JSON.
#[derive(Debug)]
pub struct AppraisalSuccess {
    pub cache_hit: bool,
    pub cached_json: String,
}

/// Typed read-path failure. `Processing` is a control-flow signal rather
/// than a true error: the computation is in flight.
#[derive(Debug, PartialEq, Eq)]
pub enum AppraisalFailure {
    NotFound(String),
    Forbidden(String),
    Processing { request_id: String, message: String },
    Internal(String),
}

pub struct AppraisalOrchestrator {
    projects: ProjectStore,
    cache: CacheStore,
    dispatcher: JobDispatcher,
    size_threshold: i64,
}

impl AppraisalOrchestrator {
    pub fn new(pool: SqlitePool, settings: &Settings) -> Self {
        Self {
            projects: ProjectStore::new(pool.clone()),
            cache: CacheStore::new(pool.clone()),
            dispatcher: JobDispatcher::new(pool),
            size_threshold: settings.size_threshold,
        }
    }

    /// Run the read path for one request.
    pub async fn appraise(
        &self,
        request: &AppraisalRequest,
    ) -> Result<AppraisalSuccess, AppraisalFailure> {
        let project = self.resolve_project(request).await?;
        self.check_eligibility(&project)?;

        let key = ProjectRef::new(&project.owner, &project.name).cache_key();
        match self.lookup_cache(&key).await {
            Some(cached_json) => self.extract_from_hit(request, cached_json),
            None => Err(self.dispatch(request, &project).await),
        }
    }

    async fn resolve_project(
        &self,
        request: &AppraisalRequest,
    ) -> Result<Project, AppraisalFailure> {
        match self.projects.find(&request.owner, &request.name).await {
            Ok(Some(project)) => Ok(project),
            Ok(None) => Err(AppraisalFailure::NotFound(format!(
                "Project {}/{} not found",
                request.owner, request.name
            ))),
            Err(e) => Err(AppraisalFailure::Internal(format!(
                "Project lookup failed: {}",
                e
            ))),
        }
    }

    /// Clone and blame cost grow with repository size; oversized projects
    /// are refused before any cache or queue interaction.
    fn check_eligibility(&self, project: &Project) -> Result<(), AppraisalFailure> {
        if project.size > self.size_threshold {
            return Err(AppraisalFailure::Forbidden(format!(
                "Project {}/{} exceeds the size limit ({} > {})",
                project.owner, project.name, project.size, self.size_threshold
            )));
        }
        Ok(())
    }

    /// Cache lookup. Store errors degrade to a miss: a cache outage means
    /// recomputing, not failing the request.
    async fn lookup_cache(&self, key: &str) -> Option<String> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Cache hit: root requests get the cached bytes verbatim (error
    /// appraisals included, so callers can see why a run failed);
    /// subfolder requests go through the extractor. A missing folder in
    /// real data is a client error, distinct from "still computing".
    fn extract_from_hit(
        &self,
        request: &AppraisalRequest,
        cached_json: String,
    ) -> Result<AppraisalSuccess, AppraisalFailure> {
        if extract::normalize(&request.folder).is_empty() {
            return Ok(AppraisalSuccess {
                cache_hit: true,
                cached_json,
            });
        }

        match extract::extract(&cached_json, &request.folder) {
            Some(appraisal) => {
                let json = serde_json::to_string(&appraisal).map_err(|e| {
                    AppraisalFailure::Internal(format!("Failed to serialize extraction: {}", e))
                })?;
                Ok(AppraisalSuccess {
                    cache_hit: true,
                    cached_json: json,
                })
            }
            None => Err(AppraisalFailure::NotFound(
                "Folder not found in project".to_string(),
            )),
        }
    }

    /// Cache miss: enqueue a root-level job and tell the caller to retry
    /// once the progress channel announces completion. The job always
    /// targets the root regardless of the folder originally requested.
    async fn dispatch(&self, request: &AppraisalRequest, project: &Project) -> AppraisalFailure {
        let job = AppraisalJob::for_root(
            ProjectRef::new(&project.owner, &project.name),
            request.request_id.clone(),
        );

        if let Err(e) = self.dispatcher.enqueue(&job).await {
            warn!(project = %job.project.slug(), error = %e, "Job enqueue failed");
            return AppraisalFailure::Internal(format!("Failed to enqueue appraisal: {}", e));
        }

        info!(
            project = %job.project.slug(),
            request_id = %request.request_id,
            "Cache miss, appraisal job dispatched"
        );
        AppraisalFailure::Processing {
            request_id: request.request_id.clone(),
            message: format!(
                "Appraisal in progress, request id {}",
                request.request_id
            ),
        }
    }
}
