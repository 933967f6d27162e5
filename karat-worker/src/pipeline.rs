//! Worker pipeline
//!
//! Four ordered stages over a mutable job context: prepare, clone,
//! appraise, cache. Only the prepare stage may abort the run; there is
//! nothing to cache before the project reference exists. Every failure
//! after that point is captured into an error appraisal and carried
//! forward so the cache stage still writes a definitive answer (with the
//! short error TTL) and the client's next poll gets data instead of
//! silence.
//!
//! The pipeline is safe to re-run from scratch: an existing checkout
//! skips the clone, and the cache write overwrites unconditionally, so
//! at-least-once job delivery never corrupts results.

use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use karat_common::cache::CacheStore;
use karat_common::config::Settings;
use karat_common::model::{
    Appraisal, AppraisalJob, ProjectRef, ERROR_TYPE_APPRAISAL_FAILED, ERROR_TYPE_CLONE_FAILED,
};
use karat_common::progress::{self, Phase, ProgressReporter};
use karat_common::{Error, Result};

use crate::analyzer::ContributionAnalyzer;
use crate::git::{GitError, GitGateway};

/// Mutable state threaded through the stages of one job.
struct JobContext {
    project: ProjectRef,
    appraisal: Option<Appraisal>,
}

pub struct WorkerPipeline<G, A> {
    pool: SqlitePool,
    cache: CacheStore,
    git: G,
    analyzer: A,
    success_ttl_secs: i64,
    error_ttl_secs: i64,
    finish_announce_secs: u64,
}

impl<G: GitGateway, A: ContributionAnalyzer> WorkerPipeline<G, A> {
    pub fn new(pool: SqlitePool, settings: &Settings, git: G, analyzer: A) -> Self {
        Self {
            cache: CacheStore::new(pool.clone()),
            pool,
            git,
            analyzer,
            success_ttl_secs: settings.success_ttl_secs,
            error_ttl_secs: settings.error_ttl_secs,
            finish_announce_secs: settings.finish_announce_secs,
        }
    }

    /// Run one job to completion. An `Err` here means the run aborted
    /// without a cache write and the job should be left for redelivery.
    pub async fn run(&self, job: AppraisalJob) -> Result<()> {
        let reporter = ProgressReporter::new(self.pool.clone(), job.correlation_id.clone());
        info!(
            project = %job.project.slug(),
            correlation_id = %job.correlation_id,
            "Pipeline run started"
        );

        let mut ctx = self.prepare(&job)?;
        self.clone_stage(&mut ctx, &reporter).await?;
        self.appraise_stage(&mut ctx, &reporter).await;
        self.cache_stage(&mut ctx, &reporter).await;

        // Re-announce completion for subscribers that connect after the
        // terminal event already fired. Best effort, not a guarantee.
        reporter
            .report_each_second(self.finish_announce_secs, Phase::Finished)
            .await;

        info!(project = %ctx.project.slug(), "Pipeline run finished");
        Ok(())
    }

    /// Stage 1: materialize the project reference. The one fatal stage.
    fn prepare(&self, job: &AppraisalJob) -> Result<JobContext> {
        if job.project.owner.trim().is_empty() || job.project.name.trim().is_empty() {
            return Err(Error::Internal(format!(
                "Job {} has no usable project reference",
                job.correlation_id
            )));
        }
        Ok(JobContext {
            project: job.project.clone(),
            appraisal: None,
        })
    }

    /// Stage 2: obtain a local working copy. A clone that is already on
    /// disk is skipped, not repeated. Clone failure does not abort: the
    /// failure itself becomes the appraisal and gets cached downstream.
    /// The sole exception is a checkout appearing mid-run: that path
    /// belongs to another worker and this run must stop.
    async fn clone_stage(&self, ctx: &mut JobContext, reporter: &ProgressReporter) -> Result<()> {
        self.publish(reporter, Phase::Started).await;

        if self.git.local_copy_exists(&ctx.project) {
            info!(project = %ctx.project.slug(), "Local copy exists, skipping clone");
            self.publish(reporter, Phase::CloningDone).await;
            return Ok(());
        }

        // Map raw clone output to phases off the stream so reporting
        // keeps up with the subprocess. Only forward motion is
        // published: the channel stays strictly increasing even when
        // dozens of lines match the same prefix.
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forwarder = {
            let reporter = reporter.clone();
            tokio::spawn(async move {
                let mut last = Phase::Started.percent();
                while let Some(line) = rx.recv().await {
                    if let Some(phase) = progress::phase_for_clone_line(&line) {
                        if phase.percent() > last {
                            last = phase.percent();
                            if let Err(e) = reporter.report(phase).await {
                                warn!(error = %e, "Clone progress publish failed");
                            }
                        }
                    }
                }
                last
            })
        };

        let result = self.git.clone_streaming(&ctx.project, tx).await;
        let last_percent = forwarder.await.unwrap_or_else(|_| Phase::Started.percent());

        match result {
            Ok(()) => {
                if last_percent < Phase::CloningDone.percent() {
                    self.publish(reporter, Phase::CloningDone).await;
                }
                Ok(())
            }
            Err(GitError::CheckoutExists(path)) => {
                error!(
                    project = %ctx.project.slug(),
                    path = %path.display(),
                    "Checkout appeared mid-run, aborting"
                );
                Err(Error::Internal(format!(
                    "Cannot overwrite existing local checkout at {}",
                    path.display()
                )))
            }
            Err(e) => {
                warn!(project = %ctx.project.slug(), error = %e, "Clone failed");
                ctx.appraisal = Some(Appraisal::error(
                    ctx.project.clone(),
                    ERROR_TYPE_CLONE_FAILED,
                    e.to_string(),
                ));
                Ok(())
            }
        }
    }

    /// Stage 3: delegate to the contribution analyzer for the whole
    /// project. Skipped entirely when the clone stage already produced
    /// an error appraisal. Analyzer failures are data, not process
    /// faults: they become an error appraisal instead of propagating.
    async fn appraise_stage(&self, ctx: &mut JobContext, reporter: &ProgressReporter) {
        if ctx.appraisal.is_some() {
            return;
        }

        self.publish(reporter, Phase::AppraisingStarted).await;

        let checkout = self.git.checkout_path(&ctx.project);
        match self.analyzer.analyze(&ctx.project, &checkout).await {
            Ok(tree) => {
                self.publish(reporter, Phase::AppraisingDone).await;
                ctx.appraisal = Some(Appraisal::ok(ctx.project.clone(), tree));
            }
            Err(e) => {
                warn!(project = %ctx.project.slug(), error = %e, "Analysis failed");
                ctx.appraisal = Some(Appraisal::error(
                    ctx.project.clone(),
                    ERROR_TYPE_APPRAISAL_FAILED,
                    e.to_string(),
                ));
            }
        }
    }

    /// Stage 4: persist whichever appraisal the run produced. The TTL
    /// follows the appraisal's status: successes live for a day, errors
    /// expire in seconds so the next request retries. A failed cache
    /// write is logged, not surfaced; the client's only recovery is a
    /// retry either way, and reporting 100% unblocks it.
    async fn cache_stage(&self, ctx: &mut JobContext, reporter: &ProgressReporter) {
        self.publish(reporter, Phase::CachingStarted).await;

        if ctx.appraisal.is_none() {
            ctx.appraisal = Some(Appraisal::error(
                ctx.project.clone(),
                ERROR_TYPE_APPRAISAL_FAILED,
                "Pipeline produced no appraisal",
            ));
        }
        let Some(appraisal) = ctx.appraisal.as_ref() else {
            return;
        };

        let ttl = if appraisal.is_ok() {
            self.success_ttl_secs
        } else {
            self.error_ttl_secs
        };
        let key = ctx.project.cache_key();

        match serde_json::to_string(appraisal) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, &json, ttl).await {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Appraisal serialization failed");
            }
        }

        self.publish(reporter, Phase::Finished).await;
    }

    /// Progress publishing is best effort: a broken channel never fails
    /// the pipeline.
    async fn publish(&self, reporter: &ProgressReporter, phase: Phase) {
        if let Err(e) = reporter.report(phase).await {
            warn!(phase = phase.as_str(), error = %e, "Progress publish failed");
        }
    }
}
