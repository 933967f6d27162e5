//! Durable appraisal job queue
//!
//! Backed by the shared database. The read path enqueues fire-and-forget;
//! workers claim rows with a visibility timeout and delete them on ack.
//! A worker that dies mid-job leaves its claim to expire, after which the
//! row is claimable again: delivery is at least once, and the pipeline
//! is built to tolerate re-runs.
//!
//! No ordering is guaranteed across jobs and no deduplication is done:
//! two concurrent misses for the same project enqueue two rows.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::model::AppraisalJob;
use crate::Result;

/// Write side: used by the read path on cache miss.
#[derive(Clone)]
pub struct JobDispatcher {
    pool: SqlitePool,
}

impl JobDispatcher {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue a job. Returns once the row is durable; processing happens
    /// independently of the caller.
    pub async fn enqueue(&self, job: &AppraisalJob) -> Result<()> {
        let payload = serde_json::to_string(job)?;

        sqlx::query("INSERT INTO appraisal_jobs (payload, enqueued_at) VALUES (?, ?)")
            .bind(&payload)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        debug!(
            project = %job.project.slug(),
            correlation_id = %job.correlation_id,
            "Appraisal job enqueued"
        );
        Ok(())
    }
}

/// A claimed row: the job plus the handle needed to ack it.
#[derive(Debug)]
pub struct ClaimedJob {
    pub claim_id: i64,
    pub job: AppraisalJob,
}

/// Worker side: claim/ack with visibility timeout.
#[derive(Clone)]
pub struct JobQueue {
    pool: SqlitePool,
    visibility_timeout_secs: i64,
}

impl JobQueue {
    pub fn new(pool: SqlitePool, visibility_timeout_secs: i64) -> Self {
        Self {
            pool,
            visibility_timeout_secs,
        }
    }

    /// Claim the oldest claimable job, making it invisible to other
    /// workers until the visibility timeout elapses. Returns `None` when
    /// the queue is empty.
    pub async fn claim_next(&self) -> Result<Option<ClaimedJob>> {
        let now = Utc::now().timestamp();
        let claimed_until = now + self.visibility_timeout_secs;

        let row: Option<(i64, String)> = sqlx::query_as(
            "UPDATE appraisal_jobs
             SET claimed_until = ?
             WHERE id = (
                 SELECT id FROM appraisal_jobs
                 WHERE claimed_until <= ?
                 ORDER BY id
                 LIMIT 1
             )
             RETURNING id, payload",
        )
        .bind(claimed_until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((claim_id, payload)) => {
                let job: AppraisalJob = serde_json::from_str(&payload)?;
                debug!(claim_id, project = %job.project.slug(), "Job claimed");
                Ok(Some(ClaimedJob { claim_id, job }))
            }
            None => Ok(None),
        }
    }

    /// Remove a completed job. Acking twice is harmless.
    pub async fn ack(&self, claim_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM appraisal_jobs WHERE id = ?")
            .bind(claim_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of rows currently in the queue, claimed or not.
    pub async fn depth(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appraisal_jobs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
