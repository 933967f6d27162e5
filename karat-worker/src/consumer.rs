//! Queue consumer loop
//!
//! One consumer per worker slot: claim the next job, run the pipeline,
//! ack on success. A failed run leaves the claim to expire so the queue
//! redelivers the job; the pipeline tolerates the re-run.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use karat_common::queue::JobQueue;

use crate::analyzer::ContributionAnalyzer;
use crate::git::GitGateway;
use crate::pipeline::WorkerPipeline;

pub struct Consumer<G, A> {
    slot: usize,
    queue: JobQueue,
    pipeline: Arc<WorkerPipeline<G, A>>,
    poll_interval: Duration,
}

impl<G: GitGateway, A: ContributionAnalyzer> Consumer<G, A> {
    pub fn new(
        slot: usize,
        queue: JobQueue,
        pipeline: Arc<WorkerPipeline<G, A>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            slot,
            queue,
            pipeline,
            poll_interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!(slot = self.slot, "Consumer started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.queue.claim_next().await {
                Ok(Some(claimed)) => {
                    info!(
                        slot = self.slot,
                        claim_id = claimed.claim_id,
                        project = %claimed.job.project.slug(),
                        "Job claimed"
                    );

                    match self.pipeline.run(claimed.job).await {
                        Ok(()) => {
                            if let Err(e) = self.queue.ack(claimed.claim_id).await {
                                warn!(claim_id = claimed.claim_id, error = %e, "Ack failed");
                            }
                        }
                        Err(e) => {
                            // No ack: the claim expires and the job is
                            // redelivered.
                            error!(
                                slot = self.slot,
                                claim_id = claimed.claim_id,
                                error = %e,
                                "Pipeline run aborted, job left for redelivery"
                            );
                        }
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(slot = self.slot, error = %e, "Queue claim failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.poll_interval * 4) => {}
                    }
                }
            }
        }

        info!(slot = self.slot, "Consumer stopped");
    }
}
