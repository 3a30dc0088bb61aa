//! Worker loop - queue consumer
//!
//! Pops submission jobs from the durable queue, judges them, and stores
//! the verdict for the coordinator's polling path. A job that cannot be
//! processed still stores an internal-error verdict so the client's
//! poll terminates.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::engine;
use crate::executor::Executor;
use crate::queue::{QueueClient, SubmissionJob};
use crate::verdict::JudgeOutcome;

pub async fn run_worker(queue: QueueClient, executor: Arc<dyn Executor>) -> Result<()> {
    info!("Worker started. Waiting for submissions...");

    loop {
        let job = queue.pop_job().await?;
        info!(
            "Received submission job: id={}, problem={}, language={}",
            job.submission_id, job.problem_id, job.language
        );

        let outcome = match process_job(&job, executor.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to process submission {}: {:#}", job.submission_id, e);
                JudgeOutcome::internal_error()
            }
        };

        if let Err(e) = queue.store_result(job.submission_id, &outcome).await {
            error!("Failed to store result for {}: {:#}", job.submission_id, e);
        }

        info!(
            "Submission judged: id={}, verdict={}, time_ms={}",
            job.submission_id, outcome.verdict, outcome.time_ms
        );
    }
}

async fn process_job(job: &SubmissionJob, executor: &dyn Executor) -> Result<JudgeOutcome> {
    engine::judge_submission(
        executor,
        &job.language,
        &job.code,
        job.meta.as_ref(),
        job.problem_id,
        &job.test_cases,
    )
    .await
}
