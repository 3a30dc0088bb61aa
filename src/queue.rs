//! Queue client - durable submission queue and verdict store
//!
//! All Redis operations live here: pushing and popping submission jobs,
//! storing and fetching verdicts, submission metadata, and the atomic
//! reward-settlement claim. The client owns its connection and exposes
//! readiness via `ping()`; there is no module-level "connected" flag.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::SubmissionKind;
use crate::problem::{ProblemMeta, TestCase};
use crate::verdict::JudgeOutcome;

/// Redis key constants
pub mod keys {
    /// Submission job queue
    pub const SUBMISSION_QUEUE: &str = "submission_queue";

    /// Verdict key prefix (for polling)
    pub const RESULT_PREFIX: &str = "submission:";

    /// Submission metadata key prefix
    pub const META_PREFIX: &str = "submission_meta:";

    /// Reward settlement claim key prefix (SET NX)
    pub const REWARD_CLAIM_PREFIX: &str = "submission_reward_claim:";
}

/// Results and metadata expire after an hour; clients poll well within it
const RESULT_EXPIRY_SECS: u64 = 3600;

/// Work item pushed to the queue for an external worker.
///
/// Test cases and driver metadata travel inline so the worker needs no
/// datastore access of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub submission_id: Uuid,
    pub problem_id: i64,
    pub code: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ProblemMeta>,
    pub test_cases: Vec<TestCase>,
}

/// Coordinator-internal record tracking reward settlement per submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub problem_id: i64,
    #[serde(rename = "type")]
    pub kind: SubmissionKind,
    pub score: u32,
    pub processed: bool,
}

/// Centralized client for the queue and verdict store
#[derive(Clone)]
pub struct QueueClient {
    manager: ConnectionManager,
}

impl QueueClient {
    /// Connect to Redis at the given URL. The underlying connection
    /// manager reconnects on its own after transient failures.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = client
            .get_connection_manager()
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", redis_url))?;
        info!("Connected to Redis at {}", redis_url);
        Ok(Self { manager })
    }

    /// Readiness check for the coordinator's path selection
    pub async fn ping(&self) -> bool {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    /// Enqueue a submission job for the worker pool
    pub async fn push_job(&self, job: &SubmissionJob) -> Result<()> {
        let json = serde_json::to_string(job)?;
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(keys::SUBMISSION_QUEUE, &json)
            .await
            .context("Failed to enqueue submission job")?;
        Ok(())
    }

    /// Block until the next job arrives (worker side). Malformed jobs
    /// are logged and skipped; connection errors back off and retry.
    pub async fn pop_job(&self) -> Result<SubmissionJob> {
        let mut conn = self.manager.clone();
        loop {
            let result: Option<(String, String)> =
                match conn.blpop(keys::SUBMISSION_QUEUE, 0.0).await {
                    Ok(res) => res,
                    Err(e) => {
                        warn!("Redis BLPOP failed: {}. Retrying in 3 seconds...", e);
                        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                        continue;
                    }
                };

            if let Some((_, job_data)) = result {
                match serde_json::from_str::<SubmissionJob>(&job_data) {
                    Ok(job) => return Ok(job),
                    Err(e) => {
                        warn!("Failed to parse submission job: {}", e);
                        continue;
                    }
                }
            }
        }
    }

    /// Store a verdict for the coordinator's polling path
    pub async fn store_result(&self, submission_id: Uuid, outcome: &JudgeOutcome) -> Result<()> {
        let json = serde_json::to_string(outcome)?;
        let key = format!("{}{}", keys::RESULT_PREFIX, submission_id);
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
            .await
            .context("Failed to store judge result")?;
        Ok(())
    }

    pub async fn get_result(&self, submission_id: Uuid) -> Result<Option<JudgeOutcome>> {
        let key = format!("{}{}", keys::RESULT_PREFIX, submission_id);
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn put_meta(&self, submission_id: Uuid, meta: &SubmissionMeta) -> Result<()> {
        let key = format!("{}{}", keys::META_PREFIX, submission_id);
        let json = serde_json::to_string(meta)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
            .await
            .context("Failed to store submission meta")?;
        Ok(())
    }

    pub async fn get_meta(&self, submission_id: Uuid) -> Result<Option<SubmissionMeta>> {
        let key = format!("{}{}", keys::META_PREFIX, submission_id);
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(&key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Atomically claim reward settlement for a submission via SET NX.
    /// Returns true for exactly one caller; concurrent polls lose the
    /// race and must not settle.
    pub async fn claim_reward(&self, submission_id: Uuid) -> Result<bool> {
        let key = format!("{}{}", keys::REWARD_CLAIM_PREFIX, submission_id);
        let mut conn = self.manager.clone();
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("claimed")
            .arg("NX")
            .arg("EX")
            .arg(RESULT_EXPIRY_SECS as usize)
            .query_async(&mut conn)
            .await?;
        Ok(claimed.is_some())
    }

    /// Record that settlement ran. Advisory fast path; the claim key is
    /// what guarantees at-most-once.
    pub async fn mark_processed(&self, submission_id: Uuid) -> Result<()> {
        if let Some(mut meta) = self.get_meta(submission_id).await? {
            meta.processed = true;
            self.put_meta(submission_id, &meta).await?;
        }
        Ok(())
    }
}
