//! Submission coordinator
//!
//! Accepts submissions, selects the test-case set, and dispatches either
//! to the durable queue (external worker pool) or to synchronous local
//! execution when the queue is unreachable. Serves polling retrieval and
//! applies reward settlement lazily, at most once per submission, on the
//! first successful poll of an accepted submit.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine;
use crate::executor::Executor;
use crate::languages;
use crate::problem::{Problem, ProblemStore, TestCase};
use crate::queue::{QueueClient, SubmissionJob, SubmissionMeta};
use crate::rewards::{self, ProfileStore, RewardDelta};
use crate::verdict::JudgeOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// Visible test cases, no rewards
    Run,
    /// Hidden test cases (falling back to visible), reward-eligible
    Submit,
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub problem_id: i64,
    pub user_id: Option<String>,
    pub code: String,
    pub language: String,
    pub kind: SubmissionKind,
}

/// Polling result for one submission
#[derive(Debug, Clone)]
pub enum SubmissionStatus {
    /// Verdict not available yet; non-terminal, not an error
    Pending,
    Resolved {
        outcome: JudgeOutcome,
        /// Present only on the poll that settled rewards
        rewards: Option<RewardDelta>,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Problem {0} not found")]
    ProblemNotFound(i64),
    #[error("Judge queue is down and language '{0}' is not supported for local execution")]
    ServiceUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct Coordinator {
    queue: Option<QueueClient>,
    problems: Arc<dyn ProblemStore>,
    profiles: Arc<dyn ProfileStore>,
    executor: Arc<dyn Executor>,
    /// Verdicts produced by the local fallback path
    local_results: DashMap<Uuid, JudgeOutcome>,
    /// Settlement bookkeeping for the local fallback path
    local_meta: DashMap<Uuid, SubmissionMeta>,
}

impl Coordinator {
    pub fn new(
        queue: Option<QueueClient>,
        problems: Arc<dyn ProblemStore>,
        profiles: Arc<dyn ProfileStore>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            queue,
            problems,
            profiles,
            executor,
            local_results: DashMap::new(),
            local_meta: DashMap::new(),
        }
    }

    /// Accept a submission: enqueue it for the worker pool, or judge it
    /// locally when the queue is unreachable. Returns the submission id
    /// the client polls with.
    pub async fn submit(&self, req: SubmissionRequest) -> Result<Uuid, SubmitError> {
        let problem = self
            .problems
            .load_problem(req.problem_id)
            .await?
            .ok_or(SubmitError::ProblemNotFound(req.problem_id))?;

        let test_cases = select_test_cases(&problem, req.kind);
        let submission_id = Uuid::new_v4();

        let meta = SubmissionMeta {
            user_id: req.user_id.clone(),
            problem_id: problem.id,
            kind: req.kind,
            score: problem.effective_score(),
            processed: false,
        };

        if let Some(queue) = self.queue_if_ready().await {
            queue.put_meta(submission_id, &meta).await?;
            queue
                .push_job(&SubmissionJob {
                    submission_id,
                    problem_id: problem.id,
                    code: req.code,
                    language: req.language,
                    meta: problem.meta.clone(),
                    test_cases,
                })
                .await?;
            info!("Submission {} queued", submission_id);
            return Ok(submission_id);
        }

        // Local fallback: synchronous in-process judging
        if languages::get_language_config(&req.language).is_none() {
            return Err(SubmitError::ServiceUnavailable(req.language));
        }

        info!("Queue unreachable, judging {} locally", submission_id);
        let outcome = engine::judge_submission(
            self.executor.as_ref(),
            &req.language,
            &req.code,
            problem.meta.as_ref(),
            problem.id,
            &test_cases,
        )
        .await?;

        self.local_meta.insert(submission_id, meta);
        self.local_results.insert(submission_id, outcome);
        Ok(submission_id)
    }

    /// Look up a submission's verdict. Settles rewards exactly once per
    /// accepted submit, on whichever poll observes it first.
    pub async fn status(&self, submission_id: Uuid) -> Result<SubmissionStatus, SubmitError> {
        if let Some(outcome) = self.local_results.get(&submission_id).map(|r| r.clone()) {
            let rewards = if outcome.is_accepted() {
                self.settle_local(submission_id).await
            } else {
                None
            };
            return Ok(SubmissionStatus::Resolved { outcome, rewards });
        }

        if let Some(queue) = &self.queue {
            if let Some(outcome) = queue.get_result(submission_id).await? {
                let rewards = if outcome.is_accepted() {
                    self.settle_queued(queue, submission_id).await
                } else {
                    None
                };
                return Ok(SubmissionStatus::Resolved { outcome, rewards });
            }
        }

        Ok(SubmissionStatus::Pending)
    }

    async fn queue_if_ready(&self) -> Option<&QueueClient> {
        match &self.queue {
            Some(queue) if queue.ping().await => Some(queue),
            _ => None,
        }
    }

    /// Claim-then-settle for the local path. The claim flips `processed`
    /// under the map's shard lock, so concurrent polls cannot both win.
    async fn settle_local(&self, submission_id: Uuid) -> Option<RewardDelta> {
        let (user_id, problem_id, score) = {
            let mut meta = self.local_meta.get_mut(&submission_id)?;
            if meta.kind != SubmissionKind::Submit || meta.processed {
                return None;
            }
            meta.processed = true;
            (meta.user_id.clone()?, meta.problem_id, meta.score)
        };
        Some(self.settle(&user_id, problem_id, score).await)
    }

    /// Claim-then-settle for the queue path, using the Redis SET NX
    /// claim key as the at-most-once guard.
    async fn settle_queued(&self, queue: &QueueClient, submission_id: Uuid) -> Option<RewardDelta> {
        let meta = match queue.get_meta(submission_id).await {
            Ok(meta) => meta?,
            Err(e) => {
                warn!("Failed to load meta for {}: {:#}", submission_id, e);
                return None;
            }
        };
        if meta.kind != SubmissionKind::Submit || meta.processed {
            return None;
        }
        let user_id = meta.user_id?;

        match queue.claim_reward(submission_id).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Reward claim failed for {}: {:#}", submission_id, e);
                return None;
            }
        }

        let delta = self.settle(&user_id, meta.problem_id, meta.score).await;
        if let Err(e) = queue.mark_processed(submission_id).await {
            warn!("Failed to mark {} processed: {:#}", submission_id, e);
        }
        Some(delta)
    }

    async fn settle(&self, user_id: &str, problem_id: i64, score: u32) -> RewardDelta {
        let featured_id = match self.problems.featured_problem_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to resolve featured problem: {:#}", e);
                None
            }
        };
        rewards::settle(self.profiles.as_ref(), user_id, problem_id, score, featured_id).await
    }
}

/// `run` judges against the visible cases; `submit` against the hidden
/// set, falling back to visible when no hidden set exists.
fn select_test_cases(problem: &Problem, kind: SubmissionKind) -> Vec<TestCase> {
    match kind {
        SubmissionKind::Run => problem.test_cases.clone(),
        SubmissionKind::Submit => problem
            .hidden_test_cases
            .clone()
            .unwrap_or_else(|| problem.test_cases.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecOutcome, ExecStatus};
    use crate::languages::LanguageConfig;
    use crate::problem::{
        Difficulty, IoValue, MemoryProblemStore, Param, ParamType, ProblemMeta,
    };
    use crate::rewards::MemoryProfileStore;
    use crate::verdict::Verdict;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor stub that always prints the same stdout.
    struct FixedExecutor {
        stdout: String,
        calls: AtomicUsize,
    }

    impl FixedExecutor {
        fn new(stdout: &str) -> Self {
            Self {
                stdout: stdout.into(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Executor for FixedExecutor {
        async fn execute(
            &self,
            _lang: &LanguageConfig,
            _work_dir: &Path,
            _input: &str,
        ) -> Result<ExecOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExecOutcome {
                status: ExecStatus::Exited(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
                time_ms: 5,
            })
        }
    }

    fn two_sum_problem() -> Problem {
        Problem {
            id: 1,
            title: "Two Sum".into(),
            difficulty: Difficulty::Easy,
            score: None,
            starter_code: Default::default(),
            test_cases: vec![TestCase {
                input: IoValue::Text("[2,7,11,15]\n9".into()),
                output: IoValue::Text("[0,1]".into()),
            }],
            hidden_test_cases: None,
            meta: Some(ProblemMeta {
                name: "twoSum".into(),
                params: vec![
                    Param {
                        name: "nums".into(),
                        kind: ParamType::Array,
                    },
                    Param {
                        name: "target".into(),
                        kind: ParamType::Integer,
                    },
                ],
            }),
            is_featured: false,
        }
    }

    fn local_coordinator(stdout: &str) -> (Coordinator, Arc<FixedExecutor>) {
        let _ = languages::init_languages();
        let executor = Arc::new(FixedExecutor::new(stdout));
        let coordinator = Coordinator::new(
            None,
            Arc::new(MemoryProblemStore::new(vec![two_sum_problem()], Some(1))),
            Arc::new(MemoryProfileStore::with_user("alice")),
            executor.clone(),
        );
        (coordinator, executor)
    }

    fn submit_request() -> SubmissionRequest {
        SubmissionRequest {
            problem_id: 1,
            user_id: Some("alice".into()),
            code: "class Solution:\n    def twoSum(self, nums, target): return [0, 1]".into(),
            language: "python".into(),
            kind: SubmissionKind::Submit,
        }
    }

    #[tokio::test]
    async fn test_local_submit_resolves_immediately() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let id = coordinator.submit(submit_request()).await.unwrap();
        match coordinator.status(id).await.unwrap() {
            SubmissionStatus::Resolved { outcome, .. } => {
                assert_eq!(outcome.verdict, Verdict::Accepted);
            }
            SubmissionStatus::Pending => panic!("local run must resolve immediately"),
        }
    }

    #[tokio::test]
    async fn test_unsupported_language_is_service_unavailable() {
        let (coordinator, executor) = local_coordinator("[0, 1]");
        let mut req = submit_request();
        req.language = "cobol".into();
        let err = coordinator.submit(req).await.unwrap_err();
        assert!(matches!(err, SubmitError::ServiceUnavailable(_)));
        // No process was spawned
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_problem() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let mut req = submit_request();
        req.problem_id = 404;
        assert!(matches!(
            coordinator.submit(req).await.unwrap_err(),
            SubmitError::ProblemNotFound(404)
        ));
    }

    #[tokio::test]
    async fn test_rewards_settled_once_across_sequential_polls() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let id = coordinator.submit(submit_request()).await.unwrap();

        let first = coordinator.status(id).await.unwrap();
        let second = coordinator.status(id).await.unwrap();

        let rewards_of = |status: SubmissionStatus| match status {
            SubmissionStatus::Resolved { rewards, .. } => rewards,
            SubmissionStatus::Pending => panic!("resolved expected"),
        };

        let first = rewards_of(first).expect("first poll settles");
        assert_eq!(first.coins, 1);
        assert_eq!(first.points, 10);
        assert!(first.daily_solved);
        assert!(rewards_of(second).is_none());
    }

    #[tokio::test]
    async fn test_rewards_settled_once_under_concurrent_polls() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let coordinator = Arc::new(coordinator);
        let id = coordinator.submit(submit_request()).await.unwrap();

        let (a, b) = tokio::join!(coordinator.status(id), coordinator.status(id));
        let settled = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|s| matches!(s, SubmissionStatus::Resolved { rewards: Some(_), .. }))
            .count();
        assert_eq!(settled, 1);
    }

    #[tokio::test]
    async fn test_run_kind_never_settles() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let mut req = submit_request();
        req.kind = SubmissionKind::Run;
        req.user_id = None;
        let id = coordinator.submit(req).await.unwrap();
        match coordinator.status(id).await.unwrap() {
            SubmissionStatus::Resolved { outcome, rewards } => {
                assert_eq!(outcome.verdict, Verdict::Accepted);
                assert!(rewards.is_none());
            }
            SubmissionStatus::Pending => panic!("resolved expected"),
        }
    }

    #[tokio::test]
    async fn test_wrong_answer_never_settles() {
        let (coordinator, _) = local_coordinator("[1, 0]");
        let id = coordinator.submit(submit_request()).await.unwrap();
        match coordinator.status(id).await.unwrap() {
            SubmissionStatus::Resolved { outcome, rewards } => {
                assert_eq!(outcome.verdict, Verdict::WrongAnswer);
                assert!(rewards.is_none());
            }
            SubmissionStatus::Pending => panic!("resolved expected"),
        }
    }

    #[tokio::test]
    async fn test_unknown_submission_is_pending() {
        let (coordinator, _) = local_coordinator("[0, 1]");
        let status = coordinator.status(Uuid::new_v4()).await.unwrap();
        assert!(matches!(status, SubmissionStatus::Pending));
    }

    #[test]
    fn test_submit_prefers_hidden_cases() {
        let mut problem = two_sum_problem();
        let hidden = vec![TestCase {
            input: IoValue::Text("hidden".into()),
            output: IoValue::Text("1".into()),
        }];
        problem.hidden_test_cases = Some(hidden.clone());

        assert_eq!(select_test_cases(&problem, SubmissionKind::Submit), hidden);
        assert_eq!(
            select_test_cases(&problem, SubmissionKind::Run),
            problem.test_cases
        );

        problem.hidden_test_cases = None;
        assert_eq!(
            select_test_cases(&problem, SubmissionKind::Submit),
            problem.test_cases
        );
    }
}
