//! Verdict engine
//!
//! Iterates a submission's test cases strictly in order, runs each one
//! through the executor, compares actual vs. expected output and stops
//! at the first failure. Executor and driver failures never propagate as
//! errors past this module; they become verdicts.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::driver;
use crate::executor::{ExecStatus, Executor};
use crate::languages::{self, LanguageConfig};
use crate::problem::{ProblemMeta, TestCase};
use crate::verdict::{JudgeOutcome, Verdict};

/// Judge a submission end to end: resolve the language, generate driver
/// code, write the complete program into a fresh scratch directory and
/// evaluate it against the test cases.
pub async fn judge_submission(
    executor: &dyn Executor,
    language: &str,
    code: &str,
    meta: Option<&ProblemMeta>,
    problem_id: i64,
    test_cases: &[TestCase],
) -> Result<JudgeOutcome> {
    let lang = languages::get_language_config(language)
        .ok_or_else(|| anyhow::anyhow!("Unsupported language: {}", language))?;

    let driver = match driver::generate(&lang.name, meta, problem_id) {
        Ok(driver) => driver,
        Err(e) => {
            warn!("Driver generation failed for problem {}: {}", problem_id, e);
            return Ok(JudgeOutcome {
                verdict: Verdict::InternalError,
                details: Some(e.to_string()),
                time_ms: 0,
            });
        }
    };

    let scratch = tempfile::tempdir()?;
    let program = format!("{}\n{}", code, driver);
    tokio::fs::write(scratch.path().join(&lang.source_file), &program).await?;

    Ok(evaluate(executor, &lang, scratch.path(), test_cases).await)
}

/// Evaluate a prepared program against test cases, fail-fast.
pub async fn evaluate(
    executor: &dyn Executor,
    lang: &LanguageConfig,
    work_dir: &Path,
    test_cases: &[TestCase],
) -> JudgeOutcome {
    if test_cases.is_empty() {
        return JudgeOutcome {
            verdict: Verdict::NoTests,
            details: Some("No test cases available for this problem. Code not verified.".into()),
            time_ms: 0,
        };
    }

    let mut total_time_ms = 0u64;

    for (idx, tc) in test_cases.iter().enumerate() {
        let input = tc.input.as_text();
        let expected = tc.output.as_text();

        let outcome = match executor.execute(lang, work_dir, &input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Executor failed on test case {}: {:#}", idx + 1, e);
                return JudgeOutcome {
                    verdict: Verdict::InternalError,
                    details: Some("Internal execution failure".into()),
                    time_ms: total_time_ms,
                };
            }
        };

        total_time_ms += outcome.time_ms;

        if outcome.status == ExecStatus::Timeout {
            return JudgeOutcome {
                verdict: Verdict::Timeout,
                details: Some(format!(
                    "Test Case {} exceeded the time limit ({} ms)",
                    idx + 1,
                    outcome.time_ms
                )),
                time_ms: total_time_ms,
            };
        }

        // Non-zero exit, or a silent run that only wrote to stderr, is a
        // runtime failure; the raw stderr is the detail.
        let stdout = outcome.stdout.trim().to_string();
        let failed = !outcome.is_success() || (stdout.is_empty() && !outcome.stderr.trim().is_empty());
        if failed {
            let detail = if outcome.stderr.trim().is_empty() {
                format!("Process exited with code {}", exit_code(&outcome.status))
            } else {
                outcome.stderr.trim().to_string()
            };
            return JudgeOutcome {
                verdict: Verdict::RuntimeError,
                details: Some(detail),
                time_ms: total_time_ms,
            };
        }

        if !outputs_match(&stdout, &expected) {
            return JudgeOutcome {
                verdict: Verdict::WrongAnswer,
                details: Some(format!(
                    "Test Case {} Failed.\nInput: {}\nExpected: {}\nActual: {}",
                    idx + 1,
                    input,
                    expected.trim(),
                    stdout
                )),
                time_ms: total_time_ms,
            };
        }
    }

    info!(
        "All {} test case(s) passed in {} ms",
        test_cases.len(),
        total_time_ms
    );

    JudgeOutcome {
        verdict: Verdict::Accepted,
        details: Some("All test cases passed".into()),
        time_ms: total_time_ms,
    }
}

fn exit_code(status: &ExecStatus) -> i32 {
    match status {
        ExecStatus::Exited(code) => *code,
        ExecStatus::Timeout => -1,
    }
}

/// Compare actual vs. expected output: structural JSON comparison first
/// (order-sensitive for arrays), trimmed literal comparison as fallback.
fn outputs_match(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    let expected = expected.trim();
    match (
        serde_json::from_str::<serde_json::Value>(actual),
        serde_json::from_str::<serde_json::Value>(expected),
    ) {
        (Ok(a), Ok(e)) => a == e,
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecOutcome;
    use crate::problem::IoValue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor stub that replays scripted outcomes and counts calls.
    struct ScriptedExecutor {
        outcomes: Vec<ExecOutcome>,
        calls: AtomicUsize,
    }

    impl ScriptedExecutor {
        fn new(outcomes: Vec<ExecOutcome>) -> Self {
            Self {
                outcomes,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Executor for ScriptedExecutor {
        async fn execute(
            &self,
            _lang: &LanguageConfig,
            _work_dir: &Path,
            _input: &str,
        ) -> Result<ExecOutcome> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcomes[idx].clone())
        }
    }

    fn ok(stdout: &str) -> ExecOutcome {
        ExecOutcome {
            status: ExecStatus::Exited(0),
            stdout: stdout.into(),
            stderr: String::new(),
            time_ms: 7,
        }
    }

    fn test_lang() -> LanguageConfig {
        LanguageConfig {
            name: "python".into(),
            source_file: "main.py".into(),
            run_command: vec!["python3".into(), "main.py".into()],
        }
    }

    fn case(input: &str, output: &str) -> TestCase {
        TestCase {
            input: IoValue::Text(input.into()),
            output: IoValue::Text(output.into()),
        }
    }

    #[tokio::test]
    async fn test_all_passing_is_accepted() {
        let cases = vec![case("1", "[0,1]"), case("2", "[1,2]")];
        let executor = ScriptedExecutor::new(vec![ok("[0, 1]"), ok("[1, 2]")]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.details.as_deref(), Some("All test cases passed"));
        assert_eq!(outcome.time_ms, 14);
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let cases = vec![case("a", "1"), case("b", "2"), case("c", "3")];
        let executor = ScriptedExecutor::new(vec![ok("1"), ok("99"), ok("3")]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::WrongAnswer);
        let details = outcome.details.unwrap();
        assert!(details.contains("Test Case 2"));
        assert!(details.contains("Expected: 2"));
        assert!(details.contains("Actual: 99"));
        // Case 3 is never executed
        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_tests_is_not_accepted() {
        let executor = ScriptedExecutor::new(vec![]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &[]).await;
        assert_eq!(outcome.verdict, Verdict::NoTests);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_runtime_error_on_first_case() {
        let cases = vec![case("a", "1"), case("b", "2")];
        let executor = ScriptedExecutor::new(vec![ExecOutcome {
            status: ExecStatus::Exited(1),
            stdout: String::new(),
            stderr: "KeyError: 'nums'".into(),
            time_ms: 3,
        }]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::RuntimeError);
        assert!(outcome.details.unwrap().contains("KeyError: 'nums'"));
        assert_eq!(executor.calls(), 1);
    }

    #[tokio::test]
    async fn test_stderr_only_output_is_runtime_error() {
        // Drivers that abort without a result line may still exit 0
        let cases = vec![case("a", "1")];
        let executor = ScriptedExecutor::new(vec![ExecOutcome {
            status: ExecStatus::Exited(0),
            stdout: String::new(),
            stderr: "could not parse input into 2 argument(s)".into(),
            time_ms: 2,
        }]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::RuntimeError);
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_runtime_error() {
        let cases = vec![case("a", "1")];
        let executor = ScriptedExecutor::new(vec![ExecOutcome {
            status: ExecStatus::Timeout,
            stdout: String::new(),
            stderr: String::new(),
            time_ms: 5000,
        }]);
        let outcome = evaluate(&executor, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::Timeout);
    }

    #[tokio::test]
    async fn test_two_sum_order_sensitive() {
        let cases = vec![TestCase {
            input: IoValue::Text("[2,7,11,15]\n9".into()),
            output: IoValue::Text("[0,1]".into()),
        }];

        let correct = ScriptedExecutor::new(vec![ok("[0, 1]")]);
        let outcome = evaluate(&correct, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::Accepted);

        let reversed = ScriptedExecutor::new(vec![ok("[1, 0]")]);
        let outcome = evaluate(&reversed, &test_lang(), Path::new("."), &cases).await;
        assert_eq!(outcome.verdict, Verdict::WrongAnswer);
    }

    #[test]
    fn test_outputs_match_structural_vs_literal() {
        assert!(outputs_match("[0,1]", "[0, 1]"));
        assert!(!outputs_match("[0,1]", "[1,0]"));
        assert!(outputs_match(" 42\n", "42"));
        // Non-JSON falls back to trimmed literal comparison
        assert!(outputs_match("hello world", "hello world"));
        assert!(!outputs_match("hello", "world"));
    }

    /// Every shipped test input must decompose into the declared number
    /// of arguments under the driver's parse strategy, or the problem is
    /// unjudgeable regardless of the submission.
    #[test]
    fn test_seed_problem_inputs_match_declared_params() {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/problems.json"));
        let file: serde_json::Value = serde_json::from_str(content).unwrap();

        for problem in file["problems"].as_array().unwrap() {
            let Some(meta) = problem.get("meta") else {
                continue;
            };
            let params = meta["params"].as_array().unwrap().len();
            let visible = problem["test_cases"].as_array().unwrap().iter();
            let hidden = problem
                .get("hidden_test_cases")
                .and_then(|h| h.as_array())
                .into_iter()
                .flatten();

            for tc in visible.chain(hidden) {
                let input = tc["input"].as_str().unwrap();
                let lines: Vec<&str> =
                    input.split('\n').filter(|l| !l.trim().is_empty()).collect();
                let per_line = lines.len() == params
                    && lines
                        .iter()
                        .all(|l| serde_json::from_str::<serde_json::Value>(l).is_ok());
                let whole = params == 1
                    && serde_json::from_str::<serde_json::Value>(input.trim()).is_ok();
                assert!(
                    per_line || whole,
                    "problem {} input {:?} cannot parse into {} argument(s)",
                    problem["id"],
                    input,
                    params
                );
            }
        }
    }

    fn param(name: &str, kind: crate::problem::ParamType) -> crate::problem::Param {
        crate::problem::Param {
            name: name.into(),
            kind,
        }
    }

    // The tests below spawn the real language runtimes; python3 and node
    // must be on PATH, as in any deployment of this service.

    #[tokio::test]
    async fn test_two_sum_python_end_to_end() {
        let _ = languages::init_languages();
        let executor = crate::executor::ProcessExecutor::default();
        let meta = ProblemMeta {
            name: "twoSum".into(),
            params: vec![
                param("nums", crate::problem::ParamType::Array),
                param("target", crate::problem::ParamType::Integer),
            ],
        };
        let code = "class Solution:\n    def twoSum(self, nums, target):\n        seen = {}\n        for i, x in enumerate(nums):\n            if target - x in seen:\n                return [seen[target - x], i]\n            seen[x] = i";
        let cases = vec![case("[2,7,11,15]\n9", "[0, 1]"), case("[3,3]\n6", "[0, 1]")];

        let outcome = judge_submission(&executor, "python", code, Some(&meta), 1, &cases)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted, "{:?}", outcome.details);
    }

    #[tokio::test]
    async fn test_two_sum_javascript_end_to_end() {
        let _ = languages::init_languages();
        let executor = crate::executor::ProcessExecutor::default();
        let meta = ProblemMeta {
            name: "twoSum".into(),
            params: vec![
                param("nums", crate::problem::ParamType::Array),
                param("target", crate::problem::ParamType::Integer),
            ],
        };
        let code = "function twoSum(nums, target) {\n    const seen = new Map();\n    for (let i = 0; i < nums.length; i++) {\n        if (seen.has(target - nums[i])) return [seen.get(target - nums[i]), i];\n        seen.set(nums[i], i);\n    }\n}";
        let cases = vec![case("[2,7,11,15]\n9", "[0, 1]")];

        let outcome = judge_submission(&executor, "javascript", code, Some(&meta), 1, &cases)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted, "{:?}", outcome.details);

        let wrong = "function twoSum(nums, target) { return [1, 0]; }";
        let outcome = judge_submission(&executor, "javascript", wrong, Some(&meta), 1, &cases)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::WrongAnswer);
    }

    #[tokio::test]
    async fn test_linked_list_round_trip_python() {
        let _ = languages::init_languages();
        let executor = crate::executor::ProcessExecutor::default();
        let meta = ProblemMeta {
            name: "echoList".into(),
            params: vec![param("head", crate::problem::ParamType::ListNode)],
        };
        // Rebuilding through both helpers must preserve the sequence,
        // including the empty one.
        let code = "class Solution:\n    def echoList(self, head):\n        return to_list(to_linked_list(to_list(head)))";
        let cases = vec![case("[2,4,3]", "[2,4,3]"), case("[]", "[]")];

        let outcome = judge_submission(&executor, "python", code, Some(&meta), 2, &cases)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted, "{:?}", outcome.details);
    }

    #[tokio::test]
    async fn test_linked_list_round_trip_javascript() {
        let _ = languages::init_languages();
        let executor = crate::executor::ProcessExecutor::default();
        let meta = ProblemMeta {
            name: "echoList".into(),
            params: vec![param("head", crate::problem::ParamType::ListNode)],
        };
        let code = "function echoList(head) {\n    return toList(toLinkedList(toList(head)));\n}";
        let cases = vec![case("[2,4,3]", "[2,4,3]"), case("[]", "[]")];

        let outcome = judge_submission(&executor, "javascript", code, Some(&meta), 2, &cases)
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted, "{:?}", outcome.details);
    }

    #[tokio::test]
    async fn test_judge_submission_missing_meta_is_internal_error() {
        let _ = languages::init_languages();
        let executor = ScriptedExecutor::new(vec![]);
        let outcome = judge_submission(&executor, "python", "print(1)", None, 99, &[case("1", "1")])
            .await
            .unwrap();
        assert_eq!(outcome.verdict, Verdict::InternalError);
        assert_eq!(executor.calls(), 0);
    }
}
