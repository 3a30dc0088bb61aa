use serde::{Deserialize, Serialize};
use std::fmt;

/// Final classification of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    Timeout,
    NoTests,
    InternalError,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::Timeout => "timeout",
            Verdict::NoTests => "no_tests",
            Verdict::InternalError => "internal_error",
        };
        write!(f, "{}", s)
    }
}

/// Result of judging one submission against its test cases.
///
/// `time_ms` is wall-clock time accumulated across every test case that
/// was executed before the verdict was reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeOutcome {
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub time_ms: u64,
}

impl JudgeOutcome {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    /// Outcome stored when the worker itself fails. The detail shown to
    /// the client stays generic; the real cause goes to the server log.
    pub fn internal_error() -> Self {
        Self {
            verdict: Verdict::InternalError,
            details: Some("Internal judging error".into()),
            time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Accepted.to_string(), "accepted");
        assert_eq!(Verdict::WrongAnswer.to_string(), "wrong_answer");
        assert_eq!(Verdict::NoTests.to_string(), "no_tests");
        assert_eq!(Verdict::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_verdict_serde_snake_case() {
        let json = serde_json::to_string(&Verdict::WrongAnswer).unwrap();
        assert_eq!(json, "\"wrong_answer\"");
        let back: Verdict = serde_json::from_str("\"internal_error\"").unwrap();
        assert_eq!(back, Verdict::InternalError);
    }
}
