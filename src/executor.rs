//! Process executor
//!
//! Runs a generated program under its language runtime, feeding the test
//! input on stdin and collecting stdout/stderr with an enforced
//! wall-clock timeout. Each invocation is independent: the program lives
//! in its own scratch directory and nothing is shared between test cases
//! or submissions.
//!
//! This is tokio-level process control, not an OS sandbox. A production
//! deployment must wrap executions in a container or restricted-syscall
//! jail with CPU/memory ceilings and no network access.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::languages::LanguageConfig;

pub const DEFAULT_TIME_LIMIT_MS: u64 = 5_000;

/// Raw execution status, no verdict interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    /// Program exited with the given code
    Exited(i32),
    /// Wall-clock time limit exceeded; the process was killed
    Timeout,
}

/// Outcome of running a program against one input
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time in milliseconds
    pub time_ms: u64,
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecStatus::Exited(0))
    }
}

/// Executor trait, the seam between the verdict engine and the runtime
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the program in `work_dir` under the language's runtime,
    /// writing `input` to its stdin.
    async fn execute(
        &self,
        lang: &LanguageConfig,
        work_dir: &Path,
        input: &str,
    ) -> Result<ExecOutcome>;
}

/// Executor that spawns the language runtime as a child process
pub struct ProcessExecutor {
    time_limit: Duration,
}

impl ProcessExecutor {
    pub fn new(time_limit_ms: u64) -> Self {
        Self {
            time_limit: Duration::from_millis(time_limit_ms),
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_LIMIT_MS)
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(
        &self,
        lang: &LanguageConfig,
        work_dir: &Path,
        input: &str,
    ) -> Result<ExecOutcome> {
        let program = lang
            .run_command
            .first()
            .context("Empty run command for language")?;

        debug!(
            "Running {:?} in {:?} ({} byte input)",
            lang.run_command,
            work_dir,
            input.len()
        );

        let mut cmd = Command::new(program);
        cmd.args(&lang.run_command[1..])
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn runtime: {}", program))?;

        // Write input and close stdin so the program sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        // kill_on_drop reaps the child when the timeout drops the future
        let output = match tokio::time::timeout(self.time_limit, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for runtime")?,
            Err(_) => {
                return Ok(ExecOutcome {
                    status: ExecStatus::Timeout,
                    stdout: String::new(),
                    stderr: String::new(),
                    time_ms: self.time_limit.as_millis() as u64,
                });
            }
        };

        let time_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        Ok(ExecOutcome {
            status: ExecStatus::Exited(exit_code),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            time_ms,
        })
    }
}
