//! External process execution.
//!
//! Every probe, checker run and `systemctl` call goes through
//! [`ProcessRunner`], so tests can substitute scripted output and every real
//! invocation is bounded by a timeout.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Errors from launching or waiting on a process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, as a terminal would show them.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }

    /// Trimmed stdout when the process succeeded and printed something.
    pub fn stdout_if_ok(&self) -> Option<&str> {
        let text = self.stdout.trim();
        (self.success && !text.is_empty()).then_some(text)
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProcessError>;
}

/// Runs real processes with a per-call timeout. The child is killed when
/// the timeout elapses.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(program, ?args, "Running external command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::Timeout {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output_order() {
        let output = CommandOutput {
            code: Some(1),
            success: false,
            stdout: "out\n".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(output.combined(), "out\nerr\n");
        assert_eq!(output.stdout_if_ok(), None);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner.run("/nonexistent/routectl-test-binary", &[]).await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_exit_and_output() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let output = runner
            .run("sh", &["-c", "echo hello; echo oops >&2; exit 3"])
            .await
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success);
        assert_eq!(output.combined(), "hello\noops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let result = runner.run("sleep", &["5"]).await;
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
    }
}
