//! Execution request and result types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::StreamSettings;
use crate::models::{ExecOutcome, ToolCallId};

/// One command execution on behalf of a tool call.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Call this execution belongs to.
    pub tool_call_id: ToolCallId,
    /// Program to run.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory; inherits the parent's when absent.
    pub cwd: Option<PathBuf>,
    /// Wall-clock limit; `None` means no timeout.
    pub timeout: Option<Duration>,
    /// Hard ceiling on stdout/stderr retained in the final result.
    pub max_buffer_bytes: usize,
    /// Grace period between graceful termination and forced kill.
    pub grace_period: Duration,
}

impl ExecRequest {
    /// Build a request with limits taken from `settings`.
    #[must_use]
    pub fn new(
        tool_call_id: ToolCallId,
        program: impl Into<String>,
        settings: &StreamSettings,
    ) -> Self {
        Self {
            tool_call_id,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
            max_buffer_bytes: settings.max_buffer_bytes,
            grace_period: settings.grace_period(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set the wall-clock timeout.
    #[must_use]
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

/// Final result of one command execution.
///
/// Present for every started call regardless of failure mode; spawn
/// failures resolve here with [`ExecOutcome::Error`] rather than an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExecResult {
    /// Exit code, when the process exited on its own with one.
    pub exit_code: Option<i32>,
    /// Captured stdout, truncated at the request's buffer cap.
    pub stdout: String,
    /// Captured stderr, truncated at the request's buffer cap.
    pub stderr: String,
    /// Wall-clock duration of the execution in milliseconds.
    pub duration_ms: u64,
    /// Terminal outcome; exit code alone never determines it.
    pub outcome: ExecOutcome,
    /// Stdout hit the buffer cap and further bytes were dropped.
    pub stdout_truncated: bool,
    /// Stderr hit the buffer cap and further bytes were dropped.
    pub stderr_truncated: bool,
}

impl ExecResult {
    /// Result for a process that never started.
    #[must_use]
    pub fn spawn_failure(message: String) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: message,
            duration_ms: 0,
            outcome: ExecOutcome::Error,
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }
}
