//! Async external process runner with semaphore-controlled concurrency
//!
//! Provides non-blocking command execution with:
//! - Semaphore to limit concurrent child processes (default: 16)
//! - Optional timeout handling (disabled unless configured)
//! - Full capture of stdout, stderr and exit status
//!
//! `run` executes an argv directly and never goes through a shell.
//! `run_shell` hands a command line to `sh -c` and is the only entry point
//! that honours shell metacharacters; it backs `execute_command` and the
//! type-check pass.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::error::{ProcessError, Result};

/// Default maximum concurrent child processes
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Shell used by [`ProcessRunner::run_shell`]
pub const SHELL: &str = "sh";

/// Captured result of a finished process
///
/// All three fields are always populated, even when the command failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything written to standard output
    pub stdout: String,
    /// Everything written to standard error
    pub stderr: String,
    /// Exit status; `-1` when the child was terminated by a signal
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr if present, otherwise stdout, trimmed
    ///
    /// git prints some failures (e.g. "nothing to commit") on stdout.
    pub fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }

    /// Human-readable report used for shell commands
    pub fn to_report(&self) -> String {
        let mut parts = Vec::new();

        if !self.stdout.is_empty() {
            parts.push(format!("STDOUT:\n{}", self.stdout));
        }
        if !self.stderr.is_empty() {
            parts.push(format!("STDERR:\n{}", self.stderr));
        }
        if !self.success() {
            parts.push(format!("Command failed with exit code {}", self.exit_code));
        }

        if parts.is_empty() {
            "Command executed successfully with no output.".to_string()
        } else {
            parts.join("\n")
        }
    }
}

/// Environment variables layered on top of the inherited environment
pub type EnvOverlay = BTreeMap<String, String>;

/// Async process runner
///
/// Uses a semaphore to limit concurrent child processes, preventing
/// resource exhaustion when many tool calls arrive at once.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// Optional command timeout; `None` waits forever
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Create a new runner with default settings
    pub fn new() -> Self {
        Self::with_max_concurrent(DEFAULT_MAX_CONCURRENT)
    }

    /// Create a runner with custom concurrency limit
    pub fn with_max_concurrent(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout: None,
        }
    }

    /// Set the command timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `argv` in `cwd`, optionally feeding `stdin`
    ///
    /// A non-zero exit is data, not an error. Only a failure to start the
    /// process (or a timeout, when configured) is reported as `Err`.
    #[instrument(skip(self, stdin), fields(cwd = %cwd.display()))]
    pub async fn run(
        &self,
        argv: &[&str],
        cwd: &Path,
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd);

        self.execute(cmd, program, stdin).await
    }

    /// Run a command line through `sh -c` with an environment overlay
    #[instrument(skip(self, env), fields(cwd = %cwd.display()))]
    pub async fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        env: &EnvOverlay,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(command).current_dir(cwd).envs(env);

        self.execute(cmd, SHELL, None).await
    }

    async fn execute(
        &self,
        mut cmd: Command,
        program: &str,
        stdin: Option<&str>,
    ) -> Result<CommandOutput> {
        // Acquire semaphore permit
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProcessError::SemaphoreError)?;

        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        // Feed stdin from a separate task so a chatty child can't deadlock
        // against a full stdout pipe while we are still writing.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_owned();
                Some(tokio::spawn(async move {
                    let result = pipe.write_all(input.as_bytes()).await;
                    drop(pipe);
                    result
                }))
            }
            _ => None,
        };

        let output = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{} timed out after {:?}", program, limit);
                    return Err(ProcessError::Timeout {
                        program: program.to_string(),
                        timeout: limit,
                    }
                    .into());
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| ProcessError::Io {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The child may exit without reading its input; that is its call.
                Ok(Err(e)) => debug!("{} did not consume stdin: {}", program, e),
                Err(e) => debug!("stdin writer for {} panicked: {}", program, e),
            }
        }

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        debug!("{} exited with {}", program, result.exit_code);

        Ok(result)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
