//! External command execution.
//!
//! Every interaction with the volume manager and the jail host goes through
//! [`CommandRunner`], so the dataset and jail services can be driven by a
//! fake in tests. [`SystemRunner`] is the production implementation.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Runs an external program with positional arguments.
///
/// Implementations must return `Ok(stdout)` only when the program ran and
/// exited with status zero. No shell is involved: `args` are passed to the
/// program as-is.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and return its standard output.
    async fn run(&self, program: &Path, args: &[&str]) -> Result<String>;
}

/// Runs commands on the host with a per-invocation timeout.
///
/// The child is killed when the timeout expires or when the returned future
/// is dropped.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    /// Create a runner that bounds every invocation by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get the configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[&str]) -> Result<String> {
        let command = render_command(program, args);
        let start = std::time::Instant::now();
        tracing::debug!(command = %command, "Running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::warn!(command = %command, error = %e, "Failed to spawn command");
                CoreError::Invocation {
                    command: command.clone(),
                    code: None,
                    message: e.to_string(),
                }
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| CoreError::Invocation {
                command: command.clone(),
                code: None,
                message: e.to_string(),
            })?,
            Err(_) => {
                tracing::warn!(
                    command = %command,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Command timed out"
                );
                return Err(CoreError::Timeout {
                    command,
                    after: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = diagnostic(&stderr, &stdout, output.status);
            tracing::debug!(
                command = %command,
                code = ?output.status.code(),
                elapsed_ms,
                "Command failed"
            );
            return Err(CoreError::Invocation {
                command,
                code: output.status.code(),
                message,
            });
        }

        tracing::trace!(command = %command, elapsed_ms, stdout_len = stdout.len(), "Command completed");
        Ok(stdout)
    }
}

/// Render a program and its arguments for logs and error messages.
pub(crate) fn render_command(program: &Path, args: &[&str]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// Pick the tool's own explanation of a failure: stderr, then stdout.
fn diagnostic(stderr: &str, stdout: &str, status: std::process::ExitStatus) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exited with {status}")
}
