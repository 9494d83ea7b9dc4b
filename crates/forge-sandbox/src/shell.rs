//! Confined subprocess execution
//!
//! Every invocation runs with the working directory pinned to the workspace
//! root, bounded wall-clock time, and `kill_on_drop` so the child is
//! terminated and reaped on every exit path including timeout and
//! cancellation.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use forge_core::{ForgeError, Result};

use crate::Sandbox;

/// Captured output is capped so a runaway command cannot blow up the
/// session record
const MAX_CAPTURE_BYTES: usize = 100_000;

/// Captured outcome of a confined subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl Sandbox {
    /// Run a shell command string through `sh -c` inside the workspace
    pub async fn run_shell(
        &self,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ShellOutput> {
        self.screen_tokens(command.split_whitespace())?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        self.spawn_confined(cmd, None, timeout, cancel).await
    }

    /// Run a program with explicit arguments (no shell interpretation)
    pub async fn run_program(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ShellOutput> {
        self.screen_tokens(args.iter().copied())?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        self.spawn_confined(cmd, None, timeout, cancel).await
    }

    /// Run a program feeding `stdin` to it (used for patch application)
    pub async fn run_program_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin: &[u8],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ShellOutput> {
        self.screen_tokens(args.iter().copied())?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        self.spawn_confined(cmd, Some(stdin), timeout, cancel).await
    }

    /// Reject absolute-path tokens referencing locations outside the root,
    /// where detectable
    fn screen_tokens<'a>(&self, tokens: impl Iterator<Item = &'a str>) -> Result<()> {
        for token in tokens {
            let trimmed = token.trim_matches(|c| matches!(c, '"' | '\'' | ';' | ','));
            if trimmed.starts_with('/') && !std::path::Path::new(trimmed).starts_with(self.root())
            {
                tracing::warn!(
                    token = trimmed,
                    root = %self.root().display(),
                    "Sandbox violation blocked in command arguments"
                );
                return Err(ForgeError::SandboxViolation(format!(
                    "'{}': absolute path outside the workspace",
                    trimmed
                )));
            }
        }
        Ok(())
    }

    async fn spawn_confined(
        &self,
        mut cmd: Command,
        stdin: Option<&[u8]>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ShellOutput> {
        cmd.current_dir(self.root())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ForgeError::ToolExecution(format!("Failed to spawn process: {}", e)))?;

        // Stdin is written from its own task, concurrently with the output
        // capture below. A child that fills its stdout pipe before it has
        // read all of a large payload would otherwise deadlock both sides.
        if let Some(data) = stdin {
            let mut handle = child.stdin.take().ok_or_else(|| {
                ForgeError::ToolExecution("Child process stdin unavailable".to_string())
            })?;
            let data = data.to_vec();
            tokio::spawn(async move {
                if let Err(err) = handle.write_all(&data).await {
                    tracing::debug!(error = %err, "Child stopped reading stdin early");
                }
                // Dropping the handle closes the pipe so the child sees EOF
            });
        }

        // Dropping the wait future on either branch below drops the child,
        // which kills and reaps it via kill_on_drop.
        let wait = child.wait_with_output();
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Subprocess cancelled");
                return Err(ForgeError::Cancelled);
            }
            outcome = tokio::time::timeout(timeout, wait) => outcome,
        };

        let output = match outcome {
            Err(_elapsed) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Subprocess timed out");
                return Err(ForgeError::Timeout(timeout.as_secs()));
            }
            Ok(result) => result?,
        };

        Ok(ShellOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: truncate_capture(output.stdout),
            stderr: truncate_capture(output.stderr),
        })
    }
}

fn truncate_capture(bytes: Vec<u8>) -> String {
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if text.len() > MAX_CAPTURE_BYTES {
        text.truncate(MAX_CAPTURE_BYTES);
        text.push_str("\n[... output truncated ...]");
    }
    text
}
