//! # forge-sandbox
//!
//! Sandbox boundary enforcer: every path and every spawned process in the
//! runtime goes through this crate before touching the real filesystem or
//! process table.
//!
//! - `Sandbox::resolve` confines paths to the workspace root, rejecting
//!   traversal and symlinked escapes
//! - `Sandbox::run_shell` / `run_program` execute subprocesses with the
//!   working directory pinned to the root, a wall-clock timeout, and
//!   guaranteed termination on timeout and cancellation

mod paths;
mod shell;

pub use paths::PROTECTED_FILES;
pub use shell::ShellOutput;

use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_core::{ForgeError, Result};

/// Default wall-clock cap for shell commands
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(120);

/// A single workspace root all file and process access is confined to
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    shell_timeout: Duration,
}

impl Sandbox {
    /// Create a sandbox rooted at an existing directory
    ///
    /// The root is canonicalized once so symlink checks compare against the
    /// real location.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root: PathBuf = root.into();
        let root = root.canonicalize().map_err(|e| {
            ForgeError::Config(format!(
                "Workspace root {} is not usable: {}",
                root.display(),
                e
            ))
        })?;
        if !root.is_dir() {
            return Err(ForgeError::Config(format!(
                "Workspace root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
        })
    }

    pub fn with_shell_timeout(mut self, timeout: Duration) -> Self {
        self.shell_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shell_timeout(&self) -> Duration {
        self.shell_timeout
    }
}
