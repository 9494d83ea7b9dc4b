//! Path confinement
//!
//! Resolution is lexical first (absolute paths and `..` escapes rejected
//! without touching the filesystem), then the nearest existing ancestor is
//! canonicalized to catch symlinked escapes.

use std::path::{Component, Path, PathBuf};

use forge_core::{ForgeError, Result};

use crate::Sandbox;

/// Files and directories tools may read but never modify
pub const PROTECTED_FILES: &[&str] = &[".git", ".env", ".secrets"];

impl Sandbox {
    /// Resolve a workspace-relative path, guaranteeing the result is inside
    /// the root
    ///
    /// Violations are logged as security-relevant events and returned as
    /// `SandboxViolation`, never raised.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let normalized = self.normalize(relative)?;
        let candidate = self.root().join(&normalized);

        // Symlink escape check: canonicalize the nearest existing ancestor
        // and require it to stay under the (already canonical) root.
        let mut existing = candidate.clone();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent.to_path_buf(),
                None => break,
            }
        }
        let canonical = existing.canonicalize().map_err(|e| {
            ForgeError::SandboxViolation(format!(
                "Cannot resolve '{}': {}",
                relative, e
            ))
        })?;
        if !canonical.starts_with(self.root()) {
            return Err(self.violation(relative, "path resolves outside the workspace"));
        }

        Ok(candidate)
    }

    /// Additional check for mutating operations: protected entries at the
    /// workspace root stay untouched
    ///
    /// The check runs on the normalized path, so `./.git/config` and
    /// `src/../.git/config` are caught like the plain spelling.
    pub fn ensure_writable(&self, relative: &str) -> Result<()> {
        let normalized = self.normalize(relative)?;
        if let Some(Component::Normal(name)) = normalized.components().next() {
            if let Some(name) = name.to_str() {
                if PROTECTED_FILES.contains(&name) {
                    return Err(self.violation(relative, "protected file"));
                }
            }
        }
        Ok(())
    }

    /// Lexical normalization: absolute paths rejected, `.` dropped, every
    /// `..` must stay inside the root
    fn normalize(&self, relative: &str) -> Result<PathBuf> {
        let requested = Path::new(relative);

        if requested.is_absolute() {
            return Err(self.violation(relative, "absolute paths are not allowed"));
        }

        let mut normalized = PathBuf::new();
        for component in requested.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(
                            self.violation(relative, "path traversal escapes the workspace")
                        );
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(self.violation(relative, "absolute paths are not allowed"));
                }
            }
        }
        Ok(normalized)
    }

    fn violation(&self, relative: &str, why: &str) -> ForgeError {
        tracing::warn!(
            path = relative,
            root = %self.root().display(),
            why,
            "Sandbox violation blocked"
        );
        ForgeError::SandboxViolation(format!("'{}': {}", relative, why))
    }
}
