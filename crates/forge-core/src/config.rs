//! Task configuration sourced from the environment
//!
//! The worker container receives its task through env vars; everything else
//! in the runtime takes an explicit `TaskConfig` and never reads the
//! environment itself.

use std::env;
use std::path::PathBuf;

use crate::error::{ForgeError, Result};
use crate::types::AutomationMode;

const DEFAULT_WORKSPACE_ROOT: &str = "/workspace";
const DEFAULT_SESSION_ID: &str = "default-session";
const DEFAULT_USER_ID: &str = "default-user";

/// Backend selection for session/memory persistence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServiceMode {
    /// In-process stores, lost on exit (dev default)
    #[default]
    Memory,
    /// JSON files under a state directory
    File,
}

impl std::str::FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "dev" => Ok(Self::Memory),
            "file" | "prod" => Ok(Self::File),
            _ => Err(format!("Invalid service mode: {}", s)),
        }
    }
}

/// Immutable task input: created at session start, never mutated
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Repository to clone and work against
    pub repo_url: String,
    /// Natural-language objective
    pub task: String,
    pub session_id: String,
    pub user_id: String,
    pub automation_mode: AutomationMode,
    /// Sandbox root; every file and process operation is confined here
    pub workspace_root: PathBuf,
    /// Token injected into the clone URL for private repos
    pub github_token: Option<String>,
    pub service_mode: ServiceMode,
}

impl TaskConfig {
    /// Read the task contract from the environment
    ///
    /// REPO_URL and TASK are required. An unknown AUTOMATION_MODE falls back
    /// to NONE with a warning rather than failing the worker.
    pub fn from_env() -> Result<Self> {
        let repo_url = env::var("REPO_URL")
            .map_err(|_| ForgeError::Config("REPO_URL env var is required".to_string()))?;
        let task = env::var("TASK")
            .map_err(|_| ForgeError::Config("TASK env var is required".to_string()))?;

        let automation_mode = match env::var("AUTOMATION_MODE") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(mode = %raw, "Unknown AUTOMATION_MODE, defaulting to NONE");
                AutomationMode::None
            }),
            Err(_) => AutomationMode::None,
        };

        let service_mode = match env::var("SERVICE_MODE") {
            Ok(raw) => raw
                .parse()
                .map_err(|e: String| ForgeError::Config(e))?,
            Err(_) => ServiceMode::Memory,
        };

        Ok(Self {
            repo_url,
            task,
            session_id: env::var("SESSION_ID").unwrap_or_else(|_| DEFAULT_SESSION_ID.to_string()),
            user_id: env::var("USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string()),
            automation_mode,
            workspace_root: env::var("WORKSPACE_ROOT")
                .unwrap_or_else(|_| DEFAULT_WORKSPACE_ROOT.to_string())
                .into(),
            github_token: env::var("GITHUB_TOKEN").ok(),
            service_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();

        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();
        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let result = f();

        for (key, original) in originals {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_from_env_requires_repo_and_task() {
        with_env_vars(
            &[
                ("REPO_URL", None),
                ("TASK", Some("fix the bug")),
                ("AUTOMATION_MODE", None),
                ("SESSION_ID", None),
                ("USER_ID", None),
                ("WORKSPACE_ROOT", None),
                ("GITHUB_TOKEN", None),
                ("SERVICE_MODE", None),
            ],
            || {
                let err = TaskConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("REPO_URL"));
            },
        );
    }

    #[test]
    fn test_from_env_defaults() {
        with_env_vars(
            &[
                ("REPO_URL", Some("https://github.com/acme/widgets")),
                ("TASK", Some("add a login page")),
                ("AUTOMATION_MODE", None),
                ("SESSION_ID", None),
                ("USER_ID", None),
                ("WORKSPACE_ROOT", None),
                ("GITHUB_TOKEN", None),
                ("SERVICE_MODE", None),
            ],
            || {
                let config = TaskConfig::from_env().unwrap();
                assert_eq!(config.session_id, "default-session");
                assert_eq!(config.user_id, "default-user");
                assert_eq!(config.automation_mode, AutomationMode::None);
                assert_eq!(config.workspace_root, PathBuf::from("/workspace"));
                assert_eq!(config.service_mode, ServiceMode::Memory);
            },
        );
    }

    #[test]
    fn test_unknown_automation_mode_falls_back_to_none() {
        with_env_vars(
            &[
                ("REPO_URL", Some("https://github.com/acme/widgets")),
                ("TASK", Some("task")),
                ("AUTOMATION_MODE", Some("FULL_SEND")),
                ("SERVICE_MODE", None),
            ],
            || {
                let config = TaskConfig::from_env().unwrap();
                assert_eq!(config.automation_mode, AutomationMode::None);
            },
        );
    }
}
