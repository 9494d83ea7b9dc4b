//! Tool execution context
//!
//! No ambient globals: everything a handler may touch travels through an
//! explicit `ToolEnv` (long-lived collaborators) and `SessionState` (the
//! per-session mutable state the orchestrator owns).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use forge_core::{
    ApprovalState, AutomationMode, ForgeError, MemoryStore, Phase, Plan, PlanGate, Result,
};
use forge_sandbox::Sandbox;

/// Long-lived collaborators shared across all tool calls of a session
#[derive(Clone)]
pub struct ToolEnv {
    pub sandbox: Sandbox,
    pub memory: Arc<dyn MemoryStore>,
    pub http: reqwest::Client,
    pub user_id: String,
    pub cancel: CancellationToken,
    /// Wall-clock cap applied to git/gh subprocesses
    pub git_timeout: Duration,
}

impl ToolEnv {
    pub fn new(sandbox: Sandbox, memory: Arc<dyn MemoryStore>, user_id: impl Into<String>) -> Self {
        Self {
            sandbox,
            memory,
            http: reqwest::Client::new(),
            user_id: user_id.into(),
            cancel: CancellationToken::new(),
            git_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Orchestration signals raised by tool handlers
///
/// The orchestrator drains these after each dispatched call to derive phase
/// events; they are never persisted.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub plan_proposed: bool,
    pub review_requested: bool,
    pub approval_recorded: bool,
    pub step_completed: bool,
    pub awaiting_user_input: Option<String>,
    pub user_messages: Vec<String>,
    /// Commit message recorded by `submit`
    pub submitted: Option<String>,
    /// Final summary recorded by `done`
    pub done: Option<String>,
}

impl Signals {
    pub fn take(&mut self) -> Signals {
        std::mem::take(self)
    }
}

/// Per-session mutable state threaded through dispatch
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub gate: PlanGate,
    pub signals: Signals,
}

impl SessionState {
    pub fn new(mode: AutomationMode) -> Self {
        Self {
            phase: Phase::Orient,
            gate: PlanGate::new(mode),
            signals: Signals::default(),
        }
    }

    /// Rebuild state from a persisted record
    pub fn restore(
        mode: AutomationMode,
        phase: Phase,
        plan: Option<Plan>,
        approval: ApprovalState,
    ) -> Self {
        Self {
            phase,
            gate: PlanGate::restore(mode, plan, approval),
            signals: Signals::default(),
        }
    }
}

/// Typed accessors over a validated argument map
///
/// The dispatcher checks presence and types against the schema before a
/// handler runs; these getters are the second line of defense and also do
/// content checks (non-empty strings, ranges).
pub struct Args<'a> {
    map: &'a serde_json::Map<String, serde_json::Value>,
}

impl<'a> Args<'a> {
    pub fn new(map: &'a serde_json::Map<String, serde_json::Value>) -> Self {
        Self { map }
    }

    pub fn str(&self, name: &str) -> Result<&'a str> {
        self.map
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing(name))
    }

    /// Required string that must have non-whitespace content
    pub fn non_empty_str(&self, name: &str) -> Result<&'a str> {
        let value = self.str(name)?;
        if value.trim().is_empty() {
            return Err(ForgeError::InvalidArguments(format!(
                "'{}' must not be empty",
                name
            )));
        }
        Ok(value)
    }

    pub fn str_opt(&self, name: &str) -> Option<&'a str> {
        self.map.get(name).and_then(|v| v.as_str())
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        self.map
            .get(name)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing(name))
    }

    pub fn integer_opt(&self, name: &str) -> Option<i64> {
        self.map.get(name).and_then(|v| v.as_i64())
    }

    pub fn string_array(&self, name: &str) -> Result<Vec<String>> {
        let items = self
            .map
            .get(name)
            .and_then(|v| v.as_array())
            .ok_or_else(|| missing(name))?;
        items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ForgeError::InvalidArguments(format!("'{}' must contain only strings", name))
                })
            })
            .collect()
    }
}

fn missing(name: &str) -> ForgeError {
    ForgeError::InvalidArguments(format!("Missing or mistyped argument '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_typed_accessors() {
        let map = args(json!({
            "path": "src/main.rs",
            "count": 3,
            "steps": ["a", "b"],
        }));
        let a = Args::new(&map);
        assert_eq!(a.str("path").unwrap(), "src/main.rs");
        assert_eq!(a.integer("count").unwrap(), 3);
        assert_eq!(a.string_array("steps").unwrap(), vec!["a", "b"]);
        assert!(a.str("missing").is_err());
        assert!(a.str_opt("missing").is_none());
    }

    #[test]
    fn test_non_empty_rejects_whitespace() {
        let map = args(json!({"message": "   "}));
        let err = Args::new(&map).non_empty_str("message").unwrap_err();
        assert_eq!(err.kind(), "invalid_arguments");
    }

    #[test]
    fn test_mixed_array_rejected() {
        let map = args(json!({"steps": ["ok", 7]}));
        assert!(Args::new(&map).string_array("steps").is_err());
    }

    #[test]
    fn test_signals_take_resets() {
        let mut signals = Signals {
            plan_proposed: true,
            ..Signals::default()
        };
        let taken = signals.take();
        assert!(taken.plan_proposed);
        assert!(!signals.plan_proposed);
    }
}
