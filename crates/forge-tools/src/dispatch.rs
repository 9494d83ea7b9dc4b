//! The tool dispatcher
//!
//! `dispatch` runs the fixed validation pipeline — unknown tool, argument
//! schema, phase permission, plan gate — then routes to the handler and
//! normalizes whatever comes back into a `ToolResult`. Nothing escapes this
//! boundary as an unhandled fault.

use forge_core::{ForgeError, Result, ToolCall, ToolResult};

use crate::context::{Args, SessionState, ToolEnv};
use crate::registry::{descriptor, ParamKind, ToolDescriptor, ToolName};
use crate::{comm, file, git, planning, research, shell};

pub struct Dispatcher {
    env: ToolEnv,
}

impl Dispatcher {
    pub fn new(env: ToolEnv) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &ToolEnv {
        &self.env
    }

    /// Validate and execute one tool call
    ///
    /// Always yields a result: success payload or structured fault. The
    /// original cause of handler failures is preserved in the fault message
    /// for the reasoning collaborator to read.
    pub async fn dispatch(&self, state: &mut SessionState, call: &ToolCall) -> ToolResult {
        match self.try_dispatch(state, call).await {
            Ok(payload) => {
                tracing::debug!(tool = %call.tool, "Tool call succeeded");
                ToolResult::ok(&call.tool, payload)
            }
            Err(err) => {
                let err = normalize(err);
                tracing::info!(tool = %call.tool, kind = err.kind(), error = %err, "Tool call failed");
                ToolResult::fault(&call.tool, &err)
            }
        }
    }

    async fn try_dispatch(
        &self,
        state: &mut SessionState,
        call: &ToolCall,
    ) -> Result<serde_json::Value> {
        // 1. Unknown tool
        let desc = descriptor(&call.tool)
            .ok_or_else(|| ForgeError::UnknownTool(call.tool.clone()))?;

        // 2. Argument schema
        validate_args(desc, call)?;

        // 3. Phase permission
        if !desc.phases.contains(&state.phase) {
            return Err(ForgeError::PhaseViolation {
                tool: call.tool.clone(),
                phase: state.phase,
            });
        }

        // 4. Plan gate for mutating calls
        if desc.mutating && !state.gate.may_mutate() {
            return Err(ForgeError::ApprovalRequired(call.tool.clone()));
        }

        // 5. Handler
        let args = Args::new(&call.args);
        let env = &self.env;
        match desc.name {
            ToolName::ListFiles => file::list_files(env, &args).await,
            ToolName::ReadFile => file::read_file(env, &args).await,
            ToolName::WriteFile => file::write_file(env, &args).await,
            ToolName::ApplyPatch => file::apply_patch(env, &args).await,
            ToolName::DeleteFile => file::delete_file(env, &args).await,
            ToolName::RenameFile => file::rename_file(env, &args).await,
            ToolName::RestoreFile => file::restore_file(env, &args).await,
            ToolName::ResetAll => file::reset_all(env).await,
            ToolName::RunInBashSession => shell::run_in_bash_session(env, &args).await,
            ToolName::FrontendVerificationInstructions => {
                shell::frontend_verification_instructions()
            }
            ToolName::FrontendVerificationComplete => {
                shell::frontend_verification_complete(env, &args).await
            }
            ToolName::SetPlan => planning::set_plan(state, &args),
            ToolName::PlanStepComplete => planning::plan_step_complete(state, &args),
            ToolName::RequestPlanReview => planning::request_plan_review(state),
            ToolName::RecordUserApprovalForPlan => planning::record_user_approval_for_plan(state),
            ToolName::PreCommitInstructions => planning::pre_commit_instructions(),
            ToolName::RecordMemory => planning::record_memory(env, &args).await,
            ToolName::MessageUser => comm::message_user(state, &args),
            ToolName::RequestUserInput => comm::request_user_input(state, &args),
            ToolName::Submit => comm::submit(state, &args),
            ToolName::Done => comm::done(state, &args),
            ToolName::WebSearch => research::web_search(env, &args).await,
            ToolName::ViewTextWebsite => research::view_text_website(env, &args).await,
            ToolName::MakeCommit => git::make_commit(env, &args).await,
            ToolName::WatchPrCiStatus => git::watch_pr_ci_status(env, &args).await,
        }
    }
}

/// Check declared parameters: required presence, known names, value types
fn validate_args(desc: &ToolDescriptor, call: &ToolCall) -> Result<()> {
    for spec in desc.params {
        match call.args.get(spec.name) {
            None if spec.required => {
                return Err(ForgeError::InvalidArguments(format!(
                    "Missing required argument '{}'",
                    spec.name
                )));
            }
            None => {}
            Some(value) => {
                let ok = match spec.kind {
                    ParamKind::String => value.is_string(),
                    ParamKind::Integer => value.is_i64() || value.is_u64(),
                    ParamKind::Boolean => value.is_boolean(),
                    ParamKind::StringArray => value
                        .as_array()
                        .is_some_and(|items| items.iter().all(|v| v.is_string())),
                };
                if !ok {
                    return Err(ForgeError::InvalidArguments(format!(
                        "Argument '{}' has the wrong type (expected {:?})",
                        spec.name, spec.kind
                    )));
                }
            }
        }
    }

    for name in call.args.keys() {
        if !desc.params.iter().any(|spec| spec.name == name) {
            return Err(ForgeError::InvalidArguments(format!(
                "Unknown argument '{}'",
                name
            )));
        }
    }
    Ok(())
}

/// Collapse handler-level faults into the wire taxonomy while keeping the
/// original cause in the message
fn normalize(err: ForgeError) -> ForgeError {
    match err {
        ForgeError::Io(e) => ForgeError::ToolExecution(format!("I/O error: {}", e)),
        ForgeError::Serialization(e) => {
            ForgeError::ToolExecution(format!("Serialization error: {}", e))
        }
        ForgeError::Config(msg) | ForgeError::Other(msg) => ForgeError::ToolExecution(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{AutomationMode, Phase, Plan};
    use forge_session::InMemoryMemoryStore;
    use forge_sandbox::Sandbox;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn dispatcher() -> (TempDir, Dispatcher) {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        let env = ToolEnv::new(sandbox, Arc::new(InMemoryMemoryStore::new()), "u1");
        (dir, Dispatcher::new(env))
    }

    fn approved_execute_state() -> SessionState {
        let mut state = SessionState::new(AutomationMode::None);
        state.gate.propose(Plan::new(vec!["step".to_string()]));
        state.gate.approve();
        state.phase = Phase::Execute;
        state
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        let result = dispatcher
            .dispatch(&mut state, &ToolCall::new("launch_missiles"))
            .await;
        assert_eq!(result.fault_kind(), Some("unknown_tool"));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        let result = dispatcher
            .dispatch(&mut state, &ToolCall::new("read_file"))
            .await;
        assert_eq!(result.fault_kind(), Some("invalid_arguments"));
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        let call = ToolCall::new("read_file").with_arg("path", json!(42));
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("invalid_arguments"));
    }

    #[tokio::test]
    async fn test_unknown_argument_rejected() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        let call = ToolCall::new("reset_all").with_arg("force", json!(true));
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("invalid_arguments"));
    }

    #[tokio::test]
    async fn test_phase_violation_in_orient() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::AutoApprove);
        let call = ToolCall::new("write_file")
            .with_arg("path", json!("a.txt"))
            .with_arg("content", json!("hi"));
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("phase_violation"));
    }

    #[tokio::test]
    async fn test_approval_required_then_cleared() {
        let (dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        state.gate.propose(Plan::new(vec!["write the file".to_string()]));
        state.phase = Phase::Execute;

        let call = ToolCall::new("write_file")
            .with_arg("path", json!("a.txt"))
            .with_arg("content", json!("hi"));

        // Unreviewed plan blocks the mutating call
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("approval_required"));
        assert!(!dir.path().join("a.txt").exists());

        // Approval clears it; the identical call now succeeds
        state.gate.approve();
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert!(result.is_ok(), "{:?}", result);
        assert!(dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_auto_approve_skips_gate() {
        let (dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::AutoApprove);
        state.gate.propose(Plan::new(vec!["s".to_string()]));
        state.phase = Phase::Execute;

        let call = ToolCall::new("write_file")
            .with_arg("path", json!("b.txt"))
            .with_arg("content", json!("hi"));
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert!(result.is_ok());
        assert!(dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn test_sandbox_violation_surfaces_and_leaves_fs_unchanged() {
        let (dir, dispatcher) = dispatcher();
        let mut state = approved_execute_state();

        let call = ToolCall::new("write_file")
            .with_arg("path", json!("../../etc/passwd"))
            .with_arg("content", json!("root::0:0"));
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("sandbox_violation"));
        assert!(dir.path().read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_read_only_dispatch_is_idempotent() {
        let (dir, dispatcher) = dispatcher();
        std::fs::write(dir.path().join("note.txt"), "stable contents").unwrap();

        let mut state = SessionState::new(AutomationMode::None);
        let call = ToolCall::new("read_file").with_arg("path", json!("note.txt"));
        let first = dispatcher.dispatch(&mut state, &call).await;
        let second = dispatcher.dispatch(&mut state, &call).await;
        assert!(first.is_ok());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_terminal_phase_accepts_no_calls() {
        let (_dir, dispatcher) = dispatcher();
        let mut state = SessionState::new(AutomationMode::None);
        state.phase = Phase::Done;
        let call = ToolCall::new("list_files");
        let result = dispatcher.dispatch(&mut state, &call).await;
        assert_eq!(result.fault_kind(), Some("phase_violation"));
    }
}
