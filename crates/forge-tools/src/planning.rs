//! Plan and memory tools
//!
//! These mutate the session's gate and plan through `SessionState` and raise
//! signals the orchestrator turns into phase events.

use serde_json::{json, Value};

use forge_core::{ApprovalState, ForgeError, MemoryFact, Plan, Result, StepStatus};

use crate::context::{Args, SessionState, ToolEnv};

pub fn set_plan(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let steps = args.string_array("steps")?;
    if steps.is_empty() || steps.iter().all(|s| s.trim().is_empty()) {
        return Err(ForgeError::InvalidArguments(
            "A plan needs at least one non-empty step".to_string(),
        ));
    }

    let count = steps.len();
    state.gate.propose(Plan::new(steps));
    state.signals.plan_proposed = true;
    if state.gate.approval() == ApprovalState::Approved {
        state.signals.approval_recorded = true;
    }

    tracing::info!(steps = count, approval = %state.gate.approval(), "Plan set");
    Ok(json!({
        "steps": count,
        "approval": state.gate.approval(),
    }))
}

pub fn plan_step_complete(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let index = args.integer("step_index")?;
    let summary = args.non_empty_str("summary")?;
    let id = u32::try_from(index)
        .map_err(|_| ForgeError::InvalidArguments(format!("Invalid step index {}", index)))?;

    let plan = state
        .gate
        .plan_mut()
        .ok_or_else(|| ForgeError::ToolExecution("No plan has been set".to_string()))?;
    plan.complete_step(id)?;
    let all_complete = plan.all_complete();
    let remaining = plan
        .steps
        .iter()
        .filter(|s| s.status != StepStatus::Complete)
        .count();
    state.signals.step_completed = true;

    tracing::info!(step = id, summary, "Plan step complete");
    Ok(json!({
        "step_index": id,
        "all_complete": all_complete,
        "remaining": remaining,
    }))
}

pub fn request_plan_review(state: &mut SessionState) -> Result<Value> {
    if state.gate.plan().is_none() {
        return Err(ForgeError::ToolExecution(
            "No plan to review. Call set_plan first.".to_string(),
        ));
    }
    state.signals.review_requested = true;
    tracing::info!(approval = %state.gate.approval(), "Plan review requested");
    Ok(json!({ "approval": state.gate.approval() }))
}

pub fn record_user_approval_for_plan(state: &mut SessionState) -> Result<Value> {
    if state.gate.plan().is_none() {
        return Err(ForgeError::ToolExecution(
            "No plan to approve. Call set_plan first.".to_string(),
        ));
    }
    state.gate.approve();
    state.signals.approval_recorded = true;
    tracing::info!("User approval recorded for the current plan");
    Ok(json!({ "approval": state.gate.approval() }))
}

pub fn pre_commit_instructions() -> Result<Value> {
    Ok(json!({
        "checklist": [
            "Run the project's formatter and linter if it has them.",
            "Run the test suite and make sure it passes.",
            "Re-read the diff against the task description.",
            "Remove debugging leftovers and commented-out code.",
            "Keep the commit message in imperative mood, under 72 characters on the first line.",
        ],
    }))
}

pub async fn record_memory(env: &ToolEnv, args: &Args<'_>) -> Result<Value> {
    let key = args.non_empty_str("key")?;
    let value = args.non_empty_str("value")?;

    env.memory
        .remember(&env.user_id, MemoryFact::new(key, value))
        .await?;
    tracing::debug!(key, "Fact recorded");
    Ok(json!({ "key": key, "recorded": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::AutomationMode;
    use forge_sandbox::Sandbox;
    use forge_session::InMemoryMemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn args_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_set_plan_raises_signal_and_unreviewed() {
        let mut state = SessionState::new(AutomationMode::None);
        let map = args_map(json!({"steps": ["read the code", "fix the bug"]}));
        let out = set_plan(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(out["steps"], 2);
        assert_eq!(state.gate.approval(), ApprovalState::Unreviewed);
        assert!(state.signals.plan_proposed);
        assert!(!state.signals.approval_recorded);
    }

    #[test]
    fn test_set_plan_auto_approve_records_approval() {
        let mut state = SessionState::new(AutomationMode::AutoApprove);
        let map = args_map(json!({"steps": ["only step"]}));
        set_plan(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(state.gate.approval(), ApprovalState::Approved);
        assert!(state.signals.approval_recorded);
    }

    #[test]
    fn test_set_plan_rejects_empty() {
        let mut state = SessionState::new(AutomationMode::None);
        let map = args_map(json!({"steps": []}));
        assert!(set_plan(&mut state, &Args::new(&map)).is_err());
        let map = args_map(json!({"steps": ["  "]}));
        assert!(set_plan(&mut state, &Args::new(&map)).is_err());
    }

    #[test]
    fn test_step_completion_tracks_progress() {
        let mut state = SessionState::new(AutomationMode::None);
        let map = args_map(json!({"steps": ["a", "b"]}));
        set_plan(&mut state, &Args::new(&map)).unwrap();

        let map = args_map(json!({"step_index": 0, "summary": "did a"}));
        let out = plan_step_complete(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(out["all_complete"], false);
        assert_eq!(out["remaining"], 1);

        let map = args_map(json!({"step_index": 1, "summary": "did b"}));
        let out = plan_step_complete(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(out["all_complete"], true);
    }

    #[test]
    fn test_step_completion_without_plan_fails() {
        let mut state = SessionState::new(AutomationMode::None);
        let map = args_map(json!({"step_index": 0, "summary": "s"}));
        assert!(plan_step_complete(&mut state, &Args::new(&map)).is_err());
    }

    #[test]
    fn test_review_and_approval_need_a_plan() {
        let mut state = SessionState::new(AutomationMode::None);
        assert!(request_plan_review(&mut state).is_err());
        assert!(record_user_approval_for_plan(&mut state).is_err());

        let map = args_map(json!({"steps": ["s"]}));
        set_plan(&mut state, &Args::new(&map)).unwrap();
        request_plan_review(&mut state).unwrap();
        assert!(state.signals.review_requested);
        record_user_approval_for_plan(&mut state).unwrap();
        assert_eq!(state.gate.approval(), ApprovalState::Approved);
    }

    #[tokio::test]
    async fn test_record_memory_reaches_store() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(InMemoryMemoryStore::new());
        let env = ToolEnv::new(Sandbox::new(dir.path()).unwrap(), memory.clone(), "u1");

        let map = args_map(json!({"key": "build", "value": "cargo build --workspace"}));
        record_memory(&env, &Args::new(&map)).await.unwrap();

        let facts = forge_core::MemoryStore::recall(memory.as_ref(), "u1", "build")
            .await
            .unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "cargo build --workspace");
    }
}
