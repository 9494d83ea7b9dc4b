//! User communication and terminal tools
//!
//! None of these perform I/O themselves. They raise signals; the
//! orchestrator relays them to the user gateway and derives phase events.

use serde_json::{json, Value};

use forge_core::{ForgeError, Result};

use crate::context::{Args, SessionState};

pub fn message_user(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let message = args.non_empty_str("message")?;
    state.signals.user_messages.push(message.to_string());
    Ok(json!({ "delivered": true }))
}

pub fn request_user_input(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let prompt = args.non_empty_str("prompt")?;
    state.signals.awaiting_user_input = Some(prompt.to_string());
    tracing::info!(prompt, "Input requested from the user");
    Ok(json!({ "awaiting_input": true }))
}

/// Finalize the work for delivery. Requires every plan step complete.
pub fn submit(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let commit_message = args.non_empty_str("commit_message")?;

    let plan = state
        .gate
        .plan()
        .ok_or_else(|| ForgeError::ToolExecution("Nothing to submit: no plan was set".to_string()))?;
    if !plan.all_complete() {
        let open = plan
            .steps
            .iter()
            .filter(|s| s.status != forge_core::StepStatus::Complete)
            .count();
        return Err(ForgeError::ToolExecution(format!(
            "Cannot submit: {} plan step(s) still open",
            open
        )));
    }

    state.signals.submitted = Some(commit_message.to_string());
    tracing::info!("Work submitted for delivery");
    Ok(json!({ "submitted": true }))
}

/// Declare the session finished without a deliverable change
pub fn done(state: &mut SessionState, args: &Args<'_>) -> Result<Value> {
    let summary = args.non_empty_str("summary")?;
    state.signals.done = Some(summary.to_string());
    tracing::info!("Session declared done");
    Ok(json!({ "done": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{AutomationMode, Plan};
    use serde_json::json;

    fn args_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_message_and_input_raise_signals() {
        let mut state = SessionState::new(AutomationMode::None);

        let map = args_map(json!({"message": "Halfway there"}));
        message_user(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(state.signals.user_messages, vec!["Halfway there"]);

        let map = args_map(json!({"prompt": "Which database?"}));
        request_user_input(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(
            state.signals.awaiting_user_input.as_deref(),
            Some("Which database?")
        );
    }

    #[test]
    fn test_submit_requires_complete_plan() {
        let mut state = SessionState::new(AutomationMode::AutoApprove);
        let map = args_map(json!({"commit_message": "Fix the bug"}));

        // No plan
        assert!(submit(&mut state, &Args::new(&map)).is_err());

        // Incomplete plan
        state.gate.propose(Plan::new(vec!["a".to_string(), "b".to_string()]));
        let err = submit(&mut state, &Args::new(&map)).unwrap_err();
        assert_eq!(err.kind(), "tool_execution_error");

        // Complete plan
        let plan = state.gate.plan_mut().unwrap();
        plan.complete_step(0).unwrap();
        plan.complete_step(1).unwrap();
        submit(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(state.signals.submitted.as_deref(), Some("Fix the bug"));
    }

    #[test]
    fn test_done_records_summary() {
        let mut state = SessionState::new(AutomationMode::None);
        let map = args_map(json!({"summary": "No change needed"}));
        done(&mut state, &Args::new(&map)).unwrap();
        assert_eq!(state.signals.done.as_deref(), Some("No change needed"));
    }
}
