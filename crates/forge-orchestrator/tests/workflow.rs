//! End-to-end workflow tests driven by a scripted reasoner

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Mutex;

use forge_core::{
    ApprovalState, AutomationMode, ForgeError, Phase, Plan, Result, RetryPolicy, ServiceMode,
    SessionRecord, SessionStore, StepStatus, TaskConfig, ToolCall,
};
use forge_orchestrator::{
    Orchestrator, Reasoner, ReasonerTurn, ReviewDecision, RunOutcome, TurnContext, TurnDirective,
    UserGateway,
};
use forge_sandbox::Sandbox;
use forge_session::{InMemoryMemoryStore, InMemorySessionStore, Stores};
use forge_tools::{Dispatcher, ToolEnv};

/// Replays a fixed sequence of turns, then empty ones
struct ScriptedReasoner {
    turns: Mutex<VecDeque<ReasonerTurn>>,
}

impl ScriptedReasoner {
    fn new(turns: Vec<ReasonerTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn next_turn(&self, _ctx: &TurnContext) -> Result<ReasonerTurn> {
        Ok(self.turns.lock().await.pop_front().unwrap_or_default())
    }
}

/// Fails every invocation with a transient error
struct UnavailableReasoner;

#[async_trait]
impl Reasoner for UnavailableReasoner {
    async fn next_turn(&self, _ctx: &TurnContext) -> Result<ReasonerTurn> {
        Err(ForgeError::CollaboratorUnavailable("HTTP 503".to_string()))
    }
}

/// Gateway with a fixed review decision; records what it was asked
struct FixedGateway {
    decision: ReviewDecision,
    notifications: Mutex<Vec<String>>,
    reviews: Mutex<usize>,
}

impl FixedGateway {
    fn approving() -> Self {
        Self::with_decision(ReviewDecision::Approved)
    }

    fn with_decision(decision: ReviewDecision) -> Self {
        Self {
            decision,
            notifications: Mutex::new(Vec::new()),
            reviews: Mutex::new(0),
        }
    }
}

#[async_trait]
impl UserGateway for FixedGateway {
    async fn notify(&self, message: &str) -> Result<()> {
        self.notifications.lock().await.push(message.to_string());
        Ok(())
    }

    async fn review_plan(&self, _plan: &Plan) -> Result<ReviewDecision> {
        *self.reviews.lock().await += 1;
        Ok(self.decision.clone())
    }

    async fn provide_input(&self, _prompt: &str) -> Result<String> {
        Ok("use sqlite".to_string())
    }
}

struct Harness {
    _workspace: TempDir,
    workspace_path: std::path::PathBuf,
    sessions: Arc<InMemorySessionStore>,
    stores: Stores,
    task: TaskConfig,
}

fn harness(mode: AutomationMode) -> Harness {
    let workspace = TempDir::new().unwrap();
    let sessions = Arc::new(InMemorySessionStore::new());
    let stores = Stores {
        sessions: sessions.clone(),
        memory: Arc::new(InMemoryMemoryStore::new()),
    };
    let task = TaskConfig {
        repo_url: "https://example.com/repo.git".to_string(),
        task: "Add a greeting file".to_string(),
        session_id: "s1".to_string(),
        user_id: "u1".to_string(),
        automation_mode: mode,
        workspace_root: workspace.path().to_path_buf(),
        github_token: None,
        service_mode: ServiceMode::Memory,
    };
    Harness {
        workspace_path: workspace.path().to_path_buf(),
        _workspace: workspace,
        sessions,
        stores,
        task,
    }
}

fn orchestrator(h: &Harness, reasoner: Arc<dyn Reasoner>, gateway: Arc<dyn UserGateway>) -> Orchestrator {
    let sandbox = Sandbox::new(&h.workspace_path).unwrap();
    let env = ToolEnv::new(sandbox, h.stores.memory.clone(), &h.task.user_id);
    Orchestrator::new(Dispatcher::new(env), h.stores.clone(), reasoner, gateway)
        .with_max_turns(10)
        .with_retry_policy(
            RetryPolicy::new(2).with_backoff(Duration::from_millis(1), Duration::from_millis(2)),
        )
}

fn calls(calls: Vec<ToolCall>) -> ReasonerTurn {
    ReasonerTurn {
        calls,
        directive: None,
    }
}

fn directive(calls: Vec<ToolCall>, directive: TurnDirective) -> ReasonerTurn {
    ReasonerTurn {
        calls,
        directive: Some(directive),
    }
}

#[tokio::test]
async fn test_auto_approve_happy_path() {
    let h = harness(AutomationMode::AutoApprove);
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![
            ToolCall::new("set_plan").with_arg("steps", json!(["write greeting.txt"]))
        ]),
        calls(vec![
            ToolCall::new("write_file")
                .with_arg("path", json!("greeting.txt"))
                .with_arg("content", json!("hello\n")),
            ToolCall::new("plan_step_complete")
                .with_arg("step_index", json!(0))
                .with_arg("summary", json!("wrote it")),
        ]),
        directive(
            vec![ToolCall::new("run_in_bash_session")
                .with_arg("command", json!("test -f greeting.txt"))],
            TurnDirective::VerificationPassed,
        ),
        calls(vec![
            ToolCall::new("submit").with_arg("commit_message", json!("Add greeting file"))
        ]),
    ]));
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, reasoner, gateway.clone())
        .run(&h.task)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Done {
            summary: "Add greeting file".to_string(),
            commit_message: Some("Add greeting file".to_string()),
        }
    );
    assert!(h.workspace_path.join("greeting.txt").exists());
    // Automation bypass: no human review happened
    assert_eq!(*gateway.reviews.lock().await, 0);
    assert!(h.sessions.is_archived("s1").await);

    let record = h.sessions.load("s1").await.unwrap().unwrap();
    assert_eq!(record.phase, Phase::Done);
    assert_eq!(record.approval, ApprovalState::Approved);
}

#[tokio::test]
async fn test_none_mode_goes_through_review() {
    let h = harness(AutomationMode::None);
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![
            ToolCall::new("set_plan").with_arg("steps", json!(["write the file"]))
        ]),
        calls(vec![ToolCall::new("request_plan_review")]),
        calls(vec![
            ToolCall::new("write_file")
                .with_arg("path", json!("a.txt"))
                .with_arg("content", json!("x")),
            ToolCall::new("message_user")
                .with_arg("message", json!("File written, wrapping up")),
            ToolCall::new("plan_step_complete")
                .with_arg("step_index", json!(0))
                .with_arg("summary", json!("done")),
        ]),
        directive(vec![], TurnDirective::VerificationPassed),
        calls(vec![
            ToolCall::new("done").with_arg("summary", json!("All set"))
        ]),
    ]));
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, reasoner, gateway.clone())
        .run(&h.task)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Done {
            summary: "All set".to_string(),
            commit_message: None,
        }
    );
    assert_eq!(*gateway.reviews.lock().await, 1);
    assert_eq!(
        *gateway.notifications.lock().await,
        vec!["File written, wrapping up"]
    );
    assert!(h.workspace_path.join("a.txt").exists());
}

#[tokio::test]
async fn test_mutation_before_approval_is_rejected() {
    let h = harness(AutomationMode::None);
    // Plan set but never reviewed; the write lands in the plan phase where
    // the mutation is not permitted at all, so the file must not appear.
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![
            ToolCall::new("set_plan").with_arg("steps", json!(["s"])),
            ToolCall::new("write_file")
                .with_arg("path", json!("never.txt"))
                .with_arg("content", json!("x")),
        ]),
    ]));
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, reasoner, gateway).run(&h.task).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(!h.workspace_path.join("never.txt").exists());

    let record = h.sessions.load("s1").await.unwrap().unwrap();
    let write_entry = record
        .history
        .iter()
        .find(|e| e.tool.as_deref() == Some("write_file"))
        .unwrap();
    assert!(!write_entry.ok);
    assert!(write_entry.detail.starts_with("phase_violation"));
}

#[tokio::test]
async fn test_rejected_plan_keeps_steps_and_revokes_approval() {
    let h = harness(AutomationMode::None);
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![ToolCall::new("set_plan")
            .with_arg("steps", json!(["step one", "step two"]))]),
        calls(vec![ToolCall::new("request_plan_review")]),
    ]));
    let gateway = Arc::new(FixedGateway::with_decision(ReviewDecision::Rejected(
        "too broad".to_string(),
    )));

    let outcome = orchestrator(&h, reasoner, gateway).run(&h.task).await.unwrap();

    // No approval ever arrives; the run burns its turn budget and fails
    assert!(matches!(outcome, RunOutcome::Failed { .. }));

    let record = h.sessions.load("s1").await.unwrap().unwrap();
    assert_eq!(record.approval, ApprovalState::Rejected);
    let plan = record.plan.unwrap();
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[0].description, "step one");
}

#[tokio::test]
async fn test_resumes_mid_execute_without_reapproval() {
    let h = harness(AutomationMode::None);

    // A previous worker run got halfway through execution
    let mut record = SessionRecord::new("s1", "u1");
    record.phase = Phase::Execute;
    let mut plan = Plan::new(vec!["write the file".to_string(), "check it".to_string()]);
    plan.complete_step(0).unwrap();
    record.plan = Some(plan);
    record.approval = ApprovalState::Approved;
    h.stores.sessions.save(&record).await.unwrap();

    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![
            ToolCall::new("write_file")
                .with_arg("path", json!("resumed.txt"))
                .with_arg("content", json!("x")),
            ToolCall::new("plan_step_complete")
                .with_arg("step_index", json!(1))
                .with_arg("summary", json!("checked")),
        ]),
        directive(vec![], TurnDirective::VerificationPassed),
        calls(vec![
            ToolCall::new("done").with_arg("summary", json!("Resumed and finished"))
        ]),
    ]));
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, reasoner, gateway.clone())
        .run(&h.task)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Done { .. }));
    // The restored approval let the mutation through with no new review
    assert_eq!(*gateway.reviews.lock().await, 0);
    assert!(h.workspace_path.join("resumed.txt").exists());
}

#[tokio::test]
async fn test_terminal_session_never_resumes() {
    let h = harness(AutomationMode::None);
    let mut record = SessionRecord::new("s1", "u1");
    record.phase = Phase::Done;
    h.stores.sessions.save(&record).await.unwrap();

    let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
    let gateway = Arc::new(FixedGateway::approving());
    let err = orchestrator(&h, reasoner, gateway)
        .run(&h.task)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already ended"));
}

#[tokio::test]
async fn test_collaborator_outage_exhausts_retries_and_fails() {
    let h = harness(AutomationMode::None);
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, Arc::new(UnavailableReasoner), gateway)
        .run(&h.task)
        .await
        .unwrap();

    match outcome {
        RunOutcome::Failed { reason } => assert!(reason.contains("Retry budget exhausted")),
        other => panic!("expected failure, got {:?}", other),
    }
    let record = h.sessions.load("s1").await.unwrap().unwrap();
    assert_eq!(record.phase, Phase::Failed);
    assert!(h.sessions.is_archived("s1").await);
}

#[tokio::test]
async fn test_verification_failure_reopens_work() {
    let h = harness(AutomationMode::AutoApprove);
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        calls(vec![
            ToolCall::new("set_plan").with_arg("steps", json!(["make it pass"]))
        ]),
        calls(vec![ToolCall::new("plan_step_complete")
            .with_arg("step_index", json!(0))
            .with_arg("summary", json!("first attempt"))]),
        // Verification fails: back to execute with the step reopened
        directive(vec![], TurnDirective::VerificationFailed),
        calls(vec![ToolCall::new("plan_step_complete")
            .with_arg("step_index", json!(0))
            .with_arg("summary", json!("second attempt"))]),
        directive(vec![], TurnDirective::VerificationPassed),
        calls(vec![
            ToolCall::new("done").with_arg("summary", json!("Fixed"))
        ]),
    ]));
    let gateway = Arc::new(FixedGateway::approving());

    let outcome = orchestrator(&h, reasoner, gateway).run(&h.task).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Done { .. }));
    let record = h.sessions.load("s1").await.unwrap().unwrap();
    assert!(record
        .plan
        .unwrap()
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Complete));
}
