//! Collaborator boundaries and the per-turn contract
//!
//! The reasoning collaborator and the user gateway are external systems.
//! They are consumed through narrow async traits so the orchestrator can be
//! driven by scripted implementations in tests and by HTTP transport in the
//! worker.

use async_trait::async_trait;

use forge_core::{ApprovalState, HistoryEntry, Phase, Plan, Result, ToolCall, ToolResult};

/// A phase-level directive the collaborator may attach to a turn
///
/// Verification outcomes cannot be derived from tool results alone (a
/// failing test run may be expected mid-fix), so the collaborator states
/// them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirective {
    /// Move from execution to verification before all steps are complete
    RequestVerification,
    VerificationPassed,
    VerificationFailed,
}

/// One turn of the reasoning collaborator: zero or more tool calls, plus an
/// optional directive
#[derive(Debug, Clone, Default)]
pub struct ReasonerTurn {
    pub calls: Vec<ToolCall>,
    pub directive: Option<TurnDirective>,
}

/// Phase-scoped context handed to the collaborator each turn
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    /// Natural-language objective of the whole session
    pub task: String,
    pub phase: Phase,
    pub approval: ApprovalState,
    pub plan: Option<Plan>,
    /// Wire names of the tools permitted in the current phase
    pub allowed_tools: Vec<&'static str>,
    /// Tail of the persisted audit history
    pub recent_history: Vec<HistoryEntry>,
    /// Results of the previous turn's calls, in dispatch order
    pub last_results: Vec<ToolResult>,
    /// Answer to a pending request_user_input, if one arrived
    pub user_input: Option<String>,
}

/// The reasoning collaborator: proposes the next turn from context
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn next_turn(&self, ctx: &TurnContext) -> Result<ReasonerTurn>;
}

/// Outcome of a plan review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approved,
    Rejected(String),
}

/// The human (or automation policy) on the other side of the session
#[async_trait]
pub trait UserGateway: Send + Sync {
    /// Relay a progress message; fire-and-forget
    async fn notify(&self, message: &str) -> Result<()>;

    /// Present the plan for review and wait for a decision
    async fn review_plan(&self, plan: &Plan) -> Result<ReviewDecision>;

    /// Ask the user a question and wait for the answer
    async fn provide_input(&self, prompt: &str) -> Result<String>;
}
