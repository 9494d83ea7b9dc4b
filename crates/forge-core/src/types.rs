//! Core type definitions for the forge workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ForgeError;

/// Workflow phase
///
/// Exactly one phase is active per session. Transitions follow the fixed
/// order orient -> plan -> execute -> verify -> submit -> done, with the
/// execute/verify revisit loop and failed reachable from anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Orient,
    Plan,
    Execute,
    Verify,
    Submit,
    Done,
    Failed,
}

impl Phase {
    /// Terminal phases accept no further tool calls
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Orient => write!(f, "orient"),
            Self::Plan => write!(f, "plan"),
            Self::Execute => write!(f, "execute"),
            Self::Verify => write!(f, "verify"),
            Self::Submit => write!(f, "submit"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orient" => Ok(Self::Orient),
            "plan" => Ok(Self::Plan),
            "execute" => Ok(Self::Execute),
            "verify" => Ok(Self::Verify),
            "submit" => Ok(Self::Submit),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid phase: {}", s)),
        }
    }
}

/// Automation policy controlling human involvement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationMode {
    /// Explicit human approval at the plan gate and explicit submit action
    #[default]
    None,
    /// Plans are approved automatically on proposal
    AutoApprove,
    /// Plan gate still applies; submit auto-creates the pull request
    AutoCreatePr,
}

impl std::fmt::Display for AutomationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::AutoApprove => write!(f, "AUTO_APPROVE"),
            Self::AutoCreatePr => write!(f, "AUTO_CREATE_PR"),
        }
    }
}

impl std::str::FromStr for AutomationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NONE" => Ok(Self::None),
            "AUTO_APPROVE" => Ok(Self::AutoApprove),
            "AUTO_CREATE_PR" => Ok(Self::AutoCreatePr),
            _ => Err(format!("Invalid automation mode: {}", s)),
        }
    }
}

/// Review state of the current plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Unreviewed,
    Approved,
    Rejected,
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApprovalState::Unreviewed => "unreviewed",
            ApprovalState::Approved => "approved",
            ApprovalState::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// Status of a single plan step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

/// One step of the execution plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub description: String,
    pub status: StepStatus,
}

/// Ordered execution plan
///
/// There is exactly one current plan per session; a new proposal replaces
/// the old plan wholesale, never merges into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan from step descriptions. The first step starts in
    /// progress; the rest are pending.
    pub fn new(descriptions: Vec<String>) -> Self {
        let steps = descriptions
            .into_iter()
            .enumerate()
            .map(|(i, description)| PlanStep {
                id: i as u32,
                description,
                status: if i == 0 {
                    StepStatus::InProgress
                } else {
                    StepStatus::Pending
                },
            })
            .collect();
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First step that is not complete, in plan order
    pub fn current_step(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.status != StepStatus::Complete)
    }

    /// Mark a step complete and promote the next pending step
    pub fn complete_step(&mut self, id: u32) -> crate::Result<()> {
        let idx = self
            .steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| {
                ForgeError::InvalidArguments(format!(
                    "Invalid step id {}. Plan has {} steps.",
                    id,
                    self.steps.len()
                ))
            })?;

        self.steps[idx].status = StepStatus::Complete;
        if let Some(next) = self.steps.iter_mut().find(|s| s.status == StepStatus::Pending) {
            next.status = StepStatus::InProgress;
        }
        Ok(())
    }

    pub fn all_complete(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Complete)
    }

    /// Reopen the most recently completed step (verification failure path)
    pub fn reopen_last_complete(&mut self) {
        if let Some(step) = self
            .steps
            .iter_mut()
            .rev()
            .find(|s| s.status == StepStatus::Complete)
        {
            step.status = StepStatus::InProgress;
        }
    }
}

/// A tool-call request issued by the reasoning collaborator
///
/// Transient: never persisted beyond the turn that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: serde_json::Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: serde_json::Value) -> Self {
        self.args.insert(key.to_string(), value);
        self
    }
}

/// Structured error carried inside a tool result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFault {
    pub kind: String,
    pub message: String,
}

/// Outcome of a tool call: a success payload or a structured fault
///
/// This is the only shape that crosses the dispatch boundary back to the
/// reasoning collaborator; it never carries a panic or a raw error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<ToolFault>,
}

impl ToolResult {
    pub fn ok(tool: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            payload: Some(payload),
            fault: None,
        }
    }

    pub fn fault(tool: impl Into<String>, err: &ForgeError) -> Self {
        Self {
            tool: tool.into(),
            payload: None,
            fault: Some(ToolFault {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.fault.is_none()
    }

    pub fn fault_kind(&self) -> Option<&str> {
        self.fault.as_ref().map(|f| f.kind.as_str())
    }
}

/// Durable user-scoped fact recorded through the memory boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub key: String,
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

impl MemoryFact {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// One audit entry in the session history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub ok: bool,
    pub detail: String,
}

impl HistoryEntry {
    pub fn tool_call(phase: Phase, result: &ToolResult) -> Self {
        let detail = match &result.fault {
            Some(fault) => format!("{}: {}", fault.kind, fault.message),
            None => "ok".to_string(),
        };
        Self {
            at: Utc::now(),
            phase,
            tool: Some(result.tool.clone()),
            ok: result.is_ok(),
            detail,
        }
    }

    pub fn note(phase: Phase, detail: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            phase,
            tool: None,
            ok: true,
            detail: detail.into(),
        }
    }
}

/// Maximum history entries kept in a persisted session record
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// The persisted session contract
///
/// Written through the session boundary after every phase transition and
/// every tool call; the last successfully persisted record is the source of
/// truth for resumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub approval: ApprovalState,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            phase: Phase::Orient,
            plan: None,
            approval: ApprovalState::Unreviewed,
            history: Vec::new(),
        }
    }

    /// Append an entry, truncating from the front past the cap
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let excess = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(..excess);
        }
    }
}
