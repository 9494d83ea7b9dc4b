//! Plan gate: no mutating tool call proceeds without an approved plan
//!
//! All automation-mode branching for approval lives here. Other components
//! only ever ask `may_mutate()`; none of them inspect the mode directly.

use crate::types::{ApprovalState, AutomationMode, Plan};

/// Holds the current plan and its approval state
#[derive(Debug, Clone)]
pub struct PlanGate {
    mode: AutomationMode,
    plan: Option<Plan>,
    approval: ApprovalState,
}

impl PlanGate {
    pub fn new(mode: AutomationMode) -> Self {
        Self {
            mode,
            plan: None,
            approval: ApprovalState::Unreviewed,
        }
    }

    /// Restore gate state from a persisted session record
    pub fn restore(mode: AutomationMode, plan: Option<Plan>, approval: ApprovalState) -> Self {
        Self {
            mode,
            plan,
            approval,
        }
    }

    /// Replace the current plan. The previous plan and its approval are
    /// superseded wholesale. AUTO_APPROVE approves immediately; AUTO_CREATE_PR
    /// does not bypass the gate.
    pub fn propose(&mut self, plan: Plan) {
        tracing::info!(steps = plan.len(), "Plan proposed");
        self.plan = Some(plan);
        self.approval = if self.mode == AutomationMode::AutoApprove {
            tracing::info!("Automation mode {} - plan auto-approved", self.mode);
            ApprovalState::Approved
        } else {
            ApprovalState::Unreviewed
        };
    }

    /// Record an external reviewer's approval
    pub fn approve(&mut self) {
        tracing::info!("Plan approved");
        self.approval = ApprovalState::Approved;
    }

    /// Record an external reviewer's rejection
    ///
    /// Approval is revoked; step statuses are retained so a revised plan can
    /// build on completed work.
    pub fn reject(&mut self, reason: &str) {
        tracing::info!(reason, "Plan rejected");
        self.approval = ApprovalState::Rejected;
    }

    /// Whether a mutating tool call may proceed right now
    pub fn may_mutate(&self) -> bool {
        self.approval == ApprovalState::Approved || self.mode == AutomationMode::AutoApprove
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn plan_mut(&mut self) -> Option<&mut Plan> {
        self.plan.as_mut()
    }

    pub fn approval(&self) -> ApprovalState {
        self.approval
    }

    pub fn mode(&self) -> AutomationMode {
        self.mode
    }
}
