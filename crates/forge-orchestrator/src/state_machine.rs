//! Pure phase state machine
//!
//! This module implements a pure transition function with NO I/O. All
//! transitions are deterministic and testable in isolation.
//!
//! The workflow order is fixed: orient → plan → execute → verify → submit →
//! done. The only revisit edge is verify → execute (verification failure
//! reopens work); a fatal event forces failed from any non-terminal phase.

use forge_core::{ForgeError, Phase, Result};

/// Events derived from tool outcomes and collaborator directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A plan was set or replaced
    PlanProposed,
    /// The current plan is approved (user action or automation bypass)
    PlanApproved,
    /// The current plan was rejected in review
    PlanRejected,
    /// All steps complete, or verification explicitly requested
    VerificationRequested,
    VerificationPassed,
    VerificationFailed,
    /// Work submitted for delivery
    Submitted,
    /// Session declared finished without a deliverable
    Finished,
    /// Unrecoverable error
    Fatal,
}

/// Pure phase transition function
///
/// Returns the next phase for a valid edge, an error for any other
/// combination. Never panics. Self-edges (re-drafting a plan, rejection)
/// return the same phase.
pub fn transition(phase: Phase, event: PhaseEvent) -> Result<Phase> {
    let next = match (phase, event) {
        (p, PhaseEvent::Fatal) if !p.is_terminal() => Phase::Failed,

        (Phase::Orient, PhaseEvent::PlanProposed) => Phase::Plan,

        // Re-drafting and rejection keep the session in plan
        (Phase::Plan, PhaseEvent::PlanProposed) => Phase::Plan,
        (Phase::Plan, PhaseEvent::PlanRejected) => Phase::Plan,
        (Phase::Plan, PhaseEvent::PlanApproved) => Phase::Execute,

        (Phase::Execute, PhaseEvent::VerificationRequested) => Phase::Verify,

        (Phase::Verify, PhaseEvent::VerificationPassed) => Phase::Submit,
        (Phase::Verify, PhaseEvent::VerificationFailed) => Phase::Execute,

        (Phase::Submit, PhaseEvent::Submitted) => Phase::Done,
        (Phase::Submit, PhaseEvent::Finished) => Phase::Done,

        (phase, event) => {
            return Err(ForgeError::Other(format!(
                "Invalid phase transition: {} cannot handle {:?}",
                phase, event
            )));
        }
    };
    Ok(next)
}
