//! # forge-orchestrator
//!
//! The workflow orchestrator: a pure phase state machine, the collaborator
//! boundaries (`Reasoner`, `UserGateway`), and the turn loop that sequences
//! gated phases, dispatches tool calls, and persists session state after
//! every phase transition and tool call.

mod orchestrator;
mod state_machine;
mod turn;

pub use orchestrator::{Orchestrator, RunOutcome};
pub use state_machine::{transition, PhaseEvent};
pub use turn::{Reasoner, ReasonerTurn, ReviewDecision, TurnContext, TurnDirective, UserGateway};
