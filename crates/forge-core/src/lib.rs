//! # forge-core
//!
//! Core types for the forge autonomous software-engineering agent runtime.
//!
//! Forge drives an external reasoning collaborator (an LLM) through a fixed,
//! gated workflow: orient, plan, execute, verify, submit. This crate holds
//! everything the other crates agree on:
//!
//! - The phase/plan/session data model
//! - The unified error taxonomy returned across the tool boundary
//! - The plan gate ("no code changes before plan approval")
//! - The session/memory persistence contracts
//! - Environment-sourced task configuration and retry policy

mod config;
mod error;
mod gate;
mod retry;
mod session;
mod types;

pub use config::{ServiceMode, TaskConfig};
pub use error::{ForgeError, Result};
pub use gate::PlanGate;
pub use retry::RetryPolicy;
pub use session::{MemoryStore, SessionStore};
pub use types::*;
