//! # forge-tools
//!
//! The tool surface the reasoning collaborator drives: a static registry of
//! ~25 tools across six categories (file, shell, planning, communication,
//! research, git), and the dispatcher that validates and executes calls.
//!
//! Dispatch is a table lookup plus a match, never reflection. Every failure
//! crossing the dispatch boundary is a structured `ToolResult` fault; the
//! dispatcher never panics and never raises past itself.

mod comm;
mod context;
mod dispatch;
mod file;
mod git;
mod planning;
mod registry;
mod research;
mod shell;

pub use context::{Args, SessionState, Signals, ToolEnv};
pub use dispatch::Dispatcher;
pub use registry::{descriptor, descriptors, ParamKind, ParamSpec, ToolDescriptor, ToolName};
