//! # forge-session
//!
//! Implementations of the session/memory boundary defined in forge-core:
//!
//! - In-memory stores for tests and local development
//! - JSON-file-backed stores for state that must survive restarts
//!
//! The orchestrator never assumes synchronous in-process storage; both
//! flavors are reached through the same async traits.

mod file;
mod memory;
mod service;

pub use file::{FileMemoryStore, FileSessionStore};
pub use memory::{InMemoryMemoryStore, InMemorySessionStore};
pub use service::{create_stores, Stores};
