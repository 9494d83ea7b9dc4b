//! Store factory
//!
//! Dual-mode: in-memory for local development, file-backed for state that
//! must survive worker restarts.

use std::path::Path;
use std::sync::Arc;

use forge_core::{MemoryStore, ServiceMode, SessionStore};

use crate::file::{FileMemoryStore, FileSessionStore};
use crate::memory::{InMemoryMemoryStore, InMemorySessionStore};

/// Handles to both boundary implementations
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub memory: Arc<dyn MemoryStore>,
}

/// Create both stores for the given mode
///
/// `state_dir` is only used in file mode.
pub fn create_stores(mode: ServiceMode, state_dir: &Path) -> Stores {
    match mode {
        ServiceMode::Memory => Stores {
            sessions: Arc::new(InMemorySessionStore::new()),
            memory: Arc::new(InMemoryMemoryStore::new()),
        },
        ServiceMode::File => Stores {
            sessions: Arc::new(FileSessionStore::new(state_dir)),
            memory: Arc::new(FileMemoryStore::new(state_dir)),
        },
    }
}
