//! Session/memory boundary contracts
//!
//! Persistence is an external collaborator: possibly slow, possibly
//! unavailable. Implementations live in forge-session; the orchestrator only
//! sees these traits and treats their failures as `PersistenceUnavailable`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MemoryFact, SessionRecord};

/// Load and persist session records, one per session id
///
/// Implementations must serialize concurrent access per session id: at most
/// one active turn may be writing a given session at a time.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    async fn save(&self, record: &SessionRecord) -> Result<()>;

    /// Mark a session finished; it is never resumed afterwards
    async fn archive(&self, session_id: &str) -> Result<()>;
}

/// Durable user-scoped facts surviving across sessions
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn remember(&self, user_id: &str, fact: MemoryFact) -> Result<()>;

    /// Facts whose key or value contains the query, most recent first
    async fn recall(&self, user_id: &str, query: &str) -> Result<Vec<MemoryFact>>;
}
