//! In-process stores for tests and local development

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use forge_core::{MemoryFact, MemoryStore, Result, SessionRecord, SessionStore};

/// Session records held in a process-local map
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    archived: Mutex<Vec<String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_archived(&self, session_id: &str) -> bool {
        self.archived
            .lock()
            .await
            .iter()
            .any(|id| id == session_id)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.lock().await.get(session_id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn archive(&self, session_id: &str) -> Result<()> {
        self.archived.lock().await.push(session_id.to_string());
        Ok(())
    }
}

/// User-scoped facts held in a process-local map
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    facts: Mutex<HashMap<String, Vec<MemoryFact>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn remember(&self, user_id: &str, fact: MemoryFact) -> Result<()> {
        let mut facts = self.facts.lock().await;
        let entries = facts.entry(user_id.to_string()).or_default();
        // A re-recorded key supersedes the old fact
        entries.retain(|f| f.key != fact.key);
        entries.push(fact);
        Ok(())
    }

    async fn recall(&self, user_id: &str, query: &str) -> Result<Vec<MemoryFact>> {
        let facts = self.facts.lock().await;
        let mut matches: Vec<MemoryFact> = facts
            .get(user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|f| f.key.contains(query) || f.value.contains(query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(matches)
    }
}
