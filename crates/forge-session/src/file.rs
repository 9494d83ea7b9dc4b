//! JSON-file-backed stores
//!
//! One file per session id under the state directory; per-id locks serialize
//! access so at most one active turn writes a given session at a time. I/O
//! failures surface as `PersistenceUnavailable` so the orchestrator retries
//! them with backoff.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use forge_core::{ForgeError, MemoryFact, MemoryStore, Result, SessionRecord, SessionStore};

fn persistence_err(context: &str, e: impl std::fmt::Display) -> ForgeError {
    ForgeError::PersistenceUnavailable(format!("{}: {}", context, e))
}

/// Sanitize an id for use as a file name
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        })
        .collect()
}

/// Session records as JSON files under `<dir>/sessions/`
pub struct FileSessionStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir
            .join("sessions")
            .join(format!("{}.json", file_safe(session_id)))
    }

    fn archive_path(&self, session_id: &str) -> PathBuf {
        self.dir
            .join("archive")
            .join(format!("{}.json", file_safe(session_id)))
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let path = self.session_path(session_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let record = serde_json::from_str(&content)
                    .map_err(|e| persistence_err("Corrupt session record", e))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(persistence_err("Failed to read session record", e)),
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<()> {
        let lock = self.lock_for(&record.session_id).await;
        let _guard = lock.lock().await;

        let path = self.session_path(&record.session_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_err("Failed to create state directory", e))?;
        }

        let json = serde_json::to_string_pretty(record)?;

        // Write-then-rename so a crash mid-save never leaves a torn record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| persistence_err("Failed to write session record", e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| persistence_err("Failed to commit session record", e))?;

        tracing::debug!(session_id = %record.session_id, path = %path.display(), "Session persisted");
        Ok(())
    }

    async fn archive(&self, session_id: &str) -> Result<()> {
        let lock = self.lock_for(session_id).await;
        let _guard = lock.lock().await;

        let from = self.session_path(session_id);
        if !from.exists() {
            return Ok(());
        }
        let to = self.archive_path(session_id);
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_err("Failed to create archive directory", e))?;
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| persistence_err("Failed to archive session", e))?;
        tracing::info!(session_id, "Session archived");
        Ok(())
    }
}

/// User-scoped facts as one JSON file per user under `<dir>/memory/`
pub struct FileMemoryStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileMemoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn user_path(&self, user_id: &str) -> PathBuf {
        self.dir
            .join("memory")
            .join(format!("{}.json", file_safe(user_id)))
    }

    async fn read_facts(&self, path: &Path) -> Result<Vec<MemoryFact>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)
                .map_err(|e| persistence_err("Corrupt memory file", e))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(persistence_err("Failed to read memory file", e)),
        }
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn remember(&self, user_id: &str, fact: MemoryFact) -> Result<()> {
        let _guard = self.lock.lock().await;

        let path = self.user_path(user_id);
        let mut facts = self.read_facts(&path).await?;
        facts.retain(|f| f.key != fact.key);
        facts.push(fact);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_err("Failed to create memory directory", e))?;
        }
        let json = serde_json::to_string_pretty(&facts)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| persistence_err("Failed to write memory file", e))?;
        Ok(())
    }

    async fn recall(&self, user_id: &str, query: &str) -> Result<Vec<MemoryFact>> {
        let _guard = self.lock.lock().await;

        let facts = self.read_facts(&self.user_path(user_id)).await?;
        let mut matches: Vec<MemoryFact> = facts
            .into_iter()
            .filter(|f| f.key.contains(query) || f.value.contains(query))
            .collect();
        matches.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(matches)
    }
}
