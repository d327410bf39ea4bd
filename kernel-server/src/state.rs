//! Process-wide server state: live sessions keyed by id, plus the bits
//! needed to construct a new one on demand (spec §6 "HTTP/WebSocket
//! surface"), grounded in `ui/server.py`'s module-level `ExecutionContext`
//! and ledger globals generalized to one-per-session.

use std::collections::HashMap;
use std::sync::Arc;

use kernel_reasoner::{HttpReasoner, Reasoner, ScriptedReasoner};
use kernel_session::{Session, SessionConfig};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ApiError;

/// Everything a handler needs: the live session table and the knobs used
/// to construct a session the first time its id is seen.
///
/// One process-wide lock guards the whole table. This serializes concurrent
/// requests across *different* sessions too — acceptable for a thin view
/// whose heavy lifting (reasoner round trips, sandboxed exec) already
/// dominates request latency; a sharded lock would be the next step if
/// that stops being true.
pub struct AppState {
    sessions: Mutex<HashMap<String, Session>>,
    root_dir: std::path::PathBuf,
    dev_mode: bool,
}

impl AppState {
    /// Build server state rooted at `root_dir`: new sessions get a
    /// `<root_dir>/<session_id>/` working directory and ledger, so
    /// concurrent sessions never collide on disk.
    #[must_use]
    pub fn new(root_dir: impl Into<std::path::PathBuf>, dev_mode: bool) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), root_dir: root_dir.into(), dev_mode }
    }

    fn build_reasoner() -> Arc<dyn Reasoner> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) => Arc::new(HttpReasoner::new(key)),
            Err(_) => Arc::new(ScriptedReasoner::new()),
        }
    }

    fn new_session(&self, session_id: &str) -> Result<Session, ApiError> {
        let dir = self.root_dir.join(session_id);
        std::fs::create_dir_all(&dir).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let config = SessionConfig {
            working_directory: dir.to_string_lossy().to_string(),
            ledger_path: dir.join("ledger.jsonl").to_string_lossy().to_string(),
            memory_db_path: Some(dir.join("memory.db").to_string_lossy().to_string()),
            dev_mode: self.dev_mode,
            ..SessionConfig::default()
        };
        Ok(Session::new(config, Self::build_reasoner())?)
    }

    /// Create `session_id` if it doesn't already exist in this process's
    /// table. A no-op otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] if the session's working directory
    /// can't be created, or [`ApiError::Session`] if its ledger/memory
    /// store can't be opened.
    pub async fn ensure_session(&self, session_id: &str) -> Result<(), ApiError> {
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(session_id) {
            let session = self.new_session(session_id)?;
            sessions.insert(session_id.to_string(), session);
        }
        Ok(())
    }

    /// Lock the session table for direct access. Handlers that need an
    /// existing session should call [`AppState::ensure_session`] first (or
    /// check presence themselves) before indexing in.
    pub async fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().await
    }

    /// Session ids currently held in memory by this process. Ordering is
    /// insertion order of the underlying hash map, not recency — callers
    /// that need recency should read the persisted `SessionStore` instead.
    pub async fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Drop a session from memory. Returns `false` if it wasn't present.
    /// Does not delete its on-disk ledger or working directory.
    pub async fn remove_session(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }
}
