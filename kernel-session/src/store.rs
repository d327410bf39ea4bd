//! SQLite-backed session persistence (spec §4.M/§6), grounded in
//! `ui/session_store.py`'s `SessionStore`.
//!
//! One row per session holding its chat history and a few scalar fields —
//! enough for a server restart to resume a conversation without replaying
//! the ledger. The ledger itself remains the audit source of truth; this
//! store is a convenience cache of the chattable surface.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::error::SessionError;

const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    session_id      TEXT PRIMARY KEY,
    chat_history    TEXT NOT NULL DEFAULT '[]',
    working_directory TEXT NOT NULL DEFAULT '.',
    replay_mode     TEXT NOT NULL DEFAULT 'off',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
";

/// One turn of persisted chat history, stored as a `(role, content)` pair
/// exactly as the original's `list[tuple[str, str]]` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTurn {
    /// `"user"`, `"assistant"`, or `"tool"`.
    pub role: String,
    /// The turn's text.
    pub content: String,
}

/// A session row as read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The session this row belongs to.
    pub session_id: String,
    /// Full chat history, oldest first.
    pub chat_history: Vec<StoredTurn>,
    /// Host path the session's filesystem capabilities are scoped to.
    pub working_directory: String,
    /// `"off"`, `"record"`, or `"replay"`.
    pub replay_mode: String,
    /// Row creation timestamp, UTC ISO-8601.
    pub created_at: String,
    /// Last update timestamp, UTC ISO-8601.
    pub updated_at: String,
    /// Freeform caller metadata.
    pub metadata: serde_json::Value,
}

/// Fields a [`SessionStore::update`] call may change; `None` leaves a
/// field untouched.
#[derive(Debug, Default)]
pub struct SessionUpdate {
    /// Replace the stored chat history wholesale.
    pub chat_history: Option<Vec<StoredTurn>>,
    /// Replace the stored working directory.
    pub working_directory: Option<String>,
    /// Replace the stored replay mode.
    pub replay_mode: Option<String>,
    /// Replace the stored metadata.
    pub metadata: Option<serde_json::Value>,
}

/// SQLite-backed session persistence, one file shared by every session
/// the process manages.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (creating if necessary) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SessionError::Store(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory store, for tests that don't need the rows to
    /// outlive the process.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, SessionError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Retrieve a session row by id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a query failure.
    pub fn get(&self, session_id: &str) -> Result<Option<StoredSession>, SessionError> {
        let conn = self.conn.lock().expect("session store mutex poisoned");
        let row = conn
            .query_row(
                "SELECT session_id, chat_history, working_directory, replay_mode, created_at, updated_at, metadata
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                row_to_stored,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a new row, defaulting `chat_history` to empty and `metadata`
    /// to `{}` unless given.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a write failure, including a
    /// duplicate `session_id`.
    pub fn create(
        &self,
        session_id: &str,
        working_directory: &str,
        replay_mode: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<StoredSession, SessionError> {
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let metadata = metadata.unwrap_or_else(|| serde_json::json!({}));
        let conn = self.conn.lock().expect("session store mutex poisoned");
        conn.execute(
            "INSERT INTO sessions (session_id, chat_history, working_directory, replay_mode, created_at, updated_at, metadata)
             VALUES (?1, '[]', ?2, ?3, ?4, ?4, ?5)",
            params![session_id, working_directory, replay_mode, now, metadata.to_string()],
        )?;
        Ok(StoredSession {
            session_id: session_id.to_string(),
            chat_history: Vec::new(),
            working_directory: working_directory.to_string(),
            replay_mode: replay_mode.to_string(),
            created_at: now.clone(),
            updated_at: now,
            metadata,
        })
    }

    /// Apply a partial update, bumping `updated_at` whenever any field is
    /// actually supplied. Returns `false` (and writes nothing) if every
    /// field in `update` is `None`, or if `session_id` doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a write failure.
    pub fn update(&self, session_id: &str, update: &SessionUpdate) -> Result<bool, SessionError> {
        let mut sets = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(history) = &update.chat_history {
            sets.push("chat_history = ?");
            values.push(Box::new(serde_json::to_string(history).map_err(|e| SessionError::Store(e.to_string()))?));
        }
        if let Some(dir) = &update.working_directory {
            sets.push("working_directory = ?");
            values.push(Box::new(dir.clone()));
        }
        if let Some(mode) = &update.replay_mode {
            sets.push("replay_mode = ?");
            values.push(Box::new(mode.clone()));
        }
        if let Some(metadata) = &update.metadata {
            sets.push("metadata = ?");
            values.push(Box::new(metadata.to_string()));
        }
        if sets.is_empty() {
            return Ok(false);
        }

        sets.push("updated_at = ?");
        values.push(Box::new(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()));
        values.push(Box::new(session_id.to_string()));

        let sql = format!("UPDATE sessions SET {} WHERE session_id = ?", sets.join(", "));
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let conn = self.conn.lock().expect("session store mutex poisoned");
        let rows = conn.execute(&sql, params.as_slice())?;
        Ok(rows > 0)
    }

    /// Append one `(role, content)` turn to a session's stored history.
    /// Returns `false` if `session_id` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a read or write failure.
    pub fn append_message(&self, session_id: &str, role: &str, content: &str) -> Result<bool, SessionError> {
        let Some(existing) = self.get(session_id)? else { return Ok(false) };
        let mut history = existing.chat_history;
        history.push(StoredTurn { role: role.to_string(), content: content.to_string() });
        self.update(session_id, &SessionUpdate { chat_history: Some(history), ..Default::default() })
    }

    /// Session ids and message counts, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a query failure.
    pub fn list_sessions(&self, limit: u32) -> Result<Vec<(String, u32, String)>, SessionError> {
        let conn = self.conn.lock().expect("session store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT session_id, json_array_length(chat_history), updated_at
             FROM sessions ORDER BY updated_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?, row.get::<_, String>(2)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SessionError::from)
    }

    /// Delete a session row. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] on a write failure.
    pub fn delete(&self, session_id: &str) -> Result<bool, SessionError> {
        let conn = self.conn.lock().expect("session store mutex poisoned");
        let rows = conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        Ok(rows > 0)
    }
}

fn row_to_stored(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredSession> {
    let history_json: String = row.get(1)?;
    let metadata_json: String = row.get(6)?;
    let chat_history: Vec<StoredTurn> = serde_json::from_str(&history_json).unwrap_or_default();
    let metadata: serde_json::Value = serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);
    Ok(StoredSession {
        session_id: row.get(0)?,
        chat_history,
        working_directory: row.get(2)?,
        replay_mode: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get_round_trips_an_empty_session() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("sess-1", "./work", "off", None).unwrap();
        let row = store.get("sess-1").unwrap().unwrap();
        assert_eq!(row.working_directory, "./work");
        assert!(row.chat_history.is_empty());
    }

    #[test]
    fn append_message_accumulates_history_in_order() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("sess-1", "./work", "off", None).unwrap();
        store.append_message("sess-1", "user", "hi").unwrap();
        store.append_message("sess-1", "assistant", "hello").unwrap();

        let row = store.get("sess-1").unwrap().unwrap();
        assert_eq!(row.chat_history.len(), 2);
        assert_eq!(row.chat_history[0].role, "user");
        assert_eq!(row.chat_history[1].content, "hello");
    }

    #[test]
    fn append_message_on_an_unknown_session_returns_false() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(!store.append_message("ghost", "user", "hi").unwrap());
    }

    #[test]
    fn update_with_no_fields_set_is_a_no_op() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("sess-1", "./work", "off", None).unwrap();
        assert!(!store.update("sess-1", &SessionUpdate::default()).unwrap());
    }

    #[test]
    fn list_sessions_orders_by_most_recently_updated() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("sess-a", ".", "off", None).unwrap();
        store.create("sess-b", ".", "off", None).unwrap();
        store.append_message("sess-a", "user", "hi").unwrap();

        let listed = store.list_sessions(10).unwrap();
        assert_eq!(listed[0].0, "sess-a");
        assert_eq!(listed[0].1, 1);
    }

    #[test]
    fn delete_removes_the_row() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create("sess-1", ".", "off", None).unwrap();
        assert!(store.delete("sess-1").unwrap());
        assert!(store.get("sess-1").unwrap().is_none());
    }
}
