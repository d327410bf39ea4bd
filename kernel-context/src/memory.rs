//! A key/value memory store with substring search, backing the
//! `memory_write`/`memory_search`/`memory_get` capabilities (spec §4.F.1)
//! and the best-effort recall [`crate::build_context`] performs.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::error::ContextError;

const CREATE_SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS memory (
    key             TEXT PRIMARY KEY,
    value           TEXT NOT NULL,
    tags_json       TEXT NOT NULL DEFAULT '[]',
    created_at_utc  TEXT NOT NULL,
    updated_at_utc  TEXT NOT NULL
);
";

const SEARCH_TRUNCATE_LEN: usize = 200;

/// One stored memory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// The entry's unique key.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// Free-form tags attached at write time.
    pub tags: Vec<String>,
    /// When this key was first written.
    pub created_at_utc: String,
    /// When this key was last overwritten.
    pub updated_at_utc: String,
}

/// A search result: same shape as [`MemoryRecord`] but with `value`
/// truncated, since recall results are meant to be skimmed, not dumped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHit {
    /// The matched entry's key.
    pub key: String,
    /// The matched entry's value, truncated to [`SEARCH_TRUNCATE_LEN`] chars.
    pub value: String,
    /// The matched entry's tags.
    pub tags: Vec<String>,
}

fn truncate(value: &str) -> String {
    if value.chars().count() > SEARCH_TRUNCATE_LEN {
        let mut out: String = value.chars().take(SEARCH_TRUNCATE_LEN).collect();
        out.push_str("...");
        out
    } else {
        value.to_string()
    }
}

/// A SQLite-backed key/value memory store.
pub struct MemoryStore {
    conn: Mutex<Connection>,
}

impl MemoryStore {
    /// Open (creating if necessary) a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContextError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ContextError::Store(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory store, useful for tests and scripted runs.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, ContextError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_SCHEMA_SQL)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Write `value` under `key`, overwriting any existing entry (and
    /// preserving its original `created_at_utc`).
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] on a write failure, or
    /// [`ContextError::Codec`] if `tags` cannot be serialized.
    pub fn store(&self, key: &str, value: &str, tags: &[String], ts_utc: &str) -> Result<(), ContextError> {
        let tags_json = serde_json::to_string(tags).map_err(|e| ContextError::Codec(e.to_string()))?;
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        conn.execute(
            "INSERT INTO memory (key, value, tags_json, created_at_utc, updated_at_utc)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                tags_json = excluded.tags_json,
                updated_at_utc = excluded.updated_at_utc",
            params![key, value, tags_json, ts_utc],
        )?;
        Ok(())
    }

    /// Look up a single entry by its exact key.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] on a query failure, or
    /// [`ContextError::Codec`] if the stored tags are corrupt.
    pub fn get(&self, key: &str) -> Result<Option<MemoryRecord>, ContextError> {
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let row = conn
            .query_row(
                "SELECT key, value, tags_json, created_at_utc, updated_at_utc
                 FROM memory WHERE key = ?1",
                params![key],
                |row| {
                    let key: String = row.get(0)?;
                    let value: String = row.get(1)?;
                    let tags_json: String = row.get(2)?;
                    let created_at_utc: String = row.get(3)?;
                    let updated_at_utc: String = row.get(4)?;
                    Ok((key, value, tags_json, created_at_utc, updated_at_utc))
                },
            )
            .ok();
        let Some((key, value, tags_json, created_at_utc, updated_at_utc)) = row else {
            return Ok(None);
        };
        let tags = serde_json::from_str(&tags_json).map_err(|e| ContextError::Codec(e.to_string()))?;
        Ok(Some(MemoryRecord { key, value, tags, created_at_utc, updated_at_utc }))
    }

    /// Search for entries whose key or value contains `query`, most
    /// recently updated first, capped at `max_results`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] on a query failure, or
    /// [`ContextError::Codec`] if a stored tags column is corrupt.
    pub fn search(&self, query: &str, max_results: u32) -> Result<Vec<MemoryHit>, ContextError> {
        let pattern = format!("%{query}%");
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let mut stmt = conn.prepare(
            "SELECT key, value, tags_json FROM memory
             WHERE key LIKE ?1 OR value LIKE ?1
             ORDER BY updated_at_utc DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![pattern, max_results], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            let tags_json: String = row.get(2)?;
            Ok((key, value, tags_json))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, value, tags_json) = row?;
            let tags = serde_json::from_str(&tags_json).map_err(|e| ContextError::Codec(e.to_string()))?;
            out.push(MemoryHit { key, value: truncate(&value), tags });
        }
        Ok(out)
    }

    /// Delete an entry by key. Returns whether a row was actually removed.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Store`] on a write failure.
    pub fn delete(&self, key: &str) -> Result<bool, ContextError> {
        let conn = self.conn.lock().expect("connection lock is never poisoned");
        let removed = conn.execute("DELETE FROM memory WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_get_round_trips() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.store("pref::editor", "vim", &["preference".to_string()], "2026-01-01T00:00:00Z").unwrap();
        let got = store.get("pref::editor").unwrap().unwrap();
        assert_eq!(got.value, "vim");
        assert_eq!(got.tags, vec!["preference".to_string()]);
    }

    #[test]
    fn storing_an_existing_key_overwrites_value_and_bumps_updated_at() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.store("k", "v1", &[], "2026-01-01T00:00:00Z").unwrap();
        store.store("k", "v2", &[], "2026-01-02T00:00:00Z").unwrap();
        let got = store.get("k").unwrap().unwrap();
        assert_eq!(got.value, "v2");
        assert_eq!(got.created_at_utc, "2026-01-01T00:00:00Z");
        assert_eq!(got.updated_at_utc, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn get_is_none_for_a_missing_key() {
        let store = MemoryStore::open_in_memory().unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn search_matches_key_or_value_substring() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.store("repo::rust::notes", "uses tokio", &[], "2026-01-01T00:00:00Z").unwrap();
        store.store("repo::go::notes", "uses goroutines", &[], "2026-01-01T00:00:01Z").unwrap();

        let hits = store.search("rust", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "repo::rust::notes");
    }

    #[test]
    fn search_truncates_long_values() {
        let store = MemoryStore::open_in_memory().unwrap();
        let long_value = "x".repeat(500);
        store.store("k", &long_value, &[], "2026-01-01T00:00:00Z").unwrap();
        let hits = store.search("k", 10).unwrap();
        assert!(hits[0].value.ends_with("..."));
        assert_eq!(hits[0].value.len(), SEARCH_TRUNCATE_LEN + 3);
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.store("k", "v", &[], "2026-01-01T00:00:00Z").unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
    }
}
