//! Deterministic replay of capability dispatches (spec §4.I), keyed by the
//! canonical hash of `{tool, args}`.
//!
//! `off` never touches the file. `record` always appends, ignoring reads.
//! `replay` loads the file once (lazily, on first `get`) into an in-memory
//! index and never writes.

use crate::error::ReplayError;
use kernel_types::{ReplayMode, ToolReplayRecord};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// `sha256(canonical({tool, args}))`, the key replay lookups are made by.
///
/// # Errors
///
/// Returns [`ReplayError::Codec`] if `args` cannot be canonicalized.
pub fn action_id(tool: &str, args: &serde_json::Value) -> Result<String, ReplayError> {
    kernel_crypto::sha256_of(&serde_json::json!({"tool": tool, "args": args}))
        .map_err(|e| ReplayError::Codec(e.to_string()))
}

/// A JSONL-backed store of recorded capability invocations.
pub struct ToolReplayStore {
    path: PathBuf,
    mode: ReplayMode,
    index: Mutex<Option<HashMap<String, ToolReplayRecord>>>,
}

impl ToolReplayStore {
    /// Open a store at `path` in the given `mode`. Does not touch the
    /// filesystem until the first `get` (in replay mode) or `put` (in
    /// record mode).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: ReplayMode) -> Self {
        Self { path: path.into(), mode, index: Mutex::new(None) }
    }

    fn ensure_loaded(&self) -> Result<(), ReplayError> {
        let mut guard = self.index.lock().expect("index lock is never poisoned");
        if guard.is_some() {
            return Ok(());
        }
        let mut index = HashMap::new();
        if self.path.exists() {
            let contents = fs::read_to_string(&self.path).map_err(|e| ReplayError::Io(e.to_string()))?;
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                // Corrupted lines are skipped rather than failing the whole
                // load — one bad record shouldn't take down an entire run.
                if let Ok(record) = serde_json::from_str::<ToolReplayRecord>(line) {
                    index.insert(record.action_id.clone(), record);
                }
            }
        }
        *guard = Some(index);
        Ok(())
    }

    /// Look up a previously recorded result by `action_id`. Always `None`
    /// unless this store is in [`ReplayMode::Replay`].
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`] if the backing file exists but cannot be
    /// read.
    pub fn get(&self, action_id: &str) -> Result<Option<ToolReplayRecord>, ReplayError> {
        if self.mode != ReplayMode::Replay {
            return Ok(None);
        }
        self.ensure_loaded()?;
        let guard = self.index.lock().expect("index lock is never poisoned");
        Ok(guard.as_ref().and_then(|idx| idx.get(action_id).cloned()))
    }

    /// Append `record`. A no-op unless this store is in [`ReplayMode::Record`].
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`] on a file-system failure.
    pub fn put(&self, record: &ToolReplayRecord) -> Result<(), ReplayError> {
        if self.mode != ReplayMode::Record {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ReplayError::Io(e.to_string()))?;
            }
        }
        let line = kernel_crypto::canonical_bytes(
            &serde_json::to_value(record).map_err(|e| ReplayError::Codec(e.to_string()))?,
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ReplayError::Io(e.to_string()))?;
        file.write_all(&line).map_err(|e| ReplayError::Io(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| ReplayError::Io(e.to_string()))?;
        Ok(())
    }

    /// Number of distinct recorded actions, loading the index if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`] if the backing file exists but cannot be
    /// read.
    pub fn count(&self) -> Result<usize, ReplayError> {
        self.ensure_loaded()?;
        let guard = self.index.lock().expect("index lock is never poisoned");
        Ok(guard.as_ref().map_or(0, HashMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> ToolReplayRecord {
        ToolReplayRecord {
            action_id: id.to_string(),
            tool: "list_dir".to_string(),
            args: json!({"path": "./"}),
            result: json!({"entries": []}),
        }
    }

    #[test]
    fn off_mode_never_writes_or_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.jsonl");
        let store = ToolReplayStore::new(&path, ReplayMode::Off);
        store.put(&record("a")).unwrap();
        assert!(!path.exists());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn record_then_replay_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.jsonl");

        let recorder = ToolReplayStore::new(&path, ReplayMode::Record);
        recorder.put(&record("a")).unwrap();
        recorder.put(&record("b")).unwrap();

        let replayer = ToolReplayStore::new(&path, ReplayMode::Replay);
        assert_eq!(replayer.count().unwrap(), 2);
        let hit = replayer.get("a").unwrap().unwrap();
        assert_eq!(hit.tool, "list_dir");
        assert_eq!(replayer.get("missing").unwrap(), None);
    }

    #[test]
    fn action_id_is_stable_for_identical_tool_and_args() {
        let a = action_id("read_file", &json!({"path": "a.rs"})).unwrap();
        let b = action_id("read_file", &json!({"path": "a.rs"})).unwrap();
        let c = action_id("read_file", &json!({"path": "b.rs"})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
