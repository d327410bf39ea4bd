//! An append-only JSONL ledger with a SHA-256 hash chain (spec §4.H).
//!
//! Kept deliberately synchronous: one entry is a few hundred bytes and one
//! `write`-plus-`flush`, and giving it its own blocking calls means callers
//! running inside `tokio::task::spawn_blocking` get the exact backpressure
//! they'd get from any other blocking file write — there's nothing an
//! async file handle would buy here.

use crate::entry::{EntryCore, LedgerEntry};
use crate::state::LedgerState;
use kernel_types::{GateDecision, LedgerError, ProposedAction};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single ledger file plus the lock serializing appends to it.
///
/// Cloning is not supported — one `AppendOnlyLedger` should own its path
/// for the lifetime of the process writing to it; share it behind an `Arc`
/// if multiple tasks append concurrently.
pub struct AppendOnlyLedger {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl AppendOnlyLedger {
    /// Open (without requiring it to exist yet) the ledger file at `path`,
    /// creating its parent directory if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LedgerError::Io(e.to_string()))?;
            }
        }
        Ok(Self { path, append_lock: Mutex::new(()) })
    }

    /// The path this ledger reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_read(&self) -> Result<Option<BufReader<File>>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path).map_err(|e| LedgerError::Io(e.to_string()))?;
        Ok(Some(BufReader::new(file)))
    }

    fn each_entry(&self, mut visit: impl FnMut(LedgerEntry) -> Result<(), LedgerError>) -> Result<u64, LedgerError> {
        let Some(reader) = self.open_for_read()? else {
            return Ok(0);
        };
        let mut count = 0u64;
        for line in reader.lines() {
            let line = line.map_err(|e| LedgerError::Io(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LedgerEntry =
                serde_json::from_str(&line).map_err(|e| LedgerError::Codec(e.to_string()))?;
            visit(entry)?;
            count += 1;
        }
        Ok(count)
    }

    /// Count of entries currently in the ledger and the `entry_hash` of the
    /// last one, or [`kernel_crypto::GENESIS_HASH`] if the ledger is empty
    /// or does not yet exist.
    fn tail_state(&self) -> Result<(u64, String), LedgerError> {
        let mut last = kernel_crypto::GENESIS_HASH.to_string();
        let count = self.each_entry(|entry| {
            last = entry.entry_hash;
            Ok(())
        })?;
        Ok((count, last))
    }

    /// Append one entry recording `decision` against `state`/`action`.
    ///
    /// `extra` is folded into the stored payload under an `"extra"` key
    /// when present, matching the controller-supplied audit metadata the
    /// turn loop and planner attach (tool output, plan step id, ...).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] on a file-system failure, or
    /// [`LedgerError::Codec`] if `state`/`action`/`extra` cannot be
    /// represented as canonical JSON.
    pub fn append<'a>(
        &self,
        state: impl Into<LedgerState<'a>>,
        action: &ProposedAction,
        decision: &GateDecision,
        extra: Option<serde_json::Value>,
    ) -> Result<LedgerEntry, LedgerError> {
        let _guard = self.append_lock.lock().expect("append lock is never poisoned by a panic mid-hold");

        let state = state.into();
        let state_hash =
            kernel_crypto::sha256_of(&state).map_err(|e| LedgerError::Codec(e.to_string()))?;
        let action_hash =
            kernel_crypto::sha256_of(action).map_err(|e| LedgerError::Codec(e.to_string()))?;

        let (idx, prev_entry_hash) = self.tail_state()?;

        let mut payload = serde_json::json!({
            "state": serde_json::to_value(&state).map_err(|e| LedgerError::Codec(e.to_string()))?,
            "action": serde_json::to_value(action).map_err(|e| LedgerError::Codec(e.to_string()))?,
            "decision": decision.reason,
        });
        if let Some(extra) = extra {
            payload["extra"] = extra;
        }

        let ts_utc = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let core = EntryCore {
            idx,
            ts_utc: &ts_utc,
            state_hash: &state_hash,
            action_hash: &action_hash,
            decision: &decision.reason,
            prev_entry_hash: &prev_entry_hash,
            payload: &payload,
        };
        let entry_hash =
            kernel_crypto::sha256_of(&core).map_err(|e| LedgerError::Codec(e.to_string()))?;

        let entry = LedgerEntry {
            idx,
            ts_utc,
            state_hash,
            action_hash,
            decision: decision.reason.clone(),
            prev_entry_hash,
            entry_hash,
            payload,
        };

        let line = kernel_crypto::canonical_bytes(
            &serde_json::to_value(&entry).map_err(|e| LedgerError::Codec(e.to_string()))?,
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::Io(e.to_string()))?;
        file.write_all(&line).map_err(|e| LedgerError::Io(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| LedgerError::Io(e.to_string()))?;
        file.flush().map_err(|e| LedgerError::Io(e.to_string()))?;

        Ok(entry)
    }

    /// The last `n` entries, oldest first. Fewer than `n` if the ledger
    /// has not accumulated that many yet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] or [`LedgerError::Codec`] on a
    /// malformed ledger file.
    pub fn read_tail(&self, n: usize) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut buffer: std::collections::VecDeque<LedgerEntry> = std::collections::VecDeque::with_capacity(n.min(1024));
        self.each_entry(|entry| {
            if buffer.len() == n {
                buffer.pop_front();
            }
            buffer.push_back(entry);
            Ok(())
        })?;
        Ok(buffer.into_iter().collect())
    }

    /// Walk every entry, verifying `prev_entry_hash` continuity and
    /// recomputing each `entry_hash` from its core fields.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ChainBroken`] at the first entry whose
    /// recorded hash does not match either the running `prev_entry_hash`
    /// or its own recomputed `entry_hash`. Returns [`LedgerError::Io`] or
    /// [`LedgerError::Codec`] if the file cannot be read or parsed.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let mut expected_prev = kernel_crypto::GENESIS_HASH.to_string();
        self.each_entry(|entry| {
            if entry.prev_entry_hash != expected_prev {
                return Err(LedgerError::ChainBroken {
                    index: entry.idx,
                    expected: expected_prev.clone(),
                    actual: entry.prev_entry_hash.clone(),
                });
            }
            let core = EntryCore {
                idx: entry.idx,
                ts_utc: &entry.ts_utc,
                state_hash: &entry.state_hash,
                action_hash: &entry.action_hash,
                decision: &entry.decision,
                prev_entry_hash: &entry.prev_entry_hash,
                payload: &entry.payload,
            };
            let recomputed =
                kernel_crypto::sha256_of(&core).map_err(|e| LedgerError::Codec(e.to_string()))?;
            if recomputed != entry.entry_hash {
                return Err(LedgerError::ChainBroken {
                    index: entry.idx,
                    expected: recomputed,
                    actual: entry.entry_hash.clone(),
                });
            }
            expected_prev = entry.entry_hash.clone();
            Ok(())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::{ActionKind, GateDecision, ProposedAction, WorldSnapshot};

    fn sample_action() -> ProposedAction {
        ProposedAction::new(ActionKind::ToolCall, serde_json::json!({"tool": "list_dir"}), "inspect repo")
    }

    #[test]
    fn first_append_chains_from_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendOnlyLedger::new(dir.path().join("ledger.jsonl")).unwrap();
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        let entry = ledger.append(&snap, &sample_action(), &GateDecision::allow(), None).unwrap();
        assert_eq!(entry.idx, 0);
        assert_eq!(entry.prev_entry_hash, kernel_crypto::GENESIS_HASH);
        assert_eq!(entry.entry_hash.len(), 64);
    }

    #[test]
    fn successive_appends_chain_and_increment_idx() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendOnlyLedger::new(dir.path().join("ledger.jsonl")).unwrap();
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        let first = ledger.append(&snap, &sample_action(), &GateDecision::allow(), None).unwrap();
        let second = ledger.append(&snap, &sample_action(), &GateDecision::deny("deny:path_escape"), None).unwrap();
        assert_eq!(second.idx, 1);
        assert_eq!(second.prev_entry_hash, first.entry_hash);
    }

    #[test]
    fn verify_passes_on_an_untampered_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendOnlyLedger::new(dir.path().join("ledger.jsonl")).unwrap();
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        for _ in 0..5 {
            ledger.append(&snap, &sample_action(), &GateDecision::allow(), None).unwrap();
        }
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn verify_detects_a_tampered_middle_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = AppendOnlyLedger::new(&path).unwrap();
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        for _ in 0..3 {
            ledger.append(&snap, &sample_action(), &GateDecision::allow(), None).unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
        let mut tampered: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        tampered["decision"] = serde_json::json!("deny:tampered");
        lines[1] = tampered.to_string();
        fs::write(&path, lines.join("\n") + "\n").unwrap();

        let err = ledger.verify().unwrap_err();
        match err {
            LedgerError::ChainBroken { index, .. } => assert_eq!(index, 1),
            other => panic!("expected ChainBroken, got {other:?}"),
        }
    }

    #[test]
    fn read_tail_returns_at_most_n_most_recent_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendOnlyLedger::new(dir.path().join("ledger.jsonl")).unwrap();
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        for _ in 0..5 {
            ledger.append(&snap, &sample_action(), &GateDecision::allow(), None).unwrap();
        }
        let tail = ledger.read_tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].idx, 3);
        assert_eq!(tail[1].idx, 4);
    }

    #[test]
    fn missing_ledger_file_verifies_trivially() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = AppendOnlyLedger::new(dir.path().join("never-written.jsonl")).unwrap();
        assert!(ledger.verify().is_ok());
        assert!(ledger.read_tail(10).unwrap().is_empty());
    }
}
