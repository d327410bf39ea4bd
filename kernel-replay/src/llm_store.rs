//! Deterministic replay of reasoner exchanges (spec §4.I), with an optional
//! HMAC integrity chain so a tampered recording is detected instead of
//! silently replayed.

use crate::error::ReplayError;
use kernel_types::{LlmReplayEntry, ReplayMode, ReplayPlaybackMode};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

fn request_hash(request: &serde_json::Value) -> Result<String, ReplayError> {
    kernel_crypto::sha256_of(request).map_err(|e| ReplayError::Codec(e.to_string()))
}

fn chain_hash(prev: &str, request_hash: &str, response: &serde_json::Value) -> Result<String, ReplayError> {
    let response_hash = kernel_crypto::sha256_of(response).map_err(|e| ReplayError::Codec(e.to_string()))?;
    Ok(kernel_crypto::sha256_hex(format!("{prev}:{request_hash}:{response_hash}").as_bytes()))
}

struct LoadedState {
    entries: Vec<LlmReplayEntry>,
    by_hash: HashMap<String, VecDeque<usize>>,
    seq_cursor: usize,
    last_chain_hash: String,
}

impl LoadedState {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_hash: HashMap::new(),
            seq_cursor: 0,
            last_chain_hash: kernel_crypto::GENESIS_HASH.to_string(),
        }
    }
}

/// A JSONL-backed store of recorded reasoner request/response pairs.
pub struct LlmReplayStore {
    path: PathBuf,
    mode: ReplayMode,
    playback: ReplayPlaybackMode,
    secret: Option<Vec<u8>>,
    state: Mutex<LoadedState>,
}

impl LlmReplayStore {
    /// Open a store at `path`. Loads and (if `secret` is set) integrity
    /// checks any existing entries immediately — unlike [`ToolReplayStore`],
    /// a replay run needs `remaining()` and chain continuity available
    /// before the first exchange, not lazily.
    ///
    /// [`ToolReplayStore`]: crate::ToolReplayStore
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`]/[`ReplayError::Codec`] on a malformed
    /// file, or [`ReplayError::Integrity`] if `secret` is set and an
    /// entry's HMAC or chain hash does not match.
    pub fn open(
        path: impl Into<PathBuf>,
        mode: ReplayMode,
        playback: ReplayPlaybackMode,
        secret: Option<Vec<u8>>,
    ) -> Result<Self, ReplayError> {
        let path = path.into();
        let state = load(&path, secret.as_deref())?;
        Ok(Self { path, mode, playback, secret, state: Mutex::new(state) })
    }

    /// Return the next replayed response for `request`, or `None` if
    /// nothing matches (or this store is not in [`ReplayMode::Replay`]).
    #[must_use]
    pub fn get(&self, request: &serde_json::Value) -> Option<serde_json::Value> {
        if self.mode != ReplayMode::Replay {
            return None;
        }
        let mut state = self.state.lock().expect("state lock is never poisoned");
        match self.playback {
            ReplayPlaybackMode::Sequential => {
                let entry = state.entries.get(state.seq_cursor)?.clone();
                state.seq_cursor += 1;
                Some(entry.response)
            }
            ReplayPlaybackMode::HashKeyed => {
                let hash = request_hash(request).ok()?;
                let queue = state.by_hash.get_mut(&hash)?;
                let idx = queue.pop_front()?;
                Some(state.entries[idx].response.clone())
            }
        }
    }

    /// Record one exchange. A no-op unless this store is in
    /// [`ReplayMode::Record`].
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`]/[`ReplayError::Codec`] on a file-system
    /// or serialization failure.
    pub fn record(
        &self,
        request: &serde_json::Value,
        response: &serde_json::Value,
    ) -> Result<(), ReplayError> {
        if self.mode != ReplayMode::Record {
            return Ok(());
        }
        let mut state = self.state.lock().expect("state lock is never poisoned");
        let req_hash = request_hash(request)?;
        let chain = chain_hash(&state.last_chain_hash, &req_hash, response)?;
        let entry_hmac = self
            .secret
            .as_deref()
            .map(|secret| kernel_crypto::hmac_sha256_hex(secret, chain.as_bytes()));

        let entry = LlmReplayEntry {
            request_hash: req_hash,
            chain_hash: chain.clone(),
            request: request.clone(),
            response: response.clone(),
            entry_hmac,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ReplayError::Io(e.to_string()))?;
            }
        }
        let line = kernel_crypto::canonical_bytes(
            &serde_json::to_value(&entry).map_err(|e| ReplayError::Codec(e.to_string()))?,
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ReplayError::Io(e.to_string()))?;
        file.write_all(&line).map_err(|e| ReplayError::Io(e.to_string()))?;
        file.write_all(b"\n").map_err(|e| ReplayError::Io(e.to_string()))?;

        let idx = state.entries.len();
        state.by_hash.entry(entry.request_hash.clone()).or_default().push_back(idx);
        state.last_chain_hash = chain;
        state.entries.push(entry);
        Ok(())
    }

    /// Total recorded entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.state.lock().expect("state lock is never poisoned").entries.len()
    }

    /// Entries not yet consumed by [`Self::get`] in the current playback mode.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let state = self.state.lock().expect("state lock is never poisoned");
        match self.playback {
            ReplayPlaybackMode::Sequential => state.entries.len().saturating_sub(state.seq_cursor),
            ReplayPlaybackMode::HashKeyed => state.by_hash.values().map(VecDeque::len).sum(),
        }
    }
}

fn load(path: &std::path::Path, secret: Option<&[u8]>) -> Result<LoadedState, ReplayError> {
    let mut state = LoadedState::empty();
    if !path.exists() {
        return Ok(state);
    }
    let contents = fs::read_to_string(path).map_err(|e| ReplayError::Io(e.to_string()))?;
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: LlmReplayEntry =
            serde_json::from_str(line).map_err(|e| ReplayError::Codec(e.to_string()))?;

        let expected_chain = chain_hash(&state.last_chain_hash, &entry.request_hash, &entry.response)?;
        if expected_chain != entry.chain_hash {
            return Err(ReplayError::Integrity(format!(
                "line {}: chain hash mismatch (expected {expected_chain}, got {})",
                line_num + 1,
                entry.chain_hash
            )));
        }
        if let Some(secret) = secret {
            let expected_hmac = kernel_crypto::hmac_sha256_hex(secret, entry.chain_hash.as_bytes());
            if entry.entry_hmac.as_deref() != Some(expected_hmac.as_str()) {
                return Err(ReplayError::Integrity(format!(
                    "line {}: HMAC mismatch",
                    line_num + 1
                )));
            }
        }

        let idx = state.entries.len();
        state.by_hash.entry(entry.request_hash.clone()).or_default().push_back(idx);
        state.last_chain_hash = entry.chain_hash.clone();
        state.entries.push(entry);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sequential_replay_returns_responses_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.jsonl");

        let recorder =
            LlmReplayStore::open(&path, ReplayMode::Record, ReplayPlaybackMode::Sequential, None).unwrap();
        recorder.record(&json!({"prompt": "a"}), &json!({"text": "first"})).unwrap();
        recorder.record(&json!({"prompt": "b"}), &json!({"text": "second"})).unwrap();

        let player =
            LlmReplayStore::open(&path, ReplayMode::Replay, ReplayPlaybackMode::Sequential, None).unwrap();
        assert_eq!(player.count(), 2);
        assert_eq!(player.get(&json!({"prompt": "anything"})), Some(json!({"text": "first"})));
        assert_eq!(player.get(&json!({"prompt": "anything"})), Some(json!({"text": "second"})));
        assert_eq!(player.get(&json!({"prompt": "anything"})), None);
    }

    #[test]
    fn hash_keyed_replay_matches_on_request_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.jsonl");

        let recorder =
            LlmReplayStore::open(&path, ReplayMode::Record, ReplayPlaybackMode::HashKeyed, None).unwrap();
        recorder.record(&json!({"prompt": "a"}), &json!({"text": "for-a"})).unwrap();
        recorder.record(&json!({"prompt": "b"}), &json!({"text": "for-b"})).unwrap();

        let player =
            LlmReplayStore::open(&path, ReplayMode::Replay, ReplayPlaybackMode::HashKeyed, None).unwrap();
        assert_eq!(player.get(&json!({"prompt": "b"})), Some(json!({"text": "for-b"})));
        assert_eq!(player.get(&json!({"prompt": "a"})), Some(json!({"text": "for-a"})));
        assert_eq!(player.get(&json!({"prompt": "a"})), None);
    }

    #[test]
    fn hmac_protected_entries_verify_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.jsonl");
        let secret = b"test-secret".to_vec();

        let recorder = LlmReplayStore::open(
            &path,
            ReplayMode::Record,
            ReplayPlaybackMode::Sequential,
            Some(secret.clone()),
        )
        .unwrap();
        recorder.record(&json!({"prompt": "a"}), &json!({"text": "first"})).unwrap();

        let reloaded = LlmReplayStore::open(
            &path,
            ReplayMode::Replay,
            ReplayPlaybackMode::Sequential,
            Some(secret),
        );
        assert!(reloaded.is_ok());
    }

    #[test]
    fn tampered_entry_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.jsonl");

        let recorder =
            LlmReplayStore::open(&path, ReplayMode::Record, ReplayPlaybackMode::Sequential, None).unwrap();
        recorder.record(&json!({"prompt": "a"}), &json!({"text": "first"})).unwrap();
        drop(recorder);

        let contents = fs::read_to_string(&path).unwrap();
        let mut tampered: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        tampered["response"] = json!({"text": "tampered"});
        fs::write(&path, format!("{tampered}\n")).unwrap();

        let err = LlmReplayStore::open(&path, ReplayMode::Replay, ReplayPlaybackMode::Sequential, None)
            .unwrap_err();
        assert!(matches!(err, ReplayError::Integrity(_)));
    }
}
