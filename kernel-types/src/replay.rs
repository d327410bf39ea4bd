//! Record shapes persisted by the tool and reasoner replay stores
//! (spec §4.K). Both stores are append-only JSONL keyed by a content hash,
//! so determinism depends entirely on these types serializing the same way
//! every time — see `kernel-crypto` for the canonical encoding used to
//! derive the keys.

use serde::{Deserialize, Serialize};

/// One recorded (or replayed) capability invocation, keyed by the canonical
/// hash of its kind and payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReplayRecord {
    /// `sha256(canonical({kind, payload}))`, used to find this record again.
    pub action_id: String,
    /// The capability name that was called.
    pub tool: String,
    /// The arguments it was called with.
    pub args: serde_json::Value,
    /// The result it produced (or, on replay, will produce again).
    pub result: serde_json::Value,
}

/// One recorded (or replayed) reasoner exchange.
///
/// `chain_hash` links entries in call order so a replay can detect
/// insertion, deletion, or reordering even when two requests hash
/// identically; `entry_hmac`, when present, lets a verifier confirm the
/// store has not been tampered with since recording (spec §4.K "integrity
/// chain" option).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmReplayEntry {
    /// `sha256(canonical(request))`, used for hash-keyed playback.
    pub request_hash: String,
    /// `sha256(prev_chain_hash || request_hash || response_hash)`, used for
    /// sequential playback and reorder detection.
    pub chain_hash: String,
    /// The exact request sent to the reasoner.
    pub request: serde_json::Value,
    /// The exact response the reasoner returned.
    pub response: serde_json::Value,
    /// `hmac_sha256(secret, chain_hash)`, present only when the store was
    /// opened with an integrity key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_hmac: Option<String>,
}

/// How a replay store should serve reads for the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPlaybackMode {
    /// Entries are matched strictly by their position in the recorded sequence.
    Sequential,
    /// Entries are matched by `request_hash`/`action_id`, order-independent.
    HashKeyed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_replay_record_round_trips_through_json() {
        let record = ToolReplayRecord {
            action_id: "abc123".into(),
            tool: "list_dir".into(),
            args: json!({"path": "./"}),
            result: json!({"entries": ["a.rs", "b.rs"]}),
        };
        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: ToolReplayRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.action_id, "abc123");
        assert_eq!(decoded.result, json!({"entries": ["a.rs", "b.rs"]}));
    }

    #[test]
    fn llm_replay_entry_omits_hmac_when_absent() {
        let entry = LlmReplayEntry {
            request_hash: "r1".into(),
            chain_hash: "c1".into(),
            request: json!({"prompt": "hi"}),
            response: json!({"actions": []}),
            entry_hmac: None,
        };
        let encoded = serde_json::to_value(&entry).unwrap();
        assert!(encoded.get("entry_hmac").is_none());
    }
}
