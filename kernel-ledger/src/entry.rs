//! The wire shape of one ledger line (spec §3 "Ledger entry").

use serde::{Deserialize, Serialize};

/// One append-only, hash-chained ledger record.
///
/// `entry_hash` is computed over every other field (with `entry_hash`
/// itself absent) via [`kernel_crypto::sha256_of`], so an entry can be
/// independently re-verified without consulting the ledger it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Zero-based position in the ledger.
    pub idx: u64,
    /// UTC timestamp, `%Y-%m-%dT%H:%M:%SZ`.
    pub ts_utc: String,
    /// Hash of the state snapshot the decision was made against.
    pub state_hash: String,
    /// Hash of the proposed action.
    pub action_hash: String,
    /// The gate's `reason` string (`"ok"` or a `deny:<code>`).
    pub decision: String,
    /// `entry_hash` of the entry immediately before this one, or
    /// [`kernel_crypto::GENESIS_HASH`] for the first entry.
    pub prev_entry_hash: String,
    /// Hash of this entry's core fields, chaining it to the ledger.
    pub entry_hash: String,
    /// The full state/action/decision/extra bundle, kept for audit replay.
    pub payload: serde_json::Value,
}

/// The subset of [`LedgerEntry`] hashed to produce `entry_hash`. A
/// separate type (rather than `LedgerEntry` with `entry_hash` skipped)
/// keeps the hashed shape obvious at the call site.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct EntryCore<'a> {
    pub idx: u64,
    pub ts_utc: &'a str,
    pub state_hash: &'a str,
    pub action_hash: &'a str,
    pub decision: &'a str,
    pub prev_entry_hash: &'a str,
    pub payload: &'a serde_json::Value,
}
