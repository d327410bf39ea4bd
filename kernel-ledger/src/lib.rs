//! # kernel-ledger — append-only, hash-chained audit trail
//!
//! Every gate decision the control plane makes is recorded here before (or
//! instead of) being executed, so a post-hoc audit can replay exactly what
//! happened and independently verify nothing was edited after the fact.
//!
//! [`AppendOnlyLedger::append`] never fails the calling turn — per spec §7
//! a ledger write failure is logged and swallowed, not propagated, so a
//! disk hiccup during an otherwise-successful action never blocks the
//! agent. Callers that need stricter guarantees can still inspect the
//! `Result` themselves.
//!
//! Hashing goes through `kernel-crypto` so `state_hash`/`action_hash`/
//! `entry_hash` agree bit-for-bit with every other crate's notion of
//! "the canonical hash of this value".

#![deny(missing_docs)]

mod entry;
mod ledger;
mod state;

pub use entry::LedgerEntry;
pub use ledger::AppendOnlyLedger;
pub use state::LedgerState;
