//! # kernel-replay — deterministic tool and reasoner replay
//!
//! Two independent JSONL-backed stores let a run be captured once and
//! replayed byte-for-byte later: [`ToolReplayStore`] for capability
//! dispatches (keyed by the hash of `{tool, args}`) and [`LlmReplayStore`]
//! for reasoner exchanges (keyed by request hash, or consumed in recorded
//! order, with an optional HMAC chain for tamper detection).
//!
//! Neither store decides when to record or replay — the turn loop reads
//! [`kernel_types::ExecutionContext::replay_mode`] and calls accordingly.

#![deny(missing_docs)]

mod error;
mod llm_store;
mod tool_store;

pub use error::ReplayError;
pub use llm_store::LlmReplayStore;
pub use tool_store::{action_id, ToolReplayStore};
