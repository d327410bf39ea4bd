//! # kernel-context — context assembly
//!
//! Builds the block of text a turn hands to the reasoner: a bounded window
//! of recent conversation ([`ChatTurn`]/[`ContextConfig`]) plus best-effort
//! recall from a persistent [`MemoryStore`], tied together by
//! [`build_context`].

#![deny(missing_docs)]

mod builder;
mod error;
mod memory;

pub use builder::{build_context, ChatTurn, ContextConfig, Role};
pub use error::ContextError;
pub use memory::{MemoryHit, MemoryRecord, MemoryStore};
