//! Long-lived session state binding the turn loop, planner, ledger, and
//! bandit learner together (spec §4.M).
//!
//! A [`Session`] is the unit of conversation state: one capability
//! registry, one policy, one ledger, one history, optionally one memory
//! store and one bandit learner, constructed once from a [`SessionConfig`]
//! and driven one call at a time via [`Session::step`] (chat) or
//! [`Session::run_goal`] (autonomous plan execution). [`SessionStore`]
//! persists session metadata and chat history to SQLite so a session can
//! be resumed across process restarts.

#![deny(missing_docs)]

mod config;
mod error;
mod session;
mod store;

pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{Session, SessionState, StepResult, ToolInfo};
pub use store::{SessionStore, SessionUpdate, StoredSession, StoredTurn};
