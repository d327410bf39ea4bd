//! # kernel-turn
//!
//! The agent turn loop (spec §4.L): build context, ask the reasoner, parse
//! its response into proposed actions, validate and gate each one, dispatch
//! allowed `tool_call`s through the router (or the replay store), and
//! terminate on a reply or after `max_steps` rounds.
//!
//! This crate owns no state across turns — [`TurnInput`] borrows everything
//! (history, ledger, execution context) from its caller, which is expected
//! to be `kernel-session`.

#![deny(missing_docs)]

mod config;
mod loop_;
mod prompts;
mod result;

pub use config::TurnConfig;
pub use loop_::{run_turn, EmitFn, TurnInput};
pub use prompts::{user_prompt, DEFAULT_SYSTEM_PROMPT};
pub use result::TurnResult;
