//! # kernel-planner
//!
//! Hierarchical goal decomposition and plan execution (spec §4.J): turn a
//! free-text goal into a [`kernel_types::Plan`], run it step by step through
//! the gate and the capability router, and checkpoint/roll back the workdir
//! and any declared SQLite databases around mutating steps that fail.
//!
//! This crate owns no session state — it is handed a goal, a world
//! snapshot, and a mutable [`kernel_types::ExecutionContext`] by its caller
//! (`kernel-session`), and returns a [`PlanResult`] plus, via an optional
//! emit callback, a stream of progress events for the ledger.

#![deny(missing_docs)]

mod decomposer;
mod executor;
mod generator;
mod result;
mod reward;
mod sqlite_snapshot;
mod workdir_checkpoint;

pub use decomposer::decompose_goal;
pub use executor::{execute_plan, execute_step, EmitFn, RollbackOptions};
pub use generator::{auto_plan, generate_plan, select_strategy};
pub use result::{PlanResult, StepResult};
pub use reward::{
    combine_plan_and_test_reward, reward_from_plan_result, reward_from_step_outcomes,
    reward_from_test_delta, TestDelta,
};
pub use sqlite_snapshot::{cleanup_sqlite_snaps, restore_sqlite_files, snapshot_sqlite_files, SqliteTarget};
pub use workdir_checkpoint::{checkpoint, ensure_git_repo, get_current_commit, reset_hard, CheckpointError};
