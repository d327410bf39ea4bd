//! # kernel-types — data model for an untrusted-reasoner control plane
//!
//! This crate defines the vocabulary every other `kernel-*` crate shares:
//! the shape of a proposal coming out of the reasoner, the shape of a
//! verdict coming out of the gate, the state snapshots both consult, and
//! the bookkeeping types the planner and bandit learner accumulate over a
//! run.
//!
//! ## The pipeline
//!
//! | Stage | Types | What it does |
//! |-------|-------|---------------|
//! | Propose | [`ProposedAction`], [`ActionKind`] | what the reasoner asked for |
//! | Gate | [`GateDecision`], [`RepoSnapshot`], [`WorldSnapshot`] | pure allow/deny, no I/O |
//! | Route | [`CapabilitySpec`], [`ExecutionContext`] | schema, budget, permission enforcement |
//! | Plan | [`Plan`], [`PlanStep`], [`Strategy`] | decomposition and step sequencing |
//! | Learn | [`Arm`], [`ArmStats`], [`OutcomeRecord`] | which choice paid off, per context |
//! | Replay | [`ToolReplayRecord`], [`LlmReplayEntry`] | deterministic re-execution |
//!
//! ## Design principle
//!
//! Nothing in this crate performs I/O or makes a decision. `gate()`,
//! `route()` and friends live in their own crates; this one only defines
//! what they pass to each other, so every downstream crate agrees on the
//! wire shape without depending on each other's internals.
//!
//! ## Dependency notes
//!
//! `serde_json::Value` backs every open-ended payload field (action
//! payloads, metadata, replay bodies). The alternative — a generic
//! `T: Serialize` — would make these types impossible to put behind a
//! trait object, which the router and ledger both need.

#![deny(missing_docs)]

pub mod action;
pub mod arm;
pub mod capability;
pub mod context;
pub mod decision;
pub mod error;
pub mod id;
pub mod outcome;
pub mod plan;
pub mod reasoner;
pub mod replay;
pub mod snapshot;

pub use action::{ActionKind, ProposedAction, RiskTags};
pub use arm::{Arm, ArmStats, Category};
pub use capability::{
    CapabilityBudget, CapabilitySpec, FieldKind, PermissionRule, RiskLevel, SchemaField,
};
pub use context::{BudgetUsage, ExecutionContext, ReplayMode};
pub use decision::GateDecision;
pub use error::{
    BudgetError, DenyError, DispatchError, LedgerError, PermError, ReasonerError, SchemaError,
    ToolError,
};
pub use id::{ArmKey, ContextKey, PlanId, RunId, SessionId, StepId, TaskId, UserId};
pub use outcome::{ArmPerformance, OutcomeRecord, RichOutcome};
pub use plan::{Plan, PlanStep, Strategy, StepStatus};
pub use reasoner::{CompletionRequest, CompletionResponse, Usage};
pub use replay::{LlmReplayEntry, ReplayPlaybackMode, ToolReplayRecord};
pub use snapshot::{RepoSnapshot, WorldSnapshot};
