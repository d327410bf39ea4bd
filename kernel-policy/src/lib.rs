//! # kernel-policy — policy bundle and the pure gate
//!
//! Two things live here, deliberately kept in separate modules because they
//! have different purity obligations:
//!
//! - [`policy::Policy`] is *data*: an allowlist, some regexes, a handful of
//!   limits. It never decides anything about a specific action.
//! - [`gate::gate`] is the *pure function* that combines a [`policy::Policy`],
//!   a snapshot, and a proposed action into a [`kernel_types::GateDecision`].
//!   It performs no I/O and consults no clock; calling it twice with the
//!   same three inputs always returns the same decision.
//!
//! Everything downstream (the router in `kernel-registry`, the planner's
//! executor in `kernel-planner`, the turn loop in `kernel-turn`) calls
//! `gate()` before it ever touches a capability handler.

#![deny(missing_docs)]

pub mod gate;
pub mod policy;

pub use gate::{gate, Snapshot};
pub use policy::{Policy, RegexSetPolicy};
