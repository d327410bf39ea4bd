//! # kernel-registry — capability registry and enforcement router
//!
//! This crate is the single source of truth for every capability the
//! reasoner can invoke through a `tool_call` action. It owns:
//!
//! - the [`registry::CapabilityRegistry`], binding a capability name to its
//!   schema, risk, budget, permission rule, and [`handler::CapabilityHandler`];
//! - [`router::dispatch`], the nine-step enforcement pipeline every call
//!   passes through before a handler runs;
//! - the built-in capability families (filesystem, memory, browser/network,
//!   code intelligence, reasoning) in [`families`].
//!
//! Sandboxed and host exec are deliberately absent from [`families`] — they
//! are registered by whoever constructs the registry, using handlers backed
//! by `kernel-exec`, so this crate never has to know whether "exec" means a
//! Docker container or a bare subprocess.

#![deny(missing_docs)]

pub mod families;
pub mod handler;
pub mod metrics;
pub mod path_scope;
pub mod registry;
pub mod router;

pub use handler::{CapabilityHandler, CapabilityOutcome, HandlerFn};
pub use metrics::RouterMetrics;
pub use registry::{validate_arguments, CapabilityEntry, CapabilityRegistry};
pub use router::dispatch;
