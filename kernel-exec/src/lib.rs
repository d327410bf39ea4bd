//! # kernel-exec — sandboxed and host exec capability backends
//!
//! Implements the one capability family `kernel-registry` never wires up
//! itself: running a shell command. Two backends share the
//! [`backend::ExecBackend`] trait —
//! [`docker::DockerExecBackend`] (Docker-isolated) and
//! [`host::HostExecBackend`] (direct subprocess, dev-mode only) — and
//! [`capability::register_exec_capabilities`] adapts either into a
//! `kernel-registry` handler.
//!
//! [`test_runner::TestRunner`] reuses the same backend seam to produce the
//! pass/fail counts the planner's test-delta reward needs, so that reward
//! computation never depends on which backend actually ran the suite.

#![deny(missing_docs)]

pub mod backend;
pub mod capability;
pub mod docker;
pub mod host;
pub mod test_runner;

pub use backend::{ExecBackend, ShellMeta, ShellRequest, ShellResult};
pub use capability::register_exec_capabilities;
pub use docker::DockerExecBackend;
pub use host::HostExecBackend;
pub use test_runner::{ExecTestRunner, TestRunResult, TestRunner};
