//! The contract every exec backend satisfies (spec §6 "Sandboxed exec").
//!
//! [`crate::docker::DockerExecBackend`] and [`crate::host::HostExecBackend`]
//! both implement [`ExecBackend`] identically from the router's point of
//! view — only their isolation guarantees differ.

use async_trait::async_trait;
use kernel_types::ToolError;
use std::collections::BTreeMap;

/// One shell command to run under a backend's isolation boundary.
#[derive(Debug, Clone)]
pub struct ShellRequest {
    /// The command string, interpreted by `sh -c`.
    pub command: String,
    /// Working directory the command runs in. Always the session's working
    /// directory — the router forces this (step 8) before dispatch.
    pub workdir: String,
    /// Wall-clock timeout.
    pub timeout_secs: u64,
    /// Container image identifier. Ignored by [`crate::host::HostExecBackend`].
    pub image: Option<String>,
    /// Memory limit, e.g. `"2g"`. Ignored by the host backend.
    pub memory_limit: Option<String>,
    /// CPU limit, e.g. `"2.0"`. Ignored by the host backend.
    pub cpu_limit: Option<String>,
    /// Whether outbound networking is disabled inside the isolation boundary.
    pub network_disabled: bool,
    /// Environment variables exposed to the command.
    pub env: BTreeMap<String, String>,
    /// Stdout/stderr are truncated to this many bytes each.
    pub max_output_bytes: usize,
}

impl ShellRequest {
    /// A request with every optional field left at its restrictive default:
    /// no image, default resource limits omitted, networking disabled.
    #[must_use]
    pub fn new(command: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            workdir: workdir.into(),
            timeout_secs: 300,
            image: None,
            memory_limit: None,
            cpu_limit: None,
            network_disabled: true,
            env: BTreeMap::new(),
            max_output_bytes: 1_000_000,
        }
    }
}

/// Metadata about how a [`ShellResult`] was produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShellMeta {
    /// Whether the command ran inside a Docker container.
    pub docker: bool,
    /// Whether the command was killed for exceeding its timeout.
    pub timed_out: bool,
    /// The configuration actually applied (image, limits, network policy).
    pub config: serde_json::Value,
    /// The host path mounted as the command's working directory.
    pub mounted_workdir: String,
}

/// The outcome of running one [`ShellRequest`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShellResult {
    /// Process exit code, or `-1` on timeout.
    pub exit_code: i32,
    /// Captured stdout, truncated to `max_output_bytes`.
    pub stdout: String,
    /// Captured stderr, truncated to `max_output_bytes`.
    pub stderr: String,
    /// Execution metadata.
    pub meta: ShellMeta,
}

impl ShellResult {
    /// Whether the command exited zero and was not killed for timeout.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.meta.timed_out
    }
}

/// Truncate `text` to at most `max_bytes`, respecting UTF-8 char boundaries.
pub(crate) fn truncate_utf8(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let mut truncated = text[..boundary].to_string();
    truncated.push_str("... [truncated]");
    truncated
}

/// Runs one [`ShellRequest`] to completion under some isolation boundary.
#[async_trait]
pub trait ExecBackend: Send + Sync {
    /// Execute `request`, enforcing its timeout.
    async fn run(&self, request: ShellRequest) -> Result<ShellResult, ToolError>;
}
