//! Direct-subprocess [`ExecBackend`], gated behind dev-mode at the point
//! where it is registered into the capability registry (spec §4.F.1
//! "host exec (dev-mode only)").

use crate::backend::{truncate_utf8, ExecBackend, ShellMeta, ShellRequest, ShellResult};
use async_trait::async_trait;
use kernel_types::ToolError;
use std::time::Duration;
use tokio::process::Command;

/// Runs commands directly in the current process's OS, with no isolation
/// boundary beyond the forced working directory. Never registered unless
/// the caller has already checked `RFSN_DEV_MODE`.
#[derive(Default)]
pub struct HostExecBackend;

impl HostExecBackend {
    /// A new host backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecBackend for HostExecBackend {
    async fn run(&self, request: ShellRequest) -> Result<ShellResult, ToolError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&request.command)
            .current_dir(&request.workdir)
            .kill_on_drop(true);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let timeout = Duration::from_secs(request.timeout_secs);
        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(ShellResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: truncate_utf8(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    request.max_output_bytes,
                ),
                stderr: truncate_utf8(
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    request.max_output_bytes,
                ),
                meta: ShellMeta {
                    docker: false,
                    timed_out: false,
                    config: serde_json::Value::Null,
                    mounted_workdir: request.workdir.clone(),
                },
            }),
            Ok(Err(err)) => Err(ToolError::ExternalFailure(format!("spawn failed: {err}"))),
            Err(_) => Ok(ShellResult {
                exit_code: -1,
                stdout: String::new(),
                stderr: "Command timed out".to_string(),
                meta: ShellMeta {
                    docker: false,
                    timed_out: true,
                    config: serde_json::Value::Null,
                    mounted_workdir: request.workdir,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn host_backend_runs_a_simple_command() {
        let backend = HostExecBackend::new();
        let dir = std::env::temp_dir();
        let request = ShellRequest::new("echo hello", dir.to_string_lossy());
        let result = backend.run(request).await.unwrap();
        assert!(result.succeeded());
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.meta.docker);
    }

    #[tokio::test]
    async fn host_backend_reports_nonzero_exit() {
        let backend = HostExecBackend::new();
        let dir = std::env::temp_dir();
        let request = ShellRequest::new("exit 3", dir.to_string_lossy());
        let result = backend.run(request).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn host_backend_times_out_long_running_command() {
        let backend = HostExecBackend::new();
        let dir = std::env::temp_dir();
        let mut request = ShellRequest::new("sleep 5", dir.to_string_lossy());
        request.timeout_secs = 1;
        let result = backend.run(request).await.unwrap();
        assert!(result.meta.timed_out);
    }
}
