//! Docker-backed [`ExecBackend`] (spec §6), grounded in the original
//! controller's container lifecycle management.

use crate::backend::{truncate_utf8, ExecBackend, ShellMeta, ShellRequest, ShellResult};
use async_trait::async_trait;
use kernel_types::ToolError;
use std::time::Duration;
use tokio::process::Command;

/// Default image used when a [`ShellRequest`] does not name one, read from
/// `RFSN_DOCKER_IMAGE` if set.
fn default_image() -> String {
    std::env::var("RFSN_DOCKER_IMAGE").unwrap_or_else(|_| "rust:1-slim".to_string())
}

/// A Docker-backed backend. Each call runs in a disposable, named container
/// that is removed whether the command succeeds, fails, or times out.
pub struct DockerExecBackend {
    /// Maximum processes inside the container (`--pids-limit`).
    pub pid_limit: u32,
}

impl Default for DockerExecBackend {
    fn default() -> Self {
        Self { pid_limit: 256 }
    }
}

impl DockerExecBackend {
    /// A backend with the default pid limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn build_command(&self, request: &ShellRequest, container_name: &str) -> Command {
        let image = request.image.clone().unwrap_or_else(default_image);
        let mut cmd = Command::new("docker");
        cmd.arg("run")
            .arg("--rm")
            .arg("--name")
            .arg(container_name)
            .arg("-v")
            .arg(format!("{}:/workspace", request.workdir))
            .arg("-w")
            .arg("/workspace")
            .arg("--user")
            .arg("1000:1000")
            .arg("--cap-drop=ALL")
            .arg("--security-opt=no-new-privileges")
            .arg("--read-only")
            .arg("--tmpfs")
            .arg("/tmp")
            .arg(format!("--pids-limit={}", self.pid_limit));

        if let Some(memory) = &request.memory_limit {
            cmd.arg(format!("--memory={memory}"));
        }
        if let Some(cpus) = &request.cpu_limit {
            cmd.arg(format!("--cpus={cpus}"));
        }
        if request.network_disabled {
            cmd.arg("--network=none");
        }
        for (key, value) in &request.env {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }
        cmd.arg(image).arg("sh").arg("-c").arg(&request.command);
        cmd
    }
}

#[async_trait]
impl ExecBackend for DockerExecBackend {
    async fn run(&self, request: ShellRequest) -> Result<ShellResult, ToolError> {
        let container_name = format!("kernel-exec-{}", uuid::Uuid::new_v4().simple());
        let config = serde_json::json!({
            "image": request.image.clone().unwrap_or_else(default_image),
            "memory_limit": request.memory_limit,
            "cpu_limit": request.cpu_limit,
            "network_disabled": request.network_disabled,
        });
        let mut cmd = self.build_command(&request, &container_name);
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
                    docker: true,
                    timed_out: false,
                    config,
                    mounted_workdir: request.workdir.clone(),
                },
            }),
            Ok(Err(err)) => Err(ToolError::ExternalFailure(format!("docker spawn failed: {err}"))),
            Err(_) => {
                let _ = Command::new("docker").arg("kill").arg(&container_name).output().await;
                let _ = Command::new("docker").arg("rm").arg("-f").arg(&container_name).output().await;
                Ok(ShellResult {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: "Container execution timed out".to_string(),
                    meta: ShellMeta {
                        docker: true,
                        timed_out: true,
                        config,
                        mounted_workdir: request.workdir,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_applies_security_hardening_flags() {
        let backend = DockerExecBackend::new();
        let request = ShellRequest::new("echo hi", "/work");
        let cmd = backend.build_command(&request, "test-container");
        let rendered = format!("{cmd:?}");
        assert!(rendered.contains("--cap-drop=ALL"));
        assert!(rendered.contains("--security-opt=no-new-privileges"));
        assert!(rendered.contains("--read-only"));
        assert!(rendered.contains("--network=none"));
    }

    #[test]
    fn default_image_falls_back_when_env_unset() {
        std::env::remove_var("RFSN_DOCKER_IMAGE");
        assert_eq!(default_image(), "rust:1-slim");
    }
}
