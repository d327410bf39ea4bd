//! Bridges an [`ExecBackend`] into a `kernel-registry` [`CapabilityHandler`]
//! and registers the `sandboxed_exec`/`host_exec` capability specs.

use crate::backend::{ExecBackend, ShellRequest};
use async_trait::async_trait;
use kernel_registry::{CapabilityHandler, CapabilityRegistry};
use kernel_types::{
    CapabilityBudget, CapabilitySpec, ExecutionContext, FieldKind, PermissionRule, RiskLevel,
    SchemaField, ToolError,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

struct ExecHandler(Arc<dyn ExecBackend>);

#[async_trait]
impl CapabilityHandler for ExecHandler {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let command = args
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::BadArgs("missing string field: command".to_string()))?;
        let mut request = ShellRequest::new(command, ctx.working_directory.clone());
        if let Some(timeout) = args.get("timeout_secs").and_then(Value::as_u64) {
            request.timeout_secs = timeout;
        }
        if let Some(env) = args.get("env").and_then(Value::as_object) {
            request.env = env
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect::<BTreeMap<_, _>>();
        }
        let result = self.0.run(request).await?;
        Ok(json!({
            "exit_code": result.exit_code,
            "stdout": result.stdout,
            "stderr": result.stderr,
            "meta": result.meta,
        }))
    }
}

fn exec_spec(name: &str, require_explicit_grant: bool) -> CapabilitySpec {
    CapabilitySpec {
        name: name.to_string(),
        schema: vec![
            SchemaField::required("command", FieldKind::Str),
            SchemaField::optional("timeout_secs", FieldKind::Int),
            SchemaField::optional("env", FieldKind::Dict),
            SchemaField::optional("cwd", FieldKind::Str),
        ],
        risk: RiskLevel::High,
        budget: CapabilityBudget::calls_only(20),
        permission: PermissionRule {
            require_explicit_grant,
            mutates: true,
            irreversible: false,
            ..Default::default()
        },
    }
}

/// Register `sandboxed_exec` backed by `sandbox`, and — only when `host` is
/// `Some` — `host_exec` backed by it. Callers decide whether `host` is
/// present by checking `RFSN_DEV_MODE` themselves; this function does not
/// re-check it.
pub fn register_exec_capabilities(
    registry: &mut CapabilityRegistry,
    sandbox: Arc<dyn ExecBackend>,
    host: Option<Arc<dyn ExecBackend>>,
) {
    registry.register(exec_spec("sandboxed_exec", false), Arc::new(ExecHandler(sandbox)));
    if let Some(host) = host {
        registry.register(
            exec_spec("host_exec", true),
            Arc::new(ExecHandler(host)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostExecBackend;
    use kernel_registry::dispatch;
    use kernel_registry::RouterMetrics;
    use serde_json::json;

    #[tokio::test]
    async fn sandboxed_exec_runs_through_the_router() {
        let mut registry = CapabilityRegistry::new();
        register_exec_capabilities(&mut registry, Arc::new(HostExecBackend::new()), None);
        let metrics = RouterMetrics::new();
        let mut ctx = ExecutionContext::new(std::env::temp_dir().to_string_lossy().to_string());
        let outcome = dispatch(&registry, &metrics, &mut ctx, "sandboxed_exec", json!({"command": "echo hi"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output["stdout"].as_str().unwrap().trim(), "hi");
    }

    #[tokio::test]
    async fn host_exec_absent_unless_registered() {
        let mut registry = CapabilityRegistry::new();
        register_exec_capabilities(&mut registry, Arc::new(HostExecBackend::new()), None);
        assert!(!registry.contains("host_exec"));
    }
}
