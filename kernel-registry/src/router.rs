//! The enforcement pipeline every capability call passes through before a
//! handler ever runs (spec §4.F "Router enforcement order").

use crate::metrics::RouterMetrics;
use crate::path_scope::{extract_path_arg, resolve_within};
use crate::registry::{validate_arguments, CapabilityRegistry};
use crate::CapabilityOutcome;
use kernel_types::{BudgetError, DenyError, DispatchError, ExecutionContext, PermError, ToolError};
use serde_json::{Map, Value};
use std::time::Instant;

const HOST_EXEC_CAPABILITY: &str = "host_exec";
const SANDBOX_CAPABILITY: &str = "sandboxed_exec";
const SHELL_LIKE: [&str; 2] = [HOST_EXEC_CAPABILITY, SANDBOX_CAPABILITY];

/// Run `name(args)` through every enforcement step and, if all pass,
/// through its registered handler. Returns `Err` for a denial at any step
/// 1-8; step 9's handler outcome (success or failure) is always `Ok`.
pub async fn dispatch(
    registry: &CapabilityRegistry,
    metrics: &RouterMetrics,
    ctx: &mut ExecutionContext,
    name: &str,
    args: Value,
) -> Result<CapabilityOutcome, DispatchError> {
    dispatch_inner(registry, metrics, ctx, name, args, true).await
}

async fn dispatch_inner(
    registry: &CapabilityRegistry,
    metrics: &RouterMetrics,
    ctx: &mut ExecutionContext,
    name: &str,
    mut args: Value,
    allow_host_rewrite: bool,
) -> Result<CapabilityOutcome, DispatchError> {
    // Step 1: unknown capability.
    let Some(entry) = registry.get(name) else {
        metrics.record_decision(name, "tool");
        return Err(DispatchError::Tool(ToolError::NotFound(name.to_string())));
    };

    // Step 2: schema validation.
    if let Err(schema_err) = validate_arguments(&entry.spec, &args) {
        metrics.record_decision(name, "schema");
        return Err(DispatchError::Schema(schema_err));
    }

    // Step 3: permission check, with the host-exec-to-sandbox rewrite exception.
    let grant_missing =
        entry.spec.permission.require_explicit_grant && !ctx.is_granted(name);
    if grant_missing {
        if allow_host_rewrite && name == HOST_EXEC_CAPABILITY && registry.contains(SANDBOX_CAPABILITY) {
            return Box::pin(dispatch_inner(
                registry,
                metrics,
                ctx,
                SANDBOX_CAPABILITY,
                args,
                false,
            ))
            .await;
        }
        metrics.record_decision(name, "perm");
        return Err(DispatchError::Perm(PermError::GrantRequired(name.to_string())));
    }

    // Step 4: replay-mode block.
    if ctx.replay_mode == kernel_types::ReplayMode::Replay && entry.spec.permission.deny_in_replay {
        metrics.record_decision(name, "perm");
        return Err(DispatchError::Perm(PermError::ScopeDenied(
            "capability is blocked while replaying".to_string(),
        )));
    }

    // Step 5: path scoping.
    if entry.spec.permission.restrict_paths_to_workdir {
        if let Some(raw_path) = extract_path_arg(&args) {
            if resolve_within(&ctx.working_directory, raw_path).is_none() {
                metrics.record_decision(name, "deny");
                return Err(DispatchError::Deny(DenyError::PathEscape));
            }
        }
    }

    // Step 6: budget charge.
    let estimated_bytes = estimate_bytes(&args, entry.spec.permission.mutates);
    ctx.budget.charge_call(name);
    if ctx.budget.calls_used(name) > entry.spec.budget.calls_per_turn {
        metrics.record_decision(name, "budget");
        return Err(DispatchError::Budget(BudgetError::CallsExceeded(name.to_string())));
    }
    if let Some(max_bytes) = entry.spec.budget.max_bytes {
        ctx.budget.charge_bytes(name, estimated_bytes);
        if ctx.budget.bytes_used(name) > max_bytes {
            metrics.record_decision(name, "budget");
            return Err(DispatchError::Budget(BudgetError::BytesExceeded(name.to_string())));
        }
    }

    // Step 7: inject per-session defaults (spec §4.F "Inject per-session
    // defaults (e.g., memory store locator) into kwargs").
    if let Value::Object(ref mut map) = args {
        map.entry("working_directory")
            .or_insert_with(|| Value::String(ctx.working_directory.clone()));
        if let Some(memory_db_path) = &ctx.memory_db_path {
            map.entry("memory_db_path")
                .or_insert_with(|| Value::String(memory_db_path.clone()));
        }
    }

    // Step 8: force cwd on shell-like capabilities.
    if SHELL_LIKE.contains(&name) {
        if let Value::Object(ref mut map) = args {
            map.insert("cwd".to_string(), Value::String(ctx.working_directory.clone()));
        }
    }

    // Step 9: invoke, normalize, time.
    let started = Instant::now();
    let outcome = match entry.handler.call(args, ctx).await {
        Ok(output) => CapabilityOutcome::ok(output),
        Err(err) => CapabilityOutcome::failed(err),
    };
    let elapsed = started.elapsed();
    tracing::info!(
        capability = name,
        success = outcome.success,
        elapsed_ms = elapsed.as_millis() as u64,
        "capability dispatched"
    );

    if let Some(max_results) = entry.spec.budget.max_results {
        if let Some(count) = outcome.output.as_array().map(Vec::len) {
            ctx.budget.charge_results(name, count as u32);
            if ctx.budget.results_used(name) > max_results {
                metrics.record_decision(name, "budget");
                return Err(DispatchError::Budget(BudgetError::ResultsExceeded(
                    name.to_string(),
                )));
            }
        }
    }

    metrics.record_decision(name, if outcome.success { "allow" } else { "tool" });
    Ok(outcome)
}

fn estimate_bytes(args: &Value, mutates: bool) -> u64 {
    if mutates {
        args.get("content")
            .or_else(|| args.get("value"))
            .and_then(Value::as_str)
            .map(|s| s.len() as u64)
            .unwrap_or(0)
    } else {
        args.get("max_bytes").and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Build an empty args object, used by callers constructing a rewritten
/// host-exec-to-sandbox call without a caller-supplied `Map`.
#[must_use]
pub fn empty_args() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerFn;
    use crate::registry::CapabilityRegistry;
    use kernel_types::{CapabilityBudget, CapabilitySpec, FieldKind, PermissionRule, RiskLevel, SchemaField};
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("/work")
    }

    fn echo_spec(name: &str, permission: PermissionRule) -> CapabilitySpec {
        CapabilitySpec {
            name: name.to_string(),
            schema: vec![SchemaField::optional("path", FieldKind::Str)],
            risk: RiskLevel::Low,
            budget: CapabilityBudget::calls_only(2),
            permission,
        }
    }

    fn echo_registry(name: &str, permission: PermissionRule) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            echo_spec(name, permission),
            Arc::new(HandlerFn(|args, _ctx| async move { Ok(args) })),
        );
        registry
    }

    #[tokio::test]
    async fn unknown_capability_fails_not_found() {
        let registry = CapabilityRegistry::new();
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let err = dispatch(&registry, &metrics, &mut c, "ghost", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "tool:not_found: ghost");
    }

    #[tokio::test]
    async fn schema_violation_fails_before_handler_runs() {
        let registry = echo_registry("read_file", PermissionRule::default());
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let err = dispatch(&registry, &metrics, &mut c, "read_file", json!({"path": 5}))
            .await
            .unwrap_err();
        assert!(err.code().starts_with("schema:"));
    }

    #[tokio::test]
    async fn ungranted_capability_requiring_grant_is_denied() {
        let registry = echo_registry(
            "memory_write",
            PermissionRule { require_explicit_grant: true, ..Default::default() },
        );
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let err = dispatch(&registry, &metrics, &mut c, "memory_write", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "perm:grant_required: memory_write");
    }

    #[tokio::test]
    async fn path_escape_is_denied() {
        let registry = echo_registry(
            "read_file",
            PermissionRule { restrict_paths_to_workdir: true, ..Default::default() },
        );
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let err = dispatch(&registry, &metrics, &mut c, "read_file", json!({"path": "../etc/passwd"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "deny:path_escape");
    }

    #[tokio::test]
    async fn calls_per_turn_budget_is_enforced() {
        let registry = echo_registry("read_file", PermissionRule::default());
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        dispatch(&registry, &metrics, &mut c, "read_file", json!({})).await.unwrap();
        dispatch(&registry, &metrics, &mut c, "read_file", json!({})).await.unwrap();
        let err = dispatch(&registry, &metrics, &mut c, "read_file", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "budget:calls_exceeded: read_file");
    }

    #[tokio::test]
    async fn successful_call_reports_working_directory_injected() {
        let registry = echo_registry("read_file", PermissionRule::default());
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let outcome = dispatch(&registry, &metrics, &mut c, "read_file", json!({}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output["working_directory"], json!("/work"));
    }

    fn exec_spec(name: &str, permission: PermissionRule) -> CapabilitySpec {
        CapabilitySpec {
            name: name.to_string(),
            schema: vec![
                SchemaField::optional("command", FieldKind::Str),
                SchemaField::optional("cwd", FieldKind::Str),
            ],
            risk: RiskLevel::High,
            budget: CapabilityBudget::calls_only(2),
            permission,
        }
    }

    #[tokio::test]
    async fn host_exec_without_grant_rewrites_to_sandbox_once() {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            exec_spec(HOST_EXEC_CAPABILITY, PermissionRule { require_explicit_grant: true, ..Default::default() }),
            Arc::new(HandlerFn(|_args, _ctx| async move { Err(ToolError::InternalError("host handler should not run".into())) })),
        );
        registry.register(
            exec_spec(SANDBOX_CAPABILITY, PermissionRule::default()),
            Arc::new(HandlerFn(|args, _ctx| async move { Ok(args) })),
        );
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let outcome = dispatch(&registry, &metrics, &mut c, HOST_EXEC_CAPABILITY, json!({"command": "ls"}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(c.budget.calls_used(SANDBOX_CAPABILITY), 1);
        assert_eq!(c.budget.calls_used(HOST_EXEC_CAPABILITY), 0);
    }

    #[tokio::test]
    async fn shell_like_capability_has_cwd_forced() {
        let mut registry = CapabilityRegistry::new();
        registry.register(
            exec_spec(SANDBOX_CAPABILITY, PermissionRule::default()),
            Arc::new(HandlerFn(|args, _ctx| async move { Ok(args) })),
        );
        let metrics = RouterMetrics::new();
        let mut c = ctx();
        let outcome = dispatch(
            &registry,
            &metrics,
            &mut c,
            SANDBOX_CAPABILITY,
            json!({"cwd": "/somewhere/else"}),
        )
        .await
        .unwrap();
        assert_eq!(outcome.output["cwd"], json!("/work"));
    }
}
