//! Plan execution with real workdir/DB rollback (spec §4.J "Executor" and
//! "Real rollback").
//!
//! Rollback semantics: the workdir filesystem rolls back via git
//! checkpoint/reset; declared SQLite databases roll back via file
//! snapshots; the ledger is append-only and is never truncated; any other
//! side effect (network calls, memory-store writes) is not rolled back.

use kernel_policy::{gate, Policy};
use kernel_registry::{dispatch, CapabilityRegistry, RouterMetrics};
use kernel_types::{ActionKind, ExecutionContext, Plan, PlanStep, WorldSnapshot};
use serde_json::{json, Value};

use crate::result::{PlanResult, StepResult};
use crate::sqlite_snapshot::{cleanup_sqlite_snaps, restore_sqlite_files, snapshot_sqlite_files, SqliteTarget};
use crate::workdir_checkpoint::{checkpoint, ensure_git_repo, reset_hard};

/// Capabilities the executor treats as mutating the workdir or session
/// state (spec §4.J "mutating set").
const MUTATING_TOOLS: &[&str] = &["write_file", "apply_diff", "memory_delete", "memory_store", "run_command", "run_python", "sandbox_exec"];

/// Capabilities whose effect can never be undone by a workdir/DB rollback.
const IRREVERSIBLE_TOOLS: &[&str] = &["memory_store", "memory_delete"];

/// A sink for planner progress events; observing never changes the
/// executor's outcome.
pub type EmitFn<'a> = dyn FnMut(&str, Value) + Send + 'a;

fn emit(sink: &mut Option<&mut EmitFn<'_>>, event: &str, payload: Value) {
    if let Some(f) = sink.as_mut() {
        f(event, payload);
    }
}

/// Whether rollback should be attempted around mutating steps, and what to
/// snapshot alongside the workdir.
#[derive(Default)]
pub struct RollbackOptions {
    /// Create git checkpoints before mutating steps and reset on failure.
    pub enable_workdir_rollback: bool,
    /// SQLite databases to snapshot alongside each workdir checkpoint.
    pub sqlite_targets: Vec<SqliteTarget>,
    /// How many snapshots to retain per database.
    pub keep_sqlite_snaps: usize,
}

impl RollbackOptions {
    /// No rollback support — the default the original "legacy" callers
    /// (that never declared a workdir) still get.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Workdir-only rollback, keeping the 5 most recent DB snapshots.
    #[must_use]
    pub fn workdir_only() -> Self {
        Self { enable_workdir_rollback: true, sqlite_targets: Vec::new(), keep_sqlite_snaps: 5 }
    }
}

/// Execute a single plan step: gate, then dispatch if allowed.
pub async fn execute_step(
    step: &PlanStep,
    registry: &CapabilityRegistry,
    metrics: &RouterMetrics,
    ctx: &mut ExecutionContext,
    world: &WorldSnapshot,
    policy: &Policy,
) -> StepResult {
    let action = &step.action;
    let decision = gate(world, action, policy);

    if !decision.allow {
        return StepResult {
            step_id: step.id.clone(),
            success: false,
            output: Value::Null,
            error: Some(format!("Blocked by gate: {}", decision.reason)),
            gated: false,
            gate_reason: decision.reason,
        };
    }

    let effective = decision.effective_action(action);
    match effective.kind {
        ActionKind::ToolCall => {
            let tool = effective.tool_name().unwrap_or_default();
            let args = effective.tool_args();
            let outcome = dispatch(registry, metrics, ctx, tool, args).await;
            match outcome {
                Ok(o) => StepResult { step_id: step.id.clone(), success: o.success, output: o.output, error: o.error, gated: true, gate_reason: decision.reason },
                Err(e) => StepResult { step_id: step.id.clone(), success: false, output: Value::Null, error: Some(e.to_string()), gated: true, gate_reason: decision.reason },
            }
        }
        ActionKind::MessageSend => {
            let message = effective.payload.get("message").and_then(Value::as_str).unwrap_or_default();
            StepResult { step_id: step.id.clone(), success: true, output: json!({"message": message}), error: None, gated: true, gate_reason: decision.reason }
        }
        ActionKind::MemoryWrite => {
            let outcome = dispatch(registry, metrics, ctx, "memory_store", effective.payload.clone()).await;
            match outcome {
                Ok(o) => StepResult { step_id: step.id.clone(), success: o.success, output: o.output, error: o.error, gated: true, gate_reason: decision.reason },
                Err(e) => StepResult { step_id: step.id.clone(), success: false, output: Value::Null, error: Some(e.to_string()), gated: true, gate_reason: decision.reason },
            }
        }
        other => StepResult { step_id: step.id.clone(), success: false, output: Value::Null, error: Some(format!("Unsupported action kind: {other:?}")), gated: true, gate_reason: decision.reason },
    }
}

fn tool_name_of(step: &PlanStep) -> &str {
    step.action.tool_name().unwrap_or_default()
}

/// Execute every step of `plan` in dependency order, optionally checkpoint
/// ing and rolling back the workdir/declared databases around mutating
/// steps.
pub async fn execute_plan(
    plan: &mut Plan,
    registry: &CapabilityRegistry,
    metrics: &RouterMetrics,
    ctx: &mut ExecutionContext,
    world: &WorldSnapshot,
    policy: &Policy,
    rollback: &RollbackOptions,
    mut emit_sink: Option<&mut EmitFn<'_>>,
) -> PlanResult {
    let mut step_results = Vec::new();
    let mut completed = 0u32;
    let mut failed = 0u32;
    let mut rolled_back = false;

    let mut last_checkpoint: Option<String> = None;
    let mut last_sqlite_checkpoint: Option<String> = None;
    let mut workdir_rollback = rollback.enable_workdir_rollback;

    if workdir_rollback {
        match ensure_git_repo(&ctx.working_directory).and_then(|_| checkpoint(&ctx.working_directory, "plan_start")) {
            Ok(commit) => {
                emit(&mut emit_sink, "planner_checkpoint", json!({"commit": commit, "label": "plan_start"}));
                last_checkpoint = Some(commit);
                if !rollback.sqlite_targets.is_empty() {
                    let id = format!("{}_start", plan.id.as_str());
                    if let Ok(()) = snapshot_sqlite_files(&ctx.working_directory, &rollback.sqlite_targets, &id).map(|_| ()) {
                        cleanup_sqlite_snaps(&ctx.working_directory, &rollback.sqlite_targets, rollback.keep_sqlite_snaps);
                        last_sqlite_checkpoint = Some(id);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, workdir = %ctx.working_directory, "initial plan checkpoint failed, rollback disabled for this run");
                emit(&mut emit_sink, "planner_checkpoint_error", json!({"error": e.to_string()}));
                workdir_rollback = false;
            }
        }
    }

    emit(&mut emit_sink, "planner_start", json!({"steps": plan.steps.len(), "workdir_rollback": workdir_rollback}));

    let mut step_index = 0u32;
    loop {
        let ready_ids: Vec<kernel_types::StepId> = plan.ready_steps().into_iter().map(|s| s.id.clone()).collect();
        let Some(step_id) = ready_ids.into_iter().next() else { break };

        let step = plan.steps.iter().find(|s| s.id == step_id).expect("id came from this plan").clone();
        let tool = tool_name_of(&step).to_string();
        let is_mutating = MUTATING_TOOLS.contains(&tool.as_str());
        let is_irreversible = IRREVERSIBLE_TOOLS.contains(&tool.as_str());

        emit(&mut emit_sink, "planner_step_start", json!({"step": step_index, "tool": tool, "is_mutating": is_mutating, "irreversible": is_irreversible}));
        if is_mutating && is_irreversible {
            emit(&mut emit_sink, "planner_note", json!({"step": step_index, "note": "mutating_step_irreversible", "tool": tool}));
        }

        if workdir_rollback && is_mutating && !is_irreversible {
            match checkpoint(&ctx.working_directory, &format!("before_step_{step_index}_{tool}")) {
                Ok(commit) => {
                    emit(&mut emit_sink, "planner_checkpoint", json!({"commit": commit, "label": format!("before_step_{step_index}_{tool}")}));
                    last_checkpoint = Some(commit);
                    if !rollback.sqlite_targets.is_empty() {
                        let id = format!("{}_{step_index}", plan.id.as_str());
                        if snapshot_sqlite_files(&ctx.working_directory, &rollback.sqlite_targets, &id).is_ok() {
                            cleanup_sqlite_snaps(&ctx.working_directory, &rollback.sqlite_targets, rollback.keep_sqlite_snaps);
                            last_sqlite_checkpoint = Some(id);
                        }
                    }
                }
                Err(e) => emit(&mut emit_sink, "planner_checkpoint_error", json!({"step": step_index, "error": e.to_string()})),
            }
        }

        let result = execute_step(&step, registry, metrics, ctx, world, policy).await;
        emit(&mut emit_sink, "planner_step_end", json!({"step": step_index, "tool": tool, "ok": result.success}));

        let step_mut = plan.steps.iter_mut().find(|s| s.id == step_id).expect("id came from this plan");
        if result.success {
            step_mut.status = kernel_types::StepStatus::Completed;
            completed += 1;
            step_results.push(result);
        } else {
            step_mut.status = kernel_types::StepStatus::Failed;
            failed += 1;
            emit(&mut emit_sink, "planner_abort", json!({"step": step_index, "reason": result.error, "tool": tool}));
            plan.skip_downstream_of(&step_id);
            for s in &mut plan.steps {
                if s.status == kernel_types::StepStatus::Pending {
                    s.status = kernel_types::StepStatus::Skipped;
                }
            }

            if workdir_rollback {
                if let Some(commit) = &last_checkpoint {
                    rolled_back = attempt_rollback(&ctx.working_directory, commit, &rollback.sqlite_targets, last_sqlite_checkpoint.as_deref(), &mut emit_sink);
                }
            }
            step_results.push(result);
            break;
        }

        step_index += 1;
    }

    let success = failed == 0 && completed as usize == plan.steps.len();
    emit(&mut emit_sink, "planner_end", json!({"ok": success, "completed_steps": completed, "rolled_back": rolled_back}));

    let error = step_results.last().filter(|r| !r.success).and_then(|r| r.error.clone());
    PlanResult {
        plan_id: plan.id.clone(),
        success,
        step_results,
        total_steps: plan.steps.len() as u32,
        completed_steps: completed,
        failed_steps: failed,
        rolled_back,
        error,
    }
}

fn attempt_rollback(
    workdir: &str,
    last_checkpoint: &str,
    sqlite_targets: &[SqliteTarget],
    last_sqlite_checkpoint: Option<&str>,
    emit_sink: &mut Option<&mut EmitFn<'_>>,
) -> bool {
    match reset_hard(workdir, last_checkpoint) {
        Ok(()) => {
            emit(emit_sink, "planner_rollback", json!({"ok": true, "commit": last_checkpoint}));
            if let Some(id) = last_sqlite_checkpoint {
                if !sqlite_targets.is_empty() {
                    match restore_sqlite_files(workdir, sqlite_targets, id) {
                        Ok(()) => emit(emit_sink, "planner_sqlite_restore", json!({"ok": true, "checkpoint_id": id})),
                        Err(e) => emit(emit_sink, "planner_sqlite_restore", json!({"ok": false, "checkpoint_id": id, "error": e.to_string()})),
                    }
                }
            }
            true
        }
        Err(e) => {
            tracing::error!(error = %e, commit = %last_checkpoint, workdir = %workdir, "plan rollback failed, workdir may be left in a partially-mutated state");
            emit(emit_sink, "planner_rollback", json!({"ok": false, "commit": last_checkpoint, "error": e.to_string()}));
            false
        }
    }
}
