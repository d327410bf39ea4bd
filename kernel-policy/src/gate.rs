//! The pure gate: `gate(snapshot, action, policy) -> GateDecision` (spec §4.E).
//!
//! No I/O, no clock, no mutation of its inputs. Same inputs always produce
//! bit-for-bit the same decision — the turn loop, the planner's executor,
//! and every test in this crate rely on that.

use crate::policy::Policy;
use kernel_types::{ActionKind, DenyError, GateDecision, ProposedAction, RepoSnapshot, WorldSnapshot};

/// The two flavors of state the gate accepts (spec §3 "Snapshot").
#[derive(Debug, Clone, Copy)]
pub enum Snapshot<'a> {
    /// A working-tree view, used for `patch`/`command`/`patch_plan` actions.
    Repo(&'a RepoSnapshot),
    /// A session view, used for `tool_call`/`memory_write`/... actions.
    World(&'a WorldSnapshot),
}

impl Snapshot<'_> {
    /// `tests_passed` for repo snapshots; `system_clean` stands in for it
    /// when only a world snapshot is available, matching the conversion the
    /// original controller performs when bridging session actions into the
    /// repo-flavored core gate.
    fn tests_passed(&self) -> bool {
        match self {
            Snapshot::Repo(s) => s.tests_passed,
            Snapshot::World(s) => s.system_clean,
        }
    }
}

impl<'a> From<&'a RepoSnapshot> for Snapshot<'a> {
    fn from(value: &'a RepoSnapshot) -> Self {
        Snapshot::Repo(value)
    }
}

impl<'a> From<&'a WorldSnapshot> for Snapshot<'a> {
    fn from(value: &'a WorldSnapshot) -> Self {
        Snapshot::World(value)
    }
}

/// Evaluate `action` against `snapshot` under `policy`.
#[must_use]
pub fn gate<'a>(
    snapshot: impl Into<Snapshot<'a>>,
    action: &ProposedAction,
    policy: &Policy,
) -> GateDecision {
    let snapshot = snapshot.into();

    if action.justification.len() < policy.min_justification_len {
        return GateDecision::deny(DenyError::WeakJustification.to_string());
    }

    match action.kind {
        ActionKind::PatchPlan => GateDecision::allow_normalized(action.clone()),
        ActionKind::Patch => gate_patch(snapshot, action, policy),
        ActionKind::Command => gate_command(action, policy),
        ActionKind::ToolCall => gate_tool_call(action, policy),
        ActionKind::MemoryWrite => gate_memory_write(action, policy),
        ActionKind::MessageSend => gate_message_send(action, policy),
        ActionKind::PermissionRequest => gate_permission_request(policy),
        _ => unreachable!("ActionKind is non_exhaustive but all current variants are handled above"),
    }
}

fn gate_patch(snapshot: Snapshot<'_>, action: &ProposedAction, policy: &Policy) -> GateDecision {
    if policy.require_clean_tests_for_patch && !snapshot.tests_passed() {
        return GateDecision::deny(
            DenyError::PolicyForbidden("Refusing patch: state not clean (tests failing)".into())
                .to_string(),
        );
    }
    let Some(patch_text) = action.payload.as_str() else {
        return GateDecision::deny(
            DenyError::PolicyForbidden("Patch payload must be unified diff string".into())
                .to_string(),
        );
    };
    if patch_text.len() > policy.max_patch_bytes {
        return GateDecision::deny(DenyError::PayloadTooLarge.to_string());
    }

    let normalized_text = patch_text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    let normalized = ProposedAction::new(
        ActionKind::Patch,
        serde_json::Value::String(normalized_text),
        action.justification.clone(),
    )
    .with_risk_tags(action.risk_tags.clone());
    GateDecision::allow_normalized(normalized)
}

fn gate_command(action: &ProposedAction, policy: &Policy) -> GateDecision {
    if !policy.allow_commands {
        return GateDecision::deny(DenyError::CommandsNotAllowed.to_string());
    }
    let Some(command) = action.payload.as_str() else {
        return GateDecision::deny(
            DenyError::PolicyForbidden("Command payload must be a string".into()).to_string(),
        );
    };
    if policy.is_command_blocked(command) {
        return GateDecision::deny(DenyError::CommandBlocked(command.to_string()).to_string());
    }
    GateDecision::allow_normalized(action.clone())
}

fn gate_tool_call(action: &ProposedAction, policy: &Policy) -> GateDecision {
    // A missing tool name is just another name `allowed_tools` never
    // contains, so it denies through the same `ToolNotAllowed` path as any
    // other disallowed tool rather than a bespoke message.
    let tool = action.tool_name().unwrap_or("");

    if !policy.is_tool_allowed(tool) {
        let suggestion = policy
            .allowed_tools
            .iter()
            .take(5)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        return GateDecision::deny(DenyError::ToolNotAllowed(tool.to_string()).to_string())
            .with_suggestion(format!("Try one of: {suggestion}"));
    }

    let args = action.tool_args();

    if matches!(tool, "read_file" | "write_file" | "list_dir" | "search_files") {
        let path = args
            .get("path")
            .or_else(|| args.get("directory"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if !path.is_empty() {
            let (allowed, reason) = policy.check_path(path);
            if !allowed {
                return GateDecision::deny(DenyError::PolicyForbidden(reason).to_string())
                    .with_suggestion("Use a path under an allowed prefix".to_string());
            }
        }
    }

    if tool == "http_get" || tool == "http_post" {
        if let Some(url) = args.get("url").and_then(serde_json::Value::as_str) {
            if let Some(host) = url.split("://").nth(1).and_then(|rest| rest.split('/').next()) {
                let (allowed, reason) = policy.check_domain(host);
                if !allowed {
                    return GateDecision::deny(DenyError::DomainBlocked(reason).to_string());
                }
            }
        }
    }

    if matches!(tool, "write_file" | "memory_write" | "http_post") {
        let content = args
            .get("content")
            .or_else(|| args.get("value"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let (allowed, _) = policy.check_egress(content);
        if !allowed {
            return GateDecision::deny(DenyError::EgressBlocked(tool.to_string()).to_string())
                .with_suggestion("Remove sensitive data before sending".to_string());
        }
    }

    GateDecision::allow_normalized(action.clone())
}

fn gate_memory_write(action: &ProposedAction, policy: &Policy) -> GateDecision {
    let value = action
        .payload
        .get("value")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let (allowed, _) = policy.check_egress(value);
    if !allowed {
        return GateDecision::deny(DenyError::EgressBlocked("memory_write".to_string()).to_string())
            .with_suggestion("Redact sensitive data".to_string());
    }
    if value.len() > policy.max_payload_bytes {
        return GateDecision::deny(DenyError::PayloadTooLarge.to_string());
    }
    GateDecision::allow_normalized(action.clone())
}

fn gate_message_send(action: &ProposedAction, policy: &Policy) -> GateDecision {
    let message = action
        .payload
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let (allowed, _) = policy.check_egress(message);
    if !allowed {
        return GateDecision::deny(DenyError::EgressBlocked("message_send".to_string()).to_string())
            .with_suggestion("Remove sensitive data".to_string());
    }
    GateDecision::allow_normalized(action.clone())
}

fn gate_permission_request(policy: &Policy) -> GateDecision {
    if policy.elevation_requires_approval {
        return GateDecision::deny(DenyError::ElevationRequiresApproval.to_string())
            .with_suggestion("Ask the user first".to_string());
    }
    GateDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_types::SessionId;
    use serde_json::json;

    fn dev_policy() -> Policy {
        Policy::permissive_dev()
    }

    fn world() -> WorldSnapshot {
        WorldSnapshot::new(SessionId::new("s1").to_string(), "hash-0")
    }

    #[test]
    fn weak_justification_is_denied_before_any_kind_dispatch() {
        let action = ProposedAction::new(ActionKind::MessageSend, json!({"message": "hi"}), "no");
        let decision = gate(&world(), &action, &dev_policy());
        assert!(!decision.allow);
        assert_eq!(decision.reason, DenyError::WeakJustification.to_string());
    }

    #[test]
    fn allowed_tool_call_passes_through_with_no_normalization_change() {
        let action = ProposedAction::new(
            ActionKind::ToolCall,
            json!({"tool": "list_dir", "args": {"path": "./"}}),
            "List current directory",
        );
        let decision = gate(&world(), &action, &dev_policy());
        assert!(decision.allow);
    }

    #[test]
    fn tool_not_in_allowlist_is_denied_with_exact_message() {
        let action = ProposedAction::new(
            ActionKind::ToolCall,
            json!({"tool": "dangerous_tool", "args": {}}),
            "Just trying it out",
        );
        let decision = gate(&world(), &action, &dev_policy());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "Tool 'dangerous_tool' not in allowlist");
    }

    #[test]
    fn patch_gate_strips_trailing_whitespace_and_appends_newline() {
        let repo = RepoSnapshot {
            repo_id: "r1".into(),
            fs_tree_hash: "h".into(),
            toolchain: "rustc".into(),
            tests_passed: true,
            metadata: serde_json::Value::Null,
        };
        let action = ProposedAction::new(
            ActionKind::Patch,
            json!("line one   \nline two\t\n"),
            "Fix trailing whitespace bug",
        );
        let decision = gate(&repo, &action, &Policy::restrictive_default());
        assert!(decision.allow);
        let normalized = decision.normalized_action.unwrap();
        assert_eq!(normalized.payload, json!("line one\nline two\n"));
    }

    #[test]
    fn patch_denied_when_tests_failing_and_policy_requires_clean_tests() {
        let repo = RepoSnapshot {
            repo_id: "r1".into(),
            fs_tree_hash: "h".into(),
            toolchain: "rustc".into(),
            tests_passed: false,
            metadata: serde_json::Value::Null,
        };
        let action = ProposedAction::new(ActionKind::Patch, json!("diff text\n"), "Apply the fix");
        let decision = gate(&repo, &action, &Policy::restrictive_default());
        assert!(!decision.allow);
    }

    #[test]
    fn command_blocked_by_prefix_even_when_commands_allowed() {
        let action = ProposedAction::new(ActionKind::Command, json!("sudo rm -rf /"), "Clean up disk");
        let decision = gate(&world(), &action, &dev_policy());
        assert!(!decision.allow);
        assert!(decision.reason.starts_with("command_blocked"));
    }

    #[test]
    fn commands_denied_outright_under_restrictive_policy() {
        let action = ProposedAction::new(ActionKind::Command, json!("ls -la"), "List files here");
        let decision = gate(&world(), &action, &Policy::restrictive_default());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "commands_not_allowed");
    }

    #[test]
    fn permission_request_denied_when_approval_required() {
        let action =
            ProposedAction::new(ActionKind::PermissionRequest, json!({}), "Need write access");
        let decision = gate(&world(), &action, &Policy::restrictive_default());
        assert!(!decision.allow);
        assert_eq!(decision.reason, "elevation_requires_approval");
    }

    #[test]
    fn gate_is_pure_same_inputs_produce_same_decision() {
        let action = ProposedAction::new(
            ActionKind::ToolCall,
            json!({"tool": "read_file", "args": {"path": "./README.md"}}),
            "Read the readme for context",
        );
        let policy = dev_policy();
        let w = world();
        let d1 = gate(&w, &action, &policy);
        let d2 = gate(&w, &action, &policy);
        assert_eq!(d1.allow, d2.allow);
        assert_eq!(d1.reason, d2.reason);
    }
}
