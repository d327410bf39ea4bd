//! A proposal from the untrusted reasoner: the only input the control
//! plane ever accepts from it (spec §3 "Proposed action").

use serde::{Deserialize, Serialize};

/// The discriminator for a proposed action's payload shape.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A multi-step plan proposed wholesale; the gate defers to the planner.
    PatchPlan,
    /// A unified diff to apply to the working tree.
    Patch,
    /// A shell command to run (host or sandboxed, per registry configuration).
    Command,
    /// An invocation of a named capability with structured arguments.
    ToolCall,
    /// A message destined for the user; ends the turn when allowed.
    MessageSend,
    /// A key/value write into the session's memory store.
    MemoryWrite,
    /// A request to elevate permissions for a named capability.
    PermissionRequest,
}

/// Free-form risk tags a reasoner may attach to a proposal. The gate does
/// not interpret these; they pass through to the ledger for audit.
pub type RiskTags = Vec<String>;

/// An action proposed by the reasoner. Immutable once constructed — the
/// gate produces a new `ProposedAction` via `normalized_action` rather than
/// mutating this one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedAction {
    /// Which kind of action this is; determines how `payload` is interpreted.
    pub kind: ActionKind,
    /// The kind-specific payload. Shape is not enforced at this layer — the
    /// gate and the capability schema each apply their own checks.
    pub payload: serde_json::Value,
    /// Why the reasoner believes this action is warranted. Must be non-empty
    /// and at least as long as the policy's configured minimum.
    pub justification: String,
    /// Optional free-form risk tags (e.g. `["destructive", "network"]`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_tags: RiskTags,
}

impl ProposedAction {
    /// Construct a new proposed action with no risk tags.
    pub fn new(
        kind: ActionKind,
        payload: serde_json::Value,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            payload,
            justification: justification.into(),
            risk_tags: Vec::new(),
        }
    }

    /// Attach risk tags, builder-style.
    #[must_use]
    pub fn with_risk_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.risk_tags = tags.into_iter().collect();
        self
    }

    /// Read `payload.tool` for `tool_call` actions, or `None` for any other
    /// shape (missing field, wrong kind, or wrong action kind entirely).
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        if self.kind != ActionKind::ToolCall {
            return None;
        }
        self.payload.get("tool").and_then(serde_json::Value::as_str)
    }

    /// Read `payload.args` for `tool_call` actions, defaulting to an empty object.
    #[must_use]
    pub fn tool_args(&self) -> serde_json::Value {
        self.payload
            .get("args")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_name_reads_payload_tool_field() {
        let action = ProposedAction::new(
            ActionKind::ToolCall,
            json!({"tool": "list_dir", "args": {"path": "./"}}),
            "List current directory",
        );
        assert_eq!(action.tool_name(), Some("list_dir"));
        assert_eq!(action.tool_args(), json!({"path": "./"}));
    }

    #[test]
    fn tool_name_is_none_for_non_tool_call_kinds() {
        let action = ProposedAction::new(ActionKind::Patch, json!("diff"), "fix bug");
        assert_eq!(action.tool_name(), None);
    }

    #[test]
    fn kind_round_trips_through_json_as_snake_case() {
        let json = serde_json::to_value(ActionKind::MemoryWrite).unwrap();
        assert_eq!(json, json!("memory_write"));
        let back: ActionKind = serde_json::from_value(json).unwrap();
        assert_eq!(back, ActionKind::MemoryWrite);
    }

    #[test]
    fn unknown_kind_fails_closed_at_parse_time() {
        let err = serde_json::from_value::<ActionKind>(json!("detonate")).unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }
}
