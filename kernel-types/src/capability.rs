//! Static description of a callable capability: schema, risk, budget and
//! permission rule (spec §3 "Capability spec", §4.F).
//!
//! This module only holds data; the registry (`kernel-registry`) owns the
//! handler dispatch table keyed by [`CapabilitySpec::name`].

use serde::{Deserialize, Serialize};

/// The declared kind of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string.
    Str,
    /// Signed integer, no fractional part.
    Int,
    /// Boolean.
    Bool,
    /// JSON object.
    Dict,
    /// JSON array.
    List,
    /// No type constraint; any JSON value is accepted.
    Any,
}

impl FieldKind {
    /// Whether `value` is an instance of this kind.
    #[must_use]
    pub fn matches(self, value: &serde_json::Value) -> bool {
        match self {
            FieldKind::Str => value.is_string(),
            FieldKind::Int => value.is_i64() || value.is_u64(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Dict => value.is_object(),
            FieldKind::List => value.is_array(),
            FieldKind::Any => true,
        }
    }
}

/// One field in a capability's argument schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name as it appears in the arguments object.
    pub name: String,
    /// The field's declared kind.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
}

impl SchemaField {
    /// Construct a required field.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Construct an optional field.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// How dangerous a capability is, informational for policy authors and UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Read-only, no side effects outside the process.
    Low,
    /// Mutates state but within a recoverable scope (workdir, memory).
    Medium,
    /// Mutates state outside easy recovery, or reaches external systems.
    High,
}

/// Per-turn resource limits for one capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CapabilityBudget {
    /// Maximum number of calls to this capability within one turn.
    pub calls_per_turn: u32,
    /// Maximum cumulative bytes read or written within one turn, if bounded.
    pub max_bytes: Option<u64>,
    /// Maximum cumulative result count (e.g. search hits) within one turn, if bounded.
    pub max_results: Option<u32>,
}

impl CapabilityBudget {
    /// A budget limited only by call count.
    #[must_use]
    pub fn calls_only(calls_per_turn: u32) -> Self {
        Self {
            calls_per_turn,
            max_bytes: None,
            max_results: None,
        }
    }
}

/// Permission and scoping rules the router enforces before dispatch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Path-bearing arguments must resolve strictly under the session's working directory.
    pub restrict_paths_to_workdir: bool,
    /// The session must have been explicitly granted this capability name.
    pub require_explicit_grant: bool,
    /// The capability is refused outright while `replay_mode == Replay`.
    pub deny_in_replay: bool,
    /// The handler is expected to alter filesystem, DB, or external state.
    pub mutates: bool,
    /// A mutation this capability makes cannot be undone by planner rollback
    /// (e.g. memory-store writes). Only meaningful when `mutates` is set.
    pub irreversible: bool,
}

/// Static description of one callable capability (spec §3 "Capability spec").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    /// Unique capability name, as referenced by `tool_call.payload.tool`.
    pub name: String,
    /// Ordered argument schema; no field outside this list is accepted.
    pub schema: Vec<SchemaField>,
    /// Declared risk level, informational.
    pub risk: RiskLevel,
    /// Per-turn resource limits.
    pub budget: CapabilityBudget,
    /// Permission and scoping rules.
    pub permission: PermissionRule,
}

impl CapabilitySpec {
    /// Look up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.schema.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_kind_matches_checks_json_shape() {
        assert!(FieldKind::Str.matches(&json!("x")));
        assert!(!FieldKind::Str.matches(&json!(1)));
        assert!(FieldKind::Int.matches(&json!(1)));
        assert!(FieldKind::Any.matches(&json!(null)));
    }

    #[test]
    fn capability_spec_field_lookup() {
        let spec = CapabilitySpec {
            name: "read_file".into(),
            schema: vec![SchemaField::required("path", FieldKind::Str)],
            risk: RiskLevel::Low,
            budget: CapabilityBudget::calls_only(20),
            permission: PermissionRule {
                restrict_paths_to_workdir: true,
                ..Default::default()
            },
        };
        assert!(spec.field("path").is_some());
        assert!(spec.field("missing").is_none());
    }

    #[test]
    fn risk_level_orders_low_to_high() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
    }
}
