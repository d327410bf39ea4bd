//! Deterministic views of controllable state the gate and planner consume.
//!
//! Two flavors exist because the control plane is used both against a
//! working tree (repo flavor) and against a live chat session (session
//! flavor); the gate is generic over neither — each call site picks one.

use serde::{Deserialize, Serialize};

/// A deterministic view of a working tree (spec §3 "State snapshot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSnapshot {
    /// Identifies the repository this snapshot was taken from.
    pub repo_id: String,
    /// Content hash of the working tree at snapshot time.
    pub fs_tree_hash: String,
    /// Toolchain identifier (e.g. `"rustc 1.85"`), informational only.
    pub toolchain: String,
    /// Whether the last known test run passed.
    pub tests_passed: bool,
    /// Freeform metadata the caller wants carried through to the ledger.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// An immutable descriptor of session-level controllable state (spec §3
/// "World snapshot"). Consumed by the gate and the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// The session this snapshot belongs to.
    pub session_id: String,
    /// Content hash summarizing the session's current state.
    pub world_state_hash: String,
    /// Tool names currently enabled for this session, in declaration order.
    pub enabled_tools: Vec<String>,
    /// Capability names the session has been explicitly granted.
    pub permissions: std::collections::BTreeSet<String>,
    /// Whether the underlying system (repo, sandbox) is in a clean state.
    pub system_clean: bool,
    /// Freeform metadata the caller wants carried through to the ledger.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl WorldSnapshot {
    /// Construct a snapshot with no tools enabled and no permissions granted.
    pub fn new(session_id: impl Into<String>, world_state_hash: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            world_state_hash: world_state_hash.into(),
            enabled_tools: Vec::new(),
            permissions: std::collections::BTreeSet::new(),
            system_clean: true,
            metadata: serde_json::Value::Null,
        }
    }

    /// Whether `tool` is in `enabled_tools`.
    #[must_use]
    pub fn has_tool(&self, tool: &str) -> bool {
        self.enabled_tools.iter().any(|t| t == tool)
    }

    /// Whether `capability` has been explicitly granted.
    #[must_use]
    pub fn has_permission(&self, capability: &str) -> bool {
        self.permissions.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_starts_clean_with_no_tools_or_grants() {
        let snap = WorldSnapshot::new("sess-1", "hash-0");
        assert!(snap.system_clean);
        assert!(!snap.has_tool("list_dir"));
        assert!(!snap.has_permission("exec"));
    }

    #[test]
    fn has_tool_and_has_permission_reflect_contents() {
        let mut snap = WorldSnapshot::new("sess-1", "hash-0");
        snap.enabled_tools.push("list_dir".into());
        snap.permissions.insert("exec".into());
        assert!(snap.has_tool("list_dir"));
        assert!(snap.has_permission("exec"));
        assert!(!snap.has_permission("network"));
    }
}
