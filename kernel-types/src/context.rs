//! Per-turn execution context: replay mode and the budget/permission state
//! the router consults while dispatching one turn's actions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How the router should treat capability calls this turn (spec §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Dispatch to real handlers; no replay store involvement.
    Off,
    /// Dispatch to real handlers and record the call/result into the replay store.
    Record,
    /// Serve results from the replay store; live handlers are never invoked.
    Replay,
}

impl Default for ReplayMode {
    fn default() -> Self {
        ReplayMode::Off
    }
}

/// Accumulated spend against per-capability budgets for the current turn.
/// Reset at the start of every turn (spec §4.L step 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetUsage {
    calls: BTreeMap<String, u32>,
    bytes: BTreeMap<String, u64>,
    results: BTreeMap<String, u32>,
}

impl BudgetUsage {
    /// Calls already spent against `capability` this turn.
    #[must_use]
    pub fn calls_used(&self, capability: &str) -> u32 {
        self.calls.get(capability).copied().unwrap_or(0)
    }

    /// Bytes already spent against `capability` this turn.
    #[must_use]
    pub fn bytes_used(&self, capability: &str) -> u64 {
        self.bytes.get(capability).copied().unwrap_or(0)
    }

    /// Results already spent against `capability` this turn.
    #[must_use]
    pub fn results_used(&self, capability: &str) -> u32 {
        self.results.get(capability).copied().unwrap_or(0)
    }

    /// Record one more call against `capability`.
    pub fn charge_call(&mut self, capability: &str) {
        *self.calls.entry(capability.to_string()).or_insert(0) += 1;
    }

    /// Record `n` additional bytes spent against `capability`.
    pub fn charge_bytes(&mut self, capability: &str, n: u64) {
        *self.bytes.entry(capability.to_string()).or_insert(0) += n;
    }

    /// Record `n` additional results spent against `capability`.
    pub fn charge_results(&mut self, capability: &str, n: u32) {
        *self.results.entry(capability.to_string()).or_insert(0) += n;
    }

    /// Clear all spend, starting a fresh turn.
    pub fn reset(&mut self) {
        self.calls.clear();
        self.bytes.clear();
        self.results.clear();
    }
}

/// The mutable state the router and gate consult for one session, threaded
/// through a turn (spec §3 "Execution context").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Capability names explicitly granted to this session.
    pub granted: BTreeSet<String>,
    /// Current replay mode.
    pub replay_mode: ReplayMode,
    /// Per-turn budget spend, reset at the start of each turn.
    pub budget: BudgetUsage,
    /// Coarse flag gating the entire host-exec capability family, separate
    /// from per-capability grants (spec §4.G "coarse flags").
    pub host_exec_enabled: bool,
    /// Absolute path every path-restricted capability's arguments must
    /// resolve strictly under (router step 5).
    pub working_directory: String,
    /// Locator for this session's memory store, injected into every
    /// capability's kwargs alongside `working_directory` (router step 7).
    /// `None` means the session has no memory store configured.
    pub memory_db_path: Option<String>,
}

impl ExecutionContext {
    /// A fresh context rooted at `working_directory`: no grants, replay off,
    /// empty budget.
    #[must_use]
    pub fn new(working_directory: impl Into<String>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Whether `capability` has been explicitly granted.
    #[must_use]
    pub fn is_granted(&self, capability: &str) -> bool {
        self.granted.contains(capability)
    }

    /// Grant a capability.
    pub fn grant(&mut self, capability: impl Into<String>) {
        self.granted.insert(capability.into());
    }

    /// Revoke a previously granted capability.
    pub fn revoke(&mut self, capability: &str) {
        self.granted.remove(capability);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_usage_tracks_independent_counters_per_capability() {
        let mut usage = BudgetUsage::default();
        usage.charge_call("read_file");
        usage.charge_call("read_file");
        usage.charge_bytes("read_file", 1024);
        usage.charge_call("list_dir");
        assert_eq!(usage.calls_used("read_file"), 2);
        assert_eq!(usage.bytes_used("read_file"), 1024);
        assert_eq!(usage.calls_used("list_dir"), 1);
        assert_eq!(usage.calls_used("write_file"), 0);
    }

    #[test]
    fn reset_clears_all_counters() {
        let mut usage = BudgetUsage::default();
        usage.charge_call("read_file");
        usage.reset();
        assert_eq!(usage.calls_used("read_file"), 0);
    }

    #[test]
    fn grant_and_revoke_round_trip() {
        let mut ctx = ExecutionContext::new("/workdir");
        assert!(!ctx.is_granted("exec"));
        ctx.grant("exec");
        assert!(ctx.is_granted("exec"));
        ctx.revoke("exec");
        assert!(!ctx.is_granted("exec"));
    }

    #[test]
    fn default_replay_mode_is_off() {
        assert_eq!(ReplayMode::default(), ReplayMode::Off);
    }
}
