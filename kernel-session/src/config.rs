//! Everything a new [`crate::Session`] needs decided up front (spec §4.M,
//! grounded in `controller/session_runner.py`'s `SessionConfig`).

use kernel_bandit::BanditAlgorithm;
use kernel_policy::Policy;
use kernel_types::ReplayMode;

/// Construction-time configuration for a [`crate::Session`].
///
/// Mirrors the original's `SessionConfig` dataclass field-for-field
/// (`policy`, `working_directory`, `memory_db_path`, `ledger_path`,
/// `auto_grant_tools`) plus the knobs this workspace's replay/bandit/exec
/// stack adds.
pub struct SessionConfig {
    /// The policy every gated action in this session is checked against.
    pub policy: Policy,
    /// Host path the session's filesystem capabilities are scoped to.
    pub working_directory: String,
    /// Where the session's key/value memory store lives. `None` disables
    /// `memory_write`/`memory_search`/`memory_get` and context recall.
    pub memory_db_path: Option<String>,
    /// Where this session's append-only ledger is written.
    pub ledger_path: String,
    /// Capabilities granted at construction time without a separate
    /// `grant_tool` call, e.g. for tests and scripted demos.
    pub auto_grant_tools: Vec<String>,
    /// Tool-call and reasoner replay mode for the whole session.
    pub replay_mode: ReplayMode,
    /// Where tool-call replay records are stored. Required when
    /// `replay_mode != Off`.
    pub tool_replay_path: Option<String>,
    /// Enables `host_exec` (direct subprocess, no container) alongside
    /// `sandboxed_exec`. Mirrors `RFSN_DEV_MODE`; leave `false` in
    /// anything but local development.
    pub dev_mode: bool,
    /// Git/SQLite rollback around mutating plan steps, passed straight to
    /// [`kernel_planner::execute_plan`].
    pub enable_plan_rollback: bool,
    /// System prompt override for the turn loop. Empty defers to
    /// [`kernel_turn::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: String,
    /// Reasoner model override. Empty defers to the reasoner's own default.
    pub default_model: String,
    /// Reasoner rounds per `step()` call before giving up.
    pub max_steps: u32,
    /// Where the bandit learner's outcome history lives. `None` disables
    /// learned strategy selection — [`crate::Session::run_goal`] falls
    /// back to [`kernel_planner::select_strategy`]'s heuristic.
    pub outcomes_db_path: Option<String>,
    /// Selection algorithm the bandit learner uses, when enabled.
    pub bandit_algorithm: BanditAlgorithm,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            policy: Policy::restrictive_default(),
            working_directory: "./".to_string(),
            memory_db_path: Some("agent_memory.db".to_string()),
            ledger_path: "session.jsonl".to_string(),
            auto_grant_tools: Vec::new(),
            replay_mode: ReplayMode::Off,
            tool_replay_path: None,
            dev_mode: false,
            enable_plan_rollback: true,
            system_prompt: String::new(),
            default_model: String::new(),
            max_steps: 6,
            outcomes_db_path: None,
            bandit_algorithm: BanditAlgorithm::Thompson,
        }
    }
}
