//! The long-lived session type (spec §4.M), grounded in
//! `controller/session_runner.py`'s `Session`/`SessionConfig`/`StepResult`.
//!
//! Two entry points sit on top of the same bundled state: [`Session::step`]
//! runs one ordinary chat turn through `kernel-turn`, while
//! [`Session::run_goal`] drives `kernel-planner` directly for an explicit
//! multi-step goal — mirroring the original's split between
//! `session_runner.py` (chat) and `runner.py`/`learner_bridge.py`
//! (autonomous plan execution with bandit-learned strategy selection).

use std::sync::Arc;

use kernel_bandit::{ArmCatalog, MultiArmLearner};
use kernel_context::{ChatTurn, MemoryStore};
use kernel_exec::{register_exec_capabilities, DockerExecBackend, HostExecBackend};
use kernel_ledger::AppendOnlyLedger;
use kernel_planner::{execute_plan, generate_plan, reward_from_plan_result, select_strategy, PlanResult, RollbackOptions};
use kernel_reasoner::Reasoner;
use kernel_registry::{families::register_builtins, CapabilityRegistry, RouterMetrics};
use kernel_replay::ToolReplayStore;
use kernel_turn::{run_turn, TurnConfig, TurnInput};
use kernel_types::{
    Arm, ArmKey, Category, ContextKey, ExecutionContext, GateDecision, ProposedAction,
    SessionId, Strategy,
};
use kernel_types::{ActionKind, WorldSnapshot};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;

fn short_id() -> String {
    Uuid::new_v4().simple().to_string().chars().take(8).collect()
}

/// What a single [`Session::step`] call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// The assistant's reply for this turn.
    pub reply: String,
    /// Reasoner rounds actually taken.
    pub steps_taken: u32,
    /// Actions the reasoner proposed across every round of this turn.
    pub actions_proposed: u32,
    /// Actions the gate allowed.
    pub actions_allowed: u32,
    /// Actions the gate denied.
    pub actions_denied: u32,
    /// Tool calls served from the replay store instead of a live dispatch.
    pub actions_replayed: u32,
}

/// Introspection snapshot returned by [`Session::get_state`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionState {
    /// This session's id.
    pub session_id: String,
    /// Number of `step`/`run_goal` calls made so far.
    pub step_count: u32,
    /// Number of turns currently in history.
    pub history_length: usize,
    /// Capabilities explicitly granted via [`Session::grant_tool`] or
    /// [`crate::SessionConfig::auto_grant_tools`].
    pub granted_tools: Vec<String>,
    /// Host path the session's filesystem capabilities are scoped to.
    pub working_directory: String,
}

/// One tool's metadata as surfaced by [`Session::list_tools`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolInfo {
    /// The capability's registered name.
    pub name: String,
    /// `"low"`, `"medium"`, or `"high"`.
    pub risk: String,
    /// Whether this capability must be explicitly granted before use.
    pub requires_grant: bool,
    /// Whether this session has currently granted it.
    pub granted: bool,
}

/// A long-lived agent session: one capability registry, one ledger, one
/// conversation history, and (optionally) one memory store, tool-replay
/// store, and bandit learner, reused across every `step`/`run_goal` call.
///
/// Construction wires the whole stack together once; every call after that
/// only borrows pieces of it, matching `kernel-turn`'s borrowed-`TurnInput`
/// convention.
pub struct Session {
    /// This session's id.
    pub id: SessionId,
    config: SessionConfig,
    world: WorldSnapshot,
    registry: CapabilityRegistry,
    metrics: RouterMetrics,
    exec_ctx: ExecutionContext,
    ledger: AppendOnlyLedger,
    history: Vec<ChatTurn>,
    memory: Option<MemoryStore>,
    tool_replay: Option<ToolReplayStore>,
    reasoner: Arc<dyn Reasoner>,
    turn_cfg: TurnConfig,
    learner: Option<MultiArmLearner>,
    step_count: u32,
}

impl Session {
    /// Build a session from `config`, wiring the capability registry
    /// (filesystem/memory/network/code-intel built-ins plus `sandboxed_exec`
    /// and, in dev mode, `host_exec`), the ledger, and — if
    /// `config.outcomes_db_path` is set — the bandit learner.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the ledger, memory store, tool-replay
    /// store, or outcome store cannot be opened.
    pub fn new(config: SessionConfig, reasoner: Arc<dyn Reasoner>) -> Result<Self, SessionError> {
        let id = SessionId::new(short_id());

        let mut registry = CapabilityRegistry::new();
        register_builtins(&mut registry, config.memory_db_path.clone());
        let host_backend: Option<Arc<dyn kernel_exec::ExecBackend>> =
            if config.dev_mode { Some(Arc::new(HostExecBackend::new())) } else { None };
        register_exec_capabilities(&mut registry, Arc::new(DockerExecBackend::new()), host_backend);

        let mut exec_ctx = ExecutionContext::new(config.working_directory.clone());
        exec_ctx.replay_mode = config.replay_mode;
        exec_ctx.memory_db_path = config.memory_db_path.clone();
        for tool in &config.auto_grant_tools {
            exec_ctx.granted.insert(tool.clone());
        }

        let enabled_tools: Vec<String> = registry.iter().map(|e| e.spec.name.clone()).collect();
        let mut world = WorldSnapshot::new(id.as_str(), kernel_crypto_hash(&enabled_tools));
        world.enabled_tools = enabled_tools;
        world.permissions = exec_ctx.granted.clone();

        let ledger = AppendOnlyLedger::new(config.ledger_path.as_str())?;

        let memory = match &config.memory_db_path {
            Some(path) => Some(MemoryStore::open(path)?),
            None => None,
        };

        let tool_replay = config
            .tool_replay_path
            .as_ref()
            .map(|path| ToolReplayStore::new(path.as_str(), config.replay_mode));

        let learner = match &config.outcomes_db_path {
            Some(path) => {
                let store = kernel_bandit::OutcomeStore::open(path)?;
                Some(MultiArmLearner::new(store, config.bandit_algorithm))
            }
            None => None,
        };

        let turn_cfg = TurnConfig {
            system_prompt: if config.system_prompt.is_empty() {
                kernel_turn::DEFAULT_SYSTEM_PROMPT.to_string()
            } else {
                config.system_prompt.clone()
            },
            default_model: config.default_model.clone(),
            max_steps: config.max_steps,
            context: kernel_context::ContextConfig::default(),
        };

        Ok(Self {
            id,
            config,
            world,
            registry,
            metrics: RouterMetrics::new(),
            exec_ctx,
            ledger,
            history: Vec::new(),
            memory,
            tool_replay,
            reasoner,
            turn_cfg,
            learner,
            step_count: 0,
        })
    }

    /// This session's working directory.
    #[must_use]
    pub fn working_directory(&self) -> &str {
        &self.exec_ctx.working_directory
    }

    /// The capability registry backing this session, for callers (e.g. the
    /// HTTP thin view) that need to dispatch a tool call outside a turn.
    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Router dispatch counters, for a `/metrics` endpoint.
    #[must_use]
    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    /// Mutable access to this session's execution context (grants, budget,
    /// replay mode), for callers that dispatch capabilities directly.
    pub fn exec_ctx_mut(&mut self) -> &mut ExecutionContext {
        &mut self.exec_ctx
    }

    /// Read-only access to this session's execution context.
    #[must_use]
    pub fn exec_ctx(&self) -> &ExecutionContext {
        &self.exec_ctx
    }

    /// This session's memory store, if one was configured.
    #[must_use]
    pub fn memory(&self) -> Option<&MemoryStore> {
        self.memory.as_ref()
    }

    /// This session's world snapshot (enabled tools, permissions, state
    /// hash), for callers that surface it directly (e.g. a `world` endpoint).
    #[must_use]
    pub fn world(&self) -> &WorldSnapshot {
        &self.world
    }

    /// This session's append-only ledger, for callers that need
    /// [`kernel_ledger::AppendOnlyLedger::verify`] directly.
    #[must_use]
    pub fn ledger(&self) -> &AppendOnlyLedger {
        &self.ledger
    }

    /// The path backing this session's tool-replay store, if replay is
    /// configured.
    #[must_use]
    pub fn tool_replay_path(&self) -> Option<&str> {
        self.config.tool_replay_path.as_deref()
    }

    /// This session's replay mode (`off`, `record`, or `replay`).
    #[must_use]
    pub fn replay_mode(&self) -> kernel_types::ReplayMode {
        self.exec_ctx.replay_mode
    }

    /// Switch this session's replay mode. Takes effect on the next
    /// capability dispatch; does not rewind or discard a half-written
    /// replay file.
    pub fn set_replay_mode(&mut self, mode: kernel_types::ReplayMode) {
        self.exec_ctx.replay_mode = mode;
        self.tool_replay = self.config.tool_replay_path.as_ref().map(|path| ToolReplayStore::new(path.as_str(), mode));
    }

    /// Run one ordinary chat turn through the turn loop (spec §4.L).
    ///
    /// The user's message is appended to history before the turn runs, so
    /// it is part of the context every subsequent turn — and this one's
    /// own later rounds, if the reasoner needs more than one — build from.
    pub async fn step(&mut self, user_text: &str) -> StepResult {
        self.step_with_emit(user_text, None).await
    }

    /// Like [`Session::step`], but forwards every internal turn event
    /// (`turn_start`, `proposal_parsed`, `deny`, `tool_call`, `turn_end`,
    /// ...) to `emit`. The HTTP thin view's WebSocket handler is the
    /// intended caller; tests that want to assert on intermediate steps
    /// are the other.
    pub async fn step_with_emit<'a>(
        &'a mut self,
        user_text: &'a str,
        emit: Option<&'a mut kernel_turn::EmitFn<'a>>,
    ) -> StepResult {
        self.step_count += 1;
        self.history.push(ChatTurn::new("user", user_text));

        let input = TurnInput {
            user_text,
            history: &mut self.history,
            world: &self.world,
            policy: &self.config.policy,
            ledger: Some(&self.ledger),
            exec_ctx: &mut self.exec_ctx,
            registry: &self.registry,
            metrics: &self.metrics,
            memory: self.memory.as_ref(),
            reasoner: self.reasoner.as_ref(),
            tool_replay: self.tool_replay.as_ref(),
            cfg: &self.turn_cfg,
            emit,
        };
        let result = run_turn(input).await;

        StepResult {
            reply: result.message,
            steps_taken: result.steps_taken,
            actions_proposed: result.actions_proposed,
            actions_allowed: result.actions_allowed,
            actions_denied: result.actions_denied,
            actions_replayed: result.actions_replayed,
        }
    }

    /// Generate and execute a plan for `goal` directly (spec §4.J/§4.C),
    /// bypassing the reasoner entirely.
    ///
    /// Strategy is resolved in priority order: `forced_strategy` if given,
    /// else the bandit learner's pick (when `outcomes_db_path` was
    /// configured) recorded against `reward_from_plan_result` once the plan
    /// finishes, else [`kernel_planner::select_strategy`]'s heuristic. This
    /// mirrors `controller/learner_bridge.py`'s `choose_plan_strategy` and
    /// `record_plan_outcome`.
    ///
    /// A ledger entry is appended for the plan's outcome regardless of
    /// which strategy source was used.
    pub async fn run_goal(&mut self, goal: &str, forced_strategy: Option<Strategy>) -> PlanResult {
        self.run_goal_with_emit(goal, forced_strategy, None).await
    }

    /// Like [`Session::run_goal`], but forwards every planner event
    /// (`planner_start`, `planner_step_start`, `planner_checkpoint`,
    /// `planner_end`, ...) to `emit`.
    pub async fn run_goal_with_emit(
        &mut self,
        goal: &str,
        forced_strategy: Option<Strategy>,
        mut emit: Option<&mut kernel_planner::EmitFn<'_>>,
    ) -> PlanResult {
        self.step_count += 1;

        let context_key = ContextKey::new(format!("session::{}", self.id));
        let (strategy, selection) = match (forced_strategy, &self.learner) {
            (Some(s), _) => (s, None),
            (None, Some(learner)) => {
                let catalog = plan_arm_catalog();
                match learner.select(&context_key, u64::from(self.step_count), &catalog) {
                    Ok(selection) => (strategy_from_arm(selection.get(Category::Plan)), Some(selection)),
                    Err(e) => {
                        tracing::warn!(error = %e, "bandit selection failed; falling back to the heuristic");
                        (select_strategy(goal), None)
                    }
                }
            }
            (None, None) => (select_strategy(goal), None),
        };

        let mut plan = generate_plan(goal, Some(&self.world), strategy);
        let rollback = if self.config.enable_plan_rollback {
            RollbackOptions::workdir_only()
        } else {
            RollbackOptions::disabled()
        };

        let result = execute_plan(
            &mut plan,
            &self.registry,
            &self.metrics,
            &mut self.exec_ctx,
            &self.world,
            &self.config.policy,
            &rollback,
            emit.take(),
        )
        .await;

        let reward = reward_from_plan_result(&result);
        if let (Some(learner), Some(selection)) = (&self.learner, &selection) {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
            if let Err(e) = learner.record(&ts, selection, reward, result.success) {
                tracing::warn!(error = %e, "failed to record plan outcome against the bandit learner");
            }
        }

        let action = ProposedAction::new(ActionKind::PatchPlan, serde_json::json!({"goal": goal}), "run_goal");
        let decision = if result.success { GateDecision::allow() } else { GateDecision::deny("deny:plan_failed") };
        if let Err(e) = self.ledger.append(
            &self.world,
            &action,
            &decision,
            Some(serde_json::json!({
                "strategy": format!("{strategy:?}"),
                "reward": reward,
                "total_steps": result.total_steps,
                "completed_steps": result.completed_steps,
                "failed_steps": result.failed_steps,
                "rolled_back": result.rolled_back,
            })),
        ) {
            tracing::error!(error = %e, "ledger append failed for plan outcome");
        }

        let summary = if result.success {
            format!("Completed '{goal}' ({}/{} steps)", result.completed_steps, result.total_steps)
        } else {
            format!("Failed '{goal}' after {}/{} steps", result.completed_steps, result.total_steps)
        };
        self.history.push(ChatTurn::new("tool", summary));

        result
    }

    /// Grant a capability without going through a gated action, recording
    /// nothing but the permission-state change itself.
    pub fn grant_tool(&mut self, tool: &str) {
        self.exec_ctx.grant(tool.to_string());
        self.world.permissions.insert(tool.to_string());
    }

    /// Revoke a previously granted capability.
    pub fn revoke_tool(&mut self, tool: &str) {
        self.exec_ctx.revoke(tool);
        self.world.permissions.remove(tool);
    }

    /// List every registered capability with its risk level, grant
    /// requirement, and whether this session currently has it granted.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry
            .iter()
            .map(|entry| ToolInfo {
                name: entry.spec.name.clone(),
                risk: format!("{:?}", entry.spec.risk).to_lowercase(),
                requires_grant: entry.spec.permission.require_explicit_grant,
                granted: self.exec_ctx.is_granted(&entry.spec.name),
            })
            .collect()
    }

    /// Clear conversation history and per-turn budget/grant counters. The
    /// ledger and any persisted outcomes are untouched — resetting a
    /// session forgets its conversation, not its audit trail.
    pub fn reset(&mut self) {
        self.history.clear();
        self.exec_ctx.budget.reset();
        self.step_count = 0;
    }

    /// A snapshot of this session's counters and grants.
    #[must_use]
    pub fn get_state(&self) -> SessionState {
        SessionState {
            session_id: self.id.to_string(),
            step_count: self.step_count,
            history_length: self.history.len(),
            granted_tools: self.exec_ctx.granted.iter().cloned().collect(),
            working_directory: self.exec_ctx.working_directory.clone(),
        }
    }

    /// Conversation history as plain `(role, content)` pairs, the shape
    /// [`crate::SessionStore`] persists.
    #[must_use]
    pub fn history_snapshot(&self) -> Vec<(String, String)> {
        self.history.iter().map(|t| (format!("{:?}", t.role).to_lowercase(), t.text.clone())).collect()
    }

    /// Dispatch a single capability call outside the turn loop, through the
    /// same router enforcement a reasoner-proposed action would go through.
    /// Used by the HTTP thin view's `tools/run` endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`kernel_types::DispatchError`] on schema, permission,
    /// budget, or scope failures.
    pub async fn dispatch_tool(
        &mut self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<kernel_registry::CapabilityOutcome, kernel_types::DispatchError> {
        kernel_registry::dispatch(&self.registry, &self.metrics, &mut self.exec_ctx, name, args).await
    }

    /// The last `n` ledger entries for this session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Ledger`] on a malformed ledger file.
    pub fn ledger_tail(&self, n: usize) -> Result<Vec<kernel_ledger::LedgerEntry>, SessionError> {
        Ok(self.ledger.read_tail(n)?)
    }
}

fn plan_arm_catalog() -> ArmCatalog {
    let mut catalog = ArmCatalog::new();
    catalog.insert(
        Category::Plan,
        vec![
            Arm::new(Category::Plan, "direct"),
            Arm::new(Category::Plan, "decompose"),
            Arm::new(Category::Plan, "search_first"),
            Arm::new(Category::Plan, "ask_user"),
        ],
    );
    catalog
}

fn strategy_from_arm(arm: Option<&ArmKey>) -> Strategy {
    match arm.map(ArmKey::as_str) {
        Some("plan::decompose") => Strategy::Decompose,
        Some("plan::search_first") => Strategy::SearchFirst,
        Some("plan::ask_user") => Strategy::AskUser,
        _ => Strategy::Direct,
    }
}

fn kernel_crypto_hash(enabled_tools: &[String]) -> String {
    kernel_crypto::sha256_of(&serde_json::json!({"enabled_tools": enabled_tools}))
        .unwrap_or_else(|_| kernel_crypto::GENESIS_HASH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_reasoner::ScriptedReasoner;
    use kernel_types::CompletionResponse;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path) -> SessionConfig {
        SessionConfig {
            policy: kernel_policy::Policy::permissive_dev(),
            working_directory: dir.to_string_lossy().to_string(),
            memory_db_path: None,
            ledger_path: dir.join("session.jsonl").to_string_lossy().to_string(),
            auto_grant_tools: Vec::new(),
            ..SessionConfig::default()
        }
    }

    fn scripted_reply(text: &str) -> Arc<dyn Reasoner> {
        Arc::new(ScriptedReasoner::with_responses(vec![CompletionResponse {
            content: serde_json::json!({"actions": [{
                "kind": "message_send",
                "payload": {"message": text},
                "justification": "answering directly",
            }]})
            .to_string(),
            model: "scripted".to_string(),
            usage: None,
        }]))
    }

    #[tokio::test]
    async fn step_runs_a_turn_and_records_the_reply() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("hello there")).unwrap();

        let result = session.step("hi").await;

        assert_eq!(result.reply, "hello there");
        assert_eq!(result.steps_taken, 1);
        assert_eq!(session.get_state().history_length, 2);
    }

    #[tokio::test]
    async fn step_with_emit_forwards_turn_events() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("hi")).unwrap();

        let mut events: Vec<String> = Vec::new();
        let mut sink = |name: &str, _payload: serde_json::Value| events.push(name.to_string());
        session.step_with_emit("hello", Some(&mut sink)).await;

        assert!(events.contains(&"turn_start".to_string()));
        assert!(events.contains(&"turn_end".to_string()));
    }

    #[tokio::test]
    async fn run_goal_with_emit_forwards_planner_events() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("unused")).unwrap();

        let mut events: Vec<String> = Vec::new();
        let mut sink = |name: &str, _payload: serde_json::Value| events.push(name.to_string());
        session.run_goal_with_emit("list the files here", Some(Strategy::Direct), Some(&mut sink)).await;

        assert!(events.contains(&"planner_start".to_string()));
        assert!(events.contains(&"planner_end".to_string()));
    }

    #[tokio::test]
    async fn grant_and_revoke_tool_round_trip_through_list_tools() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("ok")).unwrap();

        session.grant_tool("read_file");
        assert!(session.list_tools().iter().any(|t| t.name == "read_file" && t.granted));

        session.revoke_tool("read_file");
        assert!(session.list_tools().iter().any(|t| t.name == "read_file" && !t.granted));
    }

    #[tokio::test]
    async fn reset_clears_history_but_keeps_the_ledger() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("hi")).unwrap();
        session.step("hello").await;
        assert_eq!(session.get_state().history_length, 2);

        session.reset();

        assert_eq!(session.get_state().history_length, 0);
        assert_eq!(session.get_state().step_count, 0);
    }

    #[tokio::test]
    async fn run_goal_executes_a_plan_and_appends_a_ledger_entry() {
        let dir = tempdir().unwrap();
        let mut session = Session::new(config(dir.path()), scripted_reply("unused")).unwrap();

        let result = session.run_goal("list the files here", Some(Strategy::Direct)).await;

        assert!(result.total_steps > 0);
        let tail = session.ledger_tail(10).unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn strategy_from_arm_maps_every_arm_name() {
        assert_eq!(strategy_from_arm(Some(&ArmKey::new("plan::direct"))), Strategy::Direct);
        assert_eq!(strategy_from_arm(Some(&ArmKey::new("plan::decompose"))), Strategy::Decompose);
        assert_eq!(strategy_from_arm(Some(&ArmKey::new("plan::search_first"))), Strategy::SearchFirst);
        assert_eq!(strategy_from_arm(Some(&ArmKey::new("plan::ask_user"))), Strategy::AskUser);
        assert_eq!(strategy_from_arm(None), Strategy::Direct);
    }
}
