//! The proposal→gate→execute→ledger loop (spec §4.L), run once per user
//! message.

use kernel_context::{build_context, ChatTurn};
use kernel_ledger::AppendOnlyLedger;
use kernel_policy::{gate, Policy};
use kernel_reasoner::{parse_actions, Reasoner};
use kernel_registry::{dispatch, CapabilityRegistry, RouterMetrics};
use kernel_replay::{action_id, ToolReplayStore};
use kernel_types::{
    ActionKind, CompletionRequest, ExecutionContext, GateDecision, ProposedAction, ReplayMode,
    ToolReplayRecord, WorldSnapshot,
};
use serde_json::json;

use crate::config::TurnConfig;
use crate::prompts::user_prompt;
use crate::result::TurnResult;

/// A caller-supplied sink for internal turn events (UI WebSocket, tests).
/// Observing never changes the turn's outcome — an observer that panics or
/// errors is the caller's problem, not this loop's.
pub type EmitFn<'a> = dyn FnMut(&str, serde_json::Value) + Send + 'a;

/// Everything one call to [`run_turn`] needs. Borrowed, not owned, so the
/// caller (a session) keeps its history, ledger, and execution context
/// across turns.
pub struct TurnInput<'a> {
    /// The user's message for this turn.
    pub user_text: &'a str,
    /// Conversation history, mutated in place as the turn proceeds.
    pub history: &'a mut Vec<ChatTurn>,
    /// The session's world view, consulted by the gate.
    pub world: &'a WorldSnapshot,
    /// The policy the gate evaluates actions under.
    pub policy: &'a Policy,
    /// Append-only audit log. `None` disables ledger writes (tests only).
    pub ledger: Option<&'a AppendOnlyLedger>,
    /// Per-turn budgets and grants, reset at the start of this call.
    pub exec_ctx: &'a mut ExecutionContext,
    /// The capability registry the router dispatches through.
    pub registry: &'a CapabilityRegistry,
    /// Router decision counters.
    pub metrics: &'a RouterMetrics,
    /// Session memory store for `memory_write` and recall. `None` disables both.
    pub memory: Option<&'a kernel_context::MemoryStore>,
    /// The reasoner this turn asks for completions.
    pub reasoner: &'a dyn Reasoner,
    /// Tool-call replay store, consulted/written per `exec_ctx.replay_mode`.
    pub tool_replay: Option<&'a ToolReplayStore>,
    /// Static turn defaults.
    pub cfg: &'a TurnConfig,
    /// Optional event sink.
    pub emit: Option<&'a mut EmitFn<'a>>,
}

fn emit(input: &mut TurnInput<'_>, event: &str, payload: serde_json::Value) {
    if let Some(sink) = input.emit.as_mut() {
        sink(event, payload);
    }
}

fn append_ledger(input: &TurnInput<'_>, action: &ProposedAction, decision: &GateDecision, extra: Option<serde_json::Value>) {
    let Some(ledger) = input.ledger else { return };
    if let Err(e) = ledger.append(input.world, action, decision, extra) {
        tracing::error!(error = %e, "ledger append failed");
    }
}

fn with_auto_justification(action: ProposedAction) -> ProposedAction {
    if !action.justification.trim().is_empty() {
        return action;
    }
    let justification = format!("Auto: {:?}", action.kind);
    ProposedAction { justification, ..action }
}

/// Run one user turn to completion: reset budgets, loop reasoner rounds
/// until a reply is produced or `cfg.max_steps` is exhausted.
pub async fn run_turn(mut input: TurnInput<'_>) -> TurnResult {
    input.exec_ctx.budget.reset();
    let turn_start_payload = json!({"user_text": input.user_text});
    emit(&mut input, "turn_start", turn_start_payload);

    let mut actions_proposed = 0u32;
    let mut actions_allowed = 0u32;
    let mut actions_denied = 0u32;
    let mut actions_replayed = 0u32;
    let mut final_message: Option<String> = None;
    let mut steps_taken = 0u32;

    for step in 0..input.cfg.max_steps {
        steps_taken = step + 1;

        let context_block = build_context(input.history, input.user_text, input.memory, &input.cfg.context);
        let prompt = user_prompt(input.user_text, &context_block);
        let mut request = CompletionRequest::new(input.cfg.system_prompt.clone(), prompt);
        if !input.cfg.default_model.is_empty() {
            request = request.with_model(input.cfg.default_model.clone());
        }

        let response = match input.reasoner.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                let action = ProposedAction::new(ActionKind::ToolCall, json!({"error": "llm_call"}), "LLM call failed");
                append_ledger(&input, &action, &GateDecision::deny(format!("error:llm_call:{e}")), None);
                return TurnResult {
                    message: format!("LLM call failed: {e}"),
                    steps_taken,
                    actions_proposed,
                    actions_allowed,
                    actions_denied,
                    actions_replayed,
                };
            }
        };

        let raw_head: String = response.content.chars().take(1000).collect();
        emit(&mut input, "llm_raw", json!({"step": step, "raw_head": raw_head}));

        let actions = match parse_actions(&response.content) {
            Ok(actions) if !actions.is_empty() => actions,
            Ok(_) | Err(_) => {
                let action = ProposedAction::new(
                    ActionKind::MessageSend,
                    json!({"message": "LLM_JSON_PARSE_ERROR"}),
                    "Parse failed",
                );
                append_ledger(&input, &action, &GateDecision::deny("deny:llm_json_parse_error"), None);
                return TurnResult {
                    message: "I couldn't parse the model output. Try a simpler request.".to_string(),
                    steps_taken,
                    actions_proposed,
                    actions_allowed,
                    actions_denied,
                    actions_replayed,
                };
            }
        };

        emit(&mut input, "proposal_parsed", json!({"step": step, "num_actions": actions.len()}));

        for action in actions {
            actions_proposed += 1;
            let action = with_auto_justification(action);

            if action.kind == ActionKind::ToolCall {
                let known = action.tool_name().is_some_and(|t| input.registry.contains(t));
                if !known {
                    let error = "tool_args_invalid: unknown tool";
                    emit(&mut input, "deny", json!({"step": step, "reason": error}));
                    append_ledger(&input, &action, &GateDecision::deny("deny:tool_args_invalid"), Some(json!({"error": error, "step": step})));
                    input.history.push(ChatTurn::new("tool", error));
                    actions_denied += 1;
                    continue;
                }
            }

            let decision = gate(input.world, &action, input.policy);
            emit(
                &mut input,
                "gate_decision",
                json!({"step": step, "allowed": decision.allow, "reason": decision.reason}),
            );
            append_ledger(&input, &action, &decision, Some(json!({"step": step})));

            if !decision.allow {
                actions_denied += 1;
                input.history.push(ChatTurn::new("tool", format!("tool_args_invalid: {}", decision.reason)));
                continue;
            }
            actions_allowed += 1;

            let effective = decision.effective_action(&action).clone();
            match effective.kind {
                ActionKind::MessageSend => {
                    let msg = effective.payload.get("message").and_then(serde_json::Value::as_str).unwrap_or_default().to_string();
                    input.history.push(ChatTurn::new("assistant", msg.clone()));
                    final_message = Some(msg);
                }
                ActionKind::PermissionRequest => {
                    let request = effective.payload.get("request").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let why = effective.payload.get("why").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let msg = format!("I need permission: {request}\n\nReason: {why}");
                    input.history.push(ChatTurn::new("assistant", msg.clone()));
                    final_message = Some(msg);
                }
                ActionKind::MemoryWrite => {
                    let key = effective.payload.get("key").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let value = effective.payload.get("value").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let tags: Vec<String> = effective
                        .payload
                        .get("tags")
                        .and_then(serde_json::Value::as_array)
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    match input.memory {
                        Some(store) => {
                            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
                            match store.store(key, value, &tags, &ts) {
                                Ok(()) => input.history.push(ChatTurn::new("tool", format!("memory_write: stored '{key}'"))),
                                Err(e) => input.history.push(ChatTurn::new("tool", format!("memory_write: ERROR - {e}"))),
                            }
                        }
                        None => input.history.push(ChatTurn::new("tool", "memory_write: no memory store available")),
                    }
                }
                ActionKind::ToolCall => {
                    actions_replayed += run_tool_call(&mut input, step, &effective).await;
                }
                ActionKind::PatchPlan | ActionKind::Patch | ActionKind::Command => {
                    // Multi-step plans and raw patches/commands are the
                    // planner's domain; the gate decision above is already
                    // on the ledger, so there's nothing further to execute
                    // or record here.
                    input.history.push(ChatTurn::new("tool", format!("{:?}: deferred to planner", effective.kind)));
                }
                _ => unreachable!("ActionKind is non_exhaustive but all current variants are handled above"),
            }
        }

        if final_message.is_some() {
            break;
        }
    }

    emit(&mut input, "turn_end", json!({"final_message": final_message}));

    TurnResult {
        message: final_message.unwrap_or_else(|| "I couldn't complete that request. Try asking for something specific.".to_string()),
        steps_taken,
        actions_proposed,
        actions_allowed,
        actions_denied,
        actions_replayed,
    }
}

/// Execute an allowed `tool_call`, handling replay short-circuit and
/// record-on-success. Returns `1` if served from replay, else `0`.
async fn run_tool_call(input: &mut TurnInput<'_>, step: u32, action: &ProposedAction) -> u32 {
    let tool = action.tool_name().unwrap_or_default().to_string();
    let args = action.tool_args();

    if input.exec_ctx.replay_mode == ReplayMode::Replay {
        if let Some(store) = input.tool_replay {
            if let Ok(aid) = action_id(&tool, &args) {
                if let Ok(Some(rec)) = store.get(&aid) {
                    let summary = rec.result.to_string();
                    append_ledger(
                        input,
                        action,
                        &GateDecision::allow(),
                        Some(json!({"info": "tool_result_replay", "summary": summary, "step": step})),
                    );
                    input.history.push(ChatTurn::new("tool", format!("{tool} (replay): {summary}")));
                    return 1;
                }
            }
        }
    }

    emit(input, "tool_call", json!({"step": step, "tool": tool, "arguments": args}));

    let outcome = dispatch(input.registry, input.metrics, input.exec_ctx, &tool, args.clone()).await;
    let (ok, summary) = match &outcome {
        Ok(o) => (o.success, if o.success { o.output.to_string() } else { format!("ERROR: {}", o.error.clone().unwrap_or_default()) }),
        Err(e) => (false, format!("ERROR: {e}")),
    };

    if let (Ok(outcome), Some(store)) = (&outcome, input.tool_replay) {
        if input.exec_ctx.replay_mode == ReplayMode::Record {
            if let Ok(aid) = action_id(&tool, &args) {
                let record = ToolReplayRecord { action_id: aid, tool: tool.clone(), args: args.clone(), result: outcome.output.clone() };
                if let Err(e) = store.put(&record) {
                    tracing::warn!(error = %e, tool = %tool, "failed to record tool replay entry");
                }
            }
        }
    }

    let decision = if ok { GateDecision::allow() } else { GateDecision::deny("deny:tool_failed") };
    append_ledger(input, action, &decision, Some(json!({"info": "tool_result", "ok": ok, "summary": summary, "step": step})));
    let truncated: String = summary.chars().take(200).collect();
    input.history.push(ChatTurn::new("tool", format!("{tool}: {truncated}")));
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_policy::Policy;
    use kernel_reasoner::ScriptedReasoner;
    use kernel_registry::CapabilityRegistry;
    use kernel_types::SessionId;

    fn world() -> WorldSnapshot {
        WorldSnapshot::new(SessionId::new("s1").to_string(), "hash-0")
    }

    #[tokio::test]
    async fn message_send_terminates_the_turn_on_the_first_round() {
        let reasoner = ScriptedReasoner::new();
        let registry = CapabilityRegistry::new();
        let metrics = RouterMetrics::new();
        let policy = Policy::permissive_dev();
        let world = world();
        let mut exec_ctx = ExecutionContext::new("/work");
        let mut history = Vec::new();
        let cfg = TurnConfig::default();

        let result = run_turn(TurnInput {
            user_text: "how are you",
            history: &mut history,
            world: &world,
            policy: &policy,
            ledger: None,
            exec_ctx: &mut exec_ctx,
            registry: &registry,
            metrics: &metrics,
            memory: None,
            reasoner: &reasoner,
            tool_replay: None,
            cfg: &cfg,
            emit: None,
        })
        .await;

        assert_eq!(result.steps_taken, 1);
        assert_eq!(result.actions_proposed, 1);
        assert_eq!(result.actions_allowed, 1);
        assert!(!result.message.is_empty());
    }

    #[tokio::test]
    async fn empty_reasoner_response_yields_a_generic_parse_failure_message() {
        let reasoner = ScriptedReasoner::with_responses(vec![kernel_types::CompletionResponse {
            content: String::new(),
            model: "scripted".to_string(),
            usage: None,
        }]);
        let registry = CapabilityRegistry::new();
        let metrics = RouterMetrics::new();
        let policy = Policy::permissive_dev();
        let world = world();
        let mut exec_ctx = ExecutionContext::new("/work");
        let mut history = Vec::new();
        let cfg = TurnConfig::default();

        let result = run_turn(TurnInput {
            user_text: "hi",
            history: &mut history,
            world: &world,
            policy: &policy,
            ledger: None,
            exec_ctx: &mut exec_ctx,
            registry: &registry,
            metrics: &metrics,
            memory: None,
            reasoner: &reasoner,
            tool_replay: None,
            cfg: &cfg,
            emit: None,
        })
        .await;

        assert!(result.message.contains("couldn't parse"));
    }

    #[tokio::test]
    async fn unknown_tool_is_denied_before_the_gate_and_recorded_as_feedback() {
        let reasoner = ScriptedReasoner::with_responses(vec![kernel_types::CompletionResponse {
            content: json!({"actions": [{
                "kind": "tool_call",
                "payload": {"tool": "does_not_exist", "args": {}},
                "justification": "try something",
            }]}).to_string(),
            model: "scripted".to_string(),
            usage: None,
        }]);
        let registry = CapabilityRegistry::new();
        let metrics = RouterMetrics::new();
        let policy = Policy::permissive_dev();
        let world = world();
        let mut exec_ctx = ExecutionContext::new("/work");
        let mut history = Vec::new();
        let mut cfg = TurnConfig::default();
        cfg.max_steps = 1;

        let result = run_turn(TurnInput {
            user_text: "hi",
            history: &mut history,
            world: &world,
            policy: &policy,
            ledger: None,
            exec_ctx: &mut exec_ctx,
            registry: &registry,
            metrics: &metrics,
            memory: None,
            reasoner: &reasoner,
            tool_replay: None,
            cfg: &cfg,
            emit: None,
        })
        .await;

        assert_eq!(result.actions_denied, 1);
        assert!(history.iter().any(|t| t.text.contains("tool_args_invalid")));
    }
}
