//! Request/response handlers for the REST surface (spec §6), grounded in
//! `ui/server.py`'s endpoint list and generalized from its single global
//! `ExecutionContext`/ledger to one pair per session id in the URL path.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kernel_types::{ReplayMode, Strategy};

use crate::error::ApiError;
use crate::ratelimit::RateLimiter;
use crate::state::AppState;

/// Shared handler state: the session table plus the tools/run limiter.
pub struct Server {
    /// Live session table.
    pub app: AppState,
    /// Sliding-window limiter guarding `tools/run` (spec §5 "Backpressure").
    pub tool_limiter: RateLimiter,
}

/// What every handler's `State` extractor actually holds.
pub type SharedServer = Arc<Server>;

/// Body of `POST /sessions/:id/chat`.
#[derive(Deserialize)]
pub struct ChatRequest {
    /// The user's message for this turn.
    pub text: String,
}

/// Response body of `POST /sessions/:id/chat`, mirroring [`kernel_session::StepResult`].
#[derive(Serialize)]
pub struct ChatResponse {
    /// The assistant's reply.
    pub reply: String,
    /// Reasoner rounds taken this turn.
    pub steps_taken: u32,
    /// Actions the reasoner proposed.
    pub actions_proposed: u32,
    /// Actions the gate allowed.
    pub actions_allowed: u32,
    /// Actions the gate denied.
    pub actions_denied: u32,
    /// Tool calls served from the replay store.
    pub actions_replayed: u32,
}

/// `POST /sessions/:id/chat`: run one chat turn, creating the session if needed.
pub async fn chat(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    let result = session.step(&req.text).await;
    Ok(Json(ChatResponse {
        reply: result.reply,
        steps_taken: result.steps_taken,
        actions_proposed: result.actions_proposed,
        actions_allowed: result.actions_allowed,
        actions_denied: result.actions_denied,
        actions_replayed: result.actions_replayed,
    }))
}

/// Body of `POST /sessions/:id/goal`.
#[derive(Deserialize)]
pub struct GoalRequest {
    /// The goal to plan and execute.
    pub goal: String,
    /// `"direct"`, `"decompose"`, `"search_first"`, or `"ask_user"`; absent
    /// defers to the session's bandit learner or heuristic fallback.
    pub strategy: Option<String>,
}

fn parse_strategy(raw: &str) -> Option<Strategy> {
    match raw {
        "direct" => Some(Strategy::Direct),
        "decompose" => Some(Strategy::Decompose),
        "search_first" => Some(Strategy::SearchFirst),
        "ask_user" => Some(Strategy::AskUser),
        _ => None,
    }
}

/// `POST /sessions/:id/goal`: generate and execute a plan, bypassing the reasoner.
pub async fn run_goal(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<GoalRequest>,
) -> Result<Json<Value>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    let forced = req.strategy.as_deref().and_then(parse_strategy);
    let result = session.run_goal(&req.goal, forced).await;
    Ok(Json(serde_json::json!({
        "success": result.success,
        "total_steps": result.total_steps,
        "completed_steps": result.completed_steps,
        "failed_steps": result.failed_steps,
        "rolled_back": result.rolled_back,
        "last_error": result.error,
    })))
}

/// `GET /sessions`: ids of every session this process currently holds in memory.
pub async fn list_sessions(State(server): State<SharedServer>) -> Json<Vec<String>> {
    Json(server.app.session_ids().await)
}

/// `GET /sessions/:id`: one session's counters and grants.
pub async fn get_session(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<kernel_session::SessionState>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(session.get_state()))
}

/// `DELETE /sessions/:id`: drop a session from memory (its ledger survives on disk).
pub async fn delete_session(State(server): State<SharedServer>, Path(session_id): Path<String>) -> Json<Value> {
    let removed = server.app.remove_session(&session_id).await;
    Json(serde_json::json!({"removed": removed}))
}

/// Query params of `GET /sessions/:id/ledger`.
#[derive(Deserialize)]
pub struct TailQuery {
    /// How many trailing entries to return.
    #[serde(default = "default_tail")]
    pub n: usize,
}

fn default_tail() -> usize {
    50
}

/// `GET /sessions/:id/ledger`: the last `n` entries, most recent last.
pub async fn ledger_tail(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Query(q): Query<TailQuery>,
) -> Result<Json<Vec<kernel_ledger::LedgerEntry>>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(session.ledger_tail(q.n)?))
}

/// `GET /sessions/:id/ledger/verify`: re-check the ledger's hash chain end to end.
pub async fn ledger_verify(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    match session.ledger().verify() {
        Ok(()) => Ok(Json(serde_json::json!({"valid": true}))),
        Err(e) => Ok(Json(serde_json::json!({"valid": false, "error": e.to_string()}))),
    }
}

/// `GET /sessions/:id/tools`: every registered capability and its grant state.
pub async fn list_tools(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<kernel_session::ToolInfo>>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(session.list_tools()))
}

/// Body of `POST /sessions/:id/tools/run`.
#[derive(Deserialize)]
pub struct RunToolRequest {
    /// The capability's registered name.
    pub name: String,
    /// Arguments passed straight through to the router.
    #[serde(default)]
    pub args: Value,
}

/// `POST /sessions/:id/tools/run`: dispatch one capability outside a turn,
/// rate-limited per session id (spec §5 "Backpressure").
pub async fn run_tool(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<RunToolRequest>,
) -> Result<Json<kernel_registry::CapabilityOutcome>, ApiError> {
    if !server.tool_limiter.allow(&session_id).await {
        return Err(ApiError::BadRequest("rate limit exceeded for tools/run".to_string()));
    }
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    Ok(Json(session.dispatch_tool(&req.name, req.args).await?))
}

/// Body of the permission grant/revoke endpoints.
#[derive(Deserialize)]
pub struct ToolNameRequest {
    /// The capability to grant or revoke.
    pub tool: String,
}

/// `POST /sessions/:id/permissions/grant`.
pub async fn grant_permission(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<ToolNameRequest>,
) -> Result<Json<Value>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    session.grant_tool(&req.tool);
    Ok(Json(serde_json::json!({"granted": req.tool})))
}

/// `POST /sessions/:id/permissions/revoke`.
pub async fn revoke_permission(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<ToolNameRequest>,
) -> Result<Json<Value>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    session.revoke_tool(&req.tool);
    Ok(Json(serde_json::json!({"revoked": req.tool})))
}

/// Query params of `GET /sessions/:id/memory/search`.
#[derive(Deserialize)]
pub struct MemorySearchQuery {
    /// The search text.
    pub q: String,
    /// Maximum number of hits to return.
    #[serde(default = "default_memory_limit")]
    pub limit: u32,
}

fn default_memory_limit() -> u32 {
    10
}

/// `GET /sessions/:id/memory/search`: recall matching keys. Returns no hits
/// if the session has no memory store configured.
pub async fn memory_search(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Query(q): Query<MemorySearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let Some(memory) = session.memory() else { return Ok(Json(serde_json::json!({"hits": []}))) };
    let hits = memory.search(&q.q, q.limit).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(serde_json::json!({"hits": hits})))
}

/// `GET /sessions/:id/memory/:key`: fetch one memory entry by exact key.
pub async fn memory_get(
    State(server): State<SharedServer>,
    Path((session_id, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let Some(memory) = session.memory() else { return Ok(Json(Value::Null)) };
    let record = memory.get(&key).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(serde_json::to_value(record).unwrap_or(Value::Null)))
}

/// Query params of the filesystem endpoints.
#[derive(Deserialize)]
pub struct PathQuery {
    /// Path relative to the session's working directory.
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    ".".to_string()
}

/// `GET /sessions/:id/fs`: list a directory, scoped to the session's
/// working directory via the same router enforcement `list_dir` always
/// goes through.
pub async fn fs_list(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Query(q): Query<PathQuery>,
) -> Result<Json<kernel_registry::CapabilityOutcome>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    Ok(Json(session.dispatch_tool("list_dir", serde_json::json!({"path": q.path})).await?))
}

/// `GET /sessions/:id/fs/read`: read a file, scoped the same way as [`fs_list`].
pub async fn fs_read(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Query(q): Query<PathQuery>,
) -> Result<Json<kernel_registry::CapabilityOutcome>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    Ok(Json(session.dispatch_tool("read_file", serde_json::json!({"path": q.path})).await?))
}

/// `GET /sessions/:id/replay/export`: the session's tool-replay JSONL file
/// verbatim, or an empty body if replay isn't configured.
pub async fn replay_export(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<String, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let Some(path) = session.tool_replay_path() else { return Ok(String::new()) };
    Ok(std::fs::read_to_string(path).unwrap_or_default())
}

/// Body of `POST /sessions/:id/replay/import`.
#[derive(Deserialize)]
pub struct ReplayImportRequest {
    /// Raw JSONL lines to append to the session's replay file.
    pub jsonl: String,
}

/// `POST /sessions/:id/replay/import`: append replay records to the
/// session's replay file.
pub async fn replay_import(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    let Some(path) = session.tool_replay_path() else {
        return Err(ApiError::BadRequest("session has no replay store configured".to_string()));
    };
    let req: ReplayImportRequest = serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    use std::io::Write;
    let mut file =
        std::fs::OpenOptions::new().create(true).append(true).open(path).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    file.write_all(req.jsonl.as_bytes()).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(serde_json::json!({"imported": true})))
}

/// `DELETE /sessions/:id/replay/clear`: truncate the session's replay file.
pub async fn replay_clear(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    if let Some(path) = session.tool_replay_path() {
        std::fs::write(path, "").map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }
    Ok(Json(serde_json::json!({"cleared": true})))
}

/// `GET /sessions/:id/mode`: the session's current replay mode.
pub async fn get_mode(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(serde_json::json!({"mode": session.replay_mode()})))
}

/// Body of `POST /sessions/:id/mode`.
#[derive(Deserialize)]
pub struct SetModeRequest {
    /// The replay mode to switch to.
    pub mode: ReplayMode,
}

/// `POST /sessions/:id/mode`: switch the session's replay mode.
pub async fn set_mode(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
    Json(req): Json<SetModeRequest>,
) -> Result<Json<Value>, ApiError> {
    server.app.ensure_session(&session_id).await?;
    let mut sessions = server.app.lock().await;
    let session = sessions.get_mut(&session_id).expect("just ensured");
    session.set_replay_mode(req.mode);
    Ok(Json(serde_json::json!({"mode": req.mode})))
}

/// `GET /sessions/:id/budgets`: per-capability spend for the current turn.
pub async fn get_budgets(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(serde_json::to_value(&session.exec_ctx().budget).unwrap_or(Value::Null)))
}

/// `GET /sessions/:id/world`: the session's current world snapshot.
pub async fn get_world(
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> Result<Json<kernel_types::WorldSnapshot>, ApiError> {
    let sessions = server.app.lock().await;
    let session = sessions.get(&session_id).ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;
    Ok(Json(session.world().clone()))
}

/// `GET /metrics`: Prometheus text-format snapshot across every in-memory
/// session (spec §3.1), one `# HELP`/`# TYPE` block per session since
/// `kernel-registry`'s `RouterMetrics` is scoped per session rather than
/// process-wide.
pub async fn metrics(State(server): State<SharedServer>) -> String {
    let sessions = server.app.lock().await;
    sessions.iter().map(|(id, session)| format!("# session {id}\n{}", session.metrics().to_prometheus())).collect::<Vec<_>>().join("\n")
}
