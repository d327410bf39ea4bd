//! Built-in capability families the registry composes at construction time
//! (spec §4.F.1): filesystem, memory, browser/network, code intelligence,
//! and reasoning. Sandboxed/host exec are registered separately by the
//! caller, since their implementation lives behind `kernel-exec`'s trait
//! objects and the registry itself stays ignorant of Docker.

use crate::handler::CapabilityHandler;
use crate::registry::CapabilityRegistry;
use async_trait::async_trait;
use kernel_types::{
    CapabilityBudget, CapabilitySpec, ExecutionContext, FieldKind, PermissionRule, RiskLevel,
    SchemaField, ToolError,
};
use kernel_context::MemoryStore;
use regex::Regex;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

fn arg_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::BadArgs(format!("missing string field: {field}")))
}

struct ListDir;
#[async_trait]
impl CapabilityHandler for ListDir {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let dir = args.get("directory").and_then(Value::as_str).unwrap_or(&ctx.working_directory);
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?
        {
            entries.push(entry.file_name().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(json!({ "entries": entries }))
    }
}

struct ReadFile;
#[async_trait]
impl CapabilityHandler for ReadFile {
    async fn call(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let path = arg_str(&args, "path")?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "content": content }))
    }
}

struct WriteFile;
#[async_trait]
impl CapabilityHandler for WriteFile {
    async fn call(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let path = arg_str(&args, "path")?;
        let content = arg_str(&args, "content")?;
        if let Some(parent) = PathBuf::from(path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "bytes_written": content.len() }))
    }
}

/// Resolve the session's memory database path: the router injects it into
/// every call's kwargs as `memory_db_path` (router step 7), with the path
/// `register_builtins` was called with as a fallback for callers that
/// dispatch straight through a handler in tests, bypassing the router.
/// This is the same `kernel_context::MemoryStore` the turn loop's
/// `ActionKind::MemoryWrite` arm and `build_context`'s recall open against
/// — one backing store behind both the first-class action and the tool
/// call, per `controller/tools/memory.py`'s `get_store(db_path)` singleton.
fn memory_db_path(args: &Value, ctx: &ExecutionContext, fallback: &Option<String>) -> Result<String, ToolError> {
    args.get("memory_db_path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| ctx.memory_db_path.clone())
        .or_else(|| fallback.clone())
        .ok_or_else(|| ToolError::BadArgs("session has no memory store configured".to_string()))
}

fn open_memory_store(args: &Value, ctx: &ExecutionContext, fallback: &Option<String>) -> Result<MemoryStore, ToolError> {
    let path = memory_db_path(args, ctx, fallback)?;
    MemoryStore::open(&path).map_err(|e| ToolError::ExternalFailure(e.to_string()))
}

struct MemoryWrite(Option<String>);
#[async_trait]
impl CapabilityHandler for MemoryWrite {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let store = open_memory_store(&args, ctx, &self.0)?;
        let key = arg_str(&args, "key")?;
        let value = arg_str(&args, "value")?;
        let tags: Vec<String> = args
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        store.store(key, value, &tags, &ts).map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "stored": true }))
    }
}

struct MemorySearch(Option<String>);
#[async_trait]
impl CapabilityHandler for MemorySearch {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let store = open_memory_store(&args, ctx, &self.0)?;
        let query = arg_str(&args, "query")?;
        let max_results = args.get("max_results").and_then(Value::as_u64).map(|n| n as u32).unwrap_or(50);
        let hits = store.search(query, max_results).map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "hits": hits }))
    }
}

struct MemoryGet(Option<String>);
#[async_trait]
impl CapabilityHandler for MemoryGet {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let store = open_memory_store(&args, ctx, &self.0)?;
        let key = arg_str(&args, "key")?;
        let record = store.get(key).map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "value": record.as_ref().map(|r| r.value.clone()), "record": record }))
    }
}

struct HttpGet(reqwest::Client);
#[async_trait]
impl CapabilityHandler for HttpGet {
    async fn call(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let url = arg_str(&args, "url")?;
        let response = self
            .0
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        Ok(json!({ "status": status, "body": body }))
    }
}

struct HttpPost(reqwest::Client);
#[async_trait]
impl CapabilityHandler for HttpPost {
    async fn call(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let url = arg_str(&args, "url")?;
        let body = args.get("content").cloned().unwrap_or(Value::Null);
        let response = self
            .0
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExternalFailure(e.to_string()))?;
        let status = response.status().as_u16();
        Ok(json!({ "status": status }))
    }
}

struct SearchCode;
#[async_trait]
impl CapabilityHandler for SearchCode {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let pattern = arg_str(&args, "pattern")?;
        let regex =
            Regex::new(pattern).map_err(|e| ToolError::BadArgs(format!("bad pattern: {e}")))?;
        let mut matches = Vec::new();
        let mut stack = vec![PathBuf::from(&ctx.working_directory)];
        while let Some(dir) = stack.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(r) => r,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = read_dir.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if let Ok(text) = tokio::fs::read_to_string(&path).await {
                    for (line_no, line) in text.lines().enumerate() {
                        if regex.is_match(line) {
                            matches.push(json!({
                                "path": path.to_string_lossy(),
                                "line": line_no + 1,
                                "text": line,
                            }));
                        }
                    }
                }
            }
        }
        Ok(json!({ "matches": matches }))
    }
}

struct ReadSymbol;
#[async_trait]
impl CapabilityHandler for ReadSymbol {
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let symbol = arg_str(&args, "symbol")?;
        let pattern = format!(r"\b(fn|struct|enum|trait)\s+{}\b", regex::escape(symbol));
        let regex = Regex::new(&pattern).expect("constructed pattern is always valid");
        let mut stack = vec![PathBuf::from(&ctx.working_directory)];
        while let Some(dir) = stack.pop() {
            let mut read_dir = match tokio::fs::read_dir(&dir).await {
                Ok(r) => r,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = read_dir.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if let Ok(text) = tokio::fs::read_to_string(&path).await {
                    for (line_no, line) in text.lines().enumerate() {
                        if regex.is_match(line) {
                            return Ok(json!({
                                "path": path.to_string_lossy(),
                                "line": line_no + 1,
                                "text": line,
                            }));
                        }
                    }
                }
            }
        }
        Err(ToolError::NotFound(symbol.to_string()))
    }
}

struct Think;
#[async_trait]
impl CapabilityHandler for Think {
    async fn call(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value, ToolError> {
        Ok(json!({ "echo": args }))
    }
}

fn spec(
    name: &str,
    schema: Vec<SchemaField>,
    risk: RiskLevel,
    budget: CapabilityBudget,
    permission: PermissionRule,
) -> CapabilitySpec {
    CapabilitySpec { name: name.to_string(), schema, risk, budget, permission }
}

/// Register the filesystem, memory, browser/network, code-intelligence and
/// reasoning families into `registry`. Sandboxed/host exec are the caller's
/// responsibility (they come from `kernel-exec`).
/// Register every built-in capability. `memory_db_path` is the session's
/// `kernel_context::MemoryStore` locator (`SessionConfig::memory_db_path`);
/// it backs `memory_write`/`memory_search`/`memory_get` whenever the router
/// hasn't already injected a fresher one into a call's kwargs (router step
/// 7), so the same store the turn loop's `ActionKind::MemoryWrite` arm
/// writes to is the one these capabilities read and write too.
pub fn register_builtins(registry: &mut CapabilityRegistry, memory_db_path: Option<String>) {
    registry.register(
        spec(
            "list_dir",
            vec![SchemaField::optional("directory", FieldKind::Str)],
            RiskLevel::Low,
            CapabilityBudget::calls_only(50),
            PermissionRule { restrict_paths_to_workdir: true, ..Default::default() },
        ),
        Arc::new(ListDir),
    );
    registry.register(
        spec(
            "read_file",
            vec![SchemaField::required("path", FieldKind::Str)],
            RiskLevel::Low,
            CapabilityBudget { calls_per_turn: 50, max_bytes: Some(10_000_000), max_results: None },
            PermissionRule { restrict_paths_to_workdir: true, ..Default::default() },
        ),
        Arc::new(ReadFile),
    );
    registry.register(
        spec(
            "write_file",
            vec![
                SchemaField::required("path", FieldKind::Str),
                SchemaField::required("content", FieldKind::Str),
            ],
            RiskLevel::Medium,
            CapabilityBudget { calls_per_turn: 20, max_bytes: Some(5_000_000), max_results: None },
            PermissionRule { restrict_paths_to_workdir: true, mutates: true, ..Default::default() },
        ),
        Arc::new(WriteFile),
    );

    registry.register(
        spec(
            "memory_write",
            vec![
                SchemaField::required("key", FieldKind::Str),
                SchemaField::required("value", FieldKind::Str),
                SchemaField::optional("tags", FieldKind::Any),
            ],
            RiskLevel::Medium,
            CapabilityBudget::calls_only(100),
            PermissionRule { mutates: true, irreversible: true, ..Default::default() },
        ),
        Arc::new(MemoryWrite(memory_db_path.clone())),
    );
    registry.register(
        spec(
            "memory_search",
            vec![
                SchemaField::required("query", FieldKind::Str),
                SchemaField::optional("max_results", FieldKind::Int),
            ],
            RiskLevel::Low,
            CapabilityBudget { calls_per_turn: 100, max_bytes: None, max_results: Some(200) },
            PermissionRule::default(),
        ),
        Arc::new(MemorySearch(memory_db_path.clone())),
    );
    registry.register(
        spec(
            "memory_get",
            vec![SchemaField::required("key", FieldKind::Str)],
            RiskLevel::Low,
            CapabilityBudget::calls_only(100),
            PermissionRule::default(),
        ),
        Arc::new(MemoryGet(memory_db_path)),
    );

    let client = reqwest::Client::new();
    registry.register(
        spec(
            "http_get",
            vec![SchemaField::required("url", FieldKind::Str)],
            RiskLevel::Medium,
            CapabilityBudget { calls_per_turn: 30, max_bytes: None, max_results: None },
            PermissionRule::default(),
        ),
        Arc::new(HttpGet(client.clone())),
    );
    registry.register(
        spec(
            "http_post",
            vec![
                SchemaField::required("url", FieldKind::Str),
                SchemaField::optional("content", FieldKind::Any),
            ],
            RiskLevel::High,
            CapabilityBudget::calls_only(10),
            PermissionRule { mutates: true, ..Default::default() },
        ),
        Arc::new(HttpPost(client)),
    );

    registry.register(
        spec(
            "search_code",
            vec![SchemaField::required("pattern", FieldKind::Str)],
            RiskLevel::Low,
            CapabilityBudget { calls_per_turn: 50, max_bytes: None, max_results: Some(500) },
            PermissionRule::default(),
        ),
        Arc::new(SearchCode),
    );
    registry.register(
        spec(
            "read_symbol",
            vec![SchemaField::required("symbol", FieldKind::Str)],
            RiskLevel::Low,
            CapabilityBudget::calls_only(50),
            PermissionRule::default(),
        ),
        Arc::new(ReadSymbol),
    );

    registry.register(
        spec(
            "think",
            vec![SchemaField::optional("note", FieldKind::Any)],
            RiskLevel::Low,
            CapabilityBudget::calls_only(1_000_000),
            PermissionRule::default(),
        ),
        Arc::new(Think),
    );
}
