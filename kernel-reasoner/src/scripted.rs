//! A deterministic, non-networked [`Reasoner`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use kernel_types::{CompletionRequest, CompletionResponse, ReasonerError};
use serde_json::json;

use crate::reasoner::Reasoner;

/// Replays a queue of canned responses, falling back to a keyword-matched
/// guess at the caller's intent once the queue runs dry — mirrors how this
/// workspace's ancestor faked an LLM for tests: list/read requests become
/// tool calls, everything else becomes a message.
pub struct ScriptedReasoner {
    queue: Mutex<VecDeque<CompletionResponse>>,
}

impl ScriptedReasoner {
    /// Build a reasoner that serves nothing but keyword-matched fallbacks.
    #[must_use]
    pub fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::new()) }
    }

    /// Build a reasoner that serves `responses` in order before falling
    /// back to keyword matching.
    #[must_use]
    pub fn with_responses(responses: Vec<CompletionResponse>) -> Self {
        Self { queue: Mutex::new(responses.into()) }
    }

    /// Queue one more canned response to be served next.
    pub fn push(&self, response: CompletionResponse) {
        self.queue.lock().expect("scripted reasoner queue poisoned").push_back(response);
    }

    fn fallback(user: &str) -> CompletionResponse {
        let lower = user.to_lowercase();
        let content = if lower.contains("list") && lower.contains("file") {
            json!({"actions": [{
                "kind": "tool_call",
                "payload": {"tool": "list_dir", "args": {"path": "."}},
                "justification": "scripted fallback: user asked to list files",
                "risk_tags": [],
            }]})
        } else if lower.contains("read") {
            json!({"actions": [{
                "kind": "tool_call",
                "payload": {"tool": "read_file", "args": {"path": "README.md"}},
                "justification": "scripted fallback: user asked to read a file",
                "risk_tags": [],
            }]})
        } else {
            json!({"actions": [{
                "kind": "message_send",
                "payload": {"text": user},
                "justification": "scripted fallback: echoing the request",
                "risk_tags": [],
            }]})
        };
        CompletionResponse { content: content.to_string(), model: "scripted".to_string(), usage: None }
    }
}

impl Default for ScriptedReasoner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ReasonerError> {
        let queued = self.queue.lock().expect("scripted reasoner queue poisoned").pop_front();
        Ok(queued.unwrap_or_else(|| Self::fallback(&request.user)))
    }
}
