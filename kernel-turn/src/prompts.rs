//! The default system/user prompt templates (spec §6).

/// Instructs the reasoner to emit nothing but the `{"actions": [...]}` shape.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an assistant that MUST output a single JSON object and nothing else.

You propose actions. A safety gate will allow or deny each one.
If a tool is denied, continue with other actions or ask for permission.

You MUST follow this schema:

{
  "actions": [
    { "kind": "<string>", "payload": { ... }, "justification": "<string>" }
  ]
}

Allowed kinds:
- "message_send": payload {"message": "<string>"}
- "tool_call": payload {"tool": "<string>", "args": {...}}
- "memory_write": payload {"key": "<string>", "value": "<string>", "tags": ["..."]?}
- "permission_request": payload {"request": "<string>", "why": "<string>"}

Rules:
- Usually propose 1-3 actions.
- If you can answer directly, do only "message_send".
- Use "tool_call" only if needed.
- If a tool might be sensitive, do "permission_request" first.
- Never output markdown. JSON only."#;

/// Wrap `user_text` with the assembled context block.
#[must_use]
pub fn user_prompt(user_text: &str, context_block: &str) -> String {
    format!("Context:\n{context_block}\n\nUser:\n{user_text}\n\nReturn JSON only.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_context_and_user_text() {
        let prompt = user_prompt("list files", "CHAT (recent):\nUSER: hi");
        assert!(prompt.contains("list files"));
        assert!(prompt.contains("CHAT (recent):"));
        assert!(prompt.ends_with("Return JSON only."));
    }
}
