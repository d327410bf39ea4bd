//! Assembles the context block a turn hands to the reasoner: a bounded
//! window of recent conversation plus best-effort memory recall (spec §4.L
//! step 2).

use crate::memory::MemoryStore;

/// Who said a turn of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The end user.
    User,
    /// The reasoner.
    Assistant,
    /// A tool result surfaced back into the conversation.
    Tool,
}

impl Role {
    /// Parse a role name case-insensitively, falling back to [`Role::User`]
    /// for anything unrecognized rather than rejecting the turn.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::Tool => "TOOL",
        }
    }
}

/// One turn of conversation history.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// Who said it.
    pub role: Role,
    /// What they said.
    pub text: String,
}

impl ChatTurn {
    /// Construct a turn, normalizing `role` via [`Role::parse`].
    pub fn new(role: &str, text: impl Into<String>) -> Self {
        Self { role: Role::parse(role), text: text.into() }
    }

    fn format(&self) -> String {
        format!("{}: {}", self.role.label(), self.text)
    }
}

/// Bounds on how much of the conversation and how much recalled memory
/// enters the context block.
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig {
    /// How many of the most recent turns to include; `0` means unbounded.
    pub max_turns: usize,
    /// How many memory hits to recall, at most.
    pub max_mem_items: u32,
    /// Whether to attempt memory recall at all.
    pub recall: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_turns: 12, max_mem_items: 6, recall: true }
    }
}

/// Build the context block handed to the reasoner: an optional `MEMORY
/// (recalled):` section, a `CHAT (recent):` section bounded by
/// `cfg.max_turns`, and a trailing instruction to propose actions as JSON.
///
/// Memory recall is best-effort: a search failure is logged and the turn
/// proceeds without it, matching the turn loop's rule that memory failures
/// never break a turn.
#[must_use]
pub fn build_context(
    history: &[ChatTurn],
    user_text: &str,
    memory: Option<&MemoryStore>,
    cfg: &ContextConfig,
) -> String {
    let mut out = Vec::new();

    if cfg.recall {
        if let Some(store) = memory {
            match store.search(user_text, cfg.max_mem_items) {
                Ok(hits) if !hits.is_empty() => {
                    out.push("MEMORY (recalled):".to_string());
                    for hit in hits {
                        out.push(format!("- {}: {}", hit.key, hit.value));
                    }
                    out.push(String::new());
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "memory recall failed; continuing without it");
                }
            }
        }
    }

    let turns = if cfg.max_turns > 0 && history.len() > cfg.max_turns {
        &history[history.len() - cfg.max_turns..]
    } else {
        history
    };
    if !turns.is_empty() {
        out.push("CHAT (recent):".to_string());
        out.extend(turns.iter().map(ChatTurn::format));
        out.push(String::new());
    }

    out.push("INSTRUCTION:".to_string());
    out.push("Propose the next actions as JSON.".to_string());
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_role_normalizes_to_user() {
        assert_eq!(Role::parse("SYSTEM"), Role::User);
        assert_eq!(Role::parse("assistant"), Role::Assistant);
    }

    #[test]
    fn build_context_with_no_history_or_memory_is_just_the_instruction() {
        let cfg = ContextConfig { recall: false, ..ContextConfig::default() };
        let block = build_context(&[], "hello", None, &cfg);
        assert_eq!(block, "INSTRUCTION:\nPropose the next actions as JSON.");
    }

    #[test]
    fn build_context_bounds_history_to_max_turns() {
        let history: Vec<ChatTurn> =
            (0..20).map(|i| ChatTurn::new("user", format!("turn {i}"))).collect();
        let cfg = ContextConfig { max_turns: 3, recall: false, ..ContextConfig::default() };
        let block = build_context(&history, "x", None, &cfg);
        assert!(block.contains("turn 17"));
        assert!(block.contains("turn 19"));
        assert!(!block.contains("turn 16"));
    }

    #[test]
    fn build_context_includes_recalled_memory_when_present() {
        let store = MemoryStore::open_in_memory().unwrap();
        store.store("pref::editor", "vim", &[], "2026-01-01T00:00:00Z").unwrap();
        let cfg = ContextConfig::default();
        let block = build_context(&[], "editor", Some(&store), &cfg);
        assert!(block.contains("MEMORY (recalled):"));
        assert!(block.contains("pref::editor: vim"));
    }

    #[test]
    fn build_context_skips_memory_block_when_nothing_matches() {
        let store = MemoryStore::open_in_memory().unwrap();
        let cfg = ContextConfig::default();
        let block = build_context(&[], "anything", Some(&store), &cfg);
        assert!(!block.contains("MEMORY"));
    }
}
