//! Static configuration for [`crate::run_turn`].

use kernel_context::ContextConfig;

use crate::prompts::DEFAULT_SYSTEM_PROMPT;

/// Defaults a turn falls back to when a session doesn't override them.
pub struct TurnConfig {
    /// System prompt sent with every reasoner request.
    pub system_prompt: String,
    /// Model identifier; an empty string defers to the reasoner's default.
    pub default_model: String,
    /// Maximum reasoner rounds before the turn gives up and returns a
    /// generic failure message.
    pub max_steps: u32,
    /// How much conversation history and memory recall to assemble per round.
    pub context: ContextConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            default_model: String::new(),
            max_steps: 6,
            context: ContextConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_turn_loops_documented_defaults() {
        let cfg = TurnConfig::default();
        assert_eq!(cfg.max_steps, 6);
        assert!(cfg.default_model.is_empty());
        assert!(cfg.system_prompt.contains("actions"));
    }
}
