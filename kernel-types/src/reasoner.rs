//! The reasoner's external request/response contract (spec §6), shared by
//! every crate that calls or implements a reasoner.

use serde::{Deserialize, Serialize};

/// One completion request sent to the reasoner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt: instructions, available tools, output format.
    pub system: String,
    /// User-facing prompt: the context block built for this turn.
    pub user: String,
    /// Model identifier; an empty string defers to the provider's default.
    #[serde(default)]
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl CompletionRequest {
    /// Construct a request with the defaults this workspace uses when a
    /// caller doesn't need to tune sampling: `temperature = 0.7`,
    /// `max_tokens = 4096`, `timeout_secs = 30`.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: String::new(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout_secs: 30,
        }
    }

    /// Override the model, builder-style.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Token accounting for one completion, when the provider reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens consumed by the generated content.
    pub completion_tokens: u32,
}

/// One completion response from the reasoner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw generated text — expected to be (possibly fenced) JSON matching
    /// `{"actions": [...]}`.
    pub content: String,
    /// The model that actually served the request.
    pub model: String,
    /// Token usage, if the provider reported it.
    #[serde(default)]
    pub usage: Option<Usage>,
}
