//! An HTTP-backed [`Reasoner`] against the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use kernel_types::{CompletionRequest, CompletionResponse, ReasonerError, Usage};
use serde::{Deserialize, Serialize};

use crate::reasoner::Reasoner;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Talks to the Anthropic Messages API. Builder-constructed; clone-cheap
/// since the inner [`reqwest::Client`] pools its own connections.
#[derive(Clone)]
pub struct HttpReasoner {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpReasoner {
    /// Start building a client against the default model and base URL.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model used when a request doesn't set one.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL, e.g. to point at a proxy in tests.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ReasonerError> {
        let model = if request.model.is_empty() { &self.model } else { &request.model };
        let body = MessagesRequest {
            model,
            system: &request.system,
            messages: vec![Message { role: "user", content: &request.user }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(model, url = %self.messages_url(), "sending reasoner request");

        let response = self
            .client
            .post(self.messages_url())
            .timeout(Duration::from_secs(request.timeout_secs))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_status(status, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ReasonerError::ProviderError(format!("decoding response: {e}")))?;

        let content = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or(ReasonerError::EmptyResponse)?;

        Ok(CompletionResponse {
            content,
            model: parsed.model,
            usage: parsed.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            }),
        })
    }
}

fn map_http_status(status: reqwest::StatusCode, body: &str) -> ReasonerError {
    if status.as_u16() == 429 {
        return ReasonerError::RateLimit(body.to_string());
    }
    if status.as_u16() == 400 && body.to_lowercase().contains("too long") {
        return ReasonerError::ContextTooLong(body.to_string());
    }
    ReasonerError::ProviderError(format!("{status}: {body}"))
}

fn map_reqwest_error(err: reqwest::Error) -> ReasonerError {
    if err.is_timeout() {
        return ReasonerError::ProviderError(format!("timed out: {err}"));
    }
    ReasonerError::ProviderError(format!("transport error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_current_sonnet_model_and_public_api() {
        let reasoner = HttpReasoner::new("key");
        assert_eq!(reasoner.model, DEFAULT_MODEL);
        assert_eq!(reasoner.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_methods_override_model_and_base_url() {
        let reasoner = HttpReasoner::new("key").model("claude-haiku").base_url("http://localhost:9000/");
        assert_eq!(reasoner.model, "claude-haiku");
        assert_eq!(reasoner.messages_url(), "http://localhost:9000/v1/messages");
    }

    #[test]
    fn rate_limit_status_maps_to_rate_limit_error() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, ReasonerError::RateLimit(_)));
    }

    #[test]
    fn context_length_status_maps_to_context_too_long() {
        let err = map_http_status(reqwest::StatusCode::BAD_REQUEST, "prompt is too long for context window");
        assert!(matches!(err, ReasonerError::ContextTooLong(_)));
    }

    #[test]
    fn other_status_maps_to_provider_error() {
        let err = map_http_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(matches!(err, ReasonerError::ProviderError(_)));
    }
}
