//! The trait every reasoner implementation satisfies (spec §6 "Reasoner").

use async_trait::async_trait;
use kernel_types::{CompletionRequest, CompletionResponse, ReasonerError};

/// Sends one completion request and returns the raw response. Implementors
/// do not parse or validate `content` — that's [`crate::parse_actions`]'s
/// job, applied by the caller once the response comes back.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Request one completion.
    ///
    /// # Errors
    ///
    /// Returns a [`ReasonerError`] on transport failure, rate limiting, or
    /// an empty response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ReasonerError>;
}
