//! Mapping from internal failures to HTTP responses (spec §7's "user-visible
//! failure behavior" applied at the HTTP boundary).
//!
//! Every kernel error taxonomy prefix (`deny:`/`schema:`/`budget:`/`perm:`/
//! `tool:`) maps to a 4xx; anything that indicates the server's own state
//! is broken (a store that won't open, an unknown session) maps to 404 or
//! 500 as appropriate. The body is always `{"error": "<prefixed message>"}`
//! so a client can pattern-match on the prefix the way the ledger does.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Everything an HTTP handler in this crate can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No session with the given id is held by this process.
    #[error("session not found: {0}")]
    SessionNotFound(String),
    /// A capability dispatch was refused or failed.
    #[error(transparent)]
    Dispatch(#[from] kernel_types::DispatchError),
    /// Session construction or persistence failed.
    #[error(transparent)]
    Session(#[from] kernel_session::SessionError),
    /// The ledger could not be read or failed its hash-chain check.
    #[error(transparent)]
    Ledger(#[from] kernel_types::LedgerError),
    /// A request body didn't deserialize into the expected shape.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// A filesystem path in a request escaped the session's working
    /// directory.
    #[error("path escapes the session working directory")]
    PathEscape,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::PathEscape => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(kernel_types::DispatchError::Perm(_)) => StatusCode::FORBIDDEN,
            ApiError::Dispatch(kernel_types::DispatchError::Schema(_)) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(kernel_types::DispatchError::Budget(_)) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Dispatch(_) => StatusCode::BAD_REQUEST,
            ApiError::Session(_) | ApiError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}
