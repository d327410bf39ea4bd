//! The `<category>:<code>` error taxonomy shared by the gate, router, ledger
//! and turn loop (spec §7).
//!
//! Every variant round-trips to the structured `decision`/`error` string the
//! ledger persists. Display is the wire format — changing a message changes
//! what ends up on disk, so messages are part of the contract, not cosmetic.

use thiserror::Error;

/// Gate and router refusal. Carries enough detail to reconstruct the exact
/// `deny:<code>` string the ledger and the turn loop both expect.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DenyError {
    /// The action's justification was missing or shorter than the policy minimum.
    #[error("Missing/weak justification")]
    WeakJustification,

    /// `tool_call` named a tool outside the policy allowlist.
    #[error("Tool '{0}' not in allowlist")]
    ToolNotAllowed(String),

    /// A path argument resolved outside the working directory.
    #[error("path_escape")]
    PathEscape,

    /// A domain argument was not in the allowed set.
    #[error("domain_blocked: {0}")]
    DomainBlocked(String),

    /// Content matched a blocked egress pattern (secret/PII shape).
    #[error("egress_blocked: {0}")]
    EgressBlocked(String),

    /// Payload exceeded a configured byte limit.
    #[error("payload_size")]
    PayloadTooLarge,

    /// `patch` proposed while `require_clean_tests_for_patch` is set and tests are failing.
    #[error("patch_requires_clean_tests")]
    DirtyTests,

    /// `command` proposed while `allow_commands` is false.
    #[error("commands_not_allowed")]
    CommandsNotAllowed,

    /// `command` payload began with a blocked prefix.
    #[error("command_blocked: {0}")]
    CommandBlocked(String),

    /// `permission_request` proposed while elevation requires approval.
    #[error("elevation_requires_approval")]
    ElevationRequiresApproval,

    /// `action.kind` was not one the gate recognizes.
    #[error("unknown_action_kind: {0}")]
    UnknownKind(String),

    /// Policy-level generic denial with a free-form reason.
    #[error("{0}")]
    PolicyForbidden(String),
}

/// Capability argument validation (router step 2).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A required field was absent from the arguments.
    #[error("missing_required: {0}")]
    MissingRequired(String),

    /// A field was present but of the wrong kind.
    #[error("wrong_type: {field} expected {expected}")]
    WrongType {
        /// Offending field name.
        field: String,
        /// Kind the schema declared.
        expected: String,
    },

    /// A field was present that the schema does not declare.
    #[error("unexpected_arg: {0}")]
    UnexpectedArg(String),

    /// A field had the right kind but an invalid value shape.
    #[error("invalid_format: {0}")]
    InvalidFormat(String),
}

/// Resource exhaustion (router step 6).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BudgetError {
    /// `calls_per_turn` for this capability was already spent.
    #[error("calls_exceeded: {0}")]
    CallsExceeded(String),

    /// `max_bytes` for this capability was already spent.
    #[error("bytes_exceeded: {0}")]
    BytesExceeded(String),

    /// `max_results` for this capability was already spent.
    #[error("results_exceeded: {0}")]
    ResultsExceeded(String),

    /// The call did not complete before its deadline.
    #[error("timeout")]
    Timeout,
}

/// Authorization failures (router step 3).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermError {
    /// `require_explicit_grant` is set and the session has not been granted this capability.
    #[error("grant_required: {0}")]
    GrantRequired(String),

    /// The capability is in scope but this particular use is denied.
    #[error("scope_denied: {0}")]
    ScopeDenied(String),
}

/// Execution failures surfaced by a capability handler (router step 9).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The handler did not finish before its timeout.
    #[error("timeout")]
    Timeout,

    /// The named capability has no registry entry.
    #[error("not_found: {0}")]
    NotFound(String),

    /// Arguments were schema-valid but semantically wrong for the handler.
    #[error("bad_args: {0}")]
    BadArgs(String),

    /// The handler's external dependency (subprocess, Docker, network) failed.
    #[error("external_failure: {0}")]
    ExternalFailure(String),

    /// The handler failed for a reason internal to this process.
    #[error("internal_error: {0}")]
    InternalError(String),

    /// `command` matched a blocked-prefix rule at dispatch time.
    #[error("command_blocked: {0}")]
    CommandBlocked(String),
}

/// Reasoner transport failures (spec §6/§7 `llm:*`).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasonerError {
    /// The response body was not the expected `{"actions": [...]}` JSON shape.
    #[error("parse_error: {0}")]
    ParseError(String),

    /// The reasoner's HTTP transport returned an error status or dropped the connection.
    #[error("provider_error: {0}")]
    ProviderError(String),

    /// The provider signalled rate limiting.
    #[error("rate_limit: {0}")]
    RateLimit(String),

    /// The assembled prompt exceeded the provider's context window.
    #[error("context_too_long: {0}")]
    ContextTooLong(String),

    /// The provider returned a response with no usable content.
    #[error("empty_response")]
    EmptyResponse,
}

/// Ledger-local failures. Per spec §7 these are swallowed (logged) by the
/// turn loop, never propagated to the caller — the type exists so a strict
/// configuration can choose to propagate them instead (spec §9 open question).
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger file could not be opened or appended to.
    #[error("io: {0}")]
    Io(String),

    /// An entry failed to (de)serialize as canonical JSON.
    #[error("codec: {0}")]
    Codec(String),

    /// `verify` found the hash chain broken at the given index.
    #[error("chain_broken at index {index}: expected {expected}, got {actual}")]
    ChainBroken {
        /// Index of the first entry that failed to verify.
        index: u64,
        /// Hash the chain expected at that index.
        expected: String,
        /// Hash actually recorded at that index.
        actual: String,
    },
}

/// A single dispatch-time error, tagged with the taxonomy category it came
/// from. This is what the router and turn loop log to the ledger as
/// `decision = "<category>:<code>"`.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Gate or policy refusal.
    #[error("deny:{0}")]
    Deny(#[from] DenyError),

    /// Argument validation failure.
    #[error("schema:{0}")]
    Schema(#[from] SchemaError),

    /// Resource exhaustion.
    #[error("budget:{0}")]
    Budget(#[from] BudgetError),

    /// Authorization failure.
    #[error("perm:{0}")]
    Perm(#[from] PermError),

    /// Handler execution failure.
    #[error("tool:{0}")]
    Tool(#[from] ToolError),
}

impl DispatchError {
    /// The `<category>:<code>` string the ledger persists verbatim.
    #[must_use]
    pub fn code(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_error_messages_match_spec_codes() {
        assert_eq!(DenyError::PathEscape.to_string(), "path_escape");
        assert_eq!(DenyError::WeakJustification.to_string(), "Missing/weak justification");
        assert_eq!(
            DenyError::ToolNotAllowed("dangerous_tool".into()).to_string(),
            "Tool 'dangerous_tool' not in allowlist"
        );
    }

    #[test]
    fn dispatch_error_code_is_category_prefixed() {
        let e = DispatchError::from(DenyError::PathEscape);
        assert_eq!(e.code(), "deny:path_escape");

        let e = DispatchError::from(SchemaError::MissingRequired("path".into()));
        assert_eq!(e.code(), "schema:missing_required: path");

        let e = DispatchError::from(ToolError::NotFound("dangerous_tool".into()));
        assert_eq!(e.code(), "tool:not_found: dangerous_tool");
    }
}
