//! The object-safe trait every capability handler implements, and the
//! normalized outcome the router produces from it (spec §4.F step 9).

use async_trait::async_trait;
use kernel_types::{ExecutionContext, ToolError};
use serde_json::Value;

/// The result of invoking a capability handler, already normalized to the
/// `{success, output, error}` shape the turn loop's ledger entries expect.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CapabilityOutcome {
    /// Whether the handler completed without error.
    pub success: bool,
    /// The handler's result payload. `Value::Null` when `success` is false.
    pub output: Value,
    /// The handler's error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityOutcome {
    /// Wrap a successful result.
    #[must_use]
    pub fn ok(output: Value) -> Self {
        Self { success: true, output, error: None }
    }

    /// Wrap a failed result, carrying the error's display text.
    #[must_use]
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self { success: false, output: Value::Null, error: Some(error.to_string()) }
    }
}

/// One callable capability's implementation.
///
/// Handlers never see the gate, the schema, or the budget — the router
/// resolves all of that before `call` is invoked. A handler receives only
/// schema-valid, in-scope, budget-charged arguments.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute with `args` (already schema-validated) under `ctx`.
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError>;
}

/// Adapt a plain async closure into a [`CapabilityHandler`], mirroring the
/// `tool_middleware_fn`/`from_fn` convenience constructors used for
/// ad hoc middleware elsewhere in this codebase's ancestry.
pub struct HandlerFn<F>(
    /// The wrapped closure.
    pub F,
);

#[async_trait]
impl<F, Fut> CapabilityHandler for HandlerFn<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ToolError>> + Send,
{
    async fn call(&self, args: Value, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        (self.0)(args, ctx.clone()).await
    }
}
