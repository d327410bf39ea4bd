//! Failure modes a session's setup or persistence layer can hit.

use kernel_bandit::BanditError;
use kernel_context::ContextError;
use kernel_replay::ReplayError;
use kernel_types::LedgerError;

/// Something went wrong constructing or persisting a [`crate::Session`].
///
/// Turn- and plan-execution failures never appear here — those surface as
/// fields on [`crate::StepResult`]/`PlanResult` instead, matching the turn
/// loop's rule that a single bad step never aborts the call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session or outcome store's backing SQLite file could not be
    /// opened or migrated.
    #[error("session store error: {0}")]
    Store(String),
    /// The append-only ledger's file could not be opened.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    /// The memory store's backing SQLite file could not be opened.
    #[error("memory store error: {0}")]
    Memory(#[from] ContextError),
    /// The bandit learner's outcome store could not be opened.
    #[error("bandit store error: {0}")]
    Bandit(#[from] BanditError),
    /// A replay store's backing file is malformed.
    #[error("replay store error: {0}")]
    Replay(#[from] ReplayError),
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        SessionError::Store(value.to_string())
    }
}
