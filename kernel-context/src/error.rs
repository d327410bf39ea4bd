//! Failures specific to the memory store.

use thiserror::Error;

/// What can go wrong persisting or querying recalled memory.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ContextError {
    /// The backing SQLite database could not be opened or queried.
    #[error("store: {0}")]
    Store(String),

    /// A stored value could not be (de)serialized.
    #[error("codec: {0}")]
    Codec(String),
}

impl From<rusqlite::Error> for ContextError {
    fn from(err: rusqlite::Error) -> Self {
        ContextError::Store(err.to_string())
    }
}
