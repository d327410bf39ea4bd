//! Failures specific to the outcome store.

use thiserror::Error;

/// What can go wrong recording or querying arm outcomes.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BanditError {
    /// The backing SQLite database could not be opened or queried.
    #[error("store: {0}")]
    Store(String),

    /// A stored value could not be (de)serialized.
    #[error("codec: {0}")]
    Codec(String),
}

impl From<rusqlite::Error> for BanditError {
    fn from(err: rusqlite::Error) -> Self {
        BanditError::Store(err.to_string())
    }
}
