//! Failures specific to reading or writing a replay store.

use thiserror::Error;

/// What can go wrong opening, appending to, or verifying a replay store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The store file could not be read or appended to.
    #[error("io: {0}")]
    Io(String),

    /// A line failed to (de)serialize as its record type.
    #[error("codec: {0}")]
    Codec(String),

    /// Loading with integrity verification enabled found a tampered entry.
    #[error("integrity: {0}")]
    Integrity(String),
}
