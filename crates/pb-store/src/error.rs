//! Failure modes for the durable record store.

use thiserror::Error;

/// Failures opening or operating on the sqlite-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying sqlite driver returned an error (includes constraint
    /// violations on insert).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record failed structural validation (spec §4.5 `RegisterDevice`).
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
