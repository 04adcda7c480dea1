//! Error types for the store.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// Absent lookup results are `Ok(None)`, not errors; dedup-key collisions
/// are carried in the upsert result types. What remains here are the
/// failures callers actually have to report or escalate.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite, including constraint violations the
    /// store does not recover locally.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A follower operation named a handle no account has.
    #[error("no account with handle {0:?}")]
    NoSuchAccount(String),

    /// A migration batch failed to apply, or version bookkeeping failed.
    /// Fatal at startup; the store must not be used afterwards.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error around the database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
