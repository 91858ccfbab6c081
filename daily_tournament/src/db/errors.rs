//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by durable repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Operation did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// A stored row could not be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
