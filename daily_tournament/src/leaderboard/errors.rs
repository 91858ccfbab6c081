//! Ranked store error types.

use thiserror::Error;

/// Errors raised by a ranked leaderboard store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaderboardError {
    /// The backing store could not be reached
    #[error("Leaderboard store unavailable: {0}")]
    Unavailable(String),

    /// The backing store rejected the operation
    #[error("Leaderboard operation failed: {0}")]
    Operation(String),
}

/// Result type for ranked store operations
pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

/// Errors raised while rebuilding a namespace from durable state.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Store(#[from] crate::db::StoreError),

    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}
