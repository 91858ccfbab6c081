//! Tournament error types.

use thiserror::Error;

use crate::{
    db::StoreError,
    domain::{GroupId, UserId},
    leaderboard::{LeaderboardError, RebuildError},
};

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-facing and not retryable
    Validation,
    /// Optimistic concurrency budget exhausted; a new request may succeed
    Contention,
    /// Store or ranked store failure
    Internal,
}

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("User is already in a group")]
    AlreadyInGroup,

    #[error("User is not eligible: level {level}, coins {coins}")]
    NotEligible { level: i32, coins: i64 },

    #[error("User has an unclaimed reward")]
    UnclaimedReward,

    #[error("No active tournament")]
    NoActiveTournament,

    #[error("User is not in a group")]
    NotInGroup,

    #[error("Gave up after {attempts} attempts due to concurrent updates")]
    Contention { attempts: u32 },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Leaderboard error: {0}")]
    Leaderboard(#[from] LeaderboardError),
}

impl From<RebuildError> for TournamentError {
    fn from(e: RebuildError) -> Self {
        match e {
            RebuildError::Store(e) => TournamentError::Store(e),
            RebuildError::Leaderboard(e) => TournamentError::Leaderboard(e),
        }
    }
}

impl TournamentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TournamentError::Contention { .. } => ErrorKind::Contention,
            TournamentError::Store(_) | TournamentError::Leaderboard(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Store(_) | TournamentError::Leaderboard(_) => {
                "Internal server error".to_string()
            }
            TournamentError::UserNotFound(_) => "User not found".to_string(),
            TournamentError::GroupNotFound(_) => "Group not found".to_string(),
            TournamentError::NotEligible { .. } => {
                "User is not eligible to join the tournament".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for tournament operations
pub type TournamentResult<T> = Result<T, TournamentError>;
