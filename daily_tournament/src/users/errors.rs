//! User account error types.

use thiserror::Error;

use crate::{db::StoreError, domain::UserId, tournament::ErrorKind};

/// User account errors
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("No reward to claim")]
    NoRewardToClaim,

    #[error("Gave up after {attempts} attempts due to concurrent updates")]
    Contention { attempts: u32 },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl UserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::UserNotFound(_) | UserError::NoRewardToClaim => ErrorKind::Validation,
            UserError::Contention { .. } => ErrorKind::Contention,
            UserError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            UserError::Store(_) => "Internal server error".to_string(),
            UserError::UserNotFound(_) => "User not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for user operations
pub type UserResult<T> = Result<T, UserError>;
