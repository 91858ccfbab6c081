//! User account operations.
//!
//! Level-up and claim are read-modify-write cycles on the user record,
//! guarded by its version and retried a bounded number of times.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::errors::{UserError, UserResult};
use crate::{
    db::{LevelUpOutcome, Repositories, UserRepository},
    domain::{Country, User, UserId, constants::DEFAULT_MAX_ATTEMPTS},
    leaderboard::LeaderboardProjection,
};

/// Result of a successful claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedReward {
    pub user: User,
    pub credited: i64,
}

/// User manager
#[derive(Clone)]
pub struct UserManager {
    users: Arc<dyn UserRepository>,
    projection: LeaderboardProjection,
    max_attempts: u32,
}

impl UserManager {
    /// Create a new user manager
    ///
    /// # Arguments
    ///
    /// * `repos` - Durable repositories
    /// * `projection` - Receives score updates of grouped users
    pub fn new(repos: &Repositories, projection: LeaderboardProjection) -> Self {
        Self {
            users: repos.users.clone(),
            projection,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Create a user at the starting level and balance.
    ///
    /// A random catalog country is picked when none is given.
    pub async fn create_user(&self, country: Option<Country>) -> UserResult<User> {
        let country = country.unwrap_or_else(Country::random);
        let user = self.users.create_user(country).await?;
        log::info!("Created user {} ({})", user.id, user.country);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: UserId) -> UserResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(UserError::UserNotFound(user_id))
    }

    /// Advance one level.
    ///
    /// Awards coins always, and a tournament point only while the user sits
    /// in an active group of the active tournament. The store decides that
    /// in the same write, so a tournament being ended stops scoring at once.
    pub async fn level_up(&self, user_id: UserId) -> UserResult<User> {
        for attempt in 1..=self.max_attempts {
            let current = self.get_user(user_id).await?;

            match self.users.level_up(&current).await? {
                LevelUpOutcome::Saved { user, scored } => {
                    if scored {
                        self.projection.record_score(&user).await;
                    }
                    return Ok(user);
                }
                LevelUpOutcome::Conflict => log::debug!(
                    "Level-up of user {} conflicted on attempt {}",
                    user_id,
                    attempt
                ),
            }
        }

        Err(UserError::Contention {
            attempts: self.max_attempts,
        })
    }

    /// Credit the pending reward and clear it in the same write.
    pub async fn claim_reward(&self, user_id: UserId) -> UserResult<ClaimedReward> {
        for attempt in 1..=self.max_attempts {
            let current = self.get_user(user_id).await?;
            let credited = current
                .pending_reward
                .claim_value()
                .ok_or(UserError::NoRewardToClaim)?;

            let mut next = current.clone();
            next.coins += credited;
            next.pending_reward = Default::default();

            match self.users.update_user(&next).await? {
                Some(user) => {
                    log::info!("User {} claimed {} coins", user_id, credited);
                    return Ok(ClaimedReward { user, credited });
                }
                None => log::debug!(
                    "Claim of user {} conflicted on attempt {}",
                    user_id,
                    attempt
                ),
            }
        }

        Err(UserError::Contention {
            attempts: self.max_attempts,
        })
    }
}
