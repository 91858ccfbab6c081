//! Group assignment with optimistic concurrency.
//!
//! There is no matchmaking lock. Each attempt reads the user, the tournament
//! and its groups, picks a target and submits one conditional [`JoinCommit`].
//! A lost race is a conflict and the attempt is repeated from a fresh read,
//! up to `max_attempts` times.

use rand::Rng;
use std::{sync::Arc, time::Duration};

use super::errors::{TournamentError, TournamentResult};
use crate::{
    db::{
        GroupCreation, GroupRepository, JoinCommit, JoinOutcome, Repositories,
        TournamentRepository, UserRepository,
    },
    domain::{
        Group, GroupStatus, Tournament, TournamentId, User, UserId,
        constants::{DEFAULT_MAX_ATTEMPTS, ENTRY_FEE},
    },
    leaderboard::LeaderboardProjection,
};

/// Upper bound of the randomized pause between attempts
const MAX_BACKOFF_MS: u64 = 32;

/// Reject users that may not enter a tournament.
///
/// Checks run in a fixed order: unclaimed reward, existing group, thresholds.
pub(crate) fn check_entry(user: &User) -> TournamentResult<()> {
    if user.pending_reward.is_pending() {
        return Err(TournamentError::UnclaimedReward);
    }
    if user.group_id.is_some() {
        return Err(TournamentError::AlreadyInGroup);
    }
    if !user.meets_entry_thresholds() {
        return Err(TournamentError::NotEligible {
            level: user.level,
            coins: user.coins,
        });
    }
    Ok(())
}

/// Order groups for selection: fullest first, then oldest.
fn by_preference(groups: &mut [Group]) {
    groups.sort_by(|a, b| {
        b.occupancy()
            .cmp(&a.occupancy())
            .then_with(|| a.id.cmp(&b.id))
    });
}

enum Attempt {
    Joined(Group),
    Conflict(&'static str),
}

/// Places users into groups of five distinct countries
#[derive(Clone)]
pub struct GroupAssignmentEngine {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    tournaments: Arc<dyn TournamentRepository>,
    projection: LeaderboardProjection,
    max_attempts: u32,
}

impl GroupAssignmentEngine {
    /// Create a new assignment engine
    ///
    /// # Arguments
    ///
    /// * `repos` - Durable repositories
    /// * `projection` - Ranked projection receiving the joined user's entry
    pub fn new(repos: &Repositories, projection: LeaderboardProjection) -> Self {
        Self {
            users: repos.users.clone(),
            groups: repos.groups.clone(),
            tournaments: repos.tournaments.clone(),
            projection,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt budget (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Place `user` into a group of `tournament`.
    ///
    /// # Arguments
    ///
    /// * `user` - User to place; re-read from the store on every attempt
    /// * `tournament` - The active tournament
    ///
    /// # Returns
    ///
    /// * `TournamentResult<Group>` - The group as committed, including the user
    ///
    /// # Errors
    ///
    /// Validation errors if the user or the tournament no longer qualify,
    /// [`TournamentError::Contention`] once the attempt budget is spent. In
    /// both cases neither the user nor any roster has been modified.
    pub async fn assign_user(&self, user: &User, tournament: &Tournament) -> TournamentResult<Group> {
        for attempt in 1..=self.max_attempts {
            match self.try_assign(user.id, tournament.id).await? {
                Attempt::Joined(group) => {
                    log::debug!(
                        "User {} joined group {} ({}/5) on attempt {}",
                        user.id,
                        group.id,
                        group.occupancy(),
                        attempt
                    );
                    self.projection.record_join(group.id, user.id).await;
                    return Ok(group);
                }
                Attempt::Conflict(reason) => {
                    log::debug!(
                        "Assignment of user {} conflicted on attempt {}: {}",
                        user.id,
                        attempt,
                        reason
                    );
                    if attempt < self.max_attempts {
                        let cap = MAX_BACKOFF_MS.min(1 << attempt.min(6));
                        let delay = rand::rng().random_range(0..=cap);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        log::warn!(
            "Assignment of user {} exhausted {} attempts",
            user.id,
            self.max_attempts
        );
        Err(TournamentError::Contention {
            attempts: self.max_attempts,
        })
    }

    async fn try_assign(
        &self,
        user_id: UserId,
        tournament_id: TournamentId,
    ) -> TournamentResult<Attempt> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(TournamentError::UserNotFound(user_id))?;
        check_entry(&user)?;

        self.tournaments
            .find_tournament(tournament_id)
            .await?
            .filter(|t| t.active)
            .ok_or(TournamentError::NoActiveTournament)?;

        let mut groups = self.groups.list_groups(tournament_id).await?;
        by_preference(&mut groups);

        let target = match groups.iter().find(|g| g.can_admit(user.country)) {
            Some(group) => group.id,
            None => match self
                .groups
                .create_group(tournament_id, groups.len() as i64)
                .await?
            {
                GroupCreation::Created(group) => group.id,
                GroupCreation::Stale => return Ok(Attempt::Conflict("group created concurrently")),
                GroupCreation::TournamentClosed => return Err(TournamentError::NoActiveTournament),
            },
        };

        let Some(group) = self.groups.find_group(target).await? else {
            return Ok(Attempt::Conflict("group vanished"));
        };
        if !group.can_admit(user.country) {
            return Ok(Attempt::Conflict("group filled concurrently"));
        }

        let mut joined = user.clone();
        joined.coins -= ENTRY_FEE;
        joined.group_id = Some(group.id);

        let commit = JoinCommit {
            tournament_id,
            group_id: group.id,
            expected_group_version: group.version,
            member: user.as_member(),
            status_after: GroupStatus::for_occupancy(group.occupancy() + 1),
            user: joined,
        };

        Ok(match self.groups.commit_join(&commit).await? {
            JoinOutcome::Committed { group, .. } => Attempt::Joined(group),
            JoinOutcome::GroupConflict => Attempt::Conflict("group version moved"),
            JoinOutcome::UserConflict => Attempt::Conflict("user record moved"),
            JoinOutcome::TournamentClosed => return Err(TournamentError::NoActiveTournament),
        })
    }
}
