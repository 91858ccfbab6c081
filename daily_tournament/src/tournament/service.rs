//! Entry point for tournament operations.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    assignment::{GroupAssignmentEngine, check_entry},
    errors::{TournamentError, TournamentResult},
    lifecycle::TournamentLifecycleManager,
    schedule::DailySchedule,
};
use crate::{
    db::{GroupRepository, Repositories, TournamentRepository, UserRepository},
    domain::{Country, Group, GroupId, Tournament, User, UserId},
    leaderboard::{LeaderboardProjection, Member, RankedLeaderboardStore},
};

/// Result of entering a tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group: Group,
    /// Every user currently in the group, ascending by ID
    pub members: Vec<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStanding {
    pub user_id: UserId,
    pub score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryStanding {
    pub country: Country,
    pub score: i64,
}

/// A user's position in their group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRank {
    pub user_id: UserId,
    pub group_id: GroupId,
    pub rank: usize,
}

/// Tournament service
#[derive(Clone)]
pub struct TournamentService {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    tournaments: Arc<dyn TournamentRepository>,
    projection: LeaderboardProjection,
    engine: GroupAssignmentEngine,
    lifecycle: TournamentLifecycleManager,
}

impl TournamentService {
    /// Create a new tournament service
    ///
    /// # Arguments
    ///
    /// * `repos` - Durable repositories
    /// * `store` - Ranked store backing the leaderboards
    pub fn new(repos: &Repositories, store: Arc<dyn RankedLeaderboardStore>) -> Self {
        let projection = LeaderboardProjection::new(store, repos.users.clone());
        Self {
            users: repos.users.clone(),
            groups: repos.groups.clone(),
            tournaments: repos.tournaments.clone(),
            engine: GroupAssignmentEngine::new(repos, projection.clone()),
            lifecycle: TournamentLifecycleManager::new(repos, projection.clone()),
            projection,
        }
    }

    /// Override the assignment attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.engine = self.engine.with_max_attempts(max_attempts);
        self
    }

    /// Run the lifecycle on a non-default daily window
    pub fn with_schedule(mut self, schedule: DailySchedule) -> Self {
        self.lifecycle = self.lifecycle.with_schedule(schedule);
        self
    }

    pub fn lifecycle(&self) -> &TournamentLifecycleManager {
        &self.lifecycle
    }

    pub fn projection(&self) -> &LeaderboardProjection {
        &self.projection
    }

    /// Enter the active tournament.
    ///
    /// Checked in order: user exists, no unclaimed reward, not already
    /// grouped, level and coins, a tournament is active.
    pub async fn enter_tournament(&self, user_id: UserId) -> TournamentResult<GroupEntry> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(TournamentError::UserNotFound(user_id))?;
        check_entry(&user)?;

        let tournament = self
            .tournaments
            .find_active()
            .await?
            .ok_or(TournamentError::NoActiveTournament)?;

        let group = self.engine.assign_user(&user, &tournament).await?;
        let members = self.users.find_users_in_group(group.id).await?;

        Ok(GroupEntry { group, members })
    }

    /// Ranked scores of one group
    pub async fn group_leaderboard(&self, group_id: GroupId) -> TournamentResult<Vec<GroupStanding>> {
        self.groups
            .find_group(group_id)
            .await?
            .ok_or(TournamentError::GroupNotFound(group_id))?;

        Ok(self
            .projection
            .group_ranking(group_id)
            .await?
            .into_iter()
            .filter_map(|entry| match entry.member {
                Member::User(user_id) => Some(GroupStanding {
                    user_id,
                    score: entry.score,
                }),
                Member::Country(_) => None,
            })
            .collect())
    }

    /// Aggregate score of every catalog country
    pub async fn country_leaderboard(&self) -> TournamentResult<Vec<CountryStanding>> {
        Ok(self
            .projection
            .country_standings()
            .await?
            .into_iter()
            .map(|(country, score)| CountryStanding { country, score })
            .collect())
    }

    /// Rank of a user inside their group.
    ///
    /// A missing projection entry is repaired from durable scores once.
    pub async fn group_rank(&self, user_id: UserId) -> TournamentResult<GroupRank> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or(TournamentError::UserNotFound(user_id))?;
        let group_id = user.group_id.ok_or(TournamentError::NotInGroup)?;

        let rank = match self.projection.rank(group_id, user_id).await? {
            Some(rank) => rank,
            None => {
                log::warn!(
                    "User {} missing from group {} leaderboard, rebuilding",
                    user_id,
                    group_id
                );
                self.projection.rebuild_group(group_id).await?;
                self.projection
                    .rank(group_id, user_id)
                    .await?
                    .ok_or(TournamentError::NotInGroup)?
            }
        };

        Ok(GroupRank {
            user_id,
            group_id,
            rank,
        })
    }

    pub async fn is_tournament_active(&self) -> TournamentResult<bool> {
        Ok(self.tournaments.find_active().await?.is_some())
    }

    pub async fn active_tournament(&self) -> TournamentResult<Option<Tournament>> {
        Ok(self.tournaments.find_active().await?)
    }

    /// Rebuild every namespace of the active tournament from durable scores.
    ///
    /// Returns the number of group namespaces rebuilt.
    pub async fn rebuild_leaderboards(&self) -> TournamentResult<usize> {
        let tournament = self
            .tournaments
            .find_active()
            .await?
            .ok_or(TournamentError::NoActiveTournament)?;

        let groups = self.groups.list_groups(tournament.id).await?;
        for group in &groups {
            self.projection.rebuild_group(group.id).await?;
        }
        self.projection.rebuild_countries(tournament.id).await?;

        log::info!(
            "Rebuilt leaderboards of tournament {} ({} group(s))",
            tournament.id,
            groups.len()
        );
        Ok(groups.len())
    }
}
