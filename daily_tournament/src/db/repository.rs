//! Repository trait definitions for the durable record.
//!
//! Every mutating method is a conditional write: it either applies in full
//! against the state the caller read, or reports why it did not. Callers own
//! the retry policy; repositories never loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::domain::{
    Country, Group, GroupId, GroupMember, GroupStatus, PendingReward, Tournament, TournamentId,
    User, UserId, Version,
};

/// Atomic membership commit produced by the assignment engine.
///
/// Applied only if the tournament is still active, the group is still at
/// `expected_group_version` and the stored user is still at `user.version`.
/// On success both records are written with their versions incremented.
#[derive(Debug, Clone)]
pub struct JoinCommit {
    pub tournament_id: TournamentId,
    pub group_id: GroupId,
    pub expected_group_version: Version,
    pub member: GroupMember,
    pub status_after: GroupStatus,
    /// Desired user state; `user.version` is the expected stored version.
    pub user: User,
}

/// Result of [`GroupRepository::commit_join`].
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    Committed { group: Group, user: User },
    GroupConflict,
    UserConflict,
    TournamentClosed,
}

/// Result of [`GroupRepository::create_group`].
#[derive(Debug, Clone)]
pub enum GroupCreation {
    Created(Group),
    /// Another group was created since the caller's scan.
    Stale,
    TournamentClosed,
}

/// Result of [`UserRepository::level_up`].
#[derive(Debug, Clone)]
pub enum LevelUpOutcome {
    /// `scored` tells whether the write also added a tournament point.
    Saved { user: User, scored: bool },
    Conflict,
}

/// One placement reward, recorded at most once per `(tournament, group, placement)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardGrant {
    pub tournament_id: TournamentId,
    pub group_id: GroupId,
    pub placement: usize,
    pub user_id: UserId,
    pub reward: PendingReward,
}

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user with starting level and coins
    async fn create_user(&self, country: Country) -> StoreResult<User>;

    /// Find user by ID
    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Users whose group reference is `group_id`, ascending by ID
    async fn find_users_in_group(&self, group_id: GroupId) -> StoreResult<Vec<User>>;

    /// Users grouped in any group of `tournament_id`, ascending by ID
    async fn find_users_in_tournament(&self, tournament_id: TournamentId)
    -> StoreResult<Vec<User>>;

    /// Compare-and-swap write of `user`, conditioned on `user.version`.
    ///
    /// Returns the stored record on success, `None` on a version mismatch.
    async fn update_user(&self, user: &User) -> StoreResult<Option<User>>;

    /// Compare-and-swap level-up, conditioned on `expected.version`.
    ///
    /// Adds one level and the level-up coins. The tournament point is added
    /// only if, at the time of the write, the user's group is active and its
    /// tournament is still active; the check and the write are one step.
    async fn level_up(&self, expected: &User) -> StoreResult<LevelUpOutcome>;

    /// Clear group reference and score of every user grouped in `tournament_id`.
    async fn release_tournament_members(&self, tournament_id: TournamentId) -> StoreResult<u64>;
}

/// Trait for group repository operations
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Find group by ID
    async fn find_group(&self, group_id: GroupId) -> StoreResult<Option<Group>>;

    /// All groups of a tournament, ascending by ID
    async fn list_groups(&self, tournament_id: TournamentId) -> StoreResult<Vec<Group>>;

    /// Create an empty waiting group if the tournament still has exactly
    /// `expected_group_count` groups and is still active.
    async fn create_group(
        &self,
        tournament_id: TournamentId,
        expected_group_count: i64,
    ) -> StoreResult<GroupCreation>;

    /// Apply a membership commit atomically
    async fn commit_join(&self, commit: &JoinCommit) -> StoreResult<JoinOutcome>;

    /// Settle a group in one write: record its reward grants, flag the
    /// rewarded users and mark the group completed.
    ///
    /// Returns `None` and changes nothing if the group was already
    /// completed, otherwise the number of grants recorded.
    async fn settle_group(
        &self,
        group_id: GroupId,
        grants: &[RewardGrant],
    ) -> StoreResult<Option<usize>>;
}

/// Trait for tournament repository operations
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// The active tournament, if any
    async fn find_active(&self) -> StoreResult<Option<Tournament>>;

    /// Find tournament by ID
    async fn find_tournament(&self, tournament_id: TournamentId)
    -> StoreResult<Option<Tournament>>;

    /// Create a new active tournament. Returns `None` if one is already active.
    async fn create_active(&self, now: DateTime<Utc>) -> StoreResult<Option<Tournament>>;

    /// Mark a tournament inactive. Returns `false` if it already was.
    async fn deactivate(&self, tournament_id: TournamentId, now: DateTime<Utc>)
    -> StoreResult<bool>;

    /// Most recent inactive tournament whose End did not finish
    async fn find_unfinalized(&self) -> StoreResult<Option<Tournament>>;

    /// Mark a tournament's End as finished
    async fn finalize(&self, tournament_id: TournamentId) -> StoreResult<()>;
}
