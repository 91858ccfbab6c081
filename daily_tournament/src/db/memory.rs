//! In-memory implementation of the repositories.
//!
//! All three repository traits share one state behind a `tokio::sync::RwLock`,
//! so each trait call is linearizable. Callers still interleave between calls,
//! which is exactly the window the CAS guards protect.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

use super::{
    errors::StoreResult,
    repository::{
        GroupCreation, GroupRepository, JoinCommit, JoinOutcome, LevelUpOutcome, RewardGrant,
        TournamentRepository, UserRepository,
    },
};
use crate::domain::{
    Country, Group, GroupId, GroupStatus, PendingReward, Roster, Tournament, TournamentId, User,
    UserId,
    constants::{LEVEL_UP_COINS, LEVEL_UP_SCORE, STARTING_COINS, STARTING_LEVEL},
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    tournaments: BTreeMap<TournamentId, Tournament>,
    reward_grants: HashSet<(TournamentId, GroupId, usize)>,
    next_user_id: UserId,
    next_group_id: GroupId,
    next_tournament_id: TournamentId,
}

impl MemoryState {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    /// Whether a member of `group_id` earns points right now
    fn is_scoring(&self, group_id: Option<GroupId>) -> bool {
        group_id
            .and_then(|id| self.groups.get(&id))
            .is_some_and(|g| {
                g.status == GroupStatus::Active
                    && self.tournaments.get(&g.tournament_id).is_some_and(|t| t.active)
            })
    }

    fn group_ids_of(&self, tournament_id: TournamentId) -> HashSet<GroupId> {
        self.groups
            .values()
            .filter(|g| g.tournament_id == tournament_id)
            .map(|g| g.id)
            .collect()
    }
}

/// Repository state held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully specified user, replacing any user with the same ID.
    ///
    /// Intended for seeding fixtures; IDs allocated later never collide.
    pub async fn insert_user(&self, user: User) -> User {
        let mut state = self.state.write().await;
        state.next_user_id = state.next_user_id.max(user.id);
        state.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, country: Country) -> StoreResult<User> {
        let mut state = self.state.write().await;
        let id = MemoryState::next_id(&mut state.next_user_id);
        let user = User {
            id,
            coins: STARTING_COINS,
            level: STARTING_LEVEL,
            country,
            score: 0,
            group_id: None,
            pending_reward: PendingReward::None,
            version: 0,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn find_users_in_group(&self, group_id: GroupId) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .filter(|u| u.group_id == Some(group_id))
            .cloned()
            .collect())
    }

    async fn find_users_in_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let group_ids = state.group_ids_of(tournament_id);
        Ok(state
            .users
            .values()
            .filter(|u| u.group_id.is_some_and(|g| group_ids.contains(&g)))
            .cloned()
            .collect())
    }

    async fn update_user(&self, user: &User) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.users.get_mut(&user.id) else {
            return Ok(None);
        };
        if stored.version != user.version {
            return Ok(None);
        }
        *stored = User {
            version: user.version + 1,
            ..user.clone()
        };
        Ok(Some(stored.clone()))
    }

    async fn level_up(&self, expected: &User) -> StoreResult<LevelUpOutcome> {
        let mut state = self.state.write().await;
        let current_version = state.users.get(&expected.id).map(|u| u.version);
        if current_version != Some(expected.version) {
            return Ok(LevelUpOutcome::Conflict);
        }

        let scored = state.is_scoring(expected.group_id);
        let Some(user) = state.users.get_mut(&expected.id) else {
            return Ok(LevelUpOutcome::Conflict);
        };
        user.level += 1;
        user.coins += LEVEL_UP_COINS;
        if scored {
            user.score += LEVEL_UP_SCORE;
        }
        user.version += 1;

        Ok(LevelUpOutcome::Saved {
            user: user.clone(),
            scored,
        })
    }

    async fn release_tournament_members(&self, tournament_id: TournamentId) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let group_ids = state.group_ids_of(tournament_id);
        let mut released = 0;
        for user in state.users.values_mut() {
            if user.group_id.is_some_and(|g| group_ids.contains(&g)) {
                user.group_id = None;
                user.score = 0;
                user.version += 1;
                released += 1;
            }
        }
        Ok(released)
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn find_group(&self, group_id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self.state.read().await.groups.get(&group_id).cloned())
    }

    async fn list_groups(&self, tournament_id: TournamentId) -> StoreResult<Vec<Group>> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .filter(|g| g.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn create_group(
        &self,
        tournament_id: TournamentId,
        expected_group_count: i64,
    ) -> StoreResult<GroupCreation> {
        let mut state = self.state.write().await;
        match state.tournaments.get_mut(&tournament_id) {
            Some(t) if t.active => {
                if t.group_count != expected_group_count {
                    return Ok(GroupCreation::Stale);
                }
                t.group_count += 1;
            }
            _ => return Ok(GroupCreation::TournamentClosed),
        }
        let id = MemoryState::next_id(&mut state.next_group_id);
        let group = Group {
            id,
            tournament_id,
            status: GroupStatus::Waiting,
            members: Roster::new(),
            version: 0,
        };
        state.groups.insert(id, group.clone());
        Ok(GroupCreation::Created(group))
    }

    async fn commit_join(&self, commit: &JoinCommit) -> StoreResult<JoinOutcome> {
        let mut state = self.state.write().await;

        let open = state
            .tournaments
            .get(&commit.tournament_id)
            .is_some_and(|t| t.active);
        if !open {
            return Ok(JoinOutcome::TournamentClosed);
        }

        let group_ok = state.groups.get(&commit.group_id).is_some_and(|g| {
            g.tournament_id == commit.tournament_id
                && g.version == commit.expected_group_version
                && g.can_admit(commit.member.country)
        });
        if !group_ok {
            return Ok(JoinOutcome::GroupConflict);
        }

        let user_ok = state
            .users
            .get(&commit.user.id)
            .is_some_and(|u| u.version == commit.user.version);
        if !user_ok {
            return Ok(JoinOutcome::UserConflict);
        }

        let Some(group) = state.groups.get_mut(&commit.group_id) else {
            return Ok(JoinOutcome::GroupConflict);
        };
        if group.members.admit(commit.member).is_err() {
            return Ok(JoinOutcome::GroupConflict);
        }
        group.status = commit.status_after;
        group.version += 1;
        let group = group.clone();

        let user = User {
            version: commit.user.version + 1,
            ..commit.user.clone()
        };
        state.users.insert(user.id, user.clone());

        Ok(JoinOutcome::Committed { group, user })
    }

    async fn settle_group(
        &self,
        group_id: GroupId,
        grants: &[RewardGrant],
    ) -> StoreResult<Option<usize>> {
        let mut state = self.state.write().await;
        match state.groups.get_mut(&group_id) {
            Some(group) if group.status != GroupStatus::Completed => {
                group.status = GroupStatus::Completed;
                group.version += 1;
            }
            _ => return Ok(None),
        }

        let mut recorded = 0;
        for grant in grants {
            let key = (grant.tournament_id, grant.group_id, grant.placement);
            if state.reward_grants.contains(&key) {
                continue;
            }
            let Some(user) = state.users.get_mut(&grant.user_id) else {
                continue;
            };
            user.pending_reward = grant.reward;
            user.version += 1;
            state.reward_grants.insert(key);
            recorded += 1;
        }
        Ok(Some(recorded))
    }
}

#[async_trait]
impl TournamentRepository for MemoryStore {
    async fn find_active(&self) -> StoreResult<Option<Tournament>> {
        let state = self.state.read().await;
        Ok(state.tournaments.values().find(|t| t.active).cloned())
    }

    async fn find_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<Tournament>> {
        Ok(self.state.read().await.tournaments.get(&tournament_id).cloned())
    }

    async fn create_active(&self, now: DateTime<Utc>) -> StoreResult<Option<Tournament>> {
        let mut state = self.state.write().await;
        if state.tournaments.values().any(|t| t.active) {
            return Ok(None);
        }
        let id = MemoryState::next_id(&mut state.next_tournament_id);
        let tournament = Tournament {
            id,
            active: true,
            created_at: now,
            ended_at: None,
            finalized: false,
            group_count: 0,
        };
        state.tournaments.insert(id, tournament.clone());
        Ok(Some(tournament))
    }

    async fn deactivate(
        &self,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.tournaments.get_mut(&tournament_id) {
            Some(t) if t.active => {
                t.active = false;
                t.ended_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_unfinalized(&self) -> StoreResult<Option<Tournament>> {
        let state = self.state.read().await;
        Ok(state
            .tournaments
            .values()
            .rev()
            .find(|t| !t.active && !t.finalized)
            .cloned())
    }

    async fn finalize(&self, tournament_id: TournamentId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(t) = state.tournaments.get_mut(&tournament_id) {
            t.finalized = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupMember;

    async fn open_tournament(store: &MemoryStore) -> Tournament {
        store.create_active(Utc::now()).await.unwrap().unwrap()
    }

    async fn new_group(store: &MemoryStore, tournament: &Tournament, seen: i64) -> Group {
        match store.create_group(tournament.id, seen).await.unwrap() {
            GroupCreation::Created(group) => group,
            other => panic!("expected a new group, got {other:?}"),
        }
    }

    fn join(tournament: &Tournament, group: &Group, user: &User) -> JoinCommit {
        JoinCommit {
            tournament_id: tournament.id,
            group_id: group.id,
            expected_group_version: group.version,
            member: GroupMember {
                user_id: user.id,
                country: user.country,
            },
            status_after: GroupStatus::for_occupancy(group.occupancy() + 1),
            user: User {
                group_id: Some(group.id),
                coins: user.coins - 1000,
                ..user.clone()
            },
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let store = MemoryStore::new();
        let user = store.create_user(Country::France).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.coins, 5000);
        assert_eq!(user.level, 1);
        assert_eq!(user.pending_reward, PendingReward::None);
        let second = store.create_user(Country::Turkey).await.unwrap();
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_update_user_rejects_stale_version() {
        let store = MemoryStore::new();
        let user = store.create_user(Country::Germany).await.unwrap();

        let bumped = User {
            level: 2,
            ..user.clone()
        };
        let stored = store.update_user(&bumped).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        // Same expected version again loses
        let stale = User {
            level: 3,
            ..user.clone()
        };
        assert!(store.update_user(&stale).await.unwrap().is_none());
        let current = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(current.level, 2);
    }

    #[tokio::test]
    async fn test_only_one_active_tournament() {
        let store = MemoryStore::new();
        assert!(store.create_active(Utc::now()).await.unwrap().is_some());
        assert!(store.create_active(Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_group_requires_current_count() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        new_group(&store, &tournament, 0).await;
        assert!(matches!(
            store.create_group(tournament.id, 0).await.unwrap(),
            GroupCreation::Stale
        ));
        new_group(&store, &tournament, 1).await;
    }

    #[tokio::test]
    async fn test_commit_join_applies_both_records() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let user = store.create_user(Country::Usa).await.unwrap();

        match store.commit_join(&join(&tournament, &group, &user)).await.unwrap() {
            JoinOutcome::Committed { group, user } => {
                assert_eq!(group.version, 1);
                assert_eq!(group.occupancy(), 1);
                assert_eq!(user.group_id, Some(group.id));
                assert_eq!(user.coins, 4000);
                assert_eq!(user.version, 1);
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_commit_join_with_stale_group_version_conflicts() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let first = store.create_user(Country::Usa).await.unwrap();
        let second = store.create_user(Country::France).await.unwrap();

        let commit_a = join(&tournament, &group, &first);
        let commit_b = join(&tournament, &group, &second);
        assert!(matches!(
            store.commit_join(&commit_a).await.unwrap(),
            JoinOutcome::Committed { .. }
        ));
        assert!(matches!(
            store.commit_join(&commit_b).await.unwrap(),
            JoinOutcome::GroupConflict
        ));
        let untouched = store.find_user(second.id).await.unwrap().unwrap();
        assert_eq!(untouched.coins, 5000);
        assert_eq!(untouched.group_id, None);
    }

    #[tokio::test]
    async fn test_commit_join_after_deactivation_is_closed() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let user = store.create_user(Country::Turkey).await.unwrap();
        store.deactivate(tournament.id, Utc::now()).await.unwrap();

        assert!(matches!(
            store.commit_join(&join(&tournament, &group, &user)).await.unwrap(),
            JoinOutcome::TournamentClosed
        ));
    }

    #[tokio::test]
    async fn test_settle_group_is_applied_once() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let user = store.create_user(Country::Turkey).await.unwrap();
        let grants = [RewardGrant {
            tournament_id: tournament.id,
            group_id: group.id,
            placement: 1,
            user_id: user.id,
            reward: PendingReward::First,
        }];
        assert_eq!(store.settle_group(group.id, &grants).await.unwrap(), Some(1));
        let settled = store.find_group(group.id).await.unwrap().unwrap();
        assert_eq!(settled.status, GroupStatus::Completed);

        // Claim happened in between; the replay must not re-flag
        let flagged = store.find_user(user.id).await.unwrap().unwrap();
        let claimed = User {
            pending_reward: PendingReward::None,
            ..flagged
        };
        store.update_user(&claimed).await.unwrap().unwrap();

        assert_eq!(store.settle_group(group.id, &grants).await.unwrap(), None);
        let after = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(after.pending_reward, PendingReward::None);
    }

    #[tokio::test]
    async fn test_level_up_scores_only_while_tournament_active() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let user = store.create_user(Country::Usa).await.unwrap();
        let commit = JoinCommit {
            status_after: GroupStatus::Active,
            ..join(&tournament, &group, &user)
        };
        let JoinOutcome::Committed { user, .. } = store.commit_join(&commit).await.unwrap() else {
            panic!("expected commit");
        };

        let LevelUpOutcome::Saved { user, scored } = store.level_up(&user).await.unwrap() else {
            panic!("expected level-up");
        };
        assert!(scored);
        assert_eq!(user.score, 1);

        store.deactivate(tournament.id, Utc::now()).await.unwrap();
        let LevelUpOutcome::Saved { user, scored } = store.level_up(&user).await.unwrap() else {
            panic!("expected level-up");
        };
        assert!(!scored);
        assert_eq!(user.score, 1);
        assert_eq!(user.level, 3);
        assert_eq!(user.coins, 4000 + 2 * LEVEL_UP_COINS);

        // Stale version loses
        let stale = User {
            version: 0,
            ..user
        };
        assert!(matches!(
            store.level_up(&stale).await.unwrap(),
            LevelUpOutcome::Conflict
        ));
    }

    #[tokio::test]
    async fn test_release_only_touches_tournament_members() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        let group = new_group(&store, &tournament, 0).await;
        let member = store.create_user(Country::Usa).await.unwrap();
        let outsider = store.create_user(Country::France).await.unwrap();
        store
            .commit_join(&join(&tournament, &group, &member))
            .await
            .unwrap();

        assert_eq!(store.release_tournament_members(tournament.id).await.unwrap(), 1);
        let member = store.find_user(member.id).await.unwrap().unwrap();
        assert_eq!(member.group_id, None);
        assert_eq!(member.score, 0);
        let outsider_after = store.find_user(outsider.id).await.unwrap().unwrap();
        assert_eq!(outsider_after.version, outsider.version);
    }

    #[tokio::test]
    async fn test_unfinalized_lookup() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store).await;
        assert!(store.find_unfinalized().await.unwrap().is_none());
        assert!(store.deactivate(tournament.id, Utc::now()).await.unwrap());
        assert!(!store.deactivate(tournament.id, Utc::now()).await.unwrap());
        assert_eq!(
            store.find_unfinalized().await.unwrap().map(|t| t.id),
            Some(tournament.id)
        );
        store.finalize(tournament.id).await.unwrap();
        assert!(store.find_unfinalized().await.unwrap().is_none());
    }
}
