//! Projection of durable scores into the ranked store.
//!
//! Writes after a durable commit are best-effort: a failure is logged and the
//! durable record stays authoritative. The rebuild methods are the
//! reconciliation path and do report failures.

use std::{collections::BTreeMap, sync::Arc};

use super::{
    errors::{LeaderboardResult, RebuildError},
    store::{Member, Namespace, RankedEntry, RankedLeaderboardStore},
};
use crate::{
    db::UserRepository,
    domain::{CATALOG, Country, GroupId, TournamentId, User, UserId, constants::LEVEL_UP_SCORE},
};

/// Keeps group and country namespaces in step with durable scores
#[derive(Clone)]
pub struct LeaderboardProjection {
    store: Arc<dyn RankedLeaderboardStore>,
    users: Arc<dyn UserRepository>,
}

impl LeaderboardProjection {
    /// Create a new projection
    ///
    /// # Arguments
    ///
    /// * `store` - Ranked store holding the namespaces
    /// * `users` - Durable user records, the source for rebuilds
    pub fn new(store: Arc<dyn RankedLeaderboardStore>, users: Arc<dyn UserRepository>) -> Self {
        Self { store, users }
    }

    pub fn store(&self) -> &Arc<dyn RankedLeaderboardStore> {
        &self.store
    }

    /// Add a freshly joined user at score 0. Best-effort.
    pub async fn record_join(&self, group_id: GroupId, user_id: UserId) {
        if let Err(e) = self
            .store
            .set_score(Namespace::Group(group_id), Member::User(user_id), 0)
            .await
        {
            log::warn!(
                "Failed to project join of user {} into group {}: {}",
                user_id,
                group_id,
                e
            );
        }
    }

    /// Project a scoring event of `user`, who must be grouped. Best-effort.
    pub async fn record_score(&self, user: &User) {
        let Some(group_id) = user.group_id else {
            return;
        };

        if let Err(e) = self
            .store
            .set_score(Namespace::Group(group_id), Member::User(user.id), user.score)
            .await
        {
            log::warn!(
                "Failed to project score of user {} in group {}: {}",
                user.id,
                group_id,
                e
            );
        }

        if let Err(e) = self
            .store
            .increment_score(
                Namespace::Countries,
                Member::Country(user.country),
                LEVEL_UP_SCORE,
            )
            .await
        {
            log::warn!("Failed to project score for {}: {}", user.country, e);
        }
    }

    /// Add every catalog country at 0 if absent. Best-effort.
    pub async fn seed_countries(&self) {
        for country in CATALOG {
            if let Err(e) = self
                .store
                .increment_score(Namespace::Countries, Member::Country(country), 0)
                .await
            {
                log::warn!("Failed to seed country {}: {}", country, e);
            }
        }
    }

    /// Replace a group namespace with the durable scores of its members.
    ///
    /// Returns the rebuilt ranking.
    pub async fn rebuild_group(&self, group_id: GroupId) -> Result<Vec<RankedEntry>, RebuildError> {
        let members = self.users.find_users_in_group(group_id).await?;
        let ns = Namespace::Group(group_id);

        self.store.reset(ns).await?;
        for user in &members {
            self.store
                .set_score(ns, Member::User(user.id), user.score)
                .await?;
        }

        log::debug!(
            "Rebuilt group {} namespace with {} member(s)",
            group_id,
            members.len()
        );
        Ok(self.store.all(ns).await?)
    }

    /// Replace the country aggregate with sums of durable scores of every
    /// user grouped in `tournament_id`.
    pub async fn rebuild_countries(
        &self,
        tournament_id: TournamentId,
    ) -> Result<Vec<(Country, i64)>, RebuildError> {
        let mut totals: BTreeMap<Country, i64> = CATALOG.iter().map(|c| (*c, 0)).collect();
        for user in self.users.find_users_in_tournament(tournament_id).await? {
            *totals.entry(user.country).or_default() += user.score;
        }

        self.store.reset(Namespace::Countries).await?;
        for (country, total) in &totals {
            self.store
                .set_score(Namespace::Countries, Member::Country(*country), *total)
                .await?;
        }

        Ok(self.country_standings().await?)
    }

    pub async fn group_ranking(&self, group_id: GroupId) -> LeaderboardResult<Vec<RankedEntry>> {
        self.store.all(Namespace::Group(group_id)).await
    }

    /// Every catalog country with its aggregate, descending.
    ///
    /// Countries missing from the namespace are reported at 0.
    pub async fn country_standings(&self) -> LeaderboardResult<Vec<(Country, i64)>> {
        let mut totals: BTreeMap<Country, i64> = CATALOG.iter().map(|c| (*c, 0)).collect();
        for entry in self.store.all(Namespace::Countries).await? {
            if let Member::Country(country) = entry.member {
                totals.insert(country, entry.score);
            }
        }

        let mut standings: Vec<(Country, i64)> = totals.into_iter().collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(standings)
    }

    pub async fn rank(&self, group_id: GroupId, user_id: UserId) -> LeaderboardResult<Option<usize>> {
        self.store
            .rank_of(Namespace::Group(group_id), Member::User(user_id))
            .await
    }

    /// Remove every group namespace, plus the country aggregate if `countries`.
    pub async fn clear(&self, countries: bool) -> LeaderboardResult<usize> {
        let mut cleared = 0;
        for ns in self.store.namespaces().await? {
            if matches!(ns, Namespace::Group(_)) || countries {
                self.store.delete(ns).await?;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{MemoryStore, UserRepository},
        domain::{PendingReward, constants::STARTING_COINS},
        leaderboard::InMemoryLeaderboardStore,
    };

    fn grouped(id: UserId, country: Country, score: i64, group_id: GroupId) -> User {
        User {
            id,
            coins: STARTING_COINS,
            level: 30,
            country,
            score,
            group_id: Some(group_id),
            pending_reward: PendingReward::None,
            version: 0,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, LeaderboardProjection) {
        let users = Arc::new(MemoryStore::new());
        let projection = LeaderboardProjection::new(
            Arc::new(InMemoryLeaderboardStore::new()),
            users.clone() as Arc<dyn UserRepository>,
        );
        (users, projection)
    }

    #[tokio::test]
    async fn test_rebuild_group_replaces_stale_entries() {
        let (users, projection) = setup().await;
        users.insert_user(grouped(1, Country::Turkey, 4, 7)).await;
        users.insert_user(grouped(2, Country::Usa, 9, 7)).await;

        // Stale entry for a user no longer in the group
        projection.record_join(7, 99).await;

        let ranking = projection.rebuild_group(7).await.unwrap();
        assert_eq!(
            ranking,
            vec![
                RankedEntry {
                    member: Member::User(2),
                    score: 9
                },
                RankedEntry {
                    member: Member::User(1),
                    score: 4
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_country_standings_always_list_catalog() {
        let (_, projection) = setup().await;
        projection
            .record_score(&grouped(1, Country::Germany, 1, 3))
            .await;

        let standings = projection.country_standings().await.unwrap();
        assert_eq!(standings.len(), CATALOG.len());
        assert_eq!(standings[0], (Country::Germany, 1));
        // Zero-score countries follow in name order
        assert_eq!(standings[1].0, Country::France);
    }

    #[tokio::test]
    async fn test_clear_keeps_countries_unless_asked() {
        let (_, projection) = setup().await;
        projection.seed_countries().await;
        projection.record_join(1, 1).await;
        projection.record_join(2, 2).await;

        assert_eq!(projection.clear(false).await.unwrap(), 2);
        assert_eq!(
            projection.store().namespaces().await.unwrap(),
            vec![Namespace::Countries]
        );
        assert_eq!(projection.clear(true).await.unwrap(), 1);
    }
}
