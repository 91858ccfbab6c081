//! In-memory ranked store.

use async_trait::async_trait;
use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
};
use tokio::sync::RwLock;

use super::{
    errors::LeaderboardResult,
    store::{Member, Namespace, RankedEntry, RankedLeaderboardStore},
};

/// One namespace: a score index plus an ordered view.
#[derive(Debug, Default)]
struct Board {
    scores: HashMap<Member, i64>,
    order: BTreeSet<(Reverse<i64>, Member)>,
}

impl Board {
    fn set(&mut self, member: Member, score: i64) {
        if let Some(previous) = self.scores.insert(member, score) {
            self.order.remove(&(Reverse(previous), member));
        }
        self.order.insert((Reverse(score), member));
    }

    fn entries(&self) -> impl Iterator<Item = RankedEntry> + '_ {
        self.order.iter().map(|(Reverse(score), member)| RankedEntry {
            member: *member,
            score: *score,
        })
    }

    fn clear(&mut self) {
        self.scores.clear();
        self.order.clear();
    }
}

/// Ranked store held in process memory.
///
/// Never fails; the `Result` return exists for the trait.
#[derive(Debug, Default)]
pub struct InMemoryLeaderboardStore {
    boards: RwLock<HashMap<Namespace, Board>>,
}

impl InMemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RankedLeaderboardStore for InMemoryLeaderboardStore {
    async fn set_score(&self, ns: Namespace, member: Member, score: i64) -> LeaderboardResult<()> {
        self.boards
            .write()
            .await
            .entry(ns)
            .or_default()
            .set(member, score);
        Ok(())
    }

    async fn increment_score(
        &self,
        ns: Namespace,
        member: Member,
        delta: i64,
    ) -> LeaderboardResult<i64> {
        let mut boards = self.boards.write().await;
        let board = boards.entry(ns).or_default();
        let score = board.scores.get(&member).copied().unwrap_or(0) + delta;
        board.set(member, score);
        Ok(score)
    }

    async fn rank_of(&self, ns: Namespace, member: Member) -> LeaderboardResult<Option<usize>> {
        let boards = self.boards.read().await;
        let Some(board) = boards.get(&ns) else {
            return Ok(None);
        };
        let Some(score) = board.scores.get(&member) else {
            return Ok(None);
        };
        let ahead = board.order.range(..(Reverse(*score), member)).count();
        Ok(Some(ahead + 1))
    }

    async fn top_n(&self, ns: Namespace, n: usize) -> LeaderboardResult<Vec<RankedEntry>> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(&ns)
            .map(|board| board.entries().take(n).collect())
            .unwrap_or_default())
    }

    async fn all(&self, ns: Namespace) -> LeaderboardResult<Vec<RankedEntry>> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(&ns)
            .map(|board| board.entries().collect())
            .unwrap_or_default())
    }

    async fn reset(&self, ns: Namespace) -> LeaderboardResult<()> {
        self.boards.write().await.entry(ns).or_default().clear();
        Ok(())
    }

    async fn delete(&self, ns: Namespace) -> LeaderboardResult<()> {
        self.boards.write().await.remove(&ns);
        Ok(())
    }

    async fn namespaces(&self) -> LeaderboardResult<Vec<Namespace>> {
        let mut namespaces: Vec<Namespace> = self.boards.read().await.keys().copied().collect();
        namespaces.sort();
        Ok(namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Country;

    const GROUP: Namespace = Namespace::Group(1);

    #[tokio::test]
    async fn test_descending_with_id_tie_break() {
        let store = InMemoryLeaderboardStore::new();
        store.set_score(GROUP, Member::User(3), 5).await.unwrap();
        store.set_score(GROUP, Member::User(1), 5).await.unwrap();
        store.set_score(GROUP, Member::User(2), 9).await.unwrap();

        let members: Vec<Member> = store
            .all(GROUP)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.member)
            .collect();
        assert_eq!(
            members,
            vec![Member::User(2), Member::User(1), Member::User(3)]
        );
        assert_eq!(store.rank_of(GROUP, Member::User(1)).await.unwrap(), Some(2));
        assert_eq!(store.rank_of(GROUP, Member::User(9)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_score_replaces_previous_entry() {
        let store = InMemoryLeaderboardStore::new();
        store.set_score(GROUP, Member::User(1), 3).await.unwrap();
        store.set_score(GROUP, Member::User(1), 1).await.unwrap();

        let all = store.all(GROUP).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score, 1);
    }

    #[tokio::test]
    async fn test_increment_creates_absent_member() {
        let store = InMemoryLeaderboardStore::new();
        let member = Member::Country(Country::Turkey);
        assert_eq!(
            store
                .increment_score(Namespace::Countries, member, 0)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .increment_score(Namespace::Countries, member, 2)
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .increment_score(Namespace::Countries, member, 0)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_top_n_truncates() {
        let store = InMemoryLeaderboardStore::new();
        for id in 1..=5 {
            store.set_score(GROUP, Member::User(id), id).await.unwrap();
        }
        let top = store.top_n(GROUP, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].member, Member::User(5));
        assert_eq!(top[1].member, Member::User(4));
    }

    #[tokio::test]
    async fn test_reset_keeps_namespace_delete_removes_it() {
        let store = InMemoryLeaderboardStore::new();
        store.set_score(GROUP, Member::User(1), 1).await.unwrap();
        store
            .set_score(Namespace::Countries, Member::Country(Country::Usa), 1)
            .await
            .unwrap();

        store.reset(GROUP).await.unwrap();
        assert!(store.all(GROUP).await.unwrap().is_empty());
        assert_eq!(
            store.namespaces().await.unwrap(),
            vec![GROUP, Namespace::Countries]
        );

        store.delete(GROUP).await.unwrap();
        assert_eq!(store.namespaces().await.unwrap(), vec![Namespace::Countries]);
    }
}
