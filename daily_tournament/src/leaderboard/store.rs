//! The ranked key/score store contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::LeaderboardResult;
use crate::domain::{Country, GroupId, UserId};

/// A ranked namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Per-group user scores
    Group(GroupId),
    /// Global per-country aggregate
    Countries,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Group(id) => write!(f, "group:{id}"),
            Namespace::Countries => f.write_str("countries"),
        }
    }
}

/// A ranked member.
///
/// The derived `Ord` is the tie-break order: ascending user ID within a
/// group, ascending country name in the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Member {
    User(UserId),
    Country(Country),
}

/// One `(member, score)` pair read from a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub member: Member,
    pub score: i64,
}

/// Ranked key/score store with independent namespaces.
///
/// Reads return entries by descending score, ties broken by ascending
/// [`Member`]. Operations are fallible so an implementation can front a
/// remote cache.
#[async_trait]
pub trait RankedLeaderboardStore: Send + Sync {
    /// Set an absolute score; last writer wins
    async fn set_score(&self, ns: Namespace, member: Member, score: i64) -> LeaderboardResult<()>;

    /// Add `delta` to a score, creating the member at `delta` if absent.
    ///
    /// Returns the new score.
    async fn increment_score(
        &self,
        ns: Namespace,
        member: Member,
        delta: i64,
    ) -> LeaderboardResult<i64>;

    /// 1-based rank of `member`, `None` if absent
    async fn rank_of(&self, ns: Namespace, member: Member) -> LeaderboardResult<Option<usize>>;

    /// The first `n` entries
    async fn top_n(&self, ns: Namespace, n: usize) -> LeaderboardResult<Vec<RankedEntry>>;

    /// Every entry
    async fn all(&self, ns: Namespace) -> LeaderboardResult<Vec<RankedEntry>>;

    /// Remove every entry, keeping the namespace
    async fn reset(&self, ns: Namespace) -> LeaderboardResult<()>;

    /// Remove the namespace
    async fn delete(&self, ns: Namespace) -> LeaderboardResult<()>;

    /// Existing namespaces
    async fn namespaces(&self) -> LeaderboardResult<Vec<Namespace>>;
}
