//! End-of-tournament reward computation.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{PendingReward, UserId, constants::GROUP_CAPACITY},
    leaderboard::{Member, RankedEntry},
};

/// A reward owed to one user for one placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// 1-based position in the final ranking
    pub placement: usize,
    pub user_id: UserId,
    pub reward: PendingReward,
}

/// Turns a group's final ranking into rewards.
///
/// Pure: it neither reads nor writes any store and credits nothing. The
/// lifecycle manager records the result as pending rewards.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardSettlement;

impl RewardSettlement {
    /// Rewards for a final ranking, ordered best first.
    ///
    /// Only a full group is rewarded: any ranking without exactly
    /// [`GROUP_CAPACITY`] user entries yields nothing.
    pub fn settle(ranking: &[RankedEntry]) -> Vec<Placement> {
        if ranking.len() != GROUP_CAPACITY {
            return Vec::new();
        }

        ranking
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let Member::User(user_id) = entry.member else {
                    return None;
                };
                let placement = i + 1;
                let reward = PendingReward::for_placement(placement);
                reward.is_pending().then_some(Placement {
                    placement,
                    user_id,
                    reward,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(ids: &[UserId]) -> Vec<RankedEntry> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| RankedEntry {
                member: Member::User(*id),
                score: 10 - i as i64,
            })
            .collect()
    }

    #[test]
    fn test_full_group_rewards_top_two() {
        let placements = RewardSettlement::settle(&ranking(&[7, 3, 9, 1, 4]));
        assert_eq!(
            placements,
            vec![
                Placement {
                    placement: 1,
                    user_id: 7,
                    reward: PendingReward::First
                },
                Placement {
                    placement: 2,
                    user_id: 3,
                    reward: PendingReward::Second
                },
            ]
        );
    }

    #[test]
    fn test_partial_group_gets_nothing() {
        assert!(RewardSettlement::settle(&ranking(&[1, 2, 3, 4])).is_empty());
        assert!(RewardSettlement::settle(&[]).is_empty());
    }
}
