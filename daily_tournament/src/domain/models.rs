//! Durable entities: tournaments, groups and users.

use super::{
    constants::{
        FIRST_PLACE_REWARD, GROUP_CAPACITY, MIN_ENTRY_COINS, MIN_ENTRY_LEVEL, SECOND_PLACE_REWARD,
    },
    country::Country,
    roster::Roster,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// User ID type
pub type UserId = i64;

/// Group ID type
pub type GroupId = i64;

/// Tournament ID type
pub type TournamentId = i64;

/// Optimistic concurrency token, incremented on every successful write.
pub type Version = i64;

/// Returned when a persisted enum column holds an unexpected value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// A daily tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set once every End step has run.
    pub finalized: bool,
    /// Number of groups created for this tournament; guards group creation.
    pub group_count: i64,
}

/// Group status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    /// Fewer than five members
    Waiting,
    /// Exactly five members, scores count
    Active,
    /// Owning tournament has ended
    Completed,
}

impl GroupStatus {
    /// Status a running group has with `occupancy` members.
    pub fn for_occupancy(occupancy: usize) -> Self {
        if occupancy == GROUP_CAPACITY {
            GroupStatus::Active
        } else {
            GroupStatus::Waiting
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Waiting => "waiting",
            GroupStatus::Active => "active",
            GroupStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GroupStatus::Waiting),
            "active" => Ok(GroupStatus::Active),
            "completed" => Ok(GroupStatus::Completed),
            _ => Err(ParseEnumError {
                kind: "group status",
                value: s.to_string(),
            }),
        }
    }
}

/// A cohort of up to five users from distinct countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub tournament_id: TournamentId,
    pub status: GroupStatus,
    pub members: Roster,
    pub version: Version,
}

impl Group {
    pub fn occupancy(&self) -> usize {
        self.members.len()
    }

    /// Whether a user from `country` fits: not completed, not full, country free.
    pub fn can_admit(&self, country: Country) -> bool {
        self.status != GroupStatus::Completed && self.members.can_admit(country)
    }
}

/// Reward a user has earned but not yet claimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingReward {
    #[default]
    None,
    First,
    Second,
}

impl PendingReward {
    /// Coins credited when the reward is claimed.
    pub fn claim_value(self) -> Option<i64> {
        match self {
            PendingReward::None => None,
            PendingReward::First => Some(FIRST_PLACE_REWARD),
            PendingReward::Second => Some(SECOND_PLACE_REWARD),
        }
    }

    pub fn is_pending(self) -> bool {
        self != PendingReward::None
    }

    /// Reward for a 1-based final placement.
    pub fn for_placement(placement: usize) -> Self {
        match placement {
            1 => PendingReward::First,
            2 => PendingReward::Second,
            _ => PendingReward::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PendingReward::None => "none",
            PendingReward::First => "first",
            PendingReward::Second => "second",
        }
    }
}

impl FromStr for PendingReward {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PendingReward::None),
            "first" => Ok(PendingReward::First),
            "second" => Ok(PendingReward::Second),
            _ => Err(ParseEnumError {
                kind: "pending reward",
                value: s.to_string(),
            }),
        }
    }
}

/// A player account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub coins: i64,
    pub level: i32,
    pub country: Country,
    pub score: i64,
    pub group_id: Option<GroupId>,
    pub pending_reward: PendingReward,
    pub version: Version,
}

impl User {
    /// Level and coin thresholds for entering a tournament.
    pub fn meets_entry_thresholds(&self) -> bool {
        self.level >= MIN_ENTRY_LEVEL && self.coins >= MIN_ENTRY_COINS
    }

    pub fn as_member(&self) -> super::roster::GroupMember {
        super::roster::GroupMember {
            user_id: self.id,
            country: self.country,
        }
    }
}
