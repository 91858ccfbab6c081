//! Tournament Start/End state machine.
//!
//! End is ordered so that every step can be re-run: the tournament is
//! deactivated first, which freezes every score. Groups are then settled one
//! by one, each in a single write that records its rewards and completes it.
//! Members are released, and only then is the tournament marked finalized.
//! An End interrupted at any point is picked up again by the next End or
//! Start, and skips the groups already settled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{
    errors::{TournamentError, TournamentResult},
    rewards::RewardSettlement,
    schedule::DailySchedule,
};
use crate::{
    db::{GroupRepository, Repositories, RewardGrant, TournamentRepository, UserRepository},
    domain::{GroupStatus, Tournament, TournamentId},
    leaderboard::LeaderboardProjection,
};

/// What an End run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndReport {
    pub tournament_id: TournamentId,
    /// `true` if a previously interrupted End was completed
    pub resumed: bool,
    pub groups_completed: usize,
    pub rewards_granted: usize,
    pub users_released: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EndOutcome {
    Ended(EndReport),
    /// No active tournament and no interrupted End
    NothingToEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        tournament: Tournament,
        /// The End that ran first, if there was anything to end
        previous: Option<EndReport>,
    },
    /// A concurrent Start won; this is its tournament
    AlreadyActive { tournament: Tournament },
}

impl StartOutcome {
    pub fn tournament(&self) -> &Tournament {
        match self {
            StartOutcome::Started { tournament, .. } | StartOutcome::AlreadyActive { tournament } => {
                tournament
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TickOutcome {
    Start { result: StartOutcome },
    End { result: EndOutcome },
    Idle,
}

/// Drives tournaments through Start and End
#[derive(Clone)]
pub struct TournamentLifecycleManager {
    users: Arc<dyn UserRepository>,
    groups: Arc<dyn GroupRepository>,
    tournaments: Arc<dyn TournamentRepository>,
    projection: LeaderboardProjection,
    schedule: DailySchedule,
}

impl TournamentLifecycleManager {
    /// Create a new lifecycle manager on the default daily schedule
    pub fn new(repos: &Repositories, projection: LeaderboardProjection) -> Self {
        Self {
            users: repos.users.clone(),
            groups: repos.groups.clone(),
            tournaments: repos.tournaments.clone(),
            projection,
            schedule: DailySchedule::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: DailySchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn schedule(&self) -> &DailySchedule {
        &self.schedule
    }

    /// Open a new tournament.
    ///
    /// Any active tournament, or one whose End was interrupted, is ended
    /// first. Leftover group namespaces are cleared before the new
    /// tournament exists, so no join into it can be wiped.
    pub async fn start(&self, now: DateTime<Utc>) -> TournamentResult<StartOutcome> {
        let previous = match self.end(now).await? {
            EndOutcome::Ended(report) => Some(report),
            EndOutcome::NothingToEnd => None,
        };

        match self.projection.clear(true).await {
            Ok(0) => {}
            Ok(n) => log::warn!("Cleared {} leftover leaderboard namespace(s)", n),
            Err(e) => log::warn!("Failed to clear leftover leaderboard namespaces: {}", e),
        }

        let Some(tournament) = self.tournaments.create_active(now).await? else {
            let tournament = self
                .tournaments
                .find_active()
                .await?
                .ok_or(TournamentError::Contention { attempts: 1 })?;
            log::info!(
                "Tournament {} was started concurrently",
                tournament.id
            );
            return Ok(StartOutcome::AlreadyActive { tournament });
        };

        self.projection.seed_countries().await;
        log::info!("Started tournament {}", tournament.id);

        Ok(StartOutcome::Started {
            tournament,
            previous,
        })
    }

    /// Close the active tournament, or finish an interrupted End.
    ///
    /// With neither present this is a no-op. Re-running after a failure
    /// grants no reward twice.
    pub async fn end(&self, now: DateTime<Utc>) -> TournamentResult<EndOutcome> {
        let (tournament, resumed) = match self.tournaments.find_active().await? {
            Some(active) => {
                // `false` means a concurrent End got there first; finish alongside it
                let deactivated = self.tournaments.deactivate(active.id, now).await?;
                (active, !deactivated)
            }
            None => match self.tournaments.find_unfinalized().await? {
                Some(pending) => {
                    log::warn!("Resuming interrupted end of tournament {}", pending.id);
                    (pending, true)
                }
                None => return Ok(EndOutcome::NothingToEnd),
            },
        };

        let mut groups_completed = 0;
        let mut rewards_granted = 0;

        for group in self.groups.list_groups(tournament.id).await? {
            if group.status == GroupStatus::Completed {
                continue;
            }

            let ranking = self.projection.rebuild_group(group.id).await?;
            let grants: Vec<RewardGrant> = RewardSettlement::settle(&ranking)
                .into_iter()
                .map(|placement| RewardGrant {
                    tournament_id: tournament.id,
                    group_id: group.id,
                    placement: placement.placement,
                    user_id: placement.user_id,
                    reward: placement.reward,
                })
                .collect();

            // `None` means a concurrent End settled it first
            if let Some(recorded) = self.groups.settle_group(group.id, &grants).await? {
                groups_completed += 1;
                rewards_granted += recorded;
            }
        }

        let users_released = self.users.release_tournament_members(tournament.id).await?;

        if let Err(e) = self.projection.clear(true).await {
            // Start clears leftovers again
            log::warn!(
                "Failed to clear leaderboards of tournament {}: {}",
                tournament.id,
                e
            );
        }

        self.tournaments.finalize(tournament.id).await?;

        log::info!(
            "Ended tournament {}: {} group(s) completed, {} reward(s) granted, {} user(s) released",
            tournament.id,
            groups_completed,
            rewards_granted,
            users_released
        );

        Ok(EndOutcome::Ended(EndReport {
            tournament_id: tournament.id,
            resumed,
            groups_completed,
            rewards_granted,
            users_released,
        }))
    }

    /// Bring the tournament state in line with the schedule at `now`.
    ///
    /// Inside the window a tournament is started if none is active or if the
    /// active one predates today's window. Outside the window an active
    /// tournament is ended and an interrupted End is resumed.
    pub async fn tick(&self, now: DateTime<Utc>) -> TournamentResult<TickOutcome> {
        let active = self.tournaments.find_active().await?;

        if self.schedule.is_open(now) {
            let stale = match &active {
                None => true,
                Some(t) => t.created_at < self.schedule.window_start(now),
            };
            if stale {
                return Ok(TickOutcome::Start {
                    result: self.start(now).await?,
                });
            }
            return Ok(TickOutcome::Idle);
        }

        if active.is_some() || self.tournaments.find_unfinalized().await?.is_some() {
            return Ok(TickOutcome::End {
                result: self.end(now).await?,
            });
        }
        Ok(TickOutcome::Idle)
    }
}
