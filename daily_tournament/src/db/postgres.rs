//! PostgreSQL implementation of the repositories.
//!
//! Conditional writes are expressed as `UPDATE ... WHERE version = $n` inside
//! a transaction; a zero row count is the CAS failure. The join transaction
//! takes a share lock on the tournament row, and deactivation updates that
//! row, so a join can never commit into a tournament that End has already
//! started processing. Level-up takes the same lock before deciding whether
//! the user scores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;

use super::{
    errors::{StoreError, StoreResult},
    repository::{
        GroupCreation, GroupRepository, JoinCommit, JoinOutcome, LevelUpOutcome, RewardGrant,
        TournamentRepository, UserRepository,
    },
    timeouts::{with_default_timeout, with_long_timeout, with_transaction_timeout},
};
use crate::domain::{
    Country, Group, GroupId, GroupMember, GroupStatus, PendingReward, Roster, Tournament,
    TournamentId, User, UserId,
    constants::{GROUP_CAPACITY, LEVEL_UP_COINS, LEVEL_UP_SCORE, STARTING_COINS, STARTING_LEVEL},
};

/// Repositories backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_groups(&self, rows: Vec<PgRow>) -> StoreResult<Vec<Group>> {
        let ids: Vec<GroupId> = rows.iter().map(|r| r.get("id")).collect();
        let mut members = self.load_members(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let id: GroupId = row.get("id");
                let roster = Roster::try_from(members.remove(&id).unwrap_or_default())
                    .map_err(|e| StoreError::Corrupt(format!("group {id}: {e}")))?;
                Ok(Group {
                    id,
                    tournament_id: row.get("tournament_id"),
                    status: row
                        .get::<String, _>("status")
                        .parse::<GroupStatus>()
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?,
                    members: roster,
                    version: row.get("version"),
                })
            })
            .collect()
    }

    async fn load_members(
        &self,
        group_ids: &[GroupId],
    ) -> StoreResult<HashMap<GroupId, Vec<GroupMember>>> {
        if group_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT group_id, user_id, country
                FROM group_members
                WHERE group_id = ANY($1)
                ORDER BY group_id, user_id
                "#,
            )
            .bind(group_ids.to_vec())
            .fetch_all(&self.pool),
        )
        .await?;

        let mut members: HashMap<GroupId, Vec<GroupMember>> = HashMap::new();
        for row in rows {
            let country = parse_country(&row)?;
            members
                .entry(row.get("group_id"))
                .or_default()
                .push(GroupMember {
                    user_id: row.get("user_id"),
                    country,
                });
        }
        Ok(members)
    }
}

fn parse_country(row: &PgRow) -> StoreResult<Country> {
    row.get::<String, _>("country")
        .parse::<Country>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.get("id"),
        coins: row.get("coins"),
        level: row.get("level"),
        country: parse_country(row)?,
        score: row.get("score"),
        group_id: row.get("group_id"),
        pending_reward: row
            .get::<String, _>("pending_reward")
            .parse::<PendingReward>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        version: row.get("version"),
    })
}

fn tournament_from_row(row: &PgRow) -> Tournament {
    Tournament {
        id: row.get("id"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        ended_at: row.get("ended_at"),
        finalized: row.get("finalized"),
        group_count: row.get("group_count"),
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, country: Country) -> StoreResult<User> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO users (coins, level, country)
                VALUES ($1, $2, $3)
                RETURNING id, coins, level, country, score, group_id, pending_reward, version
                "#,
            )
            .bind(STARTING_COINS)
            .bind(STARTING_LEVEL)
            .bind(country.name())
            .fetch_one(&self.pool),
        )
        .await?;

        user_from_row(&row)
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, coins, level, country, score, group_id, pending_reward, version
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_users_in_group(&self, group_id: GroupId) -> StoreResult<Vec<User>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, coins, level, country, score, group_id, pending_reward, version
                FROM users
                WHERE group_id = $1
                ORDER BY id
                "#,
            )
            .bind(group_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn find_users_in_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Vec<User>> {
        let rows = with_long_timeout(
            sqlx::query(
                r#"
                SELECT u.id, u.coins, u.level, u.country, u.score, u.group_id,
                       u.pending_reward, u.version
                FROM users u
                JOIN tournament_groups g ON g.id = u.group_id
                WHERE g.tournament_id = $1
                ORDER BY u.id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: &User) -> StoreResult<Option<User>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE users
                SET coins = $1, level = $2, score = $3, group_id = $4,
                    pending_reward = $5, version = version + 1
                WHERE id = $6 AND version = $7
                RETURNING id, coins, level, country, score, group_id, pending_reward, version
                "#,
            )
            .bind(user.coins)
            .bind(user.level)
            .bind(user.score)
            .bind(user.group_id)
            .bind(user.pending_reward.as_str())
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn level_up(&self, expected: &User) -> StoreResult<LevelUpOutcome> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let scored = match expected.group_id {
                Some(group_id) => sqlx::query_scalar::<_, bool>(
                    r#"
                    SELECT g.status = 'active' AND t.active
                    FROM tournament_groups g
                    JOIN tournaments t ON t.id = g.tournament_id
                    WHERE g.id = $1
                    FOR SHARE OF t
                    "#,
                )
                .bind(group_id)
                .fetch_optional(&mut *tx)
                .await?
                .unwrap_or(false),
                None => false,
            };

            let row = sqlx::query(
                r#"
                UPDATE users
                SET level = level + 1, coins = coins + $1, score = score + $2,
                    version = version + 1
                WHERE id = $3 AND version = $4
                RETURNING id, coins, level, country, score, group_id, pending_reward, version
                "#,
            )
            .bind(LEVEL_UP_COINS)
            .bind(if scored { LEVEL_UP_SCORE } else { 0 })
            .bind(expected.id)
            .bind(expected.version)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Ok::<_, StoreError>(LevelUpOutcome::Conflict);
            };
            let user = user_from_row(&row)?;
            tx.commit().await?;
            Ok(LevelUpOutcome::Saved { user, scored })
        })
        .await
    }

    async fn release_tournament_members(&self, tournament_id: TournamentId) -> StoreResult<u64> {
        let result = with_long_timeout(
            sqlx::query(
                r#"
                UPDATE users
                SET group_id = NULL, score = 0, version = version + 1
                WHERE group_id IN (SELECT id FROM tournament_groups WHERE tournament_id = $1)
                "#,
            )
            .bind(tournament_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GroupRepository for PgStore {
    async fn find_group(&self, group_id: GroupId) -> StoreResult<Option<Group>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, tournament_id, status, version FROM tournament_groups WHERE id = $1",
            )
            .bind(group_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        match row {
            Some(row) => Ok(self.load_groups(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_groups(&self, tournament_id: TournamentId) -> StoreResult<Vec<Group>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, tournament_id, status, version
                FROM tournament_groups
                WHERE tournament_id = $1
                ORDER BY id
                "#,
            )
            .bind(tournament_id)
            .fetch_all(&self.pool),
        )
        .await?;

        self.load_groups(rows).await
    }

    async fn create_group(
        &self,
        tournament_id: TournamentId,
        expected_group_count: i64,
    ) -> StoreResult<GroupCreation> {
        let created = with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let claimed = sqlx::query(
                r#"
                UPDATE tournaments
                SET group_count = group_count + 1
                WHERE id = $1 AND active AND group_count = $2
                "#,
            )
            .bind(tournament_id)
            .bind(expected_group_count)
            .execute(&mut *tx)
            .await?;

            if claimed.rows_affected() == 0 {
                let active: Option<bool> =
                    sqlx::query_scalar("SELECT active FROM tournaments WHERE id = $1")
                        .bind(tournament_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Ok::<_, StoreError>(if active == Some(true) {
                    Err(GroupCreation::Stale)
                } else {
                    Err(GroupCreation::TournamentClosed)
                });
            }

            let row = sqlx::query(
                r#"
                INSERT INTO tournament_groups (tournament_id, status)
                VALUES ($1, $2)
                RETURNING id, version
                "#,
            )
            .bind(tournament_id)
            .bind(GroupStatus::Waiting.as_str())
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(Ok(Group {
                id: row.get("id"),
                tournament_id,
                status: GroupStatus::Waiting,
                members: Roster::new(),
                version: row.get("version"),
            }))
        })
        .await?;

        Ok(match created {
            Ok(group) => GroupCreation::Created(group),
            Err(outcome) => outcome,
        })
    }

    async fn commit_join(&self, commit: &JoinCommit) -> StoreResult<JoinOutcome> {
        let outcome = with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let active: Option<bool> =
                sqlx::query_scalar("SELECT active FROM tournaments WHERE id = $1 FOR SHARE")
                    .bind(commit.tournament_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if active != Some(true) {
                return Ok::<_, StoreError>(JoinOutcome::TournamentClosed);
            }

            let group_row = sqlx::query(
                r#"
                UPDATE tournament_groups
                SET status = $1, member_count = member_count + 1, version = version + 1
                WHERE id = $2 AND tournament_id = $3 AND version = $4
                  AND status <> 'completed' AND member_count < $5
                RETURNING id
                "#,
            )
            .bind(commit.status_after.as_str())
            .bind(commit.group_id)
            .bind(commit.tournament_id)
            .bind(commit.expected_group_version)
            .bind(GROUP_CAPACITY as i32)
            .fetch_optional(&mut *tx)
            .await?;
            if group_row.is_none() {
                return Ok(JoinOutcome::GroupConflict);
            }

            // UNIQUE (group_id, country) backs the diversity rule
            let inserted = sqlx::query(
                r#"
                INSERT INTO group_members (group_id, user_id, country)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(commit.group_id)
            .bind(commit.member.user_id)
            .bind(commit.member.country.name())
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                return Ok(JoinOutcome::GroupConflict);
            }

            let user_row = sqlx::query(
                r#"
                UPDATE users
                SET coins = $1, level = $2, score = $3, group_id = $4,
                    pending_reward = $5, version = version + 1
                WHERE id = $6 AND version = $7
                RETURNING id, coins, level, country, score, group_id, pending_reward, version
                "#,
            )
            .bind(commit.user.coins)
            .bind(commit.user.level)
            .bind(commit.user.score)
            .bind(commit.user.group_id)
            .bind(commit.user.pending_reward.as_str())
            .bind(commit.user.id)
            .bind(commit.user.version)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(user_row) = user_row else {
                return Ok(JoinOutcome::UserConflict);
            };
            let user = user_from_row(&user_row)?;

            tx.commit().await?;
            Ok(JoinOutcome::Committed {
                // Placeholder replaced below once the roster is reloaded
                group: Group {
                    id: commit.group_id,
                    tournament_id: commit.tournament_id,
                    status: commit.status_after,
                    members: Roster::new(),
                    version: commit.expected_group_version + 1,
                },
                user,
            })
        })
        .await?;

        match outcome {
            JoinOutcome::Committed { group, user } => {
                let group = self.find_group(group.id).await?.unwrap_or(group);
                Ok(JoinOutcome::Committed { group, user })
            }
            other => Ok(other),
        }
    }

    async fn settle_group(
        &self,
        group_id: GroupId,
        grants: &[RewardGrant],
    ) -> StoreResult<Option<usize>> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let completed = sqlx::query(
                r#"
                UPDATE tournament_groups
                SET status = 'completed', version = version + 1
                WHERE id = $1 AND status <> 'completed'
                "#,
            )
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
            if completed.rows_affected() == 0 {
                return Ok::<_, StoreError>(None);
            }

            let mut recorded = 0;
            for grant in grants {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO reward_grants (tournament_id, group_id, placement, user_id, reward)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (tournament_id, group_id, placement) DO NOTHING
                    "#,
                )
                .bind(grant.tournament_id)
                .bind(grant.group_id)
                .bind(grant.placement as i32)
                .bind(grant.user_id)
                .bind(grant.reward.as_str())
                .execute(&mut *tx)
                .await?;
                if inserted.rows_affected() == 0 {
                    continue;
                }

                sqlx::query(
                    "UPDATE users SET pending_reward = $1, version = version + 1 WHERE id = $2",
                )
                .bind(grant.reward.as_str())
                .bind(grant.user_id)
                .execute(&mut *tx)
                .await?;
                recorded += 1;
            }

            tx.commit().await?;
            Ok(Some(recorded))
        })
        .await
    }
}

#[async_trait]
impl TournamentRepository for PgStore {
    async fn find_active(&self) -> StoreResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, active, created_at, ended_at, finalized, group_count
                FROM tournaments
                WHERE active
                "#,
            )
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(tournament_from_row))
    }

    async fn find_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> StoreResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, active, created_at, ended_at, finalized, group_count
                FROM tournaments
                WHERE id = $1
                "#,
            )
            .bind(tournament_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(tournament_from_row))
    }

    async fn create_active(&self, now: DateTime<Utc>) -> StoreResult<Option<Tournament>> {
        // The partial unique index on `active` turns a second active row into a no-op
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO tournaments (active, created_at)
                VALUES (TRUE, $1)
                ON CONFLICT DO NOTHING
                RETURNING id, active, created_at, ended_at, finalized, group_count
                "#,
            )
            .bind(now)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(tournament_from_row))
    }

    async fn deactivate(
        &self,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE tournaments SET active = FALSE, ended_at = $1 WHERE id = $2 AND active",
            )
            .bind(now)
            .bind(tournament_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_unfinalized(&self) -> StoreResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, active, created_at, ended_at, finalized, group_count
                FROM tournaments
                WHERE NOT active AND NOT finalized
                ORDER BY id DESC
                LIMIT 1
                "#,
            )
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(tournament_from_row))
    }

    async fn finalize(&self, tournament_id: TournamentId) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query("UPDATE tournaments SET finalized = TRUE WHERE id = $1")
                .bind(tournament_id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
