//! Durable storage: repository traits, the in-memory and PostgreSQL
//! implementations, and connection pooling.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::{sync::Arc, time::Duration};

pub mod config;
pub mod errors;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use repository::{
    GroupCreation, GroupRepository, JoinCommit, JoinOutcome, LevelUpOutcome, RewardGrant,
    TournamentRepository, UserRepository,
};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use daily_tournament::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), daily_tournament::db::StoreError> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StoreResult<()> {
        timeouts::with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// The three repositories, backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub tournaments: Arc<dyn TournamentRepository>,
}

impl Repositories {
    /// Repositories sharing one in-memory store
    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    /// Repositories sharing one PostgreSQL pool
    pub fn postgres(database: &Database) -> Self {
        Self::from_store(Arc::new(PgStore::new(database.pool().clone())))
    }

    /// Use one value for all three repository roles
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + GroupRepository + TournamentRepository + 'static,
    {
        Self {
            users: store.clone(),
            groups: store.clone(),
            tournaments: store,
        }
    }
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../../migrations/20261019000000_tournament_schema.sql");

    #[test]
    fn test_schema_keeps_user_counters_non_negative() {
        for check in ["CHECK (coins >= 0)", "CHECK (level >= 1)", "CHECK (score >= 0)"] {
            assert!(SCHEMA.contains(check), "missing {check}");
        }
    }
}
