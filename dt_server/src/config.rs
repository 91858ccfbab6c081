//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use daily_tournament::{db::DatabaseConfig, domain::constants::DEFAULT_MAX_ATTEMPTS};
use std::{fmt, net::SocketAddr, str::FromStr};

/// Where durable tournament state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local store, lost on restart
    Memory,
    /// PostgreSQL through `DATABASE_URL`
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => Err(ConfigError::Invalid {
                var: "STORAGE_BACKEND".to_string(),
                reason: format!("Unknown backend '{}', expected memory or postgres", other),
            }),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => f.write_str("memory"),
            StorageBackend::Postgres => f.write_str("postgres"),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Storage backend
    pub storage: StorageBackend,
    /// Database configuration, used by the postgres backend
    pub database: DatabaseConfig,
    /// Lifecycle clock settings
    pub clock: ClockConfig,
    /// Group assignment attempt budget
    pub assign_max_attempts: u32,
    /// Prometheus scrape address; no exporter when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Expose manual start/end/rebuild routes
    pub admin_routes_enabled: bool,
}

/// Lifecycle clock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Run the background tick task
    pub enabled: bool,
    /// Seconds between ticks
    pub tick_secs: u64,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub storage: Option<StorageBackend>,
    pub database_url: Option<String>,
    pub no_clock: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_env_addr("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080))),
        };

        let storage = match overrides.storage {
            Some(storage) => storage,
            None => match std::env::var("STORAGE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => StorageBackend::Memory,
            },
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = overrides.database_url {
            database.database_url = url;
        }

        let clock = ClockConfig {
            enabled: !overrides.no_clock && parse_env_or("LIFECYCLE_CLOCK_ENABLED", true),
            tick_secs: parse_env_or("LIFECYCLE_TICK_SECS", 30),
        };

        Ok(ServerConfig {
            bind,
            storage,
            database,
            clock,
            assign_max_attempts: parse_env_or("ASSIGN_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            metrics_bind: parse_env_addr("METRICS_BIND")?,
            admin_routes_enabled: parse_env_or("ADMIN_ROUTES_ENABLED", false),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock.tick_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LIFECYCLE_TICK_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        // A coarser tick could miss the whole gap between End and the next Start
        if self.clock.tick_secs > 3600 {
            return Err(ConfigError::Invalid {
                var: "LIFECYCLE_TICK_SECS".to_string(),
                reason: "Must be at most 3600".to_string(),
            });
        }

        if self.assign_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "ASSIGN_MAX_ATTEMPTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.storage == StorageBackend::Postgres {
            if self.database.database_url.is_empty() {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set a postgres:// URL or use STORAGE_BACKEND=memory".to_string(),
                });
            }

            if self.database.max_connections < self.database.min_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS".to_string(),
                    reason: format!(
                        "Must be at least DB_MIN_CONNECTIONS ({})",
                        self.database.min_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from the server bind address ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// An address variable that is set must parse
fn parse_env_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{}' is not an IP:PORT address", v),
        }),
        _ => Ok(None),
    }
}
