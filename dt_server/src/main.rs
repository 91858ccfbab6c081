//! Daily tournament server.
//!
//! Serves the tournament API and runs the lifecycle clock that opens and
//! closes the daily tournament.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Error;
use daily_tournament::{
    TournamentError,
    db::{Database, Repositories},
    leaderboard::InMemoryLeaderboardStore,
};
use dt_server::{
    api,
    config::{CliOverrides, ServerConfig, StorageBackend},
    logging, metrics, scheduler,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run the daily tournament server

USAGE:
  dt_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --storage    BACKEND     memory or postgres          [default: env STORAGE_BACKEND or memory]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --no-clock               Don't run the lifecycle clock
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  STORAGE_BACKEND          memory or postgres
  DATABASE_URL             PostgreSQL connection string
  LIFECYCLE_TICK_SECS      Seconds between lifecycle ticks
  LIFECYCLE_CLOCK_ENABLED  Run the lifecycle clock
  ASSIGN_MAX_ATTEMPTS      Retry budget of concurrent updates
  METRICS_BIND             Prometheus scrape address
  ADMIN_ROUTES_ENABLED     Expose manual start/end/rebuild routes
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        no_clock: pargs.contains("--no-clock"),
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        storage: pargs.opt_value_from_str::<_, StorageBackend>("--storage")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;
    info!(
        "Starting daily tournament server at {} with {} storage",
        config.bind, config.storage
    );

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{}/metrics", addr);
    }

    let (repos, database) = match config.storage {
        StorageBackend::Memory => (Repositories::in_memory(), None),
        StorageBackend::Postgres => {
            let db = Database::new(&config.database)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database connected and migrated");
            (Repositories::postgres(&db), Some(db))
        }
    };

    let state = api::AppState::new(&repos, Arc::new(InMemoryLeaderboardStore::new()), database.clone())
        .with_max_attempts(config.assign_max_attempts)
        .with_admin_routes(config.admin_routes_enabled);

    // The ranked store is process-local; restore it from durable scores
    match state.service.rebuild_leaderboards().await {
        Ok(groups) => info!("Restored leaderboards of {} group(s)", groups),
        Err(TournamentError::NoActiveTournament) => info!("No active tournament to restore"),
        Err(e) => log::warn!("Failed to restore leaderboards: {}", e),
    }

    let clock = if config.clock.enabled {
        Some(scheduler::spawn(
            state.service.lifecycle().clone(),
            Duration::from_secs(config.clock.tick_secs),
        ))
    } else {
        info!("Lifecycle clock disabled");
        None
    };

    if config.admin_routes_enabled {
        log::warn!("Admin routes are enabled");
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    if let Some(clock) = clock {
        clock.abort();
    }
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
