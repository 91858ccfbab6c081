//! Daily tournaments: group assignment, lifecycle and rewards.
//!
//! ## Example
//!
//! ```no_run
//! use daily_tournament::db::Repositories;
//! use daily_tournament::leaderboard::InMemoryLeaderboardStore;
//! use daily_tournament::tournament::TournamentService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repos = Repositories::in_memory();
//!     let service = TournamentService::new(&repos, Arc::new(InMemoryLeaderboardStore::new()));
//!
//!     service.lifecycle().start(chrono::Utc::now()).await?;
//!     let entry = service.enter_tournament(1).await?;
//!     println!("Joined group {}", entry.group.id);
//!
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod errors;
pub mod lifecycle;
pub mod rewards;
pub mod schedule;
pub mod service;

pub use assignment::GroupAssignmentEngine;
pub use errors::{ErrorKind, TournamentError, TournamentResult};
pub use lifecycle::{EndOutcome, EndReport, StartOutcome, TickOutcome, TournamentLifecycleManager};
pub use rewards::{Placement, RewardSettlement};
pub use schedule::DailySchedule;
pub use service::{CountryStanding, GroupEntry, GroupRank, GroupStanding, TournamentService};
