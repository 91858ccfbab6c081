//! # Daily Tournament
//!
//! Daily group tournaments: eligible players are matched into groups of five
//! distinct countries, compete on live leaderboards, and the top two of every
//! full group earn a reward when the tournament closes.
//!
//! ## Architecture
//!
//! The durable record (users, groups, tournaments) is authoritative. Every
//! mutation is a versioned compare-and-swap, so concurrent joins never need a
//! global lock. Leaderboards are a ranked projection of durable scores that
//! may lag and can always be rebuilt.
//!
//! ## Core Modules
//!
//! - [`domain`]: Entities, the country catalog and fixed game rules
//! - [`db`]: Repository traits with in-memory and PostgreSQL stores
//! - [`leaderboard`]: Ranked store contract and the score projection
//! - [`tournament`]: Group assignment, lifecycle and reward settlement
//! - [`users`]: Account creation, level-up and reward claims

pub mod db;
pub mod domain;
pub mod leaderboard;
pub mod tournament;
pub mod users;

pub use domain::{Country, Group, GroupStatus, PendingReward, Tournament, User};
pub use tournament::{ErrorKind, TournamentError, TournamentLifecycleManager, TournamentService};
pub use users::{UserError, UserManager};
