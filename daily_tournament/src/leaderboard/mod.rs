//! Ranked leaderboards: the store contract, an in-memory store and the
//! projection of durable scores into it.

pub mod errors;
pub mod memory;
pub mod projection;
pub mod store;

pub use errors::{LeaderboardError, LeaderboardResult, RebuildError};
pub use memory::InMemoryLeaderboardStore;
pub use projection::LeaderboardProjection;
pub use store::{Member, Namespace, RankedEntry, RankedLeaderboardStore};
