//! Domain constants shared by every component.
//!
//! These are fixed rules of the game, not tunable policy.

/// Number of members in a full group.
pub const GROUP_CAPACITY: usize = 5;

/// Coins debited when a user enters a tournament.
pub const ENTRY_FEE: i64 = 1_000;

/// Minimum level required to enter a tournament.
pub const MIN_ENTRY_LEVEL: i32 = 20;

/// Minimum coin balance required to enter a tournament.
pub const MIN_ENTRY_COINS: i64 = ENTRY_FEE;

/// Coins granted on every level-up.
pub const LEVEL_UP_COINS: i64 = 25;

/// Score granted on a level-up while grouped in an active group.
pub const LEVEL_UP_SCORE: i64 = 1;

/// Claim value of a first place finish.
pub const FIRST_PLACE_REWARD: i64 = 10_000;

/// Claim value of a second place finish.
pub const SECOND_PLACE_REWARD: i64 = 5_000;

/// Coin balance of a freshly created user.
pub const STARTING_COINS: i64 = 5_000;

/// Level of a freshly created user.
pub const STARTING_LEVEL: i32 = 1;

/// Hour (UTC) at which the daily tournament opens.
pub const TOURNAMENT_START_HOUR_UTC: u32 = 0;

/// Hour (UTC) at which the daily tournament closes.
pub const TOURNAMENT_END_HOUR_UTC: u32 = 20;

/// Default bound on optimistic-concurrency attempts per operation.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;
