//! Player accounts: creation, level-up and reward claims.

pub mod errors;
pub mod manager;

pub use errors::{UserError, UserResult};
pub use manager::{ClaimedReward, UserManager};
