//! Domain model: entities, the country catalog and fixed game rules.

pub mod constants;
pub mod country;
pub mod models;
pub mod roster;

pub use country::{CATALOG, COUNTRY_COUNT, Country, ParseCountryError};
pub use models::{
    Group, GroupId, GroupStatus, ParseEnumError, PendingReward, Tournament, TournamentId, User,
    UserId, Version,
};
pub use roster::{GroupMember, Roster, RosterError};
