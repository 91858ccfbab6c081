//! Fixed-capacity, country-keyed member set of a group.

use super::{
    constants::GROUP_CAPACITY,
    country::{COUNTRY_COUNT, Country},
    models::UserId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `(user, country)` pair held by a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: UserId,
    pub country: Country,
}

/// Why a member could not be admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("Group is full")]
    Full,

    #[error("Group already has a member from {0}")]
    CountryTaken(Country),

    #[error("User {0} is already a member")]
    AlreadyMember(UserId),
}

/// Group members, one slot per catalog country.
///
/// The slot layout makes the diversity rule structural: two members of the
/// same country cannot be represented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<GroupMember>", try_from = "Vec<GroupMember>")]
pub struct Roster {
    slots: [Option<UserId>; COUNTRY_COUNT],
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.len() >= GROUP_CAPACITY
    }

    pub fn has_country(&self, country: Country) -> bool {
        self.slots[country.index()].is_some()
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.slots.contains(&Some(user_id))
    }

    /// Whether a user from `country` could join right now.
    pub fn can_admit(&self, country: Country) -> bool {
        !self.is_full() && !self.has_country(country)
    }

    pub fn admit(&mut self, member: GroupMember) -> Result<(), RosterError> {
        if self.contains_user(member.user_id) {
            return Err(RosterError::AlreadyMember(member.user_id));
        }
        if self.is_full() {
            return Err(RosterError::Full);
        }
        let slot = &mut self.slots[member.country.index()];
        if slot.is_some() {
            return Err(RosterError::CountryTaken(member.country));
        }
        *slot = Some(member.user_id);
        Ok(())
    }

    /// Members in slot order.
    pub fn members(&self) -> Vec<GroupMember> {
        let mut countries = crate::domain::CATALOG;
        countries.sort();
        countries
            .into_iter()
            .filter_map(|country| {
                self.slots[country.index()].map(|user_id| GroupMember { user_id, country })
            })
            .collect()
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.slots.iter().flatten().copied().collect()
    }
}

impl From<Roster> for Vec<GroupMember> {
    fn from(roster: Roster) -> Self {
        roster.members()
    }
}

impl TryFrom<Vec<GroupMember>> for Roster {
    type Error = RosterError;

    fn try_from(members: Vec<GroupMember>) -> Result<Self, Self::Error> {
        let mut roster = Roster::new();
        for member in members {
            roster.admit(member)?;
        }
        Ok(roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CATALOG;

    fn member(user_id: UserId, country: Country) -> GroupMember {
        GroupMember { user_id, country }
    }

    #[test]
    fn test_admit_until_full() {
        let mut roster = Roster::new();
        for (i, country) in CATALOG.into_iter().enumerate() {
            assert!(roster.can_admit(country));
            roster.admit(member(i as UserId + 1, country)).unwrap();
        }
        assert_eq!(roster.len(), GROUP_CAPACITY);
        assert!(roster.is_full());
        assert!(!roster.can_admit(Country::Turkey));
    }

    #[test]
    fn test_rejects_duplicate_country() {
        let mut roster = Roster::new();
        roster.admit(member(1, Country::Germany)).unwrap();
        assert_eq!(
            roster.admit(member(2, Country::Germany)),
            Err(RosterError::CountryTaken(Country::Germany))
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_rejects_same_user_twice() {
        let mut roster = Roster::new();
        roster.admit(member(7, Country::France)).unwrap();
        assert_eq!(
            roster.admit(member(7, Country::Turkey)),
            Err(RosterError::AlreadyMember(7))
        );
    }

    #[test]
    fn test_members_sorted_by_country_name() {
        let mut roster = Roster::new();
        roster.admit(member(3, Country::Usa)).unwrap();
        roster.admit(member(4, Country::France)).unwrap();
        let countries: Vec<Country> = roster.members().iter().map(|m| m.country).collect();
        assert_eq!(countries, vec![Country::France, Country::Usa]);
        assert!(roster.contains_user(3));
        assert!(!roster.contains_user(5));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_country() {
        let json = r#"[{"user_id":1,"country":"Turkey"},{"user_id":2,"country":"Turkey"}]"#;
        assert!(serde_json::from_str::<Roster>(json).is_err());
    }
}
