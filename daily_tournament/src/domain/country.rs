//! The fixed country catalog.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// A catalog country.
///
/// Variants are declared in ascending order of their display names, so the
/// derived `Ord` is the alphabetical order used to break leaderboard ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Country {
    France,
    Germany,
    Turkey,
    #[serde(rename = "USA")]
    Usa,
    #[serde(rename = "United Kingdom")]
    UnitedKingdom,
}

/// Number of countries in the catalog.
pub const COUNTRY_COUNT: usize = 5;

/// The catalog, in the order it is presented to players.
pub const CATALOG: [Country; COUNTRY_COUNT] = [
    Country::Turkey,
    Country::Germany,
    Country::Usa,
    Country::France,
    Country::UnitedKingdom,
];

impl Country {
    /// Display name, also the persisted representation.
    pub fn name(self) -> &'static str {
        match self {
            Country::France => "France",
            Country::Germany => "Germany",
            Country::Turkey => "Turkey",
            Country::Usa => "USA",
            Country::UnitedKingdom => "United Kingdom",
        }
    }

    /// Stable slot index in `0..COUNTRY_COUNT`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pick a catalog country uniformly at random.
    pub fn random() -> Self {
        let idx = rand::rng().random_range(0..COUNTRY_COUNT);
        CATALOG[idx]
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name a catalog country.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown country: {0}")]
pub struct ParseCountryError(pub String);

impl FromStr for Country {
    type Err = ParseCountryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "france" => Ok(Country::France),
            "germany" => Ok(Country::Germany),
            "turkey" => Ok(Country::Turkey),
            "usa" | "united states" => Ok(Country::Usa),
            "united kingdom" | "uk" => Ok(Country::UnitedKingdom),
            _ => Err(ParseCountryError(s.to_string())),
        }
    }
}
