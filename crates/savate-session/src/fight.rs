//! Fight categories and the ruleset each one implies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Scoring variant selected by the fight type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ruleset {
    /// Light contact. No standing counts.
    Assault,
    /// Full contact. Standing counts deduct a point each.
    Combat,
}

/// Bout category chosen by the delegate when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FightType {
    Assaut,
    Combat2Espoirs,
    Combat1Espoirs,
    Combat2Seniors,
    Combat1Seniors,
}

impl FightType {
    /// Every category, in display order.
    pub const ALL: [FightType; 5] = [
        Self::Assaut,
        Self::Combat2Espoirs,
        Self::Combat1Espoirs,
        Self::Combat2Seniors,
        Self::Combat1Seniors,
    ];

    /// Wire value, as exchanged in `session_config`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assaut => "assaut",
            Self::Combat2Espoirs => "combat2espoirs",
            Self::Combat1Espoirs => "combat1espoirs",
            Self::Combat2Seniors => "combat2seniors",
            Self::Combat1Seniors => "combat1seniors",
        }
    }

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assaut => "Assaut (3 reprises)",
            Self::Combat2Espoirs => "Combat 2ème Série Espoirs (3 reprises)",
            Self::Combat1Espoirs => "Combat 1ère Série Espoirs (5 reprises)",
            Self::Combat2Seniors => "Combat 2ème Série Seniors (3 reprises)",
            Self::Combat1Seniors => "Combat 1ère Série Seniors (5 reprises)",
        }
    }

    /// Number of rounds: 5 for the 1st-series categories, 3 otherwise.
    pub const fn round_count(self) -> u8 {
        match self {
            Self::Combat1Espoirs | Self::Combat1Seniors => 5,
            _ => 3,
        }
    }

    pub const fn ruleset(self) -> Ruleset {
        match self {
            Self::Assaut => Ruleset::Assault,
            _ => Ruleset::Combat,
        }
    }

    pub const fn is_combat(self) -> bool {
        matches!(self.ruleset(), Ruleset::Combat)
    }
}

impl fmt::Display for FightType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FightType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| Error::UnknownFightType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_series_fights_have_five_rounds() {
        assert_eq!(FightType::Combat1Espoirs.round_count(), 5);
        assert_eq!(FightType::Combat1Seniors.round_count(), 5);
        assert_eq!(FightType::Combat2Espoirs.round_count(), 3);
        assert_eq!(FightType::Combat2Seniors.round_count(), 3);
        assert_eq!(FightType::Assaut.round_count(), 3);
    }

    #[test]
    fn only_assaut_uses_the_assault_ruleset() {
        assert_eq!(FightType::Assaut.ruleset(), Ruleset::Assault);
        for fight in FightType::ALL.into_iter().skip(1) {
            assert!(fight.is_combat(), "{fight} should be combat");
        }
    }

    #[test]
    fn wire_value_round_trips_through_serde_and_from_str() {
        for fight in FightType::ALL {
            let json = serde_json::to_string(&fight).unwrap();
            assert_eq!(json, format!("\"{}\"", fight.as_str()));
            assert_eq!(fight.as_str().parse::<FightType>().unwrap(), fight);
        }
    }

    #[test]
    fn unknown_fight_type_is_rejected() {
        assert_eq!(
            "boxe".parse::<FightType>(),
            Err(Error::UnknownFightType("boxe".to_string()))
        );
    }
}
