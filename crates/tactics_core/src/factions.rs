//! Faction definitions and hostility.

use serde::{Deserialize, Serialize};

/// Side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Faction {
    /// The player's squad.
    Player,
    /// Hostile creatures and soldiers.
    #[default]
    Enemy,
    /// Props and bystanders. Never a combatant.
    Neutral,
}

impl Faction {
    /// True when units of the two factions fight each other.
    ///
    /// Neutral units are hostile to nobody and nobody is hostile to them.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Player, Self::Enemy) | (Self::Enemy, Self::Player)
        )
    }

    /// Get the short name for this faction.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostility_is_symmetric() {
        for a in [Faction::Player, Faction::Enemy, Faction::Neutral] {
            for b in [Faction::Player, Faction::Enemy, Faction::Neutral] {
                assert_eq!(a.is_hostile_to(b), b.is_hostile_to(a));
            }
        }
    }

    #[test]
    fn test_neutral_is_never_hostile() {
        assert!(!Faction::Neutral.is_hostile_to(Faction::Player));
        assert!(!Faction::Neutral.is_hostile_to(Faction::Enemy));
        assert!(Faction::Player.is_hostile_to(Faction::Enemy));
        assert!(!Faction::Player.is_hostile_to(Faction::Player));
    }
}
