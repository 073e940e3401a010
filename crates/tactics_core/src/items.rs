//! Items and weapons.
//!
//! Items are value types. A unit owns its own copy, so ammo spent by one
//! soldier never drains the template or another soldier's rifle.

use serde::{Deserialize, Serialize};

use crate::components::{Slot, StatusKind};
use crate::math::{decimal_serde, Fixed};

/// Stat bundle of an item. Every field defaults to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemStats {
    /// Weapon attack (mean projectile damage, or melee attack).
    pub attack: i32,
    /// Armour value.
    pub defence: i32,
    /// Bonus hit points. Informational.
    pub health: i32,
    /// Movement modifier. Informational.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Maximum firing distance.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Fire delay. Informational.
    pub delay: i32,
    /// Morale modifier. Informational.
    pub morale: i32,
    /// Non-zero when the weapon can be reloaded in the field.
    pub reload: i32,
    /// Rounds left in the magazine.
    pub ammo: i32,
    /// Magazine size. Zero means the weapon never runs dry.
    pub max_ammo: i32,
    /// Base chance to hit the intended target, in `[0, 1]`.
    #[serde(with = "decimal_serde")]
    pub accuracy: Fixed,
    /// Oxygen supply carried. Informational.
    pub oxygen: i32,
    /// Blast radius. Zero for single-target weapons.
    #[serde(with = "decimal_serde")]
    pub aoe: Fixed,
}

/// Probabilistic status applied by single-target hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnHitEffect {
    /// Chance to apply, in `[0, 1]`.
    #[serde(with = "decimal_serde")]
    pub chance: Fixed,
    /// Condition applied.
    pub status: StatusKind,
    /// Duration in turns.
    pub duration: u32,
}

/// Weapon family, used for narration verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponClass {
    /// Bullets and slugs.
    Projectile,
    /// Beam weapons.
    Laser,
    /// Plasma casters.
    Plasma,
    /// Knives and swords.
    Bladed,
    /// Not a weapon, or a blunt one.
    #[default]
    Other,
}

impl WeaponClass {
    /// Verb used when a weapon of this class deals damage.
    #[must_use]
    pub const fn damage_verb(self) -> &'static str {
        match self {
            Self::Projectile => "shoots",
            Self::Laser => "sears",
            Self::Plasma => "blasts",
            Self::Bladed => "slashes",
            Self::Other => "hits",
        }
    }
}

/// An item instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Display name.
    pub name: String,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
    /// Slot this item is equipped into.
    #[serde(default)]
    pub slot: Slot,
    /// Weapon family.
    #[serde(default)]
    pub class: WeaponClass,
    /// Stat bundle.
    #[serde(default)]
    pub stats: ItemStats,
    /// Status trigger on single-target hits.
    #[serde(default)]
    pub on_hit: Option<OnHitEffect>,
}

impl Item {
    /// A bare item with the given name and zeroed stats.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            slot: Slot::Extra,
            class: WeaponClass::Other,
            stats: ItemStats::default(),
            on_hit: None,
        }
    }

    /// True when the weapon tracks a magazine.
    #[must_use]
    pub fn uses_ammo(&self) -> bool {
        self.stats.max_ammo > 0
    }

    /// True when the magazine is tracked and empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uses_ammo() && self.stats.ammo <= 0
    }

    /// True when field reloads are possible.
    #[must_use]
    pub fn can_reload(&self) -> bool {
        self.stats.reload > 0
    }

    /// Refill the magazine.
    pub fn refill(&mut self) {
        self.stats.ammo = self.stats.max_ammo;
    }

    /// Spend one round if the weapon tracks ammo.
    pub fn spend_round(&mut self) {
        if self.uses_ammo() {
            self.stats.ammo = (self.stats.ammo - 1).max(0);
        }
    }

    /// True when hits splash over a radius.
    #[must_use]
    pub fn is_area(&self) -> bool {
        self.stats.aoe > Fixed::ZERO
    }
}
