//! Combat component definitions.
//!
//! Components are plain data. Behaviour that needs the map or other units
//! lives in the system modules ([`crate::ai`], [`crate::combat`],
//! [`crate::projectile`]) and in [`crate::simulation`].

use serde::{Deserialize, Serialize};

use crate::items::Item;
use crate::math::{decimal_serde, Fixed};

// ============================================================================
// Stats
// ============================================================================

/// Base statistics of a combatant.
///
/// Deserializing a partial stat block fills the missing fields from
/// [`MobStats::default`], so templates only list what they override.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MobStats {
    /// Current hit points.
    pub health: i32,
    /// Unarmed melee attack.
    pub attack: i32,
    /// Damage subtracted from every incoming hit.
    pub defence: i32,
    /// Actions per turn. A pace of 2 acts every half turn.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,
    /// Innate reach. Weapons carry their own range.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Willingness to stay in a losing fight.
    pub morale: i32,
}

impl Default for MobStats {
    fn default() -> Self {
        Self {
            health: 100,
            attack: 12,
            defence: 0,
            speed: Fixed::ONE,
            range: Fixed::ONE,
            morale: 100,
        }
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// Equipment slot an item occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slot {
    /// Helmets. Contributes defence for player units.
    Head,
    /// Body armour. Contributes defence for player units.
    Suit,
    /// Firearms and energy weapons.
    Ranged,
    /// Blades and clubs.
    Melee,
    /// Anything else.
    #[default]
    Extra,
}

impl Slot {
    /// All slots in display order.
    pub const ALL: [Self; 5] = [Self::Head, Self::Suit, Self::Ranged, Self::Melee, Self::Extra];
}

/// The five equipment slots of a mob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Equipment {
    /// Head slot.
    pub head: Option<Item>,
    /// Suit slot.
    pub suit: Option<Item>,
    /// Ranged weapon slot.
    pub ranged: Option<Item>,
    /// Melee weapon slot.
    pub melee: Option<Item>,
    /// Utility slot.
    pub extra: Option<Item>,
}

impl Equipment {
    /// Borrow the item in a slot.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&Item> {
        match slot {
            Slot::Head => self.head.as_ref(),
            Slot::Suit => self.suit.as_ref(),
            Slot::Ranged => self.ranged.as_ref(),
            Slot::Melee => self.melee.as_ref(),
            Slot::Extra => self.extra.as_ref(),
        }
    }

    /// Mutably borrow the item in a slot.
    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Item> {
        self.slot_mut(slot).as_mut()
    }

    /// Put an item into a slot, returning whatever was there.
    pub fn replace(&mut self, slot: Slot, item: Option<Item>) -> Option<Item> {
        std::mem::replace(self.slot_mut(slot), item)
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Item> {
        match slot {
            Slot::Head => &mut self.head,
            Slot::Suit => &mut self.suit,
            Slot::Ranged => &mut self.ranged,
            Slot::Melee => &mut self.melee,
            Slot::Extra => &mut self.extra,
        }
    }

    /// Defence granted by worn armour (head + suit). Weapons never count.
    #[must_use]
    pub fn armour_defence(&self) -> i32 {
        [&self.head, &self.suit]
            .into_iter()
            .flatten()
            .map(|item| item.stats.defence)
            .sum()
    }
}

// ============================================================================
// Behaviour
// ============================================================================

/// Squad-member stance when not directly controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Stance {
    /// Trail the controlled unit.
    #[default]
    Follow,
    /// Stay put and shoot whatever comes into view.
    Hold,
}

impl Stance {
    /// The other stance.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Follow => Self::Hold,
            Self::Hold => Self::Follow,
        }
    }
}

/// Decision policy of a mob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AiArchetype {
    /// Shoot if possible, else melee, else advance.
    #[default]
    Basic,
    /// Melee first, then shoot, else advance.
    Aggressive,
    /// Keep to three quarters of weapon range and shoot.
    Ranged,
    /// Melee or advance, nothing else.
    MeleeAggressive,
    /// Squad member driven by player commands or squad AI.
    Player,
    /// Terminal state.
    Dead,
}

// ============================================================================
// Status effects
// ============================================================================

/// Kind of temporary condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Loses its next turn.
    Stunned,
}

impl StatusKind {
    /// Lowercase label used in narration.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stunned => "stunned",
        }
    }
}

/// A condition with a remaining duration in turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEffect {
    /// What the effect does.
    pub kind: StatusKind,
    /// Turns left. Removed when it reaches 0.
    pub remaining: u32,
}

// ============================================================================
// Mob
// ============================================================================

/// Combat payload of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mob {
    /// Decision policy.
    pub archetype: AiArchetype,
    /// Current statistics.
    pub stats: MobStats,
    /// Worn and wielded items.
    pub equipment: Equipment,
    /// Follow or hold.
    pub stance: Stance,
    /// Squad members shoot on their own when set.
    pub autofire: bool,
    /// Turn of the last shot fired.
    pub last_fire_turn: u64,
    /// Custom line printed when this mob dies.
    pub death_message: Option<String>,
}

impl Mob {
    /// Create a mob with default behaviour flags.
    #[must_use]
    pub fn new(archetype: AiArchetype, stats: MobStats) -> Self {
        Self {
            archetype,
            stats,
            equipment: Equipment::default(),
            stance: Stance::Follow,
            autofire: true,
            last_fire_turn: 0,
            death_message: None,
        }
    }

    /// True unless the mob has died.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.archetype != AiArchetype::Dead
    }

    /// Equipped ranged weapon.
    #[must_use]
    pub fn ranged_weapon(&self) -> Option<&Item> {
        self.equipment.ranged.as_ref()
    }

    /// Attack used for melee: the melee weapon when it has a positive
    /// attack, otherwise the mob's own.
    #[must_use]
    pub fn melee_attack(&self) -> i32 {
        match &self.equipment.melee {
            Some(weapon) if weapon.stats.attack > 0 => weapon.stats.attack,
            _ => self.stats.attack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{Item, ItemStats};

    fn armour(slot: Slot, defence: i32) -> Item {
        Item {
            slot,
            stats: ItemStats {
                defence,
                ..ItemStats::default()
            },
            ..Item::named("plate")
        }
    }

    #[test]
    fn test_default_stats() {
        let stats = MobStats::default();
        assert_eq!(stats.health, 100);
        assert_eq!(stats.attack, 12);
        assert_eq!(stats.speed, Fixed::ONE);
        assert_eq!(stats.morale, 100);
    }

    #[test]
    fn test_partial_stats_merge_with_defaults() {
        let stats: MobStats = ron::from_str("(health: 40, speed: 1.5)").unwrap();
        assert_eq!(stats.health, 40);
        assert_eq!(stats.speed, Fixed::from_num(1.5));
        assert_eq!(stats.attack, 12);
        assert_eq!(stats.morale, 100);
    }

    #[test]
    fn test_armour_defence_ignores_weapons() {
        let mut equipment = Equipment::default();
        equipment.replace(Slot::Head, Some(armour(Slot::Head, 2)));
        equipment.replace(Slot::Suit, Some(armour(Slot::Suit, 5)));
        equipment.replace(Slot::Melee, Some(armour(Slot::Melee, 9)));
        assert_eq!(equipment.armour_defence(), 7);
    }

    #[test]
    fn test_replace_returns_previous() {
        let mut equipment = Equipment::default();
        assert!(equipment.replace(Slot::Suit, Some(armour(Slot::Suit, 5))).is_none());
        let old = equipment.replace(Slot::Suit, None);
        assert_eq!(old.map(|i| i.stats.defence), Some(5));
        assert_eq!(equipment.armour_defence(), 0);
    }

    #[test]
    fn test_melee_attack_prefers_positive_weapon() {
        let mut mob = Mob::new(AiArchetype::Basic, MobStats::default());
        assert_eq!(mob.melee_attack(), 12);

        let mut blade = Item::named("blade");
        blade.slot = Slot::Melee;
        blade.stats.attack = 20;
        mob.equipment.melee = Some(blade);
        assert_eq!(mob.melee_attack(), 20);

        if let Some(weapon) = mob.equipment.melee.as_mut() {
            weapon.stats.attack = 0;
        }
        assert_eq!(mob.melee_attack(), 12);
    }

    #[test]
    fn test_stance_toggle() {
        assert_eq!(Stance::Follow.toggled(), Stance::Hold);
        assert_eq!(Stance::Hold.toggled(), Stance::Follow);
    }
}
