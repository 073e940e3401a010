//! Units on the tactical map and their storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{AiArchetype, Mob, Slot, StatusEffect, StatusKind};
use crate::factions::Faction;
use crate::items::Item;
use crate::math::{fixed_serde, Fixed, GridPos};

/// Unique identifier for units.
pub type UnitId = u32;

/// Anything that occupies a map cell: soldiers, monsters, props.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier, assigned by [`UnitStorage`].
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Cell the unit stands on.
    pub pos: GridPos,
    /// Side the unit fights for.
    pub faction: Faction,
    /// Combat payload. `None` for props.
    pub mob: Option<Mob>,
    /// Whether other units may walk through this one.
    pub passable: bool,
    /// Earliest (fractional) turn at which the unit may act again.
    #[serde(with = "fixed_serde")]
    pub next_action_turn: Fixed,
    /// Whether the player's squad can currently see this unit. Combatants
    /// start visible until a visibility pass says otherwise.
    pub visible: bool,
    /// Active conditions, oldest first.
    pub status_effects: Vec<StatusEffect>,
    /// Health ceiling captured at creation.
    pub original_health: i32,
}

impl Unit {
    /// Create a combatant.
    #[must_use]
    pub fn combatant(name: impl Into<String>, pos: GridPos, faction: Faction, mob: Mob) -> Self {
        let original_health = mob.stats.health.max(0);
        let mut unit = Self {
            id: 0,
            name: name.into(),
            pos,
            faction,
            mob: Some(mob),
            passable: false,
            next_action_turn: Fixed::ZERO,
            visible: true,
            status_effects: Vec::new(),
            original_health,
        };
        unit.refresh_defence();
        unit
    }

    /// Create a non-combat prop.
    #[must_use]
    pub fn prop(name: impl Into<String>, pos: GridPos, passable: bool) -> Self {
        Self {
            id: 0,
            name: name.into(),
            pos,
            faction: Faction::Neutral,
            mob: None,
            passable,
            next_action_turn: Fixed::ZERO,
            visible: false,
            status_effects: Vec::new(),
            original_health: 0,
        }
    }

    /// True for units with a living mob.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.mob.as_ref().is_some_and(Mob::is_alive)
    }

    /// True for living player units.
    #[must_use]
    pub fn is_squad_member(&self) -> bool {
        self.faction == Faction::Player && self.is_alive()
    }

    /// Current health, 0 for props.
    #[must_use]
    pub fn health(&self) -> i32 {
        self.mob.as_ref().map_or(0, |m| m.stats.health)
    }

    /// Current defence, 0 for props.
    #[must_use]
    pub fn defence(&self) -> i32 {
        self.mob.as_ref().map_or(0, |m| m.stats.defence)
    }

    /// Set health, clamped to `[0, original_health]`.
    pub fn set_health(&mut self, value: i32) {
        let ceiling = self.original_health;
        if let Some(mob) = self.mob.as_mut() {
            mob.stats.health = value.clamp(0, ceiling);
        }
    }

    /// Subtract damage (negative values are ignored). Returns the new health.
    pub fn apply_damage(&mut self, amount: i32) -> i32 {
        self.set_health(self.health() - amount.max(0));
        self.health()
    }

    /// Restore health up to the original ceiling. Returns the new health.
    pub fn heal(&mut self, amount: i32) -> i32 {
        self.set_health(self.health() + amount.max(0));
        self.health()
    }

    /// Fraction of original health remaining.
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        if self.original_health <= 0 {
            return Fixed::ZERO;
        }
        Fixed::from_num(self.health()) / Fixed::from_num(self.original_health)
    }

    /// Put an item into its slot and return the item it displaced.
    pub fn equip(&mut self, item: Item) -> Option<Item> {
        let slot = item.slot;
        let previous = self
            .mob
            .as_mut()
            .and_then(|mob| mob.equipment.replace(slot, Some(item)));
        self.refresh_defence();
        previous
    }

    /// Empty a slot and return its item.
    pub fn unequip(&mut self, slot: Slot) -> Option<Item> {
        let previous = self
            .mob
            .as_mut()
            .and_then(|mob| mob.equipment.replace(slot, None));
        self.refresh_defence();
        previous
    }

    /// Recompute player defence as head + suit. No-op for other factions,
    /// whose defence is a base stat.
    pub fn refresh_defence(&mut self) {
        if self.faction != Faction::Player {
            return;
        }
        if let Some(mob) = self.mob.as_mut() {
            mob.stats.defence = mob.equipment.armour_defence();
        }
    }

    /// Whether the unit may act at `clock`.
    #[must_use]
    pub fn is_ready(&self, clock: u64) -> bool {
        Fixed::from_num(clock) >= self.next_action_turn
    }

    /// Whether an effect of this kind is active.
    #[must_use]
    pub fn has_status(&self, kind: StatusKind) -> bool {
        self.status_effects.iter().any(|e| e.kind == kind)
    }

    /// Add a condition, or refresh its duration if already present.
    ///
    /// Returns `true` when the effect is new.
    pub fn add_status(&mut self, kind: StatusKind, duration: u32) -> bool {
        if let Some(existing) = self.status_effects.iter_mut().find(|e| e.kind == kind) {
            existing.remaining = existing.remaining.max(duration);
            false
        } else {
            self.status_effects.push(StatusEffect {
                kind,
                remaining: duration,
            });
            true
        }
    }

    /// Count every effect down by one turn.
    ///
    /// Returns whether the unit was stunned before the countdown and the
    /// kinds that expired.
    pub fn tick_status_effects(&mut self) -> (bool, Vec<StatusKind>) {
        let stunned = self.has_status(StatusKind::Stunned);
        let mut expired = Vec::new();
        self.status_effects.retain_mut(|effect| {
            effect.remaining = effect.remaining.saturating_sub(1);
            if effect.remaining == 0 {
                expired.push(effect.kind);
                false
            } else {
                true
            }
        });
        (stunned, expired)
    }

    /// Flip the unit into its terminal state.
    ///
    /// Returns `false` when the unit was already dead or is a prop.
    pub fn mark_dead(&mut self) -> bool {
        let Some(mob) = self.mob.as_mut() else {
            return false;
        };
        if !mob.is_alive() {
            return false;
        }
        mob.archetype = AiArchetype::Dead;
        mob.stats.health = 0;
        self.passable = true;
        self.status_effects.clear();
        true
    }

    /// Whether this unit stops others from entering its cell.
    #[must_use]
    pub fn blocks_movement(&self) -> bool {
        !self.passable && (self.mob.is_none() || self.is_alive())
    }
}

/// Storage for all units in the simulation.
///
/// Ids are handed out in increasing order and the map is ordered, so
/// iteration follows spawn order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitStorage {
    units: BTreeMap<UnitId, Unit>,
    next_id: UnitId,
}

impl UnitStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new unit and return its id.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units, dead ones not yet swept included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Ids in spawn order. Used as the frozen snapshot of a turn.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Iterate over units in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Iterate mutably over units in spawn order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.values_mut()
    }

    /// The living, non-passable unit standing on `pos`, if any.
    #[must_use]
    pub fn unit_at(&self, pos: GridPos) -> Option<&Unit> {
        self.iter().find(|u| u.pos == pos && u.is_alive())
    }

    /// Whether some unit other than `ignore` blocks `pos`.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos, ignore: Option<UnitId>) -> bool {
        self.iter()
            .any(|u| u.pos == pos && Some(u.id) != ignore && u.blocks_movement())
    }
}
