//! Test fixtures and helpers.
//!
//! Pre-built soldiers, monsters and maps so tests describe only the part
//! of the board they care about.

use tactics_core::components::{AiArchetype, Mob, MobStats, Slot};
use tactics_core::factions::Faction;
use tactics_core::items::{Item, ItemStats, WeaponClass};
use tactics_core::math::{Fixed, GridPos};
use tactics_core::simulation::Simulation;
use tactics_core::terrain::{CellType, TileMap};
use tactics_core::unit::{Unit, UnitId};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Simulation code never touches floats. This is only for convenient test
/// setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// A ballistic rifle: attack 10, range 8, always hits the aimed cell.
#[must_use]
pub fn rifle(ammo: i32) -> Item {
    let mut item = Item::named("Test Rifle");
    item.slot = Slot::Ranged;
    item.class = WeaponClass::Projectile;
    item.stats = ItemStats {
        attack: 10,
        range: fixed(8),
        reload: 1,
        ammo,
        max_ammo: 6,
        accuracy: Fixed::ONE,
        ..ItemStats::default()
    };
    item
}

/// A plasma launcher with a blast radius of 2.
#[must_use]
pub fn launcher() -> Item {
    let mut item = Item::named("Test Launcher");
    item.slot = Slot::Ranged;
    item.class = WeaponClass::Plasma;
    item.stats = ItemStats {
        attack: 20,
        range: fixed(8),
        ammo: 1,
        max_ammo: 1,
        accuracy: Fixed::ONE,
        aoe: fixed(2),
        ..ItemStats::default()
    };
    item
}

/// Body armour worth `defence` points.
#[must_use]
pub fn armour(defence: i32) -> Item {
    let mut item = Item::named("Test Armour");
    item.slot = Slot::Suit;
    item.stats.defence = defence;
    item
}

/// An unarmed squad member with 100 health.
#[must_use]
pub fn trooper(name: &str, pos: GridPos) -> Unit {
    let mob = Mob::new(AiArchetype::Player, MobStats::default());
    Unit::combatant(name, pos, Faction::Player, mob)
}

/// A squad member carrying a loaded [`rifle`].
#[must_use]
pub fn rifleman(name: &str, pos: GridPos) -> Unit {
    let mut unit = trooper(name, pos);
    unit.equip(rifle(6));
    unit
}

/// An enemy with the given policy and default stats.
#[must_use]
pub fn monster(archetype: AiArchetype, pos: GridPos) -> Unit {
    Unit::combatant("Test Monster", pos, Faction::Enemy, Mob::new(archetype, MobStats::default()))
}

/// Builder for small combat scenarios.
///
/// # Example
///
/// ```
/// use tactics_core::components::AiArchetype;
/// use tactics_core::math::GridPos;
/// use tactics_test_utils::fixtures::Arena;
///
/// let (sim, ids) = Arena::new(10, 10)
///     .seed(3)
///     .squad("Hicks", GridPos::new(1, 1))
///     .enemy(AiArchetype::MeleeAggressive, GridPos::new(8, 8))
///     .build();
/// assert_eq!(ids.len(), 2);
/// assert_eq!(sim.selected(), Some(ids[0]));
/// ```
#[derive(Debug, Clone)]
pub struct Arena {
    map: TileMap,
    seed: u64,
    units: Vec<Unit>,
}

impl Arena {
    /// An open floor of the given size with seed 0.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            map: TileMap::new(width, height),
            seed: 0,
            units: Vec::new(),
        }
    }

    /// Start from an existing map.
    #[must_use]
    pub fn with_map(map: TileMap) -> Self {
        Self {
            map,
            seed: 0,
            units: Vec::new(),
        }
    }

    /// Set the RNG seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Place walls.
    #[must_use]
    pub fn walls(mut self, cells: &[GridPos]) -> Self {
        for &cell in cells {
            self.map.set(cell, CellType::Wall);
        }
        self
    }

    /// Add a [`rifleman`].
    #[must_use]
    pub fn squad(self, name: &str, pos: GridPos) -> Self {
        self.unit(rifleman(name, pos))
    }

    /// Add a [`monster`].
    #[must_use]
    pub fn enemy(self, archetype: AiArchetype, pos: GridPos) -> Self {
        self.unit(monster(archetype, pos))
    }

    /// Add any unit.
    #[must_use]
    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    /// Create the simulation. Ids are returned in insertion order.
    #[must_use]
    pub fn build(self) -> (Simulation, Vec<UnitId>) {
        let mut sim = Simulation::new(self.map, self.seed);
        let ids = self.units.into_iter().map(|u| sim.spawn(u)).collect();
        (sim, ids)
    }
}

/// Two riflemen against one of each enemy archetype on a 16x12 floor with
/// a short wall in the middle.
#[must_use]
pub fn skirmish(seed: u64) -> Simulation {
    let mut ranged = monster(AiArchetype::Ranged, GridPos::new(13, 9));
    ranged.equip(rifle(6));
    let mut basic = monster(AiArchetype::Basic, GridPos::new(12, 2));
    basic.equip(rifle(3));

    let (sim, _) = Arena::new(16, 12)
        .seed(seed)
        .walls(&[GridPos::new(7, 4), GridPos::new(7, 5), GridPos::new(7, 6)])
        .squad("Apone", GridPos::new(1, 5))
        .squad("Drake", GridPos::new(1, 6))
        .enemy(AiArchetype::MeleeAggressive, GridPos::new(14, 5))
        .enemy(AiArchetype::Aggressive, GridPos::new(12, 7))
        .unit(ranged)
        .unit(basic)
        .build();
    sim
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_selects_first_squad_member() {
        let (sim, ids) = Arena::new(8, 8)
            .enemy(AiArchetype::Basic, GridPos::new(6, 6))
            .squad("Hudson", GridPos::new(1, 1))
            .build();
        assert_eq!(sim.selected(), Some(ids[1]));
    }

    #[test]
    fn test_arena_walls() {
        let (sim, _) = Arena::new(5, 5).walls(&[GridPos::new(2, 2)]).build();
        assert_eq!(sim.map().get(GridPos::new(2, 2)), Some(CellType::Wall));
    }

    #[test]
    fn test_skirmish_layout() {
        let sim = skirmish(1);
        assert_eq!(sim.living(Faction::Player), 2);
        assert_eq!(sim.living(Faction::Enemy), 4);
    }

    #[test]
    fn test_rifleman_carries_loaded_rifle() {
        let unit = rifleman("Frost", GridPos::new(0, 0));
        let weapon = unit.mob.as_ref().and_then(Mob::ranged_weapon).unwrap();
        assert_eq!(weapon.stats.ammo, 6);
        assert!(weapon.uses_ammo());
    }
}
