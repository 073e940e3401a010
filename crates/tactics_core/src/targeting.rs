//! Target selection.
//!
//! All searches walk units in id order and break distance ties in favour
//! of the earlier id, so the same board always yields the same target.

use crate::math::{Fixed, GridPos};
use crate::pathfinding::line_of_sight;
use crate::terrain::Terrain;
use crate::unit::{Unit, UnitId, UnitStorage};

/// A chosen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target unit.
    pub id: UnitId,
    /// Where it stands.
    pub pos: GridPos,
    /// Euclidean distance from the seeker.
    pub distance: Fixed,
}

impl TargetInfo {
    fn of(seeker: &Unit, target: &Unit) -> Self {
        Self {
            id: target.id,
            pos: target.pos,
            distance: seeker.pos.distance(target.pos),
        }
    }
}

/// Whether `candidate` is something `seeker` may aim at: alive, visible,
/// hostile, not itself, and in line of sight.
fn is_valid_target<T: Terrain + ?Sized>(seeker: &Unit, candidate: &Unit, terrain: &T) -> bool {
    candidate.id != seeker.id
        && candidate.is_alive()
        && candidate.visible
        && seeker.faction.is_hostile_to(candidate.faction)
        && line_of_sight(terrain, seeker.pos, candidate.pos)
}

/// Nearest valid target within `range`.
#[must_use]
pub fn nearest_enemy<T: Terrain + ?Sized>(
    seeker: &Unit,
    range: Fixed,
    units: &UnitStorage,
    terrain: &T,
) -> Option<TargetInfo> {
    let mut best: Option<TargetInfo> = None;
    for candidate in units.iter() {
        if !seeker.pos.within(candidate.pos, range) || !is_valid_target(seeker, candidate, terrain) {
            continue;
        }
        let info = TargetInfo::of(seeker, candidate);
        if best.map_or(true, |b| info.distance < b.distance) {
            best = Some(info);
        }
    }
    best
}

/// The controlled unit as a target, when it is valid and within `range`.
#[must_use]
pub fn controlled_unit_target<T: Terrain + ?Sized>(
    seeker: &Unit,
    controlled: Option<UnitId>,
    range: Fixed,
    units: &UnitStorage,
    terrain: &T,
) -> Option<TargetInfo> {
    let candidate = units.get(controlled?)?;
    (seeker.pos.within(candidate.pos, range) && is_valid_target(seeker, candidate, terrain))
        .then(|| TargetInfo::of(seeker, candidate))
}

/// Pick a target for an AI unit, ignoring range.
///
/// The controlled unit wins outright when valid. Otherwise the weakest
/// target is chosen, the nearest among equals.
#[must_use]
pub fn find_target<T: Terrain + ?Sized>(
    seeker: &Unit,
    controlled: Option<UnitId>,
    units: &UnitStorage,
    terrain: &T,
) -> Option<TargetInfo> {
    let mut best: Option<TargetInfo> = None;
    let mut lowest_health: Option<i32> = None;
    let mut closest = Fixed::MAX;

    for candidate in units.iter() {
        if !is_valid_target(seeker, candidate, terrain) {
            continue;
        }
        let info = TargetInfo::of(seeker, candidate);
        if Some(candidate.id) == controlled {
            return Some(info);
        }

        let health = candidate.health();
        if lowest_health.map_or(true, |low| health < low) {
            lowest_health = Some(health);
            closest = info.distance;
            best = Some(info);
        } else if lowest_health == Some(health) && info.distance < closest {
            closest = info.distance;
            best = Some(info);
        } else if best.is_none() && info.distance < closest {
            closest = info.distance;
            best = Some(info);
        }
    }

    if let Some(target) = best {
        tracing::trace!(seeker = seeker.id, target = target.id, "Target chosen");
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiArchetype, Mob, MobStats};
    use crate::factions::Faction;
    use crate::terrain::{CellType, TileMap};

    fn unit(pos: GridPos, faction: Faction, health: i32) -> Unit {
        let stats = MobStats {
            health,
            ..MobStats::default()
        };
        Unit::combatant("u", pos, faction, Mob::new(AiArchetype::Basic, stats))
    }

    #[test]
    fn test_nearest_enemy_respects_range_and_faction() {
        let map = TileMap::new(10, 10);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 0), Faction::Player, 50));
        units.insert(unit(GridPos::new(1, 0), Faction::Player, 50));
        let near = units.insert(unit(GridPos::new(3, 0), Faction::Enemy, 50));
        units.insert(unit(GridPos::new(6, 0), Faction::Enemy, 50));

        let seeker = units.get(me).unwrap().clone();
        let found = nearest_enemy(&seeker, Fixed::from_num(5), &units, &map).unwrap();
        assert_eq!(found.id, near);
        assert!(nearest_enemy(&seeker, Fixed::from_num(2), &units, &map).is_none());
    }

    #[test]
    fn test_dead_and_hidden_units_are_ignored() {
        let map = TileMap::new(10, 10);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 0), Faction::Player, 50));
        let corpse = units.insert(unit(GridPos::new(1, 0), Faction::Enemy, 50));
        let hidden = units.insert(unit(GridPos::new(2, 0), Faction::Enemy, 50));
        units.get_mut(corpse).unwrap().mark_dead();
        units.get_mut(hidden).unwrap().visible = false;

        let seeker = units.get(me).unwrap().clone();
        assert!(nearest_enemy(&seeker, Fixed::from_num(9), &units, &map).is_none());
        assert!(find_target(&seeker, None, &units, &map).is_none());
    }

    #[test]
    fn test_walled_off_target_is_not_seen() {
        let mut map = TileMap::new(5, 5);
        for y in 0..5 {
            map.set(GridPos::new(2, y), CellType::Wall);
        }
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 2), Faction::Enemy, 50));
        units.insert(unit(GridPos::new(4, 2), Faction::Player, 50));
        let seeker = units.get(me).unwrap().clone();
        assert!(find_target(&seeker, None, &units, &map).is_none());
    }

    #[test]
    fn test_find_target_prefers_controlled_then_weakest() {
        let map = TileMap::new(10, 10);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 0), Faction::Enemy, 50));
        let strong = units.insert(unit(GridPos::new(1, 1), Faction::Player, 90));
        let weak_far = units.insert(unit(GridPos::new(6, 6), Faction::Player, 20));
        let weak_near = units.insert(unit(GridPos::new(3, 3), Faction::Player, 20));
        let seeker = units.get(me).unwrap().clone();

        assert_eq!(find_target(&seeker, Some(strong), &units, &map).unwrap().id, strong);
        assert_eq!(find_target(&seeker, None, &units, &map).unwrap().id, weak_near);
        assert_ne!(weak_far, weak_near);
    }

    #[test]
    fn test_controlled_unit_target_requires_range() {
        let map = TileMap::new(10, 10);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 0), Faction::Enemy, 50));
        let lead = units.insert(unit(GridPos::new(4, 0), Faction::Player, 50));
        let seeker = units.get(me).unwrap().clone();
        assert!(controlled_unit_target(&seeker, Some(lead), Fixed::from_num(3), &units, &map).is_none());
        assert_eq!(
            controlled_unit_target(&seeker, Some(lead), Fixed::from_num(4), &units, &map).map(|t| t.id),
            Some(lead)
        );
        assert!(controlled_unit_target(&seeker, None, Fixed::from_num(4), &units, &map).is_none());
    }
}
