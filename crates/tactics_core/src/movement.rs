//! Single-cell movement decisions.
//!
//! These functions only choose a cell. Moving the unit and charging its
//! action cost is done by the simulation.

use crate::math::GridPos;
use crate::pathfinding::{find_path, DIRECTIONS};
use crate::terrain::Terrain;
use crate::unit::{Unit, UnitStorage};

/// Whether `mover` could stand on `pos` right now.
#[must_use]
pub fn is_free<T: Terrain + ?Sized>(mover: &Unit, pos: GridPos, units: &UnitStorage, terrain: &T) -> bool {
    terrain.is_passable(pos) && !units.is_occupied(pos, Some(mover.id))
}

/// Next cell on the shortest path to `goal` that avoids terrain and other
/// units.
///
/// Returns `None` when no path exists, when the path is shorter than two
/// cells, or when its first cell is not free (the goal is admitted by the
/// search even if occupied).
#[must_use]
pub fn step_toward<T: Terrain + ?Sized>(
    mover: &Unit,
    goal: GridPos,
    units: &UnitStorage,
    terrain: &T,
) -> Option<GridPos> {
    let path = find_path(mover.pos, goal, |p| is_free(mover, p, units, terrain));
    let next = match path.as_deref() {
        Some([_, next, ..]) => *next,
        _ => {
            tracing::warn!(unit = mover.id, from = %mover.pos, to = %goal, "No path to destination");
            return None;
        }
    };
    is_free(mover, next, units, terrain).then_some(next)
}

/// Neighbour of `pos` farthest from `threat` among cells accepted by
/// `is_free`.
///
/// Any accepted neighbour qualifies, even one closer to the threat, so a
/// cornered unit still shuffles. Ties keep the first cell in
/// [`DIRECTIONS`] order.
#[must_use]
pub fn retreat_cell<F>(pos: GridPos, threat: GridPos, is_free: F) -> Option<GridPos>
where
    F: Fn(GridPos) -> bool,
{
    let mut best: Option<(i64, GridPos)> = None;
    for &(dx, dy) in &DIRECTIONS {
        let cell = pos.offset(dx, dy);
        if !is_free(cell) {
            continue;
        }
        let score = cell.distance_squared(threat);
        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, cell));
        }
    }
    best.map(|(_, cell)| cell)
}

/// Cell that takes `mover` away from `threat`.
#[must_use]
pub fn step_away<T: Terrain + ?Sized>(
    mover: &Unit,
    threat: GridPos,
    units: &UnitStorage,
    terrain: &T,
) -> Option<GridPos> {
    retreat_cell(mover.pos, threat, |p| is_free(mover, p, units, terrain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiArchetype, Mob, MobStats};
    use crate::factions::Faction;
    use crate::terrain::{CellType, TileMap};

    fn unit(pos: GridPos, faction: Faction) -> Unit {
        Unit::combatant("u", pos, faction, Mob::new(AiArchetype::Basic, MobStats::default()))
    }

    #[test]
    fn test_step_toward_moves_one_cell_closer() {
        let map = TileMap::new(10, 10);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(0, 0), Faction::Enemy));
        units.insert(unit(GridPos::new(5, 0), Faction::Player));
        let mover = units.get(me).unwrap().clone();

        let next = step_toward(&mover, GridPos::new(5, 0), &units, &map).unwrap();
        assert_eq!(next.chebyshev(GridPos::new(5, 0)), 4);
    }

    #[test]
    fn test_step_toward_routes_around_units() {
        let map = TileMap::from_rows(&["#####", "#...#", "#####"]).unwrap();
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(1, 1), Faction::Enemy));
        units.insert(unit(GridPos::new(2, 1), Faction::Enemy));
        units.insert(unit(GridPos::new(3, 1), Faction::Player));
        let mover = units.get(me).unwrap().clone();
        assert!(step_toward(&mover, GridPos::new(3, 1), &units, &map).is_none());
    }

    #[test]
    fn test_step_toward_ignores_dead_blockers() {
        let map = TileMap::from_rows(&["#####", "#...#", "#####"]).unwrap();
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(1, 1), Faction::Enemy));
        let corpse = units.insert(unit(GridPos::new(2, 1), Faction::Enemy));
        units.insert(unit(GridPos::new(3, 1), Faction::Player));
        units.get_mut(corpse).unwrap().mark_dead();
        let mover = units.get(me).unwrap().clone();
        assert_eq!(step_toward(&mover, GridPos::new(3, 1), &units, &map), Some(GridPos::new(2, 1)));
    }

    #[test]
    fn test_retreat_cell_maximises_distance() {
        let cell = retreat_cell(GridPos::new(5, 5), GridPos::new(4, 5), |_| true);
        assert_eq!(cell, Some(GridPos::new(6, 4)));
    }

    #[test]
    fn test_retreat_cell_takes_any_free_neighbour() {
        let only = GridPos::new(4, 4);
        let cell = retreat_cell(GridPos::new(5, 5), GridPos::new(4, 5), |p| p == only);
        assert_eq!(cell, Some(only));
        assert!(retreat_cell(GridPos::new(5, 5), GridPos::new(4, 5), |_| false).is_none());
    }

    #[test]
    fn test_step_away_avoids_walls() {
        let mut map = TileMap::new(5, 5);
        map.set(GridPos::new(3, 2), CellType::Wall);
        map.set(GridPos::new(3, 1), CellType::Wall);
        map.set(GridPos::new(3, 3), CellType::Wall);
        let mut units = UnitStorage::new();
        let me = units.insert(unit(GridPos::new(2, 2), Faction::Enemy));
        let mover = units.get(me).unwrap().clone();
        let cell = step_away(&mover, GridPos::new(1, 2), &units, &map).unwrap();
        assert!(map.is_passable(cell));
        assert_ne!(cell.x, 3);
    }
}
