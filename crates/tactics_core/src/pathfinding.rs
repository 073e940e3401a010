//! Grid search shared by movement, line of fire and projectiles.
//!
//! Movement is 8-directional with uniform step cost, so the search is A*
//! with a Chebyshev heuristic. The two endpoints are always admitted: the
//! mover stands on the start cell and the goal is usually another unit.
//!
//! Line of fire is reachability under terrain alone: two cells can shoot at
//! each other exactly when a terrain-only path connects them. Occupancy never
//! blocks it. Visibility for the presentation side uses a separate
//! transparency ray ([`sight_line`]).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::math::GridPos;
use crate::terrain::Terrain;

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct SearchNode {
    pos: GridPos,
    /// g + h.
    f_score: u32,
    /// Lower values pop first when f_scores tie.
    tie_breaker: u64,
}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse for min-heap behaviour.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),  // North
    (1, -1),  // Northeast
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
];

#[inline]
fn tie_breaker(pos: GridPos) -> u64 {
    ((pos.y as u32 as u64) << 32) | (pos.x as u32 as u64)
}

/// Shortest 8-directional path from `start` to `goal`, both included.
///
/// `passable` decides intermediate cells only. Returns `None` when the goal
/// cannot be reached; a path to the start cell itself is `[start]`.
pub fn find_path<F>(start: GridPos, goal: GridPos, passable: F) -> Option<Vec<GridPos>>
where
    F: Fn(GridPos) -> bool,
{
    if start == goal {
        return Some(vec![start]);
    }

    let mut open_set: BinaryHeap<SearchNode> = BinaryHeap::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut g_score: HashMap<GridPos, u32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(SearchNode {
        pos: start,
        f_score: start.chebyshev(goal),
        tie_breaker: tie_breaker(start),
    });

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            return Some(reconstruct_path(&came_from, goal));
        }

        let current_g = g_score.get(&current.pos).copied().unwrap_or(u32::MAX);
        if current.f_score > current_g.saturating_add(current.pos.chebyshev(goal)) {
            // Stale heap entry.
            continue;
        }

        for &(dx, dy) in &DIRECTIONS {
            let next = current.pos.offset(dx, dy);
            if next != goal && !passable(next) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_score.get(&next).copied().unwrap_or(u32::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);
                open_set.push(SearchNode {
                    pos: next,
                    f_score: tentative_g + next.chebyshev(goal),
                    tie_breaker: tie_breaker(next),
                });
            }
        }
    }

    None
}

fn reconstruct_path(came_from: &HashMap<GridPos, GridPos>, goal: GridPos) -> Vec<GridPos> {
    let mut path = vec![goal];
    let mut current = goal;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Path through terrain only, ignoring units.
pub fn terrain_path<T: Terrain + ?Sized>(terrain: &T, start: GridPos, goal: GridPos) -> Option<Vec<GridPos>> {
    if !terrain.in_bounds(start) || !terrain.in_bounds(goal) {
        return None;
    }
    find_path(start, goal, |p| terrain.is_passable(p))
}

/// Path that only has to stay on the map. Walls are crossed.
pub fn bounds_path<T: Terrain + ?Sized>(terrain: &T, start: GridPos, goal: GridPos) -> Option<Vec<GridPos>> {
    if !terrain.in_bounds(start) || !terrain.in_bounds(goal) {
        return None;
    }
    find_path(start, goal, |p| terrain.in_bounds(p))
}

/// Line of fire between two cells: a terrain-only path exists.
///
/// Symmetric in its arguments and blind to units.
pub fn line_of_sight<T: Terrain + ?Sized>(terrain: &T, from: GridPos, to: GridPos) -> bool {
    terrain_path(terrain, from, to).is_some_and(|path| path.last() == Some(&to))
}

/// Whether sight passes in a straight line between two cells.
///
/// Uses Bresenham stepping; the endpoints themselves never block, so a unit
/// standing in a doorway or behind glass is still seen.
pub fn sight_line<T: Terrain + ?Sized>(terrain: &T, from: GridPos, to: GridPos) -> bool {
    if !terrain.in_bounds(from) || !terrain.in_bounds(to) {
        return false;
    }

    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx - dy;

    let mut x = from.x;
    let mut y = from.y;

    loop {
        if x == to.x && y == to.y {
            return true;
        }

        let here = GridPos::new(x, y);
        if here != from && !terrain.is_transparent(here) {
            return false;
        }

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
}
