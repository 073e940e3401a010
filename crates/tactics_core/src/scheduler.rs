//! Speed-based turn scheduling.
//!
//! The clock is a single integer counter. Each unit carries a fractional
//! `next_action_turn`; it may act when `clock >= next_action_turn`. Acting
//! pushes that mark forward by `1 / pace`, so a pace-2 unit acts on every
//! turn while a pace-0.5 unit acts on every second turn. Marks accumulate
//! and are never snapped to whole turns.

use crate::math::Fixed;
use crate::unit::Unit;

/// Where a unit stands in its action cycle for a given clock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// May act this turn.
    Ready,
    /// Still recovering from its last action.
    Recharging {
        /// Turn at which it becomes ready.
        until: Fixed,
    },
}

/// Classify a unit against the clock.
#[must_use]
pub fn phase(unit: &Unit, clock: u64) -> Phase {
    if unit.is_ready(clock) {
        Phase::Ready
    } else {
        Phase::Recharging {
            until: unit.next_action_turn,
        }
    }
}

/// Turns a pace costs per action: `1 / pace`.
///
/// Non-positive paces cost a full turn so a misconfigured unit can never
/// act without bound.
#[must_use]
pub fn action_cost(pace: Fixed) -> Fixed {
    if pace > Fixed::ZERO {
        Fixed::ONE / pace
    } else {
        Fixed::ONE
    }
}

/// Record a primary action taken at `clock` at the given pace.
///
/// Within one decision pass a unit may take more than one step (a ranged
/// unit kites at half pace and then fires), so the mark only ever moves
/// forward: the slowest step wins.
pub fn commit_action(unit: &mut Unit, clock: u64, pace: Fixed) -> Fixed {
    let candidate = Fixed::from_num(clock) + action_cost(pace);
    if candidate > unit.next_action_turn {
        unit.next_action_turn = candidate;
    }
    tracing::trace!(
        unit = unit.id,
        clock,
        next_action_turn = %unit.next_action_turn,
        "Action committed"
    );
    unit.next_action_turn
}

/// Make a stunned unit sit out the turn after the clock next advances.
///
/// Called during cleanup, before the clock ticks: the unit cannot act at
/// `clock + 1` and is ready again at `clock + 2`.
pub fn skip_next_turn(unit: &mut Unit, clock: u64) {
    let resume = Fixed::from_num(clock + 2);
    if resume > unit.next_action_turn {
        unit.next_action_turn = resume;
    }
}

/// The clock may advance only once no projectile is in flight.
#[must_use]
pub const fn barrier_clear(projectiles_in_flight: usize) -> bool {
    projectiles_in_flight == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiArchetype, Mob, MobStats};
    use crate::factions::Faction;
    use crate::math::GridPos;

    fn unit() -> Unit {
        Unit::combatant("Scout", GridPos::new(0, 0), Faction::Enemy, Mob::new(AiArchetype::Basic, MobStats::default()))
    }

    #[test]
    fn test_fresh_unit_is_ready() {
        assert_eq!(phase(&unit(), 0), Phase::Ready);
    }

    #[test]
    fn test_slow_unit_recharges_for_two_turns() {
        let mut u = unit();
        commit_action(&mut u, 4, Fixed::from_num(0.5));
        assert_eq!(u.next_action_turn, Fixed::from_num(6));
        assert!(matches!(phase(&u, 5), Phase::Recharging { .. }));
        assert_eq!(phase(&u, 6), Phase::Ready);
    }

    #[test]
    fn test_fractional_marks_accumulate() {
        let mut u = unit();
        commit_action(&mut u, 0, Fixed::from_num(1.5));
        let first = u.next_action_turn;
        assert!(first > Fixed::ZERO && first < Fixed::ONE);
        // Ready again at turn 1, acting then gives 1 + 2/3.
        commit_action(&mut u, 1, Fixed::from_num(1.5));
        assert!(u.next_action_turn > Fixed::ONE && u.next_action_turn < Fixed::from_num(2));
    }

    #[test]
    fn test_commit_never_moves_mark_backwards() {
        let mut u = unit();
        commit_action(&mut u, 3, Fixed::from_num(0.5));
        let slow = u.next_action_turn;
        commit_action(&mut u, 3, Fixed::ONE);
        assert_eq!(u.next_action_turn, slow);
    }

    #[test]
    fn test_zero_pace_costs_one_turn() {
        assert_eq!(action_cost(Fixed::ZERO), Fixed::ONE);
    }

    #[test]
    fn test_stun_skips_following_turn() {
        let mut u = unit();
        skip_next_turn(&mut u, 7);
        assert!(!u.is_ready(8));
        assert!(u.is_ready(9));
    }

    #[test]
    fn test_barrier() {
        assert!(barrier_clear(0));
        assert!(!barrier_clear(2));
    }
}
