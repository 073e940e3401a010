//! Decision policies for computer-controlled units.
//!
//! A policy reads the board and returns an [`Action`]; it never mutates
//! anything. The simulation executes the action, charges its cost and
//! records the outcome. Dispatch is an exhaustive match on
//! [`AiArchetype`].
//!
//! ## Archetypes
//!
//! | Archetype | Priority |
//! |---|---|
//! | `Basic` | fire, melee, advance |
//! | `Aggressive` | melee, fire, advance |
//! | `Ranged` | hold 75% of weapon range while firing, else advance |
//! | `MeleeAggressive` | melee, advance |
//! | `Player` | squad policy: autofire, melee, follow the leader |
//!
//! Any non-player unit that is badly hurt and shaken breaks off and runs
//! from the nearest threat before its archetype is consulted.

use crate::combat::CombatRules;
use crate::components::{AiArchetype, Mob, Stance};
use crate::factions::Faction;
use crate::math::{Fixed, GridPos};
use crate::targeting::{find_target, nearest_enemy, TargetInfo};
use crate::terrain::Terrain;
use crate::unit::{Unit, UnitId, UnitStorage};

/// Fraction of a unit's speed spent on a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Normal movement.
    Full,
    /// Careful repositioning; costs twice as long.
    Half,
}

impl Pace {
    /// Effective pace for a unit with the given speed.
    #[must_use]
    pub fn apply(self, speed: Fixed) -> Fixed {
        match self {
            Self::Full => speed,
            Self::Half => speed / 2,
        }
    }
}

/// Direction of a move relative to another cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    /// Close in on the cell.
    Toward(GridPos),
    /// Open distance from the cell.
    AwayFrom(GridPos),
}

/// What a unit intends to do with its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to do. The unit stays ready.
    Idle,
    /// Spend the turn without acting.
    Recharge,
    /// Move one cell.
    Move {
        /// Where to.
        heading: Heading,
        /// How fast.
        pace: Pace,
    },
    /// Melee an adjacent unit.
    Melee {
        /// Victim.
        target: UnitId,
    },
    /// Fire the ranged weapon at a cell.
    Fire {
        /// Unit aimed at.
        target: UnitId,
        /// Its cell at decision time.
        at: GridPos,
    },
    /// Refill the ranged weapon.
    Reload,
    /// Reposition at half pace, then fire.
    MoveAndFire {
        /// Reposition direction.
        heading: Heading,
        /// Unit aimed at.
        target: UnitId,
        /// Its cell at decision time.
        at: GridPos,
    },
}

/// Read-only view of the board handed to policies.
pub struct AiContext<'a> {
    /// Every unit, including the one deciding.
    pub units: &'a UnitStorage,
    /// The map.
    pub terrain: &'a dyn Terrain,
    /// Combat constants.
    pub rules: &'a CombatRules,
    /// Unit under direct player control.
    pub controlled: Option<UnitId>,
}

/// Choose an action for `unit`.
#[must_use]
pub fn decide(unit: &Unit, ctx: &AiContext<'_>) -> Action {
    let Some(mob) = unit.mob.as_ref() else {
        return Action::Idle;
    };

    match mob.archetype {
        AiArchetype::Dead => Action::Idle,
        AiArchetype::Player => decide_squad(unit, mob, ctx),
        archetype => {
            if should_retreat(unit, mob, ctx.rules) {
                return retreat(unit, ctx);
            }
            let Some(target) = find_target(unit, ctx.controlled, ctx.units, ctx.terrain) else {
                tracing::debug!(unit = unit.id, "No valid targets, idling");
                return Action::Idle;
            };
            match archetype {
                AiArchetype::Aggressive => aggressive(unit, mob, &target, ctx),
                AiArchetype::Ranged => ranged(unit, mob, &target, ctx),
                AiArchetype::MeleeAggressive => melee_aggressive(unit, &target, ctx),
                AiArchetype::Basic | AiArchetype::Player | AiArchetype::Dead => basic(unit, mob, &target, ctx),
            }
        }
    }
}

fn should_retreat(unit: &Unit, mob: &Mob, rules: &CombatRules) -> bool {
    unit.faction != Faction::Player
        && unit.health_fraction() < rules.retreat_health_fraction
        && mob.stats.morale < rules.retreat_morale
}

fn retreat(unit: &Unit, ctx: &AiContext<'_>) -> Action {
    match nearest_enemy(unit, ctx.rules.retreat_scan_range, ctx.units, ctx.terrain) {
        Some(threat) => {
            tracing::info!(unit = unit.id, threat = threat.id, "Breaking off to retreat");
            Action::Move {
                heading: Heading::AwayFrom(threat.pos),
                pace: Pace::Full,
            }
        }
        None => {
            tracing::debug!(unit = unit.id, "Wants to retreat but sees no threat");
            Action::Idle
        }
    }
}

fn advance(target: &TargetInfo) -> Action {
    Action::Move {
        heading: Heading::Toward(target.pos),
        pace: Pace::Full,
    }
}

fn in_reach(unit: &Unit, target: &TargetInfo, rules: &CombatRules) -> bool {
    unit.pos.within(target.pos, rules.melee_reach)
}

/// The ranged option against `target`, if any.
///
/// Out of range or no weapon gives `None`. An empty magazine gives a reload
/// when the weapon supports one, otherwise `None`.
fn ranged_option(unit: &Unit, mob: &Mob, target: &TargetInfo) -> Option<Action> {
    let weapon = mob.ranged_weapon()?;
    if target.pos == unit.pos || !unit.pos.within(target.pos, weapon.stats.range) {
        return None;
    }
    if weapon.is_empty() {
        return weapon.can_reload().then_some(Action::Reload);
    }
    Some(Action::Fire {
        target: target.id,
        at: target.pos,
    })
}

fn basic(unit: &Unit, mob: &Mob, target: &TargetInfo, ctx: &AiContext<'_>) -> Action {
    if let Some(action) = ranged_option(unit, mob, target) {
        return action;
    }
    if in_reach(unit, target, ctx.rules) {
        return Action::Melee { target: target.id };
    }
    advance(target)
}

fn aggressive(unit: &Unit, mob: &Mob, target: &TargetInfo, ctx: &AiContext<'_>) -> Action {
    if in_reach(unit, target, ctx.rules) {
        return Action::Melee { target: target.id };
    }
    ranged_option(unit, mob, target).unwrap_or_else(|| advance(target))
}

fn ranged(unit: &Unit, mob: &Mob, target: &TargetInfo, ctx: &AiContext<'_>) -> Action {
    let Some(weapon) = mob.ranged_weapon() else {
        return advance(target);
    };
    match ranged_option(unit, mob, target) {
        Some(Action::Fire { target: id, at }) => {
            let optimal = weapon.stats.range * ctx.rules.optimal_range_fraction;
            let can_move = mob.stats.speed > Fixed::ZERO;
            let heading = if can_move && target.distance < optimal / 2 {
                Some(Heading::AwayFrom(target.pos))
            } else if can_move && target.distance > optimal {
                Some(Heading::Toward(target.pos))
            } else {
                None
            };
            match heading {
                Some(heading) => Action::MoveAndFire { heading, target: id, at },
                None => Action::Fire { target: id, at },
            }
        }
        Some(other) => other,
        None => advance(target),
    }
}

fn melee_aggressive(unit: &Unit, target: &TargetInfo, ctx: &AiContext<'_>) -> Action {
    if in_reach(unit, target, ctx.rules) {
        Action::Melee { target: target.id }
    } else {
        advance(target)
    }
}

/// Fire or reload for a squad member, the way autofire works.
///
/// Squad members always reload an empty magazine. Returns `None` when there
/// is nothing to shoot at.
fn squad_fire(unit: &Unit, mob: &Mob, ctx: &AiContext<'_>) -> Option<Action> {
    let weapon = mob.ranged_weapon()?;
    if weapon.is_empty() {
        return Some(Action::Reload);
    }
    let target = nearest_enemy(unit, weapon.stats.range, ctx.units, ctx.terrain)?;
    (target.pos != unit.pos).then_some(Action::Fire {
        target: target.id,
        at: target.pos,
    })
}

/// Policy for squad members that are not under direct control.
fn decide_squad(unit: &Unit, mob: &Mob, ctx: &AiContext<'_>) -> Action {
    if mob.autofire || mob.stance == Stance::Hold {
        if let Some(action) = squad_fire(unit, mob, ctx) {
            return action;
        }
    }

    if let Some(enemy) = nearest_enemy(unit, ctx.rules.melee_reach, ctx.units, ctx.terrain) {
        return Action::Melee { target: enemy.id };
    }

    if mob.stance == Stance::Follow {
        let leader = ctx
            .controlled
            .filter(|&id| id != unit.id)
            .and_then(|id| ctx.units.get(id))
            .filter(|lead| lead.is_squad_member());
        return match leader {
            Some(lead) if !unit.pos.within(lead.pos, ctx.rules.melee_reach) => Action::Move {
                heading: Heading::Toward(lead.pos),
                pace: Pace::Full,
            },
            _ => Action::Recharge,
        };
    }

    Action::Idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MobStats, Slot};
    use crate::items::{Item, ItemStats};
    use crate::terrain::TileMap;

    fn rifle(range: i32, ammo: i32, reload: i32) -> Item {
        Item {
            slot: Slot::Ranged,
            stats: ItemStats {
                attack: 10,
                range: Fixed::from_num(range),
                accuracy: Fixed::from_num(0.8),
                ammo,
                max_ammo: 6,
                reload,
                ..ItemStats::default()
            },
            ..Item::named("rifle")
        }
    }

    fn mob_unit(pos: GridPos, faction: Faction, archetype: AiArchetype) -> Unit {
        Unit::combatant("u", pos, faction, Mob::new(archetype, MobStats::default()))
    }

    struct Board {
        map: TileMap,
        units: UnitStorage,
        rules: CombatRules,
    }

    impl Board {
        fn new() -> Self {
            Self {
                map: TileMap::new(12, 12),
                units: UnitStorage::new(),
                rules: CombatRules::default(),
            }
        }

        fn decide(&self, id: UnitId, controlled: Option<UnitId>) -> Action {
            let ctx = AiContext {
                units: &self.units,
                terrain: &self.map,
                rules: &self.rules,
                controlled,
            };
            decide(self.units.get(id).unwrap(), &ctx)
        }
    }

    #[test]
    fn test_basic_prefers_ranged() {
        let mut board = Board::new();
        let mut shooter = mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Basic);
        shooter.equip(rifle(5, 6, 1));
        let me = board.units.insert(shooter);
        let target = board.units.insert(mob_unit(GridPos::new(1, 0), Faction::Player, AiArchetype::Player));
        assert_eq!(
            board.decide(me, None),
            Action::Fire {
                target,
                at: GridPos::new(1, 0)
            }
        );
    }

    #[test]
    fn test_aggressive_prefers_melee() {
        let mut board = Board::new();
        let mut brute = mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Aggressive);
        brute.equip(rifle(5, 6, 1));
        let me = board.units.insert(brute);
        let target = board.units.insert(mob_unit(GridPos::new(1, 1), Faction::Player, AiArchetype::Player));
        assert_eq!(board.decide(me, None), Action::Melee { target });
    }

    #[test]
    fn test_melee_aggressive_advances() {
        let mut board = Board::new();
        let me = board.units.insert(mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::MeleeAggressive));
        board.units.insert(mob_unit(GridPos::new(5, 0), Faction::Player, AiArchetype::Player));
        assert_eq!(
            board.decide(me, None),
            Action::Move {
                heading: Heading::Toward(GridPos::new(5, 0)),
                pace: Pace::Full
            }
        );
    }

    #[test]
    fn test_ranged_kites_and_fires() {
        let mut board = Board::new();
        let mut sniper = mob_unit(GridPos::new(5, 5), Faction::Enemy, AiArchetype::Ranged);
        sniper.equip(rifle(5, 6, 1));
        let me = board.units.insert(sniper);
        let target = board.units.insert(mob_unit(GridPos::new(7, 5), Faction::Player, AiArchetype::Player));
        // Optimal 3.75: distance 2 sits between 1.875 and 3.75, so it holds.
        assert_eq!(
            board.decide(me, None),
            Action::Fire {
                target,
                at: GridPos::new(7, 5)
            }
        );

        let mut sniper = mob_unit(GridPos::new(5, 5), Faction::Enemy, AiArchetype::Ranged);
        sniper.equip(rifle(8, 6, 1));
        let mut board = Board::new();
        let me = board.units.insert(sniper);
        let target = board.units.insert(mob_unit(GridPos::new(7, 5), Faction::Player, AiArchetype::Player));
        assert_eq!(
            board.decide(me, None),
            Action::MoveAndFire {
                heading: Heading::AwayFrom(GridPos::new(7, 5)),
                target,
                at: GridPos::new(7, 5)
            }
        );
    }

    #[test]
    fn test_ranged_closes_when_far() {
        let mut board = Board::new();
        let mut sniper = mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Ranged);
        sniper.equip(rifle(5, 6, 1));
        let me = board.units.insert(sniper);
        board.units.insert(mob_unit(GridPos::new(4, 3), Faction::Player, AiArchetype::Player));
        assert!(matches!(
            board.decide(me, None),
            Action::MoveAndFire {
                heading: Heading::Toward(_),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_weapon_without_reload_falls_back() {
        let mut board = Board::new();
        let mut shooter = mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Basic);
        shooter.equip(rifle(5, 0, 0));
        let me = board.units.insert(shooter);
        board.units.insert(mob_unit(GridPos::new(3, 0), Faction::Player, AiArchetype::Player));
        assert!(matches!(board.decide(me, None), Action::Move { .. }));

        let mut board = Board::new();
        let mut shooter = mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Basic);
        shooter.equip(rifle(5, 0, 1));
        let me = board.units.insert(shooter);
        board.units.insert(mob_unit(GridPos::new(3, 0), Faction::Player, AiArchetype::Player));
        assert_eq!(board.decide(me, None), Action::Reload);
    }

    #[test]
    fn test_wounded_enemy_retreats() {
        let mut board = Board::new();
        let mut coward = mob_unit(GridPos::new(5, 5), Faction::Enemy, AiArchetype::Aggressive);
        coward.set_health(10);
        let me = board.units.insert(coward);
        board.units.insert(mob_unit(GridPos::new(6, 5), Faction::Player, AiArchetype::Player));
        assert_eq!(
            board.decide(me, None),
            Action::Move {
                heading: Heading::AwayFrom(GridPos::new(6, 5)),
                pace: Pace::Full
            }
        );
    }

    #[test]
    fn test_squad_follows_leader() {
        let mut board = Board::new();
        let lead = board.units.insert(mob_unit(GridPos::new(6, 6), Faction::Player, AiArchetype::Player));
        let follower = board.units.insert(mob_unit(GridPos::new(2, 2), Faction::Player, AiArchetype::Player));
        assert_eq!(
            board.decide(follower, Some(lead)),
            Action::Move {
                heading: Heading::Toward(GridPos::new(6, 6)),
                pace: Pace::Full
            }
        );

        board.units.get_mut(follower).unwrap().pos = GridPos::new(5, 5);
        assert_eq!(board.decide(follower, Some(lead)), Action::Recharge);

        if let Some(mob) = board.units.get_mut(follower).unwrap().mob.as_mut() {
            mob.stance = Stance::Hold;
        }
        assert_eq!(board.decide(follower, Some(lead)), Action::Idle);
    }

    #[test]
    fn test_squad_autofire_and_reload() {
        let mut board = Board::new();
        let mut gunner = mob_unit(GridPos::new(0, 0), Faction::Player, AiArchetype::Player);
        gunner.equip(rifle(6, 6, 0));
        let me = board.units.insert(gunner);
        let enemy = board.units.insert(mob_unit(GridPos::new(4, 0), Faction::Enemy, AiArchetype::Basic));
        assert_eq!(
            board.decide(me, None),
            Action::Fire {
                target: enemy,
                at: GridPos::new(4, 0)
            }
        );

        if let Some(gun) = board.units.get_mut(me).unwrap().mob.as_mut().and_then(|m| m.equipment.get_mut(Slot::Ranged)) {
            gun.stats.ammo = 0;
        }
        assert_eq!(board.decide(me, None), Action::Reload);
    }

    #[test]
    fn test_squad_melees_adjacent_without_autofire() {
        let mut board = Board::new();
        let mut brawler = mob_unit(GridPos::new(0, 0), Faction::Player, AiArchetype::Player);
        if let Some(mob) = brawler.mob.as_mut() {
            mob.autofire = false;
        }
        let me = board.units.insert(brawler);
        let enemy = board.units.insert(mob_unit(GridPos::new(1, 0), Faction::Enemy, AiArchetype::Basic));
        assert_eq!(board.decide(me, None), Action::Melee { target: enemy });
    }

    #[test]
    fn test_dead_units_idle() {
        let mut board = Board::new();
        let me = board.units.insert(mob_unit(GridPos::new(0, 0), Faction::Enemy, AiArchetype::Basic));
        board.units.insert(mob_unit(GridPos::new(1, 0), Faction::Player, AiArchetype::Player));
        board.units.get_mut(me).unwrap().mark_dead();
        assert_eq!(board.decide(me, None), Action::Idle);
    }
}
