//! Projectiles in flight.
//!
//! A shot samples its damage and accuracy once at launch and precomputes its
//! path. The owning loop then calls [`Projectile::step`] once per frame; each
//! call advances exactly one cell and reports what happened there. Applying
//! damage is left to the caller via [`Projectile::impacts`], which keeps this
//! module read-only with respect to units.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::{accuracy_at, reduce_by_defence, roll_below, sample_damage, CombatRules};
use crate::components::StatusKind;
use crate::factions::Faction;
use crate::items::Item;
use crate::math::{lerp, Fixed, GridPos};
use crate::pathfinding::{bounds_path, terrain_path};
use crate::terrain::Terrain;
use crate::unit::{Unit, UnitId, UnitStorage};

/// Lifecycle of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightState {
    /// Still moving along its path.
    Traveling,
    /// Hit something, missed, or ran out of path. Ready to be dropped.
    Resolved,
}

/// What a single step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Entered an empty cell.
    Moved,
    /// Flew over a hostile unit without striking it.
    PassedOver(UnitId),
    /// Struck a unit. Call [`Projectile::impacts`] to resolve damage.
    Struck(UnitId),
    /// Reached the intended target and missed it.
    Missed(UnitId),
    /// Ran into impassable terrain.
    Blocked,
    /// Path exhausted or step cap reached.
    Expired,
}

/// Damage a single unit takes from a resolved hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impact {
    /// Unit hit.
    pub target: UnitId,
    /// Damage after defence, never negative.
    pub damage: i32,
}

/// A shot travelling cell by cell towards its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Projectile {
    /// Unit that fired.
    pub source: Option<UnitId>,
    /// Side of the shooter. Only units hostile to it can be struck.
    pub faction: Faction,
    /// Cell the shot left from.
    pub origin: GridPos,
    /// Cell it occupied before the last step.
    pub previous: GridPos,
    /// Cell it occupies now.
    pub pos: GridPos,
    /// Cell it was aimed at.
    pub target: GridPos,
    /// Damage before defence, sampled at launch.
    pub damage: i32,
    /// Hit chance against the unit at the target cell.
    #[serde(with = "crate::math::fixed_serde")]
    pub accuracy: Fixed,
    /// Copy of the weapon that fired it.
    pub weapon: Item,
    /// Steps taken so far.
    pub steps: u32,
    /// Lifecycle.
    pub state: FlightState,
    path: VecDeque<GridPos>,
}

impl Projectile {
    /// Fire `weapon` from `shooter` at `target`.
    ///
    /// The path follows passable terrain when it can. When the target cell
    /// is walled off the shot takes a straight bounds-only route, so it will
    /// stop at the first wall.
    pub fn launch<T, R>(
        shooter: &Unit,
        weapon: &Item,
        target: GridPos,
        terrain: &T,
        rules: &CombatRules,
        rng: &mut R,
    ) -> Self
    where
        T: Terrain + ?Sized,
        R: Rng + ?Sized,
    {
        let origin = shooter.pos;
        let full_path = terrain_path(terrain, origin, target)
            .or_else(|| bounds_path(terrain, origin, target))
            .unwrap_or_else(|| vec![origin]);

        let path: VecDeque<GridPos> = full_path.into_iter().skip(1).collect();
        let accuracy = accuracy_at(weapon.stats.accuracy, path.len(), weapon.stats.range, rules);
        let damage = sample_damage(weapon.stats.attack, rules, rng);

        tracing::debug!(
            shooter = shooter.id,
            %origin,
            %target,
            damage,
            accuracy = %accuracy,
            cells = path.len(),
            "Projectile launched"
        );

        Self {
            source: Some(shooter.id),
            faction: shooter.faction,
            origin,
            previous: origin,
            pos: origin,
            target,
            damage,
            accuracy,
            weapon: weapon.clone(),
            steps: 0,
            state: FlightState::Traveling,
            path,
        }
    }

    /// Whether the projectile is still moving.
    #[must_use]
    pub fn is_traveling(&self) -> bool {
        self.state == FlightState::Traveling
    }

    /// Cells left to travel.
    #[must_use]
    pub fn remaining_path(&self) -> usize {
        self.path.len()
    }

    /// Advance one cell and report what happened there.
    ///
    /// Calling this on a resolved projectile returns [`StepOutcome::Expired`]
    /// without consuming randomness.
    pub fn step<T, R>(&mut self, terrain: &T, units: &UnitStorage, rules: &CombatRules, rng: &mut R) -> StepOutcome
    where
        T: Terrain + ?Sized,
        R: Rng + ?Sized,
    {
        if !self.is_traveling() {
            return StepOutcome::Expired;
        }
        if self.steps >= rules.projectile_step_cap {
            tracing::warn!(steps = self.steps, "Projectile exceeded step cap");
            return self.resolve(StepOutcome::Expired);
        }
        let Some(next) = self.path.pop_front() else {
            return self.resolve(StepOutcome::Expired);
        };

        self.steps += 1;
        self.previous = self.pos;
        self.pos = next;

        if !terrain.is_passable(next) {
            return self.resolve(StepOutcome::Blocked);
        }

        let victim = units
            .unit_at(next)
            .filter(|u| u.is_alive() && self.faction.is_hostile_to(u.faction))
            .map(|u| u.id);

        match victim {
            Some(id) if next == self.target => {
                if roll_below(rng, self.accuracy) {
                    self.resolve(StepOutcome::Struck(id))
                } else {
                    self.resolve(StepOutcome::Missed(id))
                }
            }
            Some(id) => {
                if roll_below(rng, rules.intervening_hit_chance) {
                    self.resolve(StepOutcome::Struck(id))
                } else if self.path.is_empty() {
                    self.resolve(StepOutcome::Expired)
                } else {
                    StepOutcome::PassedOver(id)
                }
            }
            None if self.path.is_empty() => self.resolve(StepOutcome::Expired),
            None => StepOutcome::Moved,
        }
    }

    fn resolve(&mut self, outcome: StepOutcome) -> StepOutcome {
        self.state = FlightState::Resolved;
        self.path.clear();
        outcome
    }

    /// Damage dealt by a strike on `struck`.
    ///
    /// Area weapons reach every living unit within the blast radius of the
    /// impact cell, allies included; units whose defence soaks the whole hit
    /// are left out. Single-target weapons always report the struck unit,
    /// even for zero damage, so the caller can log a block.
    #[must_use]
    pub fn impacts(&self, struck: UnitId, units: &UnitStorage) -> Vec<Impact> {
        if self.weapon.is_area() {
            let radius = self.weapon.stats.aoe;
            return units
                .iter()
                .filter(|u| u.is_alive() && u.pos.within(self.pos, radius))
                .filter_map(|u| {
                    let damage = reduce_by_defence(self.damage, u.defence());
                    (damage > 0).then_some(Impact { target: u.id, damage })
                })
                .collect();
        }

        let defence = units.get(struck).map_or(0, Unit::defence);
        vec![Impact {
            target: struck,
            damage: reduce_by_defence(self.damage, defence),
        }]
    }

    /// Roll the weapon's status trigger. Area hits never trigger.
    pub fn roll_status<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(StatusKind, u32)> {
        if self.weapon.is_area() {
            return None;
        }
        let effect = self.weapon.on_hit?;
        roll_below(rng, effect.chance).then_some((effect.status, effect.duration))
    }

    /// Sprite direction for the shot's heading.
    #[must_use]
    pub fn direction(&self) -> u8 {
        direction_code(self.target.x - self.origin.x, self.target.y - self.origin.y)
    }

    /// Interpolated draw position between the last two cells, `t` in `[0, 1]`.
    ///
    /// Presentation only: collision is decided per step.
    #[must_use]
    pub fn render_pos(&self, t: Fixed) -> (Fixed, Fixed) {
        let t = t.clamp(Fixed::ZERO, Fixed::ONE);
        (
            lerp(Fixed::from_num(self.previous.x), Fixed::from_num(self.pos.x), t),
            lerp(Fixed::from_num(self.previous.y), Fixed::from_num(self.pos.y), t),
        )
    }
}

/// Sprite direction code for a heading.
///
/// 0 vertical, 1 horizontal, 2 for the `\` diagonal (signs match), 3 for
/// the `/` diagonal.
#[must_use]
pub const fn direction_code(dx: i32, dy: i32) -> u8 {
    if dx == 0 {
        0
    } else if dy == 0 {
        1
    } else if (dx > 0) == (dy > 0) {
        2
    } else {
        3
    }
}
