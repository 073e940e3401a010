//! The combat simulation context.
//!
//! [`Simulation`] owns every piece of mutable state: units, projectiles,
//! the map, the clock, the selection, the log and the RNG. Nothing lives in
//! statics, so two simulations never interfere.
//!
//! # Turn order
//!
//! [`Simulation::process_turn`] runs one turn:
//!
//! 1. Defer if any projectile is still in flight.
//! 2. Walk a snapshot of unit ids. Player defence is recomputed, units that
//!    are recharging are skipped, the selected unit is charged for the
//!    command it just carried out, everyone else runs their policy.
//! 3. Cleanup: status effects tick down, dead units are swept out.
//! 4. The mission hook sees the turn's deaths.
//! 5. The clock advances.
//! 6. Loss conditions are checked.
//!
//! Projectiles move only when the owner calls
//! [`Simulation::advance_projectiles`], one cell per call.
//!
//! # Determinism
//!
//! Units are visited in id order and every random draw goes through the
//! simulation's seeded `ChaCha8Rng`, so the same seed and the same commands
//! give the same [`Simulation::state_hash`].
//!
//! # Example
//!
//! ```
//! use tactics_core::prelude::*;
//!
//! let map = TileMap::new(10, 10);
//! let mut sim = Simulation::new(map, 7);
//!
//! let squad = Mob::new(AiArchetype::Player, MobStats::default());
//! let lead = sim.spawn(Unit::combatant("Vasquez", GridPos::new(1, 1), Faction::Player, squad));
//! assert_eq!(sim.selected(), Some(lead));
//!
//! sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).unwrap();
//! assert_eq!(sim.clock(), 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ai::{self, Action, AiContext, Heading, Pace};
use crate::combat::{resolve_melee, CombatRules, MeleeOutcome};
use crate::components::{Mob, Slot, Stance, StatusEffect, StatusKind};
use crate::data::TemplateRegistry;
use crate::error::{GameError, Result};
use crate::events::{ActionKind, CombatEvent, CombatLog, WeaponTag};
use crate::factions::Faction;
use crate::items::Item;
use crate::math::{decimal_serde, Fixed, GridPos};
use crate::mission::{LossReason, MissionStatus, TurnHook, TurnReport};
use crate::movement::{is_free, step_away, step_toward};
use crate::pathfinding::sight_line;
use crate::projectile::{Projectile, StepOutcome};
use crate::scheduler::{barrier_clear, commit_action, skip_next_turn};
use crate::terrain::{CellType, Terrain, TileMap};
use crate::unit::{Unit, UnitId, UnitStorage};

/// Orders for the selected unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Step to a neighbouring cell. Stepping into a squad mate swaps
    /// places; stepping into a hostile attacks it.
    Step {
        /// Column offset, clamped to -1..=1.
        dx: i32,
        /// Row offset, clamped to -1..=1.
        dy: i32,
    },
    /// Fire the ranged weapon at a cell.
    FireAt(GridPos),
    /// Refill the ranged weapon.
    Reload,
    /// Let a turn pass.
    Wait,
    /// Switch between follow and hold. Free.
    ToggleStance,
    /// Switch autofire. Free.
    ToggleAutofire,
    /// Hand control to the next squad member. Free.
    SelectNext,
}

/// Result of asking for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// Projectiles are in flight; the turn will run once they land.
    Deferred,
    /// The clock moved on.
    Advanced,
    /// The mission hook reported success.
    Completed,
    /// The mission was lost.
    Lost(LossReason),
}

impl TurnOutcome {
    /// Whether the game is over.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Lost(_))
    }
}

/// Read-only view of a unit for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Unit id.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Side.
    pub faction: Faction,
    /// Cell.
    pub pos: GridPos,
    /// Current health.
    pub health: i32,
    /// Health ceiling.
    pub max_health: i32,
    /// Current defence.
    pub defence: i32,
    /// Active conditions.
    pub status_effects: Vec<StatusEffect>,
    /// Alive and not a prop.
    pub alive: bool,
    /// Seen by the squad.
    pub visible: bool,
    /// Under direct control.
    pub selected: bool,
    /// Rounds left in the ranged weapon, if it tracks ammo.
    pub ammo: Option<(i32, i32)>,
}

/// Read-only view of a projectile for front ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    /// Shooter.
    pub source: Option<UnitId>,
    /// Logical cell.
    pub cell: GridPos,
    /// Interpolated column.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Interpolated row.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
    /// Sprite direction code.
    pub direction: u8,
}

/// The combat simulation.
#[derive(Debug, Clone)]
pub struct Simulation {
    units: UnitStorage,
    projectiles: Vec<Projectile>,
    map: TileMap,
    clock: u64,
    selected: Option<UnitId>,
    rng: ChaCha8Rng,
    seed: u64,
    log: CombatLog,
    rules: CombatRules,
    turn_pending: bool,
    finished: Option<TurnOutcome>,
}

impl Simulation {
    /// Create an empty simulation on `map` with a seeded RNG.
    #[must_use]
    pub fn new(map: TileMap, seed: u64) -> Self {
        Self {
            units: UnitStorage::new(),
            projectiles: Vec::new(),
            map,
            clock: 0,
            selected: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            log: CombatLog::new(),
            rules: CombatRules::default(),
            turn_pending: false,
            finished: None,
        }
    }

    /// Replace the combat constants.
    #[must_use]
    pub fn with_rules(mut self, rules: CombatRules) -> Self {
        self.rules = rules;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current turn.
    #[must_use]
    pub const fn clock(&self) -> u64 {
        self.clock
    }

    /// Seed the RNG was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Unit under direct control.
    #[must_use]
    pub const fn selected(&self) -> Option<UnitId> {
        self.selected
    }

    /// All units.
    #[must_use]
    pub const fn units(&self) -> &UnitStorage {
        &self.units
    }

    /// A unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Mutable access for scenario setup.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// The event log.
    #[must_use]
    pub const fn log(&self) -> &CombatLog {
        &self.log
    }

    /// Combat constants.
    #[must_use]
    pub const fn rules(&self) -> &CombatRules {
        &self.rules
    }

    /// Terminal outcome, once reached.
    #[must_use]
    pub const fn finished(&self) -> Option<TurnOutcome> {
        self.finished
    }

    /// Whether a deferred turn is waiting for projectiles to land.
    #[must_use]
    pub const fn turn_pending(&self) -> bool {
        self.turn_pending
    }

    /// Living squad members in id order.
    #[must_use]
    pub fn squad(&self) -> Vec<UnitId> {
        self.units.iter().filter(|u| u.is_squad_member()).map(|u| u.id).collect()
    }

    /// Number of living units of a faction.
    #[must_use]
    pub fn living(&self, faction: Faction) -> usize {
        self.units.iter().filter(|u| u.faction == faction && u.is_alive()).count()
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Add a unit. The first squad member becomes the selection.
    pub fn spawn(&mut self, unit: Unit) -> UnitId {
        let squad = unit.is_squad_member();
        let id = self.units.insert(unit);
        if squad && self.selected.is_none() {
            self.selected = Some(id);
        }
        tracing::debug!(unit = id, "Unit spawned");
        id
    }

    /// Spawn a unit from a mob template.
    pub fn spawn_template(
        &mut self,
        registry: &TemplateRegistry,
        mob_id: &str,
        pos: GridPos,
        faction: Faction,
    ) -> Result<UnitId> {
        if !self.map.in_bounds(pos) {
            return Err(GameError::OutOfBounds { x: pos.x, y: pos.y });
        }
        let unit = registry.spawn(mob_id, pos, faction)?;
        Ok(self.spawn(unit))
    }

    /// Put a squad member under direct control.
    pub fn select(&mut self, id: UnitId) -> Result<()> {
        let unit = self.units.get(id).ok_or(GameError::UnitNotFound(id))?;
        if !unit.is_squad_member() {
            return Err(GameError::InvalidState(format!("unit {id} is not a living squad member")));
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Cycle control to the next living squad member in id order.
    pub fn select_next(&mut self) -> Option<UnitId> {
        let squad = self.squad();
        let next = match self.selected {
            Some(current) => squad.iter().copied().find(|&id| id > current).or_else(|| squad.first().copied()),
            None => squad.first().copied(),
        };
        self.selected = next;
        next
    }

    // ------------------------------------------------------------------
    // Turn loop
    // ------------------------------------------------------------------

    /// Run one turn.
    ///
    /// Returns [`TurnOutcome::Deferred`] while projectiles are in flight;
    /// the turn is remembered and [`Simulation::settle`] runs it once they
    /// land. After the game ends every call returns the terminal outcome.
    pub fn process_turn(&mut self, hook: &mut dyn TurnHook) -> TurnOutcome {
        if let Some(done) = self.finished {
            return done;
        }
        if !barrier_clear(self.projectiles.len()) {
            tracing::debug!(in_flight = self.projectiles.len(), "Turn deferred");
            self.turn_pending = true;
            return TurnOutcome::Deferred;
        }
        self.turn_pending = false;

        // Control may pass to another unit mid-pass; who acts on orders is
        // fixed for the whole turn.
        let clock = self.clock;
        let selected = self.selected;
        for id in self.units.sorted_ids() {
            self.act(id, clock, selected);
        }

        let report = self.cleanup(clock);
        let status = hook.on_turn_end(&report, &self.units, &mut self.log);
        if status == MissionStatus::Complete {
            self.finished = Some(TurnOutcome::Completed);
            return TurnOutcome::Completed;
        }

        self.clock += 1;

        let loss = if self.squad().is_empty() {
            Some(LossReason::SquadWiped)
        } else if let MissionStatus::Failed(reason) = status {
            Some(reason)
        } else {
            None
        };

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(turn = self.clock, state_hash = hash, "Simulation state hash");
        }

        if let Some(reason) = loss {
            tracing::info!(turn = self.clock, %reason, "Mission lost");
            self.finished = Some(TurnOutcome::Lost(reason));
            return TurnOutcome::Lost(reason);
        }
        TurnOutcome::Advanced
    }

    /// Fly every projectile until none remain, then run any deferred turn.
    pub fn settle(&mut self, hook: &mut dyn TurnHook) -> Option<TurnOutcome> {
        while !self.projectiles.is_empty() {
            self.advance_projectiles();
        }
        self.turn_pending.then(|| self.process_turn(hook))
    }

    fn act(&mut self, id: UnitId, clock: u64, selected: Option<UnitId>) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        unit.refresh_defence();

        if !unit.is_ready(clock) {
            tracing::debug!(
                unit = id,
                next_action_turn = %unit.next_action_turn,
                clock,
                "Recharging"
            );
            return;
        }

        if selected == Some(id) {
            let speed = unit.mob.as_ref().map_or(Fixed::ONE, |m| m.stats.speed);
            commit_action(unit, clock, speed);
            return;
        }

        let action = match self.units.get(id) {
            Some(unit) => {
                let ctx = AiContext {
                    units: &self.units,
                    terrain: &self.map,
                    rules: &self.rules,
                    controlled: selected,
                };
                ai::decide(unit, &ctx)
            }
            None => Action::Idle,
        };
        tracing::debug!(unit = id, ?action, "Decision");
        self.execute(id, action);
    }

    fn execute(&mut self, id: UnitId, action: Action) {
        match action {
            Action::Idle => {}
            Action::Recharge => self.commit(id, Pace::Full),
            Action::Move { heading, pace } => {
                self.do_move(id, heading, pace);
            }
            Action::Melee { target } => {
                self.commit(id, Pace::Full);
                self.do_melee(id, target);
            }
            Action::Fire { at, .. } => {
                self.commit(id, Pace::Full);
                self.fire_weapon(id, at);
            }
            Action::Reload => {
                self.commit(id, Pace::Full);
                self.reload_weapon(id, true);
            }
            Action::MoveAndFire { heading, at, .. } => {
                self.do_move(id, heading, Pace::Half);
                self.commit(id, Pace::Full);
                self.fire_weapon(id, at);
            }
        }
    }

    fn cleanup(&mut self, clock: u64) -> TurnReport {
        let mut report = TurnReport {
            turn: clock,
            ..TurnReport::default()
        };

        for id in self.units.sorted_ids() {
            let Some(unit) = self.units.get_mut(id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            let (stunned, expired) = unit.tick_status_effects();
            if stunned {
                skip_next_turn(unit, clock);
            }
            let name = unit.name.clone();
            for kind in expired {
                self.log.push(
                    clock,
                    CombatEvent::info(Some(id), format!("{name} is no longer {}.", kind.label())),
                );
            }
        }

        let dead: Vec<(UnitId, Faction)> = self
            .units
            .iter()
            .filter(|u| u.mob.is_some() && !u.is_alive())
            .map(|u| (u.id, u.faction))
            .collect();
        for (id, faction) in dead {
            self.units.remove(id);
            report.record_death(id, faction);
        }

        if !report.deaths.is_empty() {
            tracing::info!(turn = clock, deaths = report.deaths.len(), kills = report.kills(), "Dead units swept");
        }
        report
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    fn commit(&mut self, id: UnitId, pace: Pace) {
        let clock = self.clock;
        if let Some(unit) = self.units.get_mut(id) {
            let speed = unit.mob.as_ref().map_or(Fixed::ONE, |m| m.stats.speed);
            commit_action(unit, clock, pace.apply(speed));
        }
    }

    /// Move one cell. The action cost is charged even when no cell is
    /// available.
    fn do_move(&mut self, id: UnitId, heading: Heading, pace: Pace) -> bool {
        let clock = self.clock;
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        let speed = pace.apply(unit.mob.as_ref().map_or(Fixed::ZERO, |m| m.stats.speed));
        if !unit.is_ready(clock) || speed <= Fixed::ZERO {
            tracing::debug!(unit = id, "Cannot move this turn");
            return false;
        }

        let destination = match heading {
            Heading::Toward(goal) if unit.pos.within(goal, self.rules.melee_reach) => None,
            Heading::Toward(goal) => step_toward(unit, goal, &self.units, &self.map),
            Heading::AwayFrom(threat) => step_away(unit, threat, &self.units, &self.map),
        };

        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        commit_action(unit, clock, speed);
        match destination {
            Some(cell) => {
                tracing::trace!(unit = id, from = %unit.pos, to = %cell, "Moved");
                unit.pos = cell;
                true
            }
            None => false,
        }
    }

    fn do_melee(&mut self, attacker: UnitId, target: UnitId) -> bool {
        let (Some(a), Some(d)) = (self.units.get(attacker), self.units.get(target)) else {
            return false;
        };
        let weapon = a
            .mob
            .as_ref()
            .and_then(|m| m.equipment.melee.as_ref())
            .map(WeaponTag::from);
        let Some(outcome) = resolve_melee(a, d, &self.rules, &mut self.rng) else {
            tracing::debug!(attacker, target, "Melee not possible");
            return false;
        };

        let source = Some(attacker);
        match outcome {
            MeleeOutcome::Hit(amount) => self.apply_damage(target, amount, source, weapon),
            MeleeOutcome::Miss => self.log.push(self.clock, CombatEvent::Miss { source, target }),
            MeleeOutcome::Block => self.log.push(self.clock, CombatEvent::Block { source, target }),
        }
        true
    }

    /// Launch a projectile at `at` and spend a round.
    fn fire_weapon(&mut self, id: UnitId, at: GridPos) -> bool {
        let clock = self.clock;
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        let Some(weapon) = unit.mob.as_ref().and_then(|m| m.ranged_weapon()) else {
            return false;
        };
        if weapon.is_empty() {
            tracing::debug!(unit = id, "Weapon empty");
            return false;
        }
        let projectile = Projectile::launch(unit, weapon, at, &self.map, &self.rules, &mut self.rng);
        self.log.push(
            clock,
            CombatEvent::Action {
                source: id,
                action: ActionKind::Fires,
                weapon: Some(WeaponTag::from(weapon)),
            },
        );

        if let Some(mob) = self.units.get_mut(id).and_then(|u| u.mob.as_mut()) {
            mob.last_fire_turn = clock;
            if let Some(weapon) = mob.equipment.get_mut(Slot::Ranged) {
                weapon.spend_round();
            }
        }
        self.projectiles.push(projectile);
        true
    }

    /// Refill the ranged weapon. Without `force` only weapons that support
    /// field reloads are refilled; the attempt is logged either way.
    fn reload_weapon(&mut self, id: UnitId, force: bool) -> bool {
        let clock = self.clock;
        let Some(weapon) = self
            .units
            .get_mut(id)
            .and_then(|u| u.mob.as_mut())
            .and_then(|m| m.equipment.get_mut(Slot::Ranged))
        else {
            return false;
        };
        if force || weapon.can_reload() {
            weapon.refill();
        }
        let ammo = weapon.stats.ammo;
        let tag = WeaponTag::from(&*weapon);
        self.log.push(
            clock,
            CombatEvent::Action {
                source: id,
                action: ActionKind::Reloads,
                weapon: Some(tag),
            },
        );
        tracing::info!(unit = id, ammo, "Reloaded");
        true
    }

    /// Subtract health, log the hit, and kill the unit if it reaches zero.
    fn apply_damage(&mut self, target: UnitId, amount: i32, source: Option<UnitId>, weapon: Option<WeaponTag>) {
        let clock = self.clock;
        let Some(unit) = self.units.get_mut(target) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        let remaining = unit.apply_damage(amount);
        self.log.push(
            clock,
            CombatEvent::Damage {
                source,
                target,
                amount,
                weapon,
            },
        );
        if remaining == 0 {
            self.kill(target);
        }
    }

    fn kill(&mut self, id: UnitId) {
        let clock = self.clock;
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.mark_dead() {
            return;
        }
        let pos = unit.pos;
        self.map.set(pos, CellType::Remains);
        self.log.push(clock, CombatEvent::Death { unit: id });
        tracing::info!(unit = id, %pos, "Unit died");

        if self.selected == Some(id) {
            let next = self.select_next();
            tracing::info!(from = id, to = ?next, "Control handed over");
        }
    }

    fn add_status(&mut self, id: UnitId, kind: StatusKind, duration: u32) {
        let clock = self.clock;
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        unit.add_status(kind, duration);
        let message = format!("{} is now {}!", unit.name, kind.label());
        self.log.push(clock, CombatEvent::info(Some(id), message));
    }

    // ------------------------------------------------------------------
    // Projectiles
    // ------------------------------------------------------------------

    /// Move every projectile one cell and resolve what it hits.
    ///
    /// Returns the number still in flight.
    pub fn advance_projectiles(&mut self) -> usize {
        let mut projectiles = std::mem::take(&mut self.projectiles);
        for projectile in &mut projectiles {
            let outcome = projectile.step(&self.map, &self.units, &self.rules, &mut self.rng);
            match outcome {
                StepOutcome::Moved | StepOutcome::PassedOver(_) => {}
                StepOutcome::Blocked => {
                    tracing::debug!(at = %projectile.pos, "Projectile hit a wall");
                }
                StepOutcome::Expired => {
                    tracing::trace!(at = %projectile.pos, "Projectile spent");
                }
                StepOutcome::Missed(target) => {
                    self.log.push(
                        self.clock,
                        CombatEvent::Miss {
                            source: projectile.source,
                            target,
                        },
                    );
                }
                StepOutcome::Struck(target) => self.resolve_strike(projectile, target),
            }
        }
        projectiles.retain(Projectile::is_traveling);
        self.projectiles = projectiles;
        self.projectiles.len()
    }

    fn resolve_strike(&mut self, projectile: &Projectile, struck: UnitId) {
        let weapon = Some(WeaponTag::from(&projectile.weapon));
        let area = projectile.weapon.is_area();
        tracing::debug!(target = struck, at = %projectile.pos, area, "Projectile struck");

        for impact in projectile.impacts(struck, &self.units) {
            if impact.damage == 0 {
                self.log.push(
                    self.clock,
                    CombatEvent::Block {
                        source: projectile.source,
                        target: impact.target,
                    },
                );
            } else {
                self.apply_damage(impact.target, impact.damage, projectile.source, weapon.clone());
            }
        }

        if let Some((kind, duration)) = projectile.roll_status(&mut self.rng) {
            self.add_status(struck, kind, duration);
        }
    }

    // ------------------------------------------------------------------
    // Player commands
    // ------------------------------------------------------------------

    /// Carry out a command for the selected unit.
    ///
    /// Acting commands run a turn afterwards and return its outcome; free
    /// commands and rejected moves return `Ok(None)` without touching the
    /// clock.
    ///
    /// # Errors
    ///
    /// [`GameError::NoSelection`] without a selected unit,
    /// [`GameError::UnitRecharging`] when it cannot act yet,
    /// [`GameError::TurnInProgress`] for acting commands while the last
    /// turn waits on projectiles (`Wait` still lets it resolve),
    /// [`GameError::OutOfBounds`] for steps off the map and
    /// [`GameError::InvalidState`] once the game is over.
    pub fn command(&mut self, command: PlayerCommand, hook: &mut dyn TurnHook) -> Result<Option<TurnOutcome>> {
        if let Some(done) = self.finished {
            return Err(GameError::InvalidState(format!("game already ended: {done:?}")));
        }
        tracing::debug!(?command, selected = ?self.selected, "Player command");

        match command {
            PlayerCommand::SelectNext => {
                self.select_next();
                return Ok(None);
            }
            PlayerCommand::ToggleStance => {
                let mob = self.selected_mob_mut()?;
                mob.stance = mob.stance.toggled();
                return Ok(None);
            }
            PlayerCommand::ToggleAutofire => {
                let mob = self.selected_mob_mut()?;
                mob.autofire = !mob.autofire;
                return Ok(None);
            }
            PlayerCommand::Wait if !self.projectiles.is_empty() => {
                self.turn_pending = true;
                return Ok(Some(TurnOutcome::Deferred));
            }
            PlayerCommand::Wait => return Ok(Some(self.process_turn(hook))),
            PlayerCommand::Step { .. } | PlayerCommand::FireAt(_) | PlayerCommand::Reload => {}
        }

        if self.turn_pending || !self.projectiles.is_empty() {
            return Err(GameError::TurnInProgress { turn: self.clock });
        }

        let id = self.ready_selection()?;
        let acted = match command {
            PlayerCommand::Step { dx, dy } => self.player_step(id, dx, dy)?,
            PlayerCommand::FireAt(at) => self.player_fire(id, at),
            PlayerCommand::Reload => self.player_reload(id),
            _ => false,
        };
        Ok(acted.then(|| self.process_turn(hook)))
    }

    fn selected_mob_mut(&mut self) -> Result<&mut Mob> {
        let id = self.selected.ok_or(GameError::NoSelection)?;
        self.units
            .get_mut(id)
            .and_then(|u| u.mob.as_mut())
            .ok_or(GameError::UnitNotFound(id))
    }

    fn ready_selection(&self) -> Result<UnitId> {
        let id = self.selected.ok_or(GameError::NoSelection)?;
        let unit = self.units.get(id).ok_or(GameError::UnitNotFound(id))?;
        if !unit.is_alive() {
            return Err(GameError::UnitNotFound(id));
        }
        if !unit.is_ready(self.clock) {
            return Err(GameError::UnitRecharging {
                id,
                ready_at: unit.next_action_turn.to_num::<f64>(),
            });
        }
        Ok(id)
    }

    fn player_step(&mut self, id: UnitId, dx: i32, dy: i32) -> Result<bool> {
        let (dx, dy) = (dx.clamp(-1, 1), dy.clamp(-1, 1));
        if dx == 0 && dy == 0 {
            return Err(GameError::InvalidState("step needs a direction".into()));
        }
        let Some(unit) = self.units.get(id) else {
            return Err(GameError::UnitNotFound(id));
        };
        let from = unit.pos;
        let side = unit.faction;
        let to = from.offset(dx, dy);
        if !self.map.in_bounds(to) {
            return Err(GameError::OutOfBounds { x: to.x, y: to.y });
        }

        if is_free(unit, to, &self.units, &self.map) {
            if let Some(unit) = self.units.get_mut(id) {
                unit.pos = to;
            }
            return Ok(true);
        }

        let occupant = self.units.unit_at(to).map(|u| (u.id, u.faction));
        match occupant {
            Some((other, faction)) if faction == side => {
                if let Some(mate) = self.units.get_mut(other) {
                    mate.pos = from;
                }
                if let Some(unit) = self.units.get_mut(id) {
                    unit.pos = to;
                }
                Ok(true)
            }
            Some((other, faction)) if side.is_hostile_to(faction) => {
                self.do_melee(id, other);
                Ok(true)
            }
            _ => {
                tracing::warn!(unit = id, %to, "Move rejected: cell blocked");
                Ok(false)
            }
        }
    }

    fn player_fire(&mut self, id: UnitId, at: GridPos) -> bool {
        let clock = self.clock;
        let empty = self
            .units
            .get(id)
            .and_then(|u| u.mob.as_ref())
            .and_then(|m| m.ranged_weapon())
            .map(Item::is_empty);
        let Some(empty) = empty else {
            self.log.push(clock, CombatEvent::info(Some(id), "No ranged weapon!"));
            return false;
        };
        if empty {
            self.log.push(clock, CombatEvent::info(Some(id), "No ammo!"));
            return false;
        }
        self.fire_weapon(id, at)
    }

    fn player_reload(&mut self, id: UnitId) -> bool {
        let needs_reload = self
            .units
            .get(id)
            .and_then(|u| u.mob.as_ref())
            .and_then(|m| m.ranged_weapon())
            .is_some_and(|w| w.uses_ammo() && w.stats.ammo < w.stats.max_ammo);
        needs_reload && self.reload_weapon(id, false)
    }

    // ------------------------------------------------------------------
    // Presentation support
    // ------------------------------------------------------------------

    /// Recompute which units the squad can see.
    ///
    /// A unit is visible when a living squad member within `radius` has an
    /// unobstructed sight line to it. Squad members are always visible.
    pub fn refresh_visibility(&mut self, radius: Fixed) {
        let observers: Vec<GridPos> = self
            .units
            .iter()
            .filter(|u| u.is_squad_member())
            .map(|u| u.pos)
            .collect();
        let map = &self.map;
        for unit in self.units.iter_mut() {
            unit.visible = unit.faction == Faction::Player
                || observers
                    .iter()
                    .any(|&eye| eye.within(unit.pos, radius) && sight_line(map, eye, unit.pos));
        }
    }

    /// Snapshot of every unit in id order.
    #[must_use]
    pub fn unit_snapshots(&self) -> Vec<UnitSnapshot> {
        self.units
            .iter()
            .map(|u| UnitSnapshot {
                id: u.id,
                name: u.name.clone(),
                faction: u.faction,
                pos: u.pos,
                health: u.health(),
                max_health: u.original_health,
                defence: u.defence(),
                status_effects: u.status_effects.clone(),
                alive: u.is_alive(),
                visible: u.visible,
                selected: self.selected == Some(u.id),
                ammo: u
                    .mob
                    .as_ref()
                    .and_then(|m| m.ranged_weapon())
                    .filter(|w| w.uses_ammo())
                    .map(|w| (w.stats.ammo, w.stats.max_ammo)),
            })
            .collect()
    }

    /// Snapshot of every projectile, drawn `t` of the way through its
    /// current step.
    #[must_use]
    pub fn projectile_snapshots(&self, t: Fixed) -> Vec<ProjectileSnapshot> {
        self.projectiles
            .iter()
            .map(|p| {
                let (x, y) = p.render_pos(t);
                ProjectileSnapshot {
                    source: p.source,
                    cell: p.pos,
                    x,
                    y,
                    direction: p.direction(),
                }
            })
            .collect()
    }

    /// Hash of the simulation state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.clock.hash(&mut hasher);
        self.selected.hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(unit) = self.units.get(id) {
                unit.hash(&mut hasher);
            }
        }

        self.projectiles.hash(&mut hasher);
        self.map.hash(&mut hasher);
        self.log.len().hash(&mut hasher);

        hasher.finish()
    }

    /// Squad stance of the selected unit, if any.
    #[must_use]
    pub fn selected_stance(&self) -> Option<Stance> {
        self.selected
            .and_then(|id| self.units.get(id))
            .and_then(|u| u.mob.as_ref())
            .map(|m| m.stance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiArchetype, MobStats};
    use crate::events::LogKind;
    use crate::items::{Item, ItemStats};

    fn trooper(pos: GridPos) -> Unit {
        let stats = MobStats {
            attack: 20,
            ..MobStats::default()
        };
        Unit::combatant("Trooper", pos, Faction::Player, Mob::new(AiArchetype::Player, stats))
    }

    fn grub(pos: GridPos, health: i32, defence: i32) -> Unit {
        let stats = MobStats {
            health,
            defence,
            attack: 5,
            ..MobStats::default()
        };
        Unit::combatant("Grub", pos, Faction::Enemy, Mob::new(AiArchetype::MeleeAggressive, stats))
    }

    fn rifle(ammo: i32) -> Item {
        Item {
            slot: Slot::Ranged,
            stats: ItemStats {
                attack: 30,
                range: Fixed::from_num(8),
                accuracy: Fixed::from_num(4),
                ammo,
                max_ammo: 3,
                reload: 1,
                ..ItemStats::default()
            },
            ..Item::named("Rifle")
        }
    }

    #[test]
    fn test_first_squad_member_is_selected() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        sim.spawn(grub(GridPos::new(4, 4), 10, 0));
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        sim.spawn(trooper(GridPos::new(1, 0)));
        assert_eq!(sim.selected(), Some(lead));
    }

    #[test]
    fn test_step_moves_and_advances_clock() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        let outcome = sim.command(PlayerCommand::Step { dx: 1, dy: 1 }, &mut ()).unwrap();
        assert_eq!(outcome, Some(TurnOutcome::Advanced));
        assert_eq!(sim.unit(lead).unwrap().pos, GridPos::new(1, 1));
        assert_eq!(sim.clock(), 1);
    }

    #[test]
    fn test_step_into_squad_mate_swaps() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        let mate = sim.spawn(trooper(GridPos::new(1, 0)));
        if let Some(mob) = sim.unit_mut(mate).and_then(|u| u.mob.as_mut()) {
            mob.stance = Stance::Hold;
        }
        sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).unwrap();
        assert_eq!(sim.unit(lead).unwrap().pos, GridPos::new(1, 0));
        assert_eq!(sim.unit(mate).unwrap().pos, GridPos::new(0, 0));
    }

    #[test]
    fn test_step_off_map_is_an_error() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        sim.spawn(trooper(GridPos::new(0, 0)));
        let err = sim.command(PlayerCommand::Step { dx: -1, dy: 0 }, &mut ()).unwrap_err();
        assert!(matches!(err, GameError::OutOfBounds { x: -1, y: 0 }));
        assert_eq!(sim.clock(), 0);
    }

    #[test]
    fn test_bump_attack_hits_or_misses() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 3);
        sim.spawn(trooper(GridPos::new(0, 0)));
        let victim = sim.spawn(grub(GridPos::new(1, 0), 30, 5));
        sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).unwrap();
        let health = sim.unit(victim).map_or(0, Unit::health);
        assert!(health == 30 || health == 15, "unexpected health {health}");
    }

    #[test]
    fn test_death_is_immediate_and_swept() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 9);
        sim.spawn(trooper(GridPos::new(0, 0)));
        let victim = sim.spawn(grub(GridPos::new(1, 0), 1, 0));
        sim.apply_damage(victim, 5, None, None);
        let corpse = sim.unit(victim).unwrap();
        assert!(!corpse.is_alive());
        assert!(corpse.passable);
        assert_eq!(sim.map().get(GridPos::new(1, 0)), Some(CellType::Remains));
        assert_eq!(sim.log().count(LogKind::Death), 1);

        sim.process_turn(&mut ());
        assert!(sim.unit(victim).is_none());
    }

    #[test]
    fn test_selection_hands_off_on_death() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 9);
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        let second = sim.spawn(trooper(GridPos::new(2, 2)));
        sim.apply_damage(lead, 1000, None, None);
        assert_eq!(sim.selected(), Some(second));
    }

    #[test]
    fn test_squad_wipe_loses() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 9);
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        sim.apply_damage(lead, 1000, None, None);
        assert_eq!(sim.process_turn(&mut ()), TurnOutcome::Lost(LossReason::SquadWiped));
        assert!(sim.command(PlayerCommand::Wait, &mut ()).is_err());
    }

    #[test]
    fn test_fire_defers_turn_until_projectile_lands() {
        let mut sim = Simulation::new(TileMap::new(10, 3), 5);
        let lead = sim.spawn(trooper(GridPos::new(0, 1)));
        sim.unit_mut(lead).unwrap().equip(rifle(3));
        let target = sim.spawn(grub(GridPos::new(6, 1), 100, 0));

        let outcome = sim.command(PlayerCommand::FireAt(GridPos::new(6, 1)), &mut ()).unwrap();
        assert_eq!(outcome, Some(TurnOutcome::Deferred));
        assert_eq!(sim.clock(), 0);
        assert!(sim.turn_pending());

        while sim.advance_projectiles() > 0 {
            assert_eq!(sim.process_turn(&mut ()), TurnOutcome::Deferred);
            assert_eq!(sim.clock(), 0);
        }
        assert!(sim.unit(target).unwrap().health() < 100);
        assert_eq!(sim.settle(&mut ()), Some(TurnOutcome::Advanced));
        assert_eq!(sim.clock(), 1);

        let ammo = sim.unit(lead).and_then(|u| u.mob.as_ref()).and_then(|m| m.ranged_weapon()).map(|w| w.stats.ammo);
        assert_eq!(ammo, Some(2));
    }

    #[test]
    fn test_fire_with_empty_magazine_costs_nothing() {
        let mut sim = Simulation::new(TileMap::new(10, 3), 5);
        let lead = sim.spawn(trooper(GridPos::new(0, 1)));
        sim.unit_mut(lead).unwrap().equip(rifle(0));
        let outcome = sim.command(PlayerCommand::FireAt(GridPos::new(6, 1)), &mut ()).unwrap();
        assert_eq!(outcome, None);
        assert_eq!(sim.clock(), 0);

        let outcome = sim.command(PlayerCommand::Reload, &mut ()).unwrap();
        assert_eq!(outcome, Some(TurnOutcome::Advanced));
        let ammo = sim.unit(lead).and_then(|u| u.mob.as_ref()).and_then(|m| m.ranged_weapon()).map(|w| w.stats.ammo);
        assert_eq!(ammo, Some(3));
        assert_eq!(sim.log().count(LogKind::Action), 1);
    }

    #[test]
    fn test_slow_selected_unit_must_wait() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        let lead = sim.spawn(trooper(GridPos::new(0, 0)));
        if let Some(mob) = sim.unit_mut(lead).and_then(|u| u.mob.as_mut()) {
            mob.stats.speed = Fixed::from_num(0.5);
        }
        sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).unwrap();
        let err = sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).unwrap_err();
        assert!(matches!(err, GameError::UnitRecharging { .. }));
        sim.command(PlayerCommand::Wait, &mut ()).unwrap();
        assert!(sim.command(PlayerCommand::Step { dx: 1, dy: 0 }, &mut ()).is_ok());
    }

    #[test]
    fn test_stun_skips_turns_and_expires() {
        let mut sim = Simulation::new(TileMap::new(5, 5), 1);
        sim.spawn(trooper(GridPos::new(0, 0)));
        let target = sim.spawn(grub(GridPos::new(4, 4), 50, 0));
        sim.add_status(target, StatusKind::Stunned, 2);
        sim.process_turn(&mut ());
        assert!(!sim.unit(target).unwrap().is_ready(sim.clock()));
        sim.process_turn(&mut ());
        sim.process_turn(&mut ());
        assert!(!sim.unit(target).unwrap().has_status(StatusKind::Stunned));
        assert!(sim
            .log()
            .entries()
            .iter()
            .any(|e| matches!(&e.event, CombatEvent::Info { message, .. } if message.contains("no longer stunned"))));
    }

    #[test]
    fn test_visibility_refresh_respects_walls() {
        let map = TileMap::from_rows(&[".....", "..#..", "....."]).unwrap();
        let mut sim = Simulation::new(map, 1);
        sim.spawn(trooper(GridPos::new(0, 1)));
        let hidden = sim.spawn(grub(GridPos::new(4, 1), 10, 0));
        let seen = sim.spawn(grub(GridPos::new(1, 0), 10, 0));
        sim.refresh_visibility(Fixed::from_num(8));
        assert!(!sim.unit(hidden).unwrap().visible);
        assert!(sim.unit(seen).unwrap().visible);
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut a = Simulation::new(TileMap::new(5, 5), 1);
        let mut b = Simulation::new(TileMap::new(5, 5), 1);
        a.spawn(trooper(GridPos::new(0, 0)));
        b.spawn(trooper(GridPos::new(0, 0)));
        assert_eq!(a.state_hash(), b.state_hash());
        a.command(PlayerCommand::Wait, &mut ()).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
    }
}
