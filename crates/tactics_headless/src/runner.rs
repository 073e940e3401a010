//! Skirmish execution for headless testing.
//!
//! The core only ever acts for units it controls; the selected squad
//! member waits for orders. [`autopilot`] stands in for the player and
//! [`SkirmishRunner`] drives the loop: pick a command, run the turn, land
//! projectiles, narrate, tally.
//!
//! Every loop here is bounded by the turn limit. A turn either advances the
//! clock or ends the game, and projectiles die at the step cap, so a run
//! always terminates.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tactics_core::movement::step_toward;
use tactics_core::prelude::*;
use std::result::Result;
use tactics_core::targeting::{find_target, nearest_enemy};

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::narration::Narrator;
use crate::scenario::{Scenario, ScenarioError};

/// Progress logging interval (turns).
const PROGRESS_LOG_INTERVAL: u64 = 50;

/// Choose the selected unit's next order.
///
/// Priorities: wait out recharge, reload an empty magazine, shoot the
/// nearest visible hostile in range, hit an adjacent one, then walk toward
/// whatever the mission needs next.
#[must_use]
pub fn autopilot(sim: &Simulation, mission: &Mission, artifact: Option<GridPos>) -> PlayerCommand {
    let Some(unit) = sim.selected().and_then(|id| sim.unit(id)) else {
        return PlayerCommand::Wait;
    };
    let Some(mob) = unit.mob.as_ref() else {
        return PlayerCommand::Wait;
    };
    if !unit.is_ready(sim.clock()) {
        return PlayerCommand::Wait;
    }
    let (units, map) = (sim.units(), sim.map());

    if let Some(weapon) = mob.ranged_weapon() {
        if weapon.is_empty() {
            if weapon.can_reload() {
                return PlayerCommand::Reload;
            }
        } else if let Some(target) = nearest_enemy(unit, weapon.stats.range, units, map) {
            return PlayerCommand::FireAt(target.pos);
        }
    }
    if let Some(target) = nearest_enemy(unit, sim.rules().melee_reach, units, map) {
        return step_to(unit.pos, target.pos);
    }

    let goal = if mission.phase() == MissionPhase::Evac {
        let zone = mission.evac_zone();
        if zone.contains(unit.pos) {
            return PlayerCommand::Wait;
        }
        Some(zone.nearest_cell(unit.pos))
    } else {
        match (mission.objective(), artifact) {
            (Objective::Retrieve, Some(cell)) if !mission.artifact_secured() => Some(cell),
            (Objective::Assassinate { target }, _) => sim
                .unit(target)
                .filter(|u| u.is_alive())
                .map(|u| u.pos)
                .or_else(|| hunt(unit, sim)),
            _ => hunt(unit, sim),
        }
    };

    goal.filter(|&g| g != unit.pos)
        .and_then(|g| step_toward(unit, g, units, map))
        .map_or(PlayerCommand::Wait, |next| step_to(unit.pos, next))
}

/// A visible target if there is one, otherwise the closest living hostile.
fn hunt(unit: &Unit, sim: &Simulation) -> Option<GridPos> {
    if let Some(target) = find_target(unit, None, sim.units(), sim.map()) {
        return Some(target.pos);
    }
    sim.units()
        .iter()
        .filter(|u| u.is_alive() && unit.faction.is_hostile_to(u.faction))
        .min_by_key(|u| (unit.pos.distance_squared(u.pos), u.id))
        .map(|u| u.pos)
}

fn step_to(from: GridPos, to: GridPos) -> PlayerCommand {
    PlayerCommand::Step {
        dx: (to.x - from.x).signum(),
        dy: (to.y - from.y).signum(),
    }
}

/// Carry out a command and resolve the turn it starts.
///
/// Refused or no-op commands fall back to waiting, so the clock always
/// moves unless the game has ended. Shots fired during the turn are landed
/// before returning, so the next order never meets a pending turn.
pub fn issue(sim: &mut Simulation, command: PlayerCommand, hook: &mut dyn TurnHook) -> TurnOutcome {
    let outcome = match sim.command(command, hook) {
        Ok(Some(outcome)) => outcome,
        Ok(None) => sim.process_turn(hook),
        Err(err) => {
            debug!(%err, ?command, "Command refused, waiting instead");
            sim.process_turn(hook)
        }
    };
    sim.settle(hook).unwrap_or(outcome)
}

/// What happened during one runner step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnFrame {
    /// Clock after the step.
    pub turn: u64,
    /// Order the autopilot gave.
    pub command: PlayerCommand,
    /// Result of the turn.
    pub outcome: TurnOutcome,
    /// Narrated log lines.
    pub lines: Vec<String>,
    /// Units after the turn.
    pub units: Vec<UnitSnapshot>,
}

/// Result of running a game.
#[derive(Debug)]
pub struct GameResult {
    /// Tallies and outcome.
    pub metrics: GameMetrics,
    /// Terminal outcome, `None` on timeout.
    pub outcome: Option<TurnOutcome>,
    /// Whole narrated log.
    pub narration: Vec<String>,
}

/// Configuration for a single game run.
#[derive(Debug, Clone, Default)]
pub struct GameConfig {
    /// Random seed for determinism.
    pub seed: u64,
    /// Overrides the scenario's turn limit.
    pub max_turns: Option<u64>,
    /// Game ID for tracking.
    pub game_id: String,
}

/// A deployed scenario with an autopilot at the controls.
#[derive(Debug)]
pub struct SkirmishRunner {
    sim: Simulation,
    mission: Mission,
    artifact: Option<GridPos>,
    max_turns: u64,
    sight_radius: Fixed,
    narrator: Narrator,
    metrics: MetricsCollector,
    outcome: Option<TurnOutcome>,
}

impl SkirmishRunner {
    /// Deploy `scenario` with the given content.
    pub fn new(scenario: &Scenario, registry: &TemplateRegistry, config: &GameConfig) -> Result<Self, ScenarioError> {
        let deployment = scenario.deploy(registry, config.seed)?;
        let mut narrator = Narrator::new();
        narrator.observe(&deployment.sim);
        Ok(Self {
            sim: deployment.sim,
            mission: deployment.mission,
            artifact: deployment.artifact,
            max_turns: config.max_turns.unwrap_or(deployment.max_turns),
            sight_radius: deployment.sight_radius,
            narrator,
            metrics: MetricsCollector::new(&config.game_id, &scenario.name, config.seed),
            outcome: None,
        })
    }

    /// Colour the narration.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.narrator = self.narrator.with_color(color);
        self
    }

    /// The simulation.
    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// The mission tracker.
    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Artifact cell, while it has not been picked up.
    pub fn artifact(&self) -> Option<GridPos> {
        self.artifact.filter(|_| !self.mission.artifact_secured())
    }

    /// Terminal outcome once reached.
    pub fn outcome(&self) -> Option<TurnOutcome> {
        self.outcome
    }

    /// Whether the game ended or ran out of turns.
    pub fn is_over(&self) -> bool {
        self.outcome.is_some() || self.sim.clock() >= self.max_turns
    }

    /// Give one order and resolve its turn.
    pub fn step(&mut self) -> TurnFrame {
        self.narrator.observe(&self.sim);
        self.sim.refresh_visibility(self.sight_radius);

        let command = autopilot(&self.sim, &self.mission, self.artifact());
        let outcome = issue(&mut self.sim, command, &mut self.mission);
        self.pick_up_artifact();

        let lines = self.narrator.drain(&self.sim);
        self.metrics.observe(&self.sim, &self.mission, self.narrator.roster());
        if outcome.is_terminal() {
            self.outcome = Some(outcome);
        }

        let turn = self.sim.clock();
        if turn % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                turn,
                squad = self.sim.squad().len(),
                enemies = self.sim.living(Faction::Enemy),
                kills = self.mission.kill_count(),
                "Skirmish progress"
            );
        }

        TurnFrame {
            turn,
            command,
            outcome,
            lines,
            units: self.sim.unit_snapshots(),
        }
    }

    fn pick_up_artifact(&mut self) {
        let Some(cell) = self.artifact() else {
            return;
        };
        let carrier = self
            .sim
            .units()
            .iter()
            .find(|u| u.is_squad_member() && u.pos == cell)
            .map(|u| u.id);
        if let Some(id) = carrier {
            self.mission.secure_artifact();
            info!(unit = id, %cell, turn = self.sim.clock(), "Artifact picked up");
        }
    }

    /// Step until the game ends or the turn limit is hit.
    pub fn run_to_end(mut self) -> GameResult {
        let mut narration = Vec::new();
        let mut budget = self.max_turns.saturating_add(1);
        while !self.is_over() && budget > 0 {
            narration.extend(self.step().lines);
            budget -= 1;
        }
        self.finish(narration)
    }

    /// Close the game.
    pub fn finish(self, narration: Vec<String>) -> GameResult {
        let metrics = self.metrics.finalize(&self.sim, &self.mission, self.outcome);
        info!(
            game_id = %metrics.game_id,
            seed = metrics.seed,
            turns = metrics.turns,
            outcome = metrics.outcome.label(),
            kills = metrics.kills,
            "Game finished"
        );
        GameResult {
            metrics,
            outcome: self.outcome,
            narration,
        }
    }
}

/// Run a complete game.
pub fn run_game(scenario: &Scenario, registry: &TemplateRegistry, config: &GameConfig) -> Result<GameResult, ScenarioError> {
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        scenario = %scenario.name,
        "Starting game simulation"
    );
    Ok(SkirmishRunner::new(scenario, registry, config)?.run_to_end())
}
