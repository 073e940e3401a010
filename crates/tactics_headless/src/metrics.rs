//! Game metrics collection for balance analysis.
//!
//! A [`MetricsCollector`] reads the combat log turn by turn and tallies
//! damage, misses and losses per side. [`BatchSummary`] aggregates many
//! games into win rates and averages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tactics_core::prelude::*;

use crate::narration::Roster;

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum GameOutcome {
    /// The squad met the objective and extracted.
    Completed,
    /// Every squad member died.
    SquadWiped,
    /// The air ran out.
    OxygenDepleted,
    /// The turn limit was reached first.
    #[default]
    TimedOut,
}

impl GameOutcome {
    /// Map a terminal turn outcome, or `None` for a game cut short.
    #[must_use]
    pub fn from_turn(outcome: Option<TurnOutcome>) -> Self {
        match outcome {
            Some(TurnOutcome::Completed) => Self::Completed,
            Some(TurnOutcome::Lost(LossReason::SquadWiped)) => Self::SquadWiped,
            Some(TurnOutcome::Lost(LossReason::OxygenDepleted)) => Self::OxygenDepleted,
            _ => Self::TimedOut,
        }
    }

    /// Short label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::SquadWiped => "squad_wiped",
            Self::OxygenDepleted => "oxygen_depleted",
            Self::TimedOut => "timed_out",
        }
    }

    /// Whether the squad won.
    #[must_use]
    pub const fn is_win(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Per-side tallies for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideMetrics {
    /// Health removed from the other side.
    pub damage_dealt: i64,
    /// Health lost.
    pub damage_taken: i64,
    /// Attacks that missed.
    pub misses: u32,
    /// Attacks absorbed by the other side's defence.
    pub blocked: u32,
    /// Units of this side that died.
    pub losses: u32,
    /// Magazine refills.
    pub reloads: u32,
}

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Clock value when the game stopped.
    pub turns: u64,
    /// How it ended.
    pub outcome: GameOutcome,
    /// The squad's tallies.
    pub squad: SideMetrics,
    /// The hostiles' tallies.
    pub enemy: SideMetrics,
    /// Hits on neutral units.
    pub collateral_damage: i64,
    /// Mission kill counter at the end.
    pub kills: u32,
    /// Air left, for oxygen missions.
    pub oxygen_left: Option<f64>,
    /// Turn on which the objective was met.
    pub objective_turn: Option<u64>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    fn side_mut(&mut self, faction: Faction) -> Option<&mut SideMetrics> {
        match faction {
            Faction::Player => Some(&mut self.squad),
            Faction::Enemy => Some(&mut self.enemy),
            Faction::Neutral => None,
        }
    }
}

/// Metrics collector that tracks events during a game.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
    cursor: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
            cursor: 0,
        }
    }

    /// Metrics gathered so far.
    pub fn metrics(&self) -> &GameMetrics {
        &self.metrics
    }

    /// Tally every event logged since the previous call.
    ///
    /// `roster` must know every unit named in those events.
    pub fn observe(&mut self, sim: &Simulation, mission: &Mission, roster: &Roster) {
        for entry in sim.log().since(self.cursor) {
            self.record(&entry.event, roster);
        }
        self.cursor = sim.log().len();

        if self.metrics.objective_turn.is_none() && mission.phase() == MissionPhase::Evac {
            self.metrics.objective_turn = Some(sim.clock());
        }
    }

    fn record(&mut self, event: &CombatEvent, roster: &Roster) {
        let side_of = |id: Option<UnitId>| id.and_then(|id| roster.faction(id));
        match event {
            CombatEvent::Damage {
                source, target, amount, ..
            } => {
                let amount = i64::from(*amount);
                match roster.faction(*target) {
                    Some(Faction::Neutral) => self.metrics.collateral_damage += amount,
                    Some(victim) => {
                        if let Some(side) = self.metrics.side_mut(victim) {
                            side.damage_taken += amount;
                        }
                        if let Some(attacker) = side_of(*source).filter(|a| *a != victim) {
                            if let Some(side) = self.metrics.side_mut(attacker) {
                                side.damage_dealt += amount;
                            }
                        }
                    }
                    None => {}
                }
            }
            CombatEvent::Miss { source, .. } => {
                if let Some(side) = side_of(*source).and_then(|f| self.metrics.side_mut(f)) {
                    side.misses += 1;
                }
            }
            CombatEvent::Block { target, .. } => {
                if let Some(side) = roster.faction(*target).and_then(|f| self.metrics.side_mut(f)) {
                    side.blocked += 1;
                }
            }
            CombatEvent::Action {
                source,
                action: ActionKind::Reloads,
                ..
            } => {
                if let Some(side) = roster.faction(*source).and_then(|f| self.metrics.side_mut(f)) {
                    side.reloads += 1;
                }
            }
            CombatEvent::Death { unit } => {
                if let Some(side) = roster.faction(*unit).and_then(|f| self.metrics.side_mut(f)) {
                    side.losses += 1;
                }
            }
            CombatEvent::Action { .. } | CombatEvent::Info { .. } => {}
        }
    }

    /// Close the game and hand back the metrics.
    pub fn finalize(mut self, sim: &Simulation, mission: &Mission, outcome: Option<TurnOutcome>) -> GameMetrics {
        self.metrics.turns = sim.clock();
        self.metrics.outcome = GameOutcome::from_turn(outcome);
        self.metrics.kills = mission.kill_count();
        self.metrics.oxygen_left = mission.oxygen().map(|o| o.to_num::<f64>());
        self.metrics.final_state_hash = sim.state_hash();
        self.metrics
    }
}

/// Summary statistics across multiple games.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total games played.
    pub total_games: u32,
    /// Games counted per outcome label.
    pub outcomes: BTreeMap<String, u32>,
    /// Share of games the squad completed.
    pub squad_win_rate: f64,
    /// Average game length in turns.
    pub avg_turns: f64,
    /// Shortest game.
    pub min_turns: u64,
    /// Longest game.
    pub max_turns: u64,
    /// Average kills per game.
    pub avg_kills: f64,
    /// Average squad members lost per game.
    pub avg_squad_losses: f64,
    /// Average damage the squad dealt per game.
    pub avg_damage_dealt: f64,
    /// Average damage the squad took per game.
    pub avg_damage_taken: f64,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }
        let n = games.len() as f64;
        let mut summary = Self {
            total_games: games.len() as u32,
            min_turns: u64::MAX,
            ..Default::default()
        };

        let mut wins = 0u32;
        let mut turns = 0u64;
        let mut kills = 0u64;
        let mut losses = 0u64;
        let mut dealt = 0i64;
        let mut taken = 0i64;

        for game in games {
            *summary.outcomes.entry(game.outcome.label().to_string()).or_default() += 1;
            if game.outcome.is_win() {
                wins += 1;
            }
            turns += game.turns;
            summary.min_turns = summary.min_turns.min(game.turns);
            summary.max_turns = summary.max_turns.max(game.turns);
            kills += u64::from(game.kills);
            losses += u64::from(game.squad.losses);
            dealt += game.squad.damage_dealt;
            taken += game.squad.damage_taken;
        }

        summary.squad_win_rate = f64::from(wins) / n;
        summary.avg_turns = turns as f64 / n;
        summary.avg_kills = kills as f64 / n;
        summary.avg_squad_losses = losses as f64 / n;
        summary.avg_damage_dealt = dealt as f64 / n;
        summary.avg_damage_taken = taken as f64 / n;
        summary
    }

    /// Games that ended a given way.
    #[must_use]
    pub fn count(&self, outcome: GameOutcome) -> u32 {
        self.outcomes.get(outcome.label()).copied().unwrap_or(0)
    }

    /// Whether the squad's win rate falls inside `[min, max]`.
    #[must_use]
    pub fn is_balanced(&self, min: f64, max: f64) -> bool {
        self.total_games > 0 && (min..=max).contains(&self.squad_win_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(outcome: GameOutcome, turns: u64, kills: u32) -> GameMetrics {
        GameMetrics {
            outcome,
            turns,
            kills,
            ..GameMetrics::new("g", "test", 0)
        }
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(GameOutcome::from_turn(Some(TurnOutcome::Completed)), GameOutcome::Completed);
        assert_eq!(
            GameOutcome::from_turn(Some(TurnOutcome::Lost(LossReason::OxygenDepleted))),
            GameOutcome::OxygenDepleted
        );
        assert_eq!(GameOutcome::from_turn(Some(TurnOutcome::Advanced)), GameOutcome::TimedOut);
        assert_eq!(GameOutcome::from_turn(None), GameOutcome::TimedOut);
    }

    #[test]
    fn test_summary_aggregates() {
        let games = vec![
            game(GameOutcome::Completed, 40, 5),
            game(GameOutcome::Completed, 60, 4),
            game(GameOutcome::SquadWiped, 20, 1),
            game(GameOutcome::TimedOut, 300, 2),
        ];
        let summary = BatchSummary::from_games(&games);
        assert_eq!(summary.total_games, 4);
        assert_eq!(summary.count(GameOutcome::Completed), 2);
        assert_eq!(summary.count(GameOutcome::OxygenDepleted), 0);
        assert!((summary.squad_win_rate - 0.5).abs() < f64::EPSILON);
        assert!((summary.avg_turns - 105.0).abs() < f64::EPSILON);
        assert_eq!(summary.min_turns, 20);
        assert_eq!(summary.max_turns, 300);
        assert!((summary.avg_kills - 3.0).abs() < f64::EPSILON);
        assert!(summary.is_balanced(0.4, 0.6));
        assert!(!summary.is_balanced(0.6, 0.9));
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_games(&[]);
        assert_eq!(summary.total_games, 0);
        assert!(!summary.is_balanced(0.0, 1.0));
    }

    #[test]
    fn test_collector_attributes_damage_by_side() {
        let mut sim = Simulation::new(TileMap::new(8, 3), 11);
        let stats = MobStats {
            attack: 30,
            ..MobStats::default()
        };
        let hicks = sim.spawn(Unit::combatant(
            "Hicks",
            GridPos::new(1, 1),
            Faction::Player,
            Mob::new(AiArchetype::Player, stats),
        ));
        let mut grub = Mob::new(AiArchetype::Basic, MobStats::default());
        grub.stats.health = 20;
        grub.stats.attack = 0;
        sim.spawn(Unit::combatant("Grub", GridPos::new(2, 1), Faction::Enemy, grub));

        let mut roster = Roster::default();
        roster.observe(&sim);
        let mission = Mission::new(
            Objective::Exterminate { kills: 1 },
            EvacZone {
                min: GridPos::new(0, 0),
                max: GridPos::new(1, 2),
            },
        );
        let mut collector = MetricsCollector::new("g", "test", 11);

        for _ in 0..20 {
            if sim.living(Faction::Enemy) == 0 {
                break;
            }
            let me = sim.unit(hicks).unwrap().clone();
            let prey = sim.units().iter().find(|u| u.faction == Faction::Enemy).unwrap().pos;
            if me.is_ready(sim.clock()) {
                let step = PlayerCommand::Step {
                    dx: (prey.x - me.pos.x).signum(),
                    dy: (prey.y - me.pos.y).signum(),
                };
                sim.command(step, &mut ()).unwrap();
            } else {
                sim.command(PlayerCommand::Wait, &mut ()).unwrap();
            }
            collector.observe(&sim, &mission, &roster);
        }

        let metrics = collector.metrics();
        assert_eq!(metrics.enemy.losses, 1);
        assert_eq!(metrics.squad.damage_dealt, metrics.enemy.damage_taken);
        assert!(metrics.squad.damage_dealt >= 20);
        assert_eq!(metrics.squad.losses, 0);
    }
}
