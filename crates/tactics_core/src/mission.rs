//! Mission bookkeeping run once per turn.
//!
//! The simulation calls a [`TurnHook`] after the death sweep and before the
//! clock advances. [`Mission`] is the stock implementation: objectives, the
//! evac phase and oxygen supply. Tests and tools that only want combat pass
//! `&mut ()`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::{CombatEvent, CombatLog};
use crate::factions::Faction;
use crate::math::{Fixed, GridPos};
use crate::unit::{UnitId, UnitStorage};

/// What the cleanup phase of one turn removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnReport {
    /// Clock value of the turn being closed.
    pub turn: u64,
    /// Units swept out this turn, in id order.
    pub deaths: Vec<(UnitId, Faction)>,
    /// Deaths this turn keyed by the faction that lost the unit.
    pub deaths_by_faction: BTreeMap<Faction, u32>,
}

impl TurnReport {
    /// Record a death.
    pub fn record_death(&mut self, id: UnitId, faction: Faction) {
        self.deaths.push((id, faction));
        *self.deaths_by_faction.entry(faction).or_insert(0) += 1;
    }

    /// Non-player units killed this turn.
    #[must_use]
    pub fn kills(&self) -> u32 {
        self.deaths_by_faction
            .iter()
            .filter(|(faction, _)| **faction != Faction::Player)
            .map(|(_, n)| n)
            .sum()
    }
}

/// Why a mission was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossReason {
    /// Every squad member is dead.
    SquadWiped,
    /// The air ran out.
    OxygenDepleted,
}

impl std::fmt::Display for LossReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SquadWiped => f.write_str("squad wiped out"),
            Self::OxygenDepleted => f.write_str("oxygen depleted"),
        }
    }
}

/// Verdict of a hook for the turn it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissionStatus {
    /// Keep playing.
    #[default]
    Ongoing,
    /// Objective done and the squad is out.
    Complete,
    /// Lost. Reported after the clock advances.
    Failed(LossReason),
}

/// Per-turn callback after cleanup.
pub trait TurnHook {
    /// Inspect the closed turn. May append log events.
    fn on_turn_end(&mut self, report: &TurnReport, units: &UnitStorage, log: &mut CombatLog) -> MissionStatus;
}

impl TurnHook for () {
    fn on_turn_end(&mut self, _: &TurnReport, _: &UnitStorage, _: &mut CombatLog) -> MissionStatus {
        MissionStatus::Ongoing
    }
}

/// What the squad was sent to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    /// Kill this many hostiles, then extract.
    Exterminate {
        /// Kills required.
        kills: u32,
    },
    /// Secure the artifact, then extract.
    Retrieve,
    /// Kill one unit, then extract.
    Assassinate {
        /// The high-value target.
        target: UnitId,
    },
}

/// Mission stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissionPhase {
    /// Working on the objective.
    #[default]
    Main,
    /// Objective met. Head for the evac zone.
    Evac,
}

/// Inclusive rectangle of extraction cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvacZone {
    /// Top-left corner.
    pub min: GridPos,
    /// Bottom-right corner.
    pub max: GridPos,
}

impl EvacZone {
    /// Whether a cell lies in the zone.
    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.x >= self.min.x && pos.x <= self.max.x && pos.y >= self.min.y && pos.y <= self.max.y
    }

    /// Zone cell closest to `pos` along each axis.
    #[must_use]
    pub fn nearest_cell(&self, pos: GridPos) -> GridPos {
        GridPos::new(pos.x.clamp(self.min.x, self.max.x), pos.y.clamp(self.min.y, self.max.y))
    }
}

/// Oxygen is tracked in tenths so the per-turn drain is exact.
const OXYGEN_DRAIN_TENTHS: u32 = 1;

/// Objective tracker with optional oxygen supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    objective: Objective,
    phase: MissionPhase,
    evac_zone: EvacZone,
    kill_count: u32,
    artifact_secured: bool,
    oxygen_tenths: Option<u32>,
}

impl Mission {
    /// Start a mission in the main phase.
    #[must_use]
    pub const fn new(objective: Objective, evac_zone: EvacZone) -> Self {
        Self {
            objective,
            phase: MissionPhase::Main,
            evac_zone,
            kill_count: 0,
            artifact_secured: false,
            oxygen_tenths: None,
        }
    }

    /// Give the squad a finite air supply, drained by 0.1 every turn.
    #[must_use]
    pub fn with_oxygen(mut self, supply: Fixed) -> Self {
        let tenths = (supply * 10).round().max(Fixed::ZERO);
        self.oxygen_tenths = Some(tenths.to_num::<u32>());
        self
    }

    /// Current objective.
    #[must_use]
    pub const fn objective(&self) -> Objective {
        self.objective
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> MissionPhase {
        self.phase
    }

    /// Where the squad extracts.
    #[must_use]
    pub const fn evac_zone(&self) -> EvacZone {
        self.evac_zone
    }

    /// Hostiles killed since the mission started.
    #[must_use]
    pub const fn kill_count(&self) -> u32 {
        self.kill_count
    }

    /// Remaining oxygen, if the planet needs it.
    #[must_use]
    pub fn oxygen(&self) -> Option<Fixed> {
        self.oxygen_tenths.map(|t| Fixed::from_num(t) / 10)
    }

    /// Whether the artifact has been picked up.
    #[must_use]
    pub const fn artifact_secured(&self) -> bool {
        self.artifact_secured
    }

    /// Mark the artifact as picked up. A retrieve mission moves to evac on
    /// the next turn end.
    pub fn secure_artifact(&mut self) {
        self.artifact_secured = true;
    }

    /// Whether extraction is allowed.
    #[must_use]
    pub const fn can_evac(&self) -> bool {
        match self.objective {
            Objective::Retrieve => self.artifact_secured && matches!(self.phase, MissionPhase::Evac),
            Objective::Exterminate { .. } | Objective::Assassinate { .. } => matches!(self.phase, MissionPhase::Evac),
        }
    }

    fn objective_met(&self, units: &UnitStorage) -> Option<&'static str> {
        match self.objective {
            Objective::Exterminate { kills } if self.kill_count >= kills => {
                Some("Hostiles cleared! Proceed to extraction.")
            }
            Objective::Retrieve if self.artifact_secured => Some("Artifact secured! Proceed to extraction."),
            Objective::Assassinate { target } => match units.get(target) {
                Some(hvt) if !hvt.is_alive() => Some("High-Value Target eliminated! Proceed to extraction."),
                None => Some("HVT signal lost, presumed eliminated. Proceed to extraction."),
                Some(_) => None,
            },
            _ => None,
        }
    }

    fn squad_in_zone(&self, units: &UnitStorage) -> bool {
        let mut squad = units.iter().filter(|u| u.is_squad_member()).peekable();
        squad.peek().is_some() && squad.all(|u| self.evac_zone.contains(u.pos))
    }
}

impl TurnHook for Mission {
    fn on_turn_end(&mut self, report: &TurnReport, units: &UnitStorage, log: &mut CombatLog) -> MissionStatus {
        self.kill_count += report.kills();

        match self.phase {
            MissionPhase::Evac => {
                if self.can_evac() && self.squad_in_zone(units) {
                    log.push(report.turn, CombatEvent::info(None, "Mission Complete! Extracting squad."));
                    tracing::info!(turn = report.turn, kills = self.kill_count, "Mission complete");
                    return MissionStatus::Complete;
                }
            }
            MissionPhase::Main => {
                if let Some(notice) = self.objective_met(units) {
                    self.phase = MissionPhase::Evac;
                    log.push(report.turn, CombatEvent::info(None, notice));
                    tracing::info!(turn = report.turn, objective = ?self.objective, "Objective met");
                }
            }
        }

        if let Some(tenths) = self.oxygen_tenths.as_mut() {
            *tenths = tenths.saturating_sub(OXYGEN_DRAIN_TENTHS);
            if *tenths == 0 {
                return MissionStatus::Failed(LossReason::OxygenDepleted);
            }
        }
        MissionStatus::Ongoing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AiArchetype, Mob, MobStats};
    use crate::unit::Unit;

    fn zone() -> EvacZone {
        EvacZone {
            min: GridPos::new(0, 0),
            max: GridPos::new(2, 2),
        }
    }

    fn trooper(pos: GridPos) -> Unit {
        Unit::combatant("t", pos, Faction::Player, Mob::new(AiArchetype::Player, MobStats::default()))
    }

    fn report(turn: u64, enemy_deaths: u32) -> TurnReport {
        let mut report = TurnReport {
            turn,
            ..TurnReport::default()
        };
        for i in 0..enemy_deaths {
            report.record_death(100 + i, Faction::Enemy);
        }
        report
    }

    #[test]
    fn test_exterminate_then_evac() {
        let mut units = UnitStorage::new();
        units.insert(trooper(GridPos::new(5, 5)));
        let mut log = CombatLog::new();
        let mut mission = Mission::new(Objective::Exterminate { kills: 2 }, zone());

        assert_eq!(mission.on_turn_end(&report(0, 1), &units, &mut log), MissionStatus::Ongoing);
        assert_eq!(mission.phase(), MissionPhase::Main);
        mission.on_turn_end(&report(1, 1), &units, &mut log);
        assert_eq!(mission.phase(), MissionPhase::Evac);
        assert_eq!(mission.kill_count(), 2);

        assert_eq!(mission.on_turn_end(&report(2, 0), &units, &mut log), MissionStatus::Ongoing);
        for unit in units.iter_mut() {
            unit.pos = GridPos::new(1, 1);
        }
        assert_eq!(mission.on_turn_end(&report(3, 0), &units, &mut log), MissionStatus::Complete);
    }

    #[test]
    fn test_nearest_evac_cell_clamps_into_zone() {
        assert_eq!(zone().nearest_cell(GridPos::new(9, 1)), GridPos::new(2, 1));
        assert_eq!(zone().nearest_cell(GridPos::new(-3, 7)), GridPos::new(0, 2));
        assert_eq!(zone().nearest_cell(GridPos::new(1, 1)), GridPos::new(1, 1));
    }

    #[test]
    fn test_player_deaths_are_not_kills() {
        let mut r = report(0, 0);
        r.record_death(1, Faction::Player);
        r.record_death(2, Faction::Enemy);
        assert_eq!(r.kills(), 1);
        assert_eq!(r.deaths_by_faction.get(&Faction::Player), Some(&1));
    }

    #[test]
    fn test_assassinate_missing_target_counts() {
        let units = UnitStorage::new();
        let mut log = CombatLog::new();
        let mut mission = Mission::new(Objective::Assassinate { target: 42 }, zone());
        mission.on_turn_end(&report(0, 0), &units, &mut log);
        assert_eq!(mission.phase(), MissionPhase::Evac);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_retrieve_requires_artifact() {
        let units = UnitStorage::new();
        let mut log = CombatLog::new();
        let mut mission = Mission::new(Objective::Retrieve, zone());
        mission.on_turn_end(&report(0, 3), &units, &mut log);
        assert_eq!(mission.phase(), MissionPhase::Main);
        mission.secure_artifact();
        mission.on_turn_end(&report(1, 0), &units, &mut log);
        assert!(mission.can_evac());
    }

    #[test]
    fn test_oxygen_drains_to_failure() {
        let units = UnitStorage::new();
        let mut log = CombatLog::new();
        let mut mission =
            Mission::new(Objective::Exterminate { kills: 99 }, zone()).with_oxygen(Fixed::from_num(0.3));
        assert_eq!(mission.on_turn_end(&report(0, 0), &units, &mut log), MissionStatus::Ongoing);
        assert_eq!(mission.on_turn_end(&report(1, 0), &units, &mut log), MissionStatus::Ongoing);
        assert_eq!(
            mission.on_turn_end(&report(2, 0), &units, &mut log),
            MissionStatus::Failed(LossReason::OxygenDepleted)
        );
        assert_eq!(mission.oxygen(), Some(Fixed::ZERO));
    }

    #[test]
    fn test_unit_hook_is_inert() {
        let units = UnitStorage::new();
        let mut log = CombatLog::new();
        assert_eq!(().on_turn_end(&report(0, 5), &units, &mut log), MissionStatus::Ongoing);
        assert!(log.is_empty());
    }
}
