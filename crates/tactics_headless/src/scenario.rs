//! Scenario loading and deployment.
//!
//! A scenario is a RON file naming a map, the mobs on it and the mission.
//! Mob ids resolve through a [`TemplateRegistry`] so the same scenario runs
//! against any content set.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tactics_core::prelude::*;
use std::result::Result;

const ITEMS_RON: &str = include_str!("../../../assets/data/items.ron");
const MOBS_RON: &str = include_str!("../../../assets/data/mobs.ron");

/// Scenarios shipped with the runner, addressable by name.
const BUILTIN_SCENARIOS: &[(&str, &str)] = &[
    ("derelict", include_str!("../../../assets/scenarios/derelict.ron")),
    ("hive", include_str!("../../../assets/scenarios/hive.ron")),
    ("outpost", include_str!("../../../assets/scenarios/outpost.ron")),
];

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The core rejected the setup (bad map, unknown template, off-map spawn).
    #[error("Failed to deploy scenario: {0}")]
    Game(#[from] GameError),
    /// The scenario parsed but does not describe a playable mission.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// A mob placed on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Mob template id.
    pub mob: String,
    /// Cell as (column, row).
    pub at: (i32, i32),
    /// Overrides the template's display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Placement {
    /// Placement with the template's own name.
    #[must_use]
    pub fn new(mob: &str, x: i32, y: i32) -> Self {
        Self {
            mob: mob.to_string(),
            at: (x, y),
            name: None,
        }
    }

    fn pos(&self) -> GridPos {
        GridPos::new(self.at.0, self.at.1)
    }
}

/// A piece of scenery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropPlacement {
    /// Display name.
    pub name: String,
    /// Cell as (column, row).
    pub at: (i32, i32),
    /// Whether units can walk over it.
    #[serde(default)]
    pub passable: bool,
}

/// Mission objective as written in scenario files.
///
/// Unit ids do not exist until deployment, so the assassination target is
/// an index into the enemy list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSetup {
    /// Kill this many hostiles.
    Exterminate {
        /// Kills required.
        kills: u32,
    },
    /// Carry the artifact off the given cell.
    Retrieve {
        /// Where the artifact lies.
        artifact: (i32, i32),
    },
    /// Kill one enemy.
    Assassinate {
        /// Index into [`Scenario::enemies`].
        enemy: usize,
    },
}

fn default_max_turns() -> u64 {
    300
}

fn default_sight_radius() -> f64 {
    10.0
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Map rows: `#` wall, `=` glass, `.` floor.
    pub map: Vec<String>,
    /// Player units. The first one starts selected.
    pub squad: Vec<Placement>,
    /// Hostile units.
    #[serde(default)]
    pub enemies: Vec<Placement>,
    /// Non-combatants.
    #[serde(default)]
    pub neutrals: Vec<Placement>,
    /// Scenery.
    #[serde(default)]
    pub props: Vec<PropPlacement>,
    /// What the squad must do.
    pub objective: ObjectiveSetup,
    /// Extraction rectangle, corners inclusive.
    pub evac: ((i32, i32), (i32, i32)),
    /// Air supply in turns, for planets without atmosphere.
    #[serde(default)]
    pub oxygen: Option<f64>,
    /// Turn limit for headless runs.
    #[serde(default = "default_max_turns")]
    pub max_turns: u64,
    /// Radius of the squad's visibility pass.
    #[serde(default = "default_sight_radius")]
    pub sight_radius: f64,
    /// Combat constants.
    #[serde(default)]
    pub rules: CombatRules,
}

/// A scenario turned into live state.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// The simulation, units spawned.
    pub sim: Simulation,
    /// Mission tracker to pass as the turn hook.
    pub mission: Mission,
    /// Artifact cell for retrieve missions.
    pub artifact: Option<GridPos>,
    /// Turn limit.
    pub max_turns: u64,
    /// Visibility radius.
    pub sight_radius: Fixed,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// A built-in scenario by name, or a RON file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match builtin_source(name_or_path) {
            Some(source) => Self::from_ron_str(source),
            None => Self::load(name_or_path),
        }
    }

    /// Spawn everything and build the mission.
    pub fn deploy(&self, registry: &TemplateRegistry, seed: u64) -> Result<Deployment, ScenarioError> {
        if self.squad.is_empty() {
            return Err(ScenarioError::Invalid(format!("'{}' has no squad", self.name)));
        }
        let map = TileMap::from_rows(&self.map)?;
        let mut sim = Simulation::new(map, seed).with_rules(self.rules.clone());

        for placement in &self.squad {
            place(&mut sim, registry, placement, Faction::Player)?;
        }
        let mut enemies = Vec::with_capacity(self.enemies.len());
        for placement in &self.enemies {
            enemies.push(place(&mut sim, registry, placement, Faction::Enemy)?);
        }
        for placement in &self.neutrals {
            place(&mut sim, registry, placement, Faction::Neutral)?;
        }
        for prop in &self.props {
            let pos = GridPos::new(prop.at.0, prop.at.1);
            if !sim.map().in_bounds(pos) {
                return Err(GameError::OutOfBounds { x: pos.x, y: pos.y }.into());
            }
            sim.spawn(Unit::prop(prop.name.clone(), pos, prop.passable));
        }

        let (objective, artifact) = match self.objective {
            ObjectiveSetup::Exterminate { kills } => (Objective::Exterminate { kills }, None),
            ObjectiveSetup::Retrieve { artifact } => {
                let pos = GridPos::new(artifact.0, artifact.1);
                if !sim.map().is_passable(pos) {
                    return Err(ScenarioError::Invalid(format!("artifact at {pos} is not on open floor")));
                }
                (Objective::Retrieve, Some(pos))
            }
            ObjectiveSetup::Assassinate { enemy } => {
                let target = enemies.get(enemy).copied().ok_or_else(|| {
                    ScenarioError::Invalid(format!("assassination target #{enemy} is not in the enemy list"))
                })?;
                (Objective::Assassinate { target }, None)
            }
        };

        let ((x0, y0), (x1, y1)) = self.evac;
        let zone = EvacZone {
            min: GridPos::new(x0.min(x1), y0.min(y1)),
            max: GridPos::new(x0.max(x1), y0.max(y1)),
        };
        let mut mission = Mission::new(objective, zone);
        if let Some(supply) = self.oxygen {
            let supply = Fixed::checked_from_num(supply)
                .ok_or_else(|| ScenarioError::Invalid(format!("oxygen supply {supply} is out of range")))?;
            mission = mission.with_oxygen(supply);
        }
        let sight_radius = Fixed::checked_from_num(self.sight_radius)
            .ok_or_else(|| ScenarioError::Invalid(format!("sight radius {} is out of range", self.sight_radius)))?;

        tracing::info!(
            scenario = %self.name,
            seed,
            squad = self.squad.len(),
            enemies = self.enemies.len(),
            objective = ?objective,
            "Scenario deployed"
        );

        Ok(Deployment {
            sim,
            mission,
            artifact,
            max_turns: self.max_turns,
            sight_radius,
        })
    }
}

fn place(
    sim: &mut Simulation,
    registry: &TemplateRegistry,
    placement: &Placement,
    faction: Faction,
) -> Result<UnitId, ScenarioError> {
    let id = sim.spawn_template(registry, &placement.mob, placement.pos(), faction)?;
    if let (Some(name), Some(unit)) = (&placement.name, sim.unit_mut(id)) {
        unit.name.clone_from(name);
    }
    Ok(id)
}

fn builtin_source(name: &str) -> Option<&'static str> {
    BUILTIN_SCENARIOS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, source)| *source)
}

/// Names of the scenarios compiled into the runner.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SCENARIOS.iter().map(|(name, _)| *name)
}

/// Item and mob catalogs compiled into the runner.
pub fn builtin_registry() -> Result<TemplateRegistry, ScenarioError> {
    Ok(TemplateRegistry::from_ron(ITEMS_RON, MOBS_RON)?)
}

/// Catalogs from `dir/items.ron` and `dir/mobs.ron`, or the built-in set.
pub fn load_registry(dir: Option<&Path>) -> Result<TemplateRegistry, ScenarioError> {
    let Some(dir) = dir else {
        return builtin_registry();
    };
    let read = |file: &str| -> Result<String, ScenarioError> {
        let path = dir.join(file);
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    };
    let registry = TemplateRegistry::from_ron(&read("items.ron")?, &read("mobs.ron")?)?;
    tracing::info!(dir = %dir.display(), "Loaded content catalogs");
    Ok(registry)
}
