//! # Tactics Core
//!
//! Deterministic combat core for a turn-based squad tactics game.
//!
//! This crate contains **only** game logic:
//! - No rendering
//! - No IO
//! - No system randomness (one seeded RNG per simulation)
//! - Fixed-point math for scheduling, distances and hit chances
//!
//! This separation enables:
//! - Headless runs and batch balance testing
//! - Replays from a seed and a command list
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`simulation`] - The simulation context and turn loop
//! - [`scheduler`] - Speed-based action timing
//! - [`ai`] - Decision policies per archetype
//! - [`combat`] - Melee rolls, damage sampling, accuracy
//! - [`projectile`] - Shots in flight
//! - [`targeting`] / [`pathfinding`] / [`movement`] - Board queries
//! - [`mission`] - Objectives and the per-turn hook
//! - [`data`] - RON templates and the template registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod combat;
pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod factions;
pub mod items;
pub mod math;
pub mod mission;
pub mod movement;
pub mod pathfinding;
pub mod projectile;
pub mod scheduler;
pub mod simulation;
pub mod targeting;
pub mod terrain;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{Action, AiContext, Heading, Pace};
    pub use crate::combat::CombatRules;
    pub use crate::components::*;
    pub use crate::data::{MobTemplate, TemplateRegistry};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{ActionKind, CombatEvent, CombatLog, LogEvent, LogKind, WeaponTag};
    pub use crate::factions::Faction;
    pub use crate::items::{Item, ItemStats, OnHitEffect, WeaponClass};
    pub use crate::math::{Fixed, GridPos};
    pub use crate::mission::{
        EvacZone, LossReason, Mission, MissionPhase, MissionStatus, Objective, TurnHook, TurnReport,
    };
    pub use crate::projectile::Projectile;
    pub use crate::simulation::{PlayerCommand, Simulation, TurnOutcome, UnitSnapshot};
    pub use crate::terrain::{CellType, Terrain, TileMap};
    pub use crate::unit::{Unit, UnitId, UnitStorage};
}
