//! Mob template definitions.

use serde::{Deserialize, Serialize};

use crate::components::{AiArchetype, MobStats};

/// Data-driven creature or soldier definition.
///
/// # Example RON
///
/// ```ron
/// MobTemplate(
///     name: "Carapace Stalker",
///     archetype: MeleeAggressive,
///     stats: (health: 60, attack: 18, defence: 2, speed: 1.5),
///     equipment: ["chitin_claws"],
///     death_message: Some("The stalker's shell cracks open."),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobTemplate {
    /// Display name given to spawned units.
    pub name: String,
    /// Decision policy for non-player spawns.
    #[serde(default)]
    pub archetype: AiArchetype,
    /// Stat overrides. Missing fields keep their defaults.
    #[serde(default)]
    pub stats: MobStats,
    /// Item ids equipped on spawn, in order.
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Custom death line for narration.
    #[serde(default)]
    pub death_message: Option<String>,
    /// Flavour text.
    #[serde(default)]
    pub description: String,
}

impl MobTemplate {
    /// A template with default stats and no equipment.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            archetype: AiArchetype::Basic,
            stats: MobStats::default(),
            equipment: Vec::new(),
            death_message: None,
            description: String::new(),
        }
    }
}
