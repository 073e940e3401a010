//! Combat log narration.
//!
//! The core records structured [`LogEvent`]s; this module turns them into
//! the one-line messages a player reads. Units are swept from the
//! simulation on the turn they die, so names are cached in a [`Roster`]
//! that outlives them.

use std::collections::BTreeMap;

use tactics_core::prelude::*;

/// What narration needs to remember about a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Display name.
    pub name: String,
    /// Side.
    pub faction: Faction,
    /// Custom death line.
    pub death_message: Option<String>,
}

/// Names and sides of every unit seen so far, including the dead.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: BTreeMap<UnitId, RosterEntry>,
}

impl Roster {
    /// Record every unit currently in the simulation.
    pub fn observe(&mut self, sim: &Simulation) {
        for unit in sim.units().iter().filter(|u| u.mob.is_some()) {
            self.entries.insert(
                unit.id,
                RosterEntry {
                    name: unit.name.clone(),
                    faction: unit.faction,
                    death_message: unit.mob.as_ref().and_then(|m| m.death_message.clone()),
                },
            );
        }
    }

    /// Cached entry.
    pub fn get(&self, id: UnitId) -> Option<&RosterEntry> {
        self.entries.get(&id)
    }

    /// Side of a unit, if it was ever seen.
    pub fn faction(&self, id: UnitId) -> Option<Faction> {
        self.get(id).map(|e| e.faction)
    }
}

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const ORANGE: &str = "\x1b[38;5;214m";
    pub const SQUAD: &str = "\x1b[38;5;34m";
    pub const GRAY: &str = "\x1b[90m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const YELLOW: &str = "\x1b[33m";
}

/// Renders log events as text, remembering how far it has read.
#[derive(Debug, Clone, Default)]
pub struct Narrator {
    roster: Roster,
    cursor: usize,
    color: bool,
}

impl Narrator {
    /// Plain-text narrator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap symbols and names in ANSI colours.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Cached unit names.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Refresh the roster. Call before every turn so units that die during
    /// it can still be named.
    pub fn observe(&mut self, sim: &Simulation) {
        self.roster.observe(sim);
    }

    /// Lines for every event logged since the previous call.
    pub fn drain(&mut self, sim: &Simulation) -> Vec<String> {
        self.roster.observe(sim);
        let lines = sim.log().since(self.cursor).iter().map(|e| self.line(e)).collect();
        self.cursor = sim.log().len();
        lines
    }

    /// One narrated line.
    #[must_use]
    pub fn line(&self, entry: &LogEvent) -> String {
        let body = match &entry.event {
            CombatEvent::Damage {
                source,
                target,
                amount,
                weapon,
            } => {
                let verb = weapon.as_ref().map_or("hits", |w| w.class.damage_verb());
                let who = self.source_name(*source);
                let hp = self.paint(colors::RED, &format!("{amount} HP"));
                if self.roster.faction(*target) == Some(Faction::Player) {
                    format!("{} {who} {verb} {} for {hp}!", self.paint(colors::RED, "▼"), self.name(*target))
                } else {
                    format!("{} {who} {verb} {} for {hp}.", self.paint(colors::GREEN, "※"), self.name(*target))
                }
            }
            CombatEvent::Miss { source, target } => format!(
                "{} {}'s shot misses {}.",
                self.paint(colors::GRAY, "~"),
                self.source_name(*source),
                self.name(*target)
            ),
            CombatEvent::Block { source, target } => format!(
                "{} {} blocks {}'s attack.",
                self.paint(colors::BLUE, "/"),
                self.name(*target),
                self.source_name(*source)
            ),
            CombatEvent::Action { source, action, weapon } => {
                let gear = weapon.as_ref().map(|w| format!(" their {}", w.name)).unwrap_or_default();
                format!("{} {} {}{gear}.", self.paint(colors::CYAN, "⚙"), self.name(*source), action.verb())
            }
            CombatEvent::Death { unit } => {
                let entry = self.roster.get(*unit);
                let skull = if entry.map(|e| e.faction) == Some(Faction::Player) {
                    self.paint(colors::ORANGE, "☠")
                } else {
                    self.paint(colors::RED, "☠")
                };
                match entry.and_then(|e| e.death_message.as_deref()) {
                    Some(message) => format!("{skull} {message}"),
                    None => format!("{skull} {} dies!", self.name(*unit)),
                }
            }
            CombatEvent::Info { message, .. } => format!("{} {message}", self.paint(colors::YELLOW, "»")),
        };
        format!("{}: {body}", entry.turn)
    }

    fn name(&self, id: UnitId) -> String {
        match self.roster.get(id) {
            Some(entry) if self.color => {
                let tint = if entry.faction == Faction::Player {
                    colors::SQUAD
                } else {
                    colors::ORANGE
                };
                format!("{tint}{}{}", entry.name, colors::RESET)
            }
            Some(entry) => entry.name.clone(),
            None => format!("#{id}"),
        }
    }

    fn source_name(&self, source: Option<UnitId>) -> String {
        source.map_or_else(|| "A blast".to_string(), |id| self.name(id))
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{}", colors::RESET)
        } else {
            text.to_string()
        }
    }
}
