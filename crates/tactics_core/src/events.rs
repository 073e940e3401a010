//! Structured combat log.
//!
//! The core never formats text for the player. It appends typed events with
//! unit ids and amounts; a front end turns them into narration.

use serde::{Deserialize, Serialize};

use crate::items::{Item, WeaponClass};
use crate::unit::UnitId;

/// Coarse category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    /// Health was lost.
    Damage,
    /// An attack missed.
    Miss,
    /// An attack connected but defence absorbed it.
    Block,
    /// A non-attack action such as a reload.
    Action,
    /// A unit died.
    Death,
    /// Status changes and mission notices.
    Info,
}

/// Weapon details carried by events so narration does not need the unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponTag {
    /// Item name.
    pub name: String,
    /// Weapon family.
    pub class: WeaponClass,
}

impl From<&Item> for WeaponTag {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            class: item.class,
        }
    }
}

/// Non-attack actions worth narrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Magazine refilled (or an empty attempt on a weapon that cannot reload).
    Reloads,
    /// A shot was fired under direct control.
    Fires,
}

impl ActionKind {
    /// Verb for narration.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Reloads => "reloads",
            Self::Fires => "fires",
        }
    }
}

/// Events generated by combat and the turn loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatEvent {
    /// Damage was dealt to a target.
    Damage {
        /// Attacker. `None` for ownerless blasts.
        source: Option<UnitId>,
        /// Unit that lost health.
        target: UnitId,
        /// Health lost.
        amount: i32,
        /// Weapon used, if any.
        weapon: Option<WeaponTag>,
    },
    /// An attack missed.
    Miss {
        /// Attacker.
        source: Option<UnitId>,
        /// Intended victim.
        target: UnitId,
    },
    /// Defence absorbed the whole hit.
    Block {
        /// Attacker.
        source: Option<UnitId>,
        /// Defender.
        target: UnitId,
    },
    /// A non-attack action.
    Action {
        /// Acting unit.
        source: UnitId,
        /// What it did.
        action: ActionKind,
        /// Weapon involved.
        weapon: Option<WeaponTag>,
    },
    /// A unit died.
    Death {
        /// The dead unit.
        unit: UnitId,
    },
    /// Free-form notice.
    Info {
        /// Unit the notice is about, if any.
        subject: Option<UnitId>,
        /// Plain text.
        message: String,
    },
}

impl CombatEvent {
    /// Category of the event.
    #[must_use]
    pub const fn kind(&self) -> LogKind {
        match self {
            Self::Damage { .. } => LogKind::Damage,
            Self::Miss { .. } => LogKind::Miss,
            Self::Block { .. } => LogKind::Block,
            Self::Action { .. } => LogKind::Action,
            Self::Death { .. } => LogKind::Death,
            Self::Info { .. } => LogKind::Info,
        }
    }

    /// Shorthand for an info event.
    #[must_use]
    pub fn info(subject: Option<UnitId>, message: impl Into<String>) -> Self {
        Self::Info {
            subject,
            message: message.into(),
        }
    }
}

/// A combat event stamped with the turn it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEvent {
    /// Clock value when the event was recorded.
    pub turn: u64,
    /// What happened.
    pub event: CombatEvent,
}

/// Append-only event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombatLog {
    entries: Vec<LogEvent>,
}

impl CombatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, turn: u64, event: CombatEvent) {
        tracing::debug!(turn, kind = ?event.kind(), "Combat event");
        self.entries.push(LogEvent { turn, event });
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEvent] {
        &self.entries
    }

    /// Entries recorded at or after `cursor` (an earlier [`CombatLog::len`]).
    #[must_use]
    pub fn since(&self, cursor: usize) -> &[LogEvent] {
        self.entries.get(cursor..).unwrap_or(&[])
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries of one kind.
    #[must_use]
    pub fn count(&self, kind: LogKind) -> usize {
        self.entries.iter().filter(|e| e.event.kind() == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_append_only_and_ordered() {
        let mut log = CombatLog::new();
        log.push(0, CombatEvent::Miss { source: Some(1), target: 2 });
        log.push(1, CombatEvent::Death { unit: 2 });
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].turn, 0);
        assert_eq!(log.entries()[1].event.kind(), LogKind::Death);
    }

    #[test]
    fn test_since_cursor() {
        let mut log = CombatLog::new();
        log.push(0, CombatEvent::info(None, "start"));
        let cursor = log.len();
        log.push(0, CombatEvent::Block { source: Some(1), target: 2 });
        assert_eq!(log.since(cursor).len(), 1);
        assert!(log.since(10).is_empty());
        assert_eq!(log.count(LogKind::Block), 1);
    }
}
