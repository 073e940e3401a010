//! Error types for the combat core.
//!
//! Gameplay failures (no path, out of ammo, blocked step) are not errors:
//! they resolve to an idle action or a log event. The variants here cover
//! bad lookups, bad data and commands the simulation cannot accept.

use thiserror::Error;

use crate::unit::UnitId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for the combat core.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid unit reference.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// No unit is currently selected for player control.
    #[error("No unit is selected")]
    NoSelection,

    /// The selected unit has not finished recharging.
    #[error("Unit {id} is recharging until turn {ready_at}")]
    UnitRecharging {
        /// Unit that tried to act.
        id: UnitId,
        /// Fractional turn at which the unit becomes ready.
        ready_at: f64,
    },

    /// The previous turn is still waiting for projectiles to land.
    #[error("Turn {turn} is still resolving")]
    TurnInProgress {
        /// Turn that has not finished.
        turn: u64,
    },

    /// A template key could not be resolved and no fallback exists.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// A position lies outside the map.
    #[error("Position ({x}, {y}) is outside the map")]
    OutOfBounds {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
