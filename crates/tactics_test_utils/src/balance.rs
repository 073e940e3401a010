//! Balance testing utilities for headless skirmishes.
//!
//! Tools for summarising many simulated skirmishes and for quick analytic
//! checks of stat blocks before any simulation runs.

use tactics_core::combat::reduce_by_defence;
use tactics_core::components::MobStats;
use tactics_core::math::Fixed;
use tactics_core::scheduler::action_cost;
use tactics_core::simulation::TurnOutcome;

/// Who came out on top in a skirmish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Victor {
    /// The mission hook reported success.
    Squad,
    /// The squad was lost.
    Enemy,
    /// The turn limit ran out.
    Draw,
}

impl From<Option<TurnOutcome>> for Victor {
    fn from(outcome: Option<TurnOutcome>) -> Self {
        match outcome {
            Some(TurnOutcome::Completed) => Self::Squad,
            Some(TurnOutcome::Lost(_)) => Self::Enemy,
            _ => Self::Draw,
        }
    }
}

/// Statistics for a set of skirmishes.
#[derive(Debug, Clone, Default)]
pub struct SkirmishStats {
    /// Total skirmishes recorded.
    pub total: u32,
    /// Squad victories.
    pub squad_wins: u32,
    /// Squad losses.
    pub enemy_wins: u32,
    /// Skirmishes that hit the turn limit.
    pub draws: u32,
    /// Sum of turns across all skirmishes.
    pub total_turns: u64,
}

impl SkirmishStats {
    /// Add one skirmish.
    pub fn record(&mut self, victor: Victor, turns: u64) {
        self.total += 1;
        self.total_turns += turns;
        match victor {
            Victor::Squad => self.squad_wins += 1,
            Victor::Enemy => self.enemy_wins += 1,
            Victor::Draw => self.draws += 1,
        }
    }

    /// Squad win rate (0.0 to 1.0). An empty set counts as even.
    #[must_use]
    pub fn squad_win_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.5;
        }
        f64::from(self.squad_wins) / f64::from(self.total)
    }

    /// Average skirmish length in turns.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_turns(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.total_turns as f64 / f64::from(self.total)
    }

    /// Check the squad win rate lies within `[min_rate, max_rate]`.
    #[must_use]
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.squad_win_rate();
        rate >= min_rate && rate <= max_rate
    }
}

/// Turns `attacker` needs to kill `defender` in melee if every swing lands.
///
/// Returns `None` when the defender's armour soaks every hit.
#[must_use]
pub fn turns_to_kill(attacker: &MobStats, defender: &MobStats) -> Option<Fixed> {
    let net = reduce_by_defence(attacker.attack, defender.defence);
    if net <= 0 {
        return None;
    }
    let swings = (defender.health.max(0) + net - 1) / net;
    Some(action_cost(attacker.speed) * Fixed::from_num(swings))
}

/// Melee turns-to-kill for every ordered pair of named stat blocks.
///
/// Pairs where neither side can hurt the other are reported as `None`.
#[must_use]
pub fn ttk_matrix<'a>(roster: &[(&'a str, MobStats)]) -> Vec<(&'a str, &'a str, Option<Fixed>)> {
    let mut results = Vec::new();
    for (attacker_name, attacker) in roster {
        for (defender_name, defender) in roster {
            results.push((*attacker_name, *defender_name, turns_to_kill(attacker, defender)));
        }
    }
    results
}
