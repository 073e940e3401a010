//! Attack arithmetic: melee rolls, damage sampling, accuracy falloff.
//!
//! Everything here is a pure function of its inputs and the RNG handed in.
//! Applying the result to units (and emitting log events) is the
//! simulation's job.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, Fixed};
use crate::unit::Unit;

/// Tunable combat constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatRules {
    /// Chance that a melee attack with positive net damage connects.
    #[serde(with = "decimal_serde")]
    pub melee_hit_chance: Fixed,
    /// Furthest distance at which melee is allowed.
    #[serde(with = "decimal_serde")]
    pub melee_reach: Fixed,
    /// Chance that a projectile strikes a unit it passes over.
    #[serde(with = "decimal_serde")]
    pub intervening_hit_chance: Fixed,
    /// Accuracy lost at full weapon range.
    #[serde(with = "decimal_serde")]
    pub range_falloff: Fixed,
    /// Standard deviation of sampled damage, as a fraction of the mean.
    #[serde(with = "decimal_serde")]
    pub damage_spread: Fixed,
    /// Sampled damage is clamped to the mean plus or minus this fraction.
    #[serde(with = "decimal_serde")]
    pub damage_clamp: Fixed,
    /// Steps after which a projectile is destroyed regardless of state.
    pub projectile_step_cap: u32,
    /// Health fraction below which a unit may break and run.
    #[serde(with = "decimal_serde")]
    pub retreat_health_fraction: Fixed,
    /// Morale below which a wounded unit breaks.
    pub retreat_morale: i32,
    /// How far a retreating unit looks for threats.
    #[serde(with = "decimal_serde")]
    pub retreat_scan_range: Fixed,
    /// Fraction of weapon range a ranged unit tries to keep.
    #[serde(with = "decimal_serde")]
    pub optimal_range_fraction: Fixed,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            melee_hit_chance: Fixed::from_num(0.8),
            melee_reach: Fixed::from_num(1.5),
            intervening_hit_chance: Fixed::from_num(0.15),
            range_falloff: Fixed::from_num(0.25),
            damage_spread: Fixed::from_num(0.07),
            damage_clamp: Fixed::from_num(0.1),
            projectile_step_cap: 30,
            retreat_health_fraction: Fixed::from_num(0.25),
            retreat_morale: 150,
            retreat_scan_range: Fixed::from_num(10),
            optimal_range_fraction: Fixed::from_num(0.75),
        }
    }
}

/// Result of a melee resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeleeOutcome {
    /// Connected for this much damage.
    Hit(i32),
    /// Swung and missed.
    Miss,
    /// Defence absorbed everything.
    Block,
}

/// Draw a uniform value in `[0, 1)` with 32 fractional bits.
pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Fixed {
    Fixed::from_bits(i64::from(rng.gen::<u32>()))
}

/// True with probability `chance`.
pub fn roll_below<R: Rng + ?Sized>(rng: &mut R, chance: Fixed) -> bool {
    roll(rng) < chance
}

/// Damage left after defence, never negative.
#[must_use]
pub const fn reduce_by_defence(damage: i32, defence: i32) -> i32 {
    let net = damage - defence;
    if net > 0 {
        net
    } else {
        0
    }
}

/// Net melee damage before the hit roll.
///
/// Uses the melee weapon's attack when it is positive, otherwise the
/// attacker's own. Returns `None` when either side has no mob.
#[must_use]
pub fn melee_net_damage(attacker: &Unit, defender: &Unit) -> Option<i32> {
    let attack = attacker.mob.as_ref()?.melee_attack();
    let defence = defender.mob.as_ref()?.stats.defence;
    Some(reduce_by_defence(attack, defence))
}

/// Whether a melee attack is allowed at all.
#[must_use]
pub fn can_melee(attacker: &Unit, defender: &Unit, rules: &CombatRules) -> bool {
    attacker.is_alive()
        && defender.is_alive()
        && attacker.faction.is_hostile_to(defender.faction)
        && attacker.pos.within(defender.pos, rules.melee_reach)
}

/// Roll a melee attack between two units.
///
/// Returns `None` when the preconditions fail (out of reach, not hostile,
/// dead, or a prop). No randomness is consumed for blocks.
pub fn resolve_melee<R: Rng + ?Sized>(
    attacker: &Unit,
    defender: &Unit,
    rules: &CombatRules,
    rng: &mut R,
) -> Option<MeleeOutcome> {
    if !can_melee(attacker, defender, rules) {
        return None;
    }
    let net = melee_net_damage(attacker, defender)?;
    if net == 0 {
        return Some(MeleeOutcome::Block);
    }
    if roll_below(rng, rules.melee_hit_chance) {
        Some(MeleeOutcome::Hit(net))
    } else {
        Some(MeleeOutcome::Miss)
    }
}

/// Sample projectile damage around a weapon's attack.
///
/// Drawn once per shot from Normal(attack, spread * attack), rounded,
/// clamped to attack +/- clamp, and never below 1.
pub fn sample_damage<R: Rng + ?Sized>(attack: i32, rules: &CombatRules, rng: &mut R) -> i32 {
    let mean = f64::from(attack);
    let spread = rules.damage_spread.to_num::<f64>() * mean;
    let drawn = match Normal::new(mean, spread) {
        Ok(normal) => normal.sample(rng).round(),
        Err(_) => mean,
    };

    let clamp = rules.damage_clamp.to_num::<f64>();
    let low = mean * (1.0 - clamp);
    let high = mean * (1.0 + clamp);
    let bounded = if low <= high { drawn.clamp(low, high) } else { drawn };

    (bounded.round() as i32).max(1)
}

/// Hit chance after range falloff.
///
/// `base * (1 - falloff * min(path_len / range, 1))`: a shot at point blank
/// keeps its base accuracy, a shot at full range loses `falloff` of it.
#[must_use]
pub fn accuracy_at(base: Fixed, path_len: usize, range: Fixed, rules: &CombatRules) -> Fixed {
    let ratio = if range > Fixed::ZERO {
        (Fixed::from_num(path_len) / range).min(Fixed::ONE)
    } else {
        Fixed::ONE
    };
    base * (Fixed::ONE - rules.range_falloff * ratio)
}
