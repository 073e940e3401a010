//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a seeded simulation replays
//! identically from the same commands.
//!
//! # Testing Strategy
//!
//! Replays, bug reports and batch balance runs all rely on a seed plus a
//! command list reproducing a mission exactly. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: Scheduling, distances and hit chances use
//!   [`tactics_core::math::Fixed`]. Damage spread samples a normal
//!   distribution in `f64`, so cross-platform replays are only as stable
//!   as the platform's `ln`/`sqrt`.
//!
//! - **HashMap iteration order**: Units are stored in a `BTreeMap` and
//!   always visited in sorted id order.
//!
//! - **System randomness**: Every roll draws from the simulation's own
//!   seeded RNG.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual rules (melee, accuracy, scheduling)
//! 2. **Property tests**: Random boards still replay identically
//! 3. **Integration tests**: Full skirmishes are reproducible
//! 4. **Parallel tests**: Simulations on separate threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tactics_core::simulation::{PlayerCommand, Simulation, TurnOutcome};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns simulated.
    pub turns: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of turns each simulation ran.
    pub turns: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Turns: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `turns` - Number of steps per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance the simulation by one step
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    turns: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            for _ in 0..turns {
                step(&mut state);
            }
            hash(&state)
        })
        .collect();

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    }
}

/// Run one full turn with no mission hook, landing any projectiles first.
///
/// The selected unit is left to recharge; everyone else follows their
/// policy.
pub fn advance_turn(sim: &mut Simulation) -> TurnOutcome {
    let outcome = sim.process_turn(&mut ());
    if outcome == TurnOutcome::Deferred {
        return sim.settle(&mut ()).unwrap_or(outcome);
    }
    outcome
}

/// Verify a simulation replays identically for `num_turns` turns.
///
/// # Example
///
/// ```
/// use tactics_test_utils::determinism::verify_simulation_determinism;
/// use tactics_test_utils::fixtures::skirmish;
///
/// assert!(verify_simulation_determinism(|| skirmish(42), 30));
/// ```
pub fn verify_simulation_determinism<F>(setup_fn: F, num_turns: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_turns,
        &setup_fn,
        |sim| {
            advance_turn(sim);
        },
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Replay the same command list against fresh simulations.
///
/// Rejected commands are skipped the same way on every run, so they take
/// part in the comparison too. Projectiles are landed after each command.
pub fn verify_command_replay<F>(setup_fn: F, commands: &[PlayerCommand], runs: usize) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut sim = setup_fn();
            for &command in commands {
                if sim.finished().is_some() {
                    break;
                }
                if let Err(err) = sim.command(command, &mut ()) {
                    tracing::trace!(?command, %err, "Replay command rejected");
                }
                sim.settle(&mut ());
            }
            sim.state_hash()
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        turns: commands.len() as u64,
    }
}

/// Run N simulations on separate threads and collect final hashes.
///
/// Catches state that leaks between simulations, such as statics or a
/// shared RNG.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_turns: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_turns {
                        advance_turn(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    ParallelSimResult {
        hashes,
        turns: num_turns,
        num_sims,
    }
}

/// Compare two simulation runs turn-by-turn, finding first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(turn)` for the first turn whose hash
/// differs (0 for the initial state).
pub fn find_first_divergence<F>(setup_fn: F, num_turns: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for turn in 1..=num_turns {
        advance_turn(&mut sim1);
        advance_turn(&mut sim2);

        if sim1.state_hash() != sim2.state_hash() {
            return Some(turn);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation testing.
///
/// These strategies generate random but reproducible boards and command
/// lists for property-based tests.
pub mod strategies {
    use proptest::prelude::*;
    use tactics_core::math::{Fixed, GridPos};
    use tactics_core::simulation::PlayerCommand;
    use tactics_core::terrain::{CellType, TileMap};

    /// A cell inside a `width` x `height` map.
    pub fn arb_grid_pos(width: i32, height: i32) -> impl Strategy<Value = GridPos> {
        (0..width, 0..height).prop_map(|(x, y)| GridPos::new(x, y))
    }

    /// A map with up to `max_walls` random walls.
    pub fn arb_tile_map(width: u32, height: u32, max_walls: usize) -> impl Strategy<Value = TileMap> {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        proptest::collection::vec(arb_grid_pos(w, h), 0..max_walls).prop_map(move |walls| {
            let mut map = TileMap::new(width, height);
            for cell in walls {
                map.set(cell, CellType::Wall);
            }
            map
        })
    }

    /// Unit speed from 0.5 to 4 in half steps.
    pub fn arb_pace() -> impl Strategy<Value = Fixed> {
        (1i32..=8).prop_map(|halves| Fixed::from_num(halves) / 2)
    }

    /// Health values (1-200).
    pub fn arb_health() -> impl Strategy<Value = i32> {
        1i32..=200
    }

    /// Damage values (0-100).
    pub fn arb_damage() -> impl Strategy<Value = i32> {
        0i32..=100
    }

    /// Armour values (0-30).
    pub fn arb_defence() -> impl Strategy<Value = i32> {
        0i32..=30
    }

    /// A single-cell step in any of the eight directions.
    pub fn arb_step() -> impl Strategy<Value = PlayerCommand> {
        (-1i32..=1, -1i32..=1)
            .prop_filter("step needs a direction", |&(dx, dy)| dx != 0 || dy != 0)
            .prop_map(|(dx, dy)| PlayerCommand::Step { dx, dy })
    }

    /// Any player command aimed within a `width` x `height` map.
    pub fn arb_player_command(width: i32, height: i32) -> impl Strategy<Value = PlayerCommand> {
        prop_oneof![
            4 => arb_step(),
            2 => arb_grid_pos(width, height).prop_map(PlayerCommand::FireAt),
            1 => Just(PlayerCommand::Reload),
            2 => Just(PlayerCommand::Wait),
            1 => Just(PlayerCommand::ToggleStance),
            1 => Just(PlayerCommand::ToggleAutofire),
            1 => Just(PlayerCommand::SelectNext),
        ]
    }

    /// A sequence of commands.
    pub fn arb_command_sequence(width: i32, height: i32, max_len: usize) -> impl Strategy<Value = Vec<PlayerCommand>> {
        proptest::collection::vec(arb_player_command(width, height), 0..max_len)
    }
}
