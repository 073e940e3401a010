//! Headless skirmish runner for AI testing and CI verification.
//!
//! Loads a scenario, deploys it into a [`tactics_core`] simulation and puts
//! an autopilot in charge of the squad. This enables:
//!
//! - **Playtesting without a frontend**: narrated log and ASCII board per turn
//! - **Balance batches**: hundreds of seeded games in parallel with metrics
//! - **Determinism checks**: the same seed must end in the same state hash
//!
//! # Example
//!
//! ```bash
//! # Watch a built-in scenario play out
//! cargo run -p tactics_headless -- run --scenario derelict --render
//!
//! # Run a balance batch
//! cargo run -p tactics_headless -- batch --scenario hive --count 500 --output results/
//!
//! # Verify determinism
//! cargo run -p tactics_headless -- verify --scenario outpost --seed 12345
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ascii;
pub mod batch;
pub mod metrics;
pub mod narration;
pub mod runner;
pub mod scenario;

pub use ascii::{mission_status, render_ascii, AsciiConfig, Markers};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, GameMetrics, GameOutcome, MetricsCollector};
pub use narration::{Narrator, Roster};
pub use runner::{autopilot, run_game, GameConfig, GameResult, SkirmishRunner, TurnFrame};
pub use scenario::{builtin_names, load_registry, Scenario, ScenarioError};
