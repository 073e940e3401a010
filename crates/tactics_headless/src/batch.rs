//! Batch game runner for balance testing.
//!
//! Runs one scenario over a range of seeds in parallel using rayon and
//! collects per-game metrics plus an aggregate summary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tactics_core::prelude::*;
use std::result::Result;

use crate::metrics::{BatchSummary, GameMetrics, GameOutcome};
use crate::runner::{run_game, GameConfig};
use crate::scenario::{load_registry, Scenario, ScenarioError};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or RON path
    pub scenario: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed for deterministic runs
    pub seed_start: u64,
    /// Overrides the scenario's turn limit
    pub max_turns: Option<u64>,
    /// Directory holding items.ron and mobs.ron (built-in content if unset)
    pub data_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "derelict".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_turns: None,
            data_dir: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the turn limit
    pub fn with_max_turns(mut self, turns: u64) -> Self {
        self.max_turns = Some(turns);
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total games
    pub total: u32,
    /// Completed games
    pub completed: AtomicU32,
    /// Start time
    pub start_time: Instant,
    outcomes: Mutex<BTreeMap<GameOutcome, u32>>,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
            outcomes: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record a completed game
    pub fn record_completion(&self, outcome: GameOutcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut outcomes) = self.outcomes.lock() {
            *outcomes.entry(outcome).or_insert(0) += 1;
        }
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }
        let per_game = self.start_time.elapsed().as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_game * f64::from(remaining))
    }

    /// Share of finished games per outcome so far
    pub fn current_rates(&self) -> BTreeMap<GameOutcome, f64> {
        let completed = self.current();
        if completed == 0 {
            return BTreeMap::new();
        }
        self.outcomes
            .lock()
            .map(|outcomes| {
                outcomes
                    .iter()
                    .map(|(k, v)| (*k, f64::from(*v) / f64::from(completed)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Display progress to stderr
    pub fn display(&self) {
        let eta = self.eta();
        eprintln!("╔════════════════════════════════════╗");
        eprintln!(
            "║ Batch Progress: {:>4}/{:<4} ({:>5.1}%) ║",
            self.current(),
            self.total,
            self.percentage()
        );
        eprintln!("║ ETA: {:>29} ║", format!("{}m {}s", eta.as_secs() / 60, eta.as_secs() % 60));
        let rates = self.current_rates();
        if !rates.is_empty() {
            eprintln!("╟────────────────────────────────────╢");
            for (outcome, rate) in &rates {
                eprintln!("║   {:<16}: {:>5.1}%          ║", outcome.label(), rate * 100.0);
            }
        }
        eprintln!("╚════════════════════════════════════╝");
    }
}

fn run_single_game(
    scenario: &Scenario,
    registry: &TemplateRegistry,
    seed: u64,
    max_turns: Option<u64>,
) -> Result<GameMetrics, ScenarioError> {
    let config = GameConfig {
        seed,
        max_turns,
        game_id: format!("game_{seed}"),
    };
    Ok(run_game(scenario, registry, &config)?.metrics)
}

/// Run a batch of games.
///
/// Fails only if the scenario or content cannot be loaded; per-game
/// failures are collected in [`BatchResults::errors`].
pub fn run_batch(config: BatchConfig) -> Result<BatchResults, ScenarioError> {
    let start = Instant::now();
    let scenario = Scenario::resolve(&config.scenario)?;
    let registry = load_registry(config.data_dir.as_deref())?;
    let progress = BatchProgress::new(config.game_count);

    info!(
        games = config.game_count,
        scenario = %scenario.name,
        seed_start = config.seed_start,
        "Starting batch run"
    );

    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<GameMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            match run_single_game(&scenario, &registry, seed, config.max_turns) {
                Ok(metrics) => {
                    progress.record_completion(metrics.outcome);
                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!("Progress: {}/{}", completed, config.game_count);
                    }
                    if completed % 100 == 0 {
                        progress.display();
                    }
                    Ok(metrics)
                }
                Err(e) => {
                    warn!(game = i, seed, error = %e, "Game failed");
                    Err(BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(0.001)
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Verify determinism by running the same seed several times.
///
/// Runs agree when they end on the same turn, with the same outcome and
/// the same final state hash.
pub fn verify_determinism(scenario: &str, data_dir: Option<&Path>, seed: u64, runs: u32) -> Result<bool, ScenarioError> {
    let scenario = Scenario::resolve(scenario)?;
    let registry = load_registry(data_dir)?;
    let results = (0..runs.max(1))
        .map(|_| run_single_game(&scenario, &registry, seed, None))
        .collect::<Result<Vec<_>, _>>()?;

    let first = &results[0];
    Ok(results.iter().all(|r| {
        r.final_state_hash == first.final_state_hash && r.turns == first.turns && r.outcome == first.outcome
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.game_count, 100);
        assert_eq!(config.scenario, "derelict");
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("hive", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_max_turns(80);

        assert_eq!(config.scenario, "hive");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.max_turns, Some(80));
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(100);
        assert_eq!(progress.current(), 0);
        assert!(progress.percentage().abs() < f64::EPSILON);

        progress.record_completion(GameOutcome::Completed);
        progress.record_completion(GameOutcome::SquadWiped);
        progress.record_completion(GameOutcome::Completed);

        assert_eq!(progress.current(), 3);
        let rates = progress.current_rates();
        assert!((rates[&GameOutcome::Completed] - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(BatchConfig::new("derelict", 6).with_max_turns(60)).unwrap();
        assert_eq!(results.games.len(), 6);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 6);
        assert!(results.games.iter().all(|g| g.turns <= 60));
    }

    #[test]
    fn test_unknown_scenario_fails_fast() {
        assert!(run_batch(BatchConfig::new("no_such_scenario", 3)).is_err());
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism("outpost", None, 12345, 3).unwrap());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new("derelict", 3).with_max_turns(30)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");
        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 3);
        assert_eq!(loaded.config.scenario, "derelict");
        assert_eq!(loaded.games[0].final_state_hash, results.games[0].final_state_hash);
    }
}
