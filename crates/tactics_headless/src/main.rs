//! Headless skirmish runner.
//!
//! Plays scenarios with the squad under autopilot, for playtesting, balance
//! batches and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Play a scenario, printing the narrated log
//! cargo run -p tactics_headless -- run --scenario derelict
//!
//! # Draw the board every turn
//! cargo run -p tactics_headless -- run --scenario hive --render
//!
//! # Emit one JSON turn frame per line
//! cargo run -p tactics_headless -- run --scenario outpost --json
//!
//! # Run batch balance test
//! cargo run -p tactics_headless -- batch --scenario derelict --count 1000 --output results/
//! ```
//!
//! Logs go to stderr; narration, boards and frames go to stdout.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tactics_headless::{
    ascii::{mission_status, render_ascii, AsciiConfig, Markers},
    batch::{run_batch, verify_determinism, BatchConfig},
    metrics::GameOutcome,
    runner::{GameConfig, SkirmishRunner},
    scenario::{builtin_names, load_registry, Scenario},
};

#[derive(Parser)]
#[command(name = "tactics_headless")]
#[command(about = "Headless squad tactics runner for playtesting, balance and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game under autopilot
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "derelict")]
        scenario: String,

        /// Directory with items.ron and mobs.ron
        #[arg(long)]
        data: Option<PathBuf>,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Override the scenario's turn limit
        #[arg(long)]
        max_turns: Option<u64>,

        /// Draw the board after every turn
        #[arg(long)]
        render: bool,

        /// Show units the squad cannot see
        #[arg(long, requires = "render")]
        reveal: bool,

        /// Print one JSON turn frame per line instead of text
        #[arg(long, conflicts_with = "render")]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Run batch of games for balance testing
    Batch {
        /// Scenario to run
        #[arg(short, long, default_value = "derelict")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Override the scenario's turn limit
        #[arg(long)]
        max_turns: Option<u64>,

        /// Directory with items.ron and mobs.ron
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long, default_value = "derelict")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Directory with items.ron and mobs.ron
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Play many games back to back for timing
    Benchmark {
        /// Number of games to run
        #[arg(short, long, default_value = "200")]
        games: u32,

        /// Scenario to benchmark
        #[arg(short, long, default_value = "derelict")]
        scenario: String,
    },

    /// List the built-in scenarios
    List,
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr, stdout is for game output
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            data,
            seed,
            max_turns,
            render,
            reveal,
            json,
            no_color,
        }) => {
            let view = RunView {
                render,
                reveal,
                json,
                color: !no_color,
            };
            cmd_run(&scenario, data, seed, max_turns, &view);
        }
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_turns,
            data,
        }) => {
            let config = BatchConfig {
                scenario,
                game_count: count,
                parallel_games: parallel,
                output_dir: output,
                seed_start: seed,
                max_turns,
                data_dir: data,
            };
            cmd_batch(config);
        }
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            data,
        }) => {
            cmd_verify(&scenario, data, seed, runs);
        }
        Some(Commands::Benchmark { games, scenario }) => {
            cmd_benchmark(games, &scenario);
        }
        Some(Commands::List) => {
            for name in builtin_names() {
                println!("{name}");
            }
        }
        None => {
            let view = RunView {
                render: false,
                reveal: false,
                json: false,
                color: true,
            };
            cmd_run("derelict", None, 0, None, &view);
        }
    }
}

/// How `run` presents each turn.
struct RunView {
    render: bool,
    reveal: bool,
    json: bool,
    color: bool,
}

/// Play a single game
fn cmd_run(scenario: &str, data: Option<PathBuf>, seed: u64, max_turns: Option<u64>, view: &RunView) {
    let (scenario, registry) = match Scenario::resolve(scenario).and_then(|s| Ok((s, load_registry(data.as_deref())?))) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(scenario = %scenario.name, seed, "Starting game");
    if !scenario.description.is_empty() && !view.json {
        println!("{}\n", scenario.description);
    }

    let config = GameConfig {
        seed,
        max_turns,
        game_id: format!("run_{seed}"),
    };
    let mut runner = match SkirmishRunner::new(&scenario, &registry, &config) {
        Ok(r) => r.with_color(view.color && !view.json),
        Err(e) => {
            eprintln!("Failed to deploy scenario: {e}");
            std::process::exit(1);
        }
    };

    let ascii = AsciiConfig {
        show_legend: true,
        use_color: view.color,
        reveal: view.reveal,
    };

    let mut narration = Vec::new();
    while !runner.is_over() {
        let frame = runner.step();
        if view.json {
            match serde_json::to_string(&frame) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "Failed to encode turn frame"),
            }
        } else {
            for line in &frame.lines {
                println!("{line}");
            }
            if view.render {
                let markers = Markers::for_mission(runner.mission(), runner.artifact());
                print!("{}", render_ascii(runner.sim(), markers, &ascii));
                println!("{}\n", mission_status(runner.mission()));
            }
        }
        narration.extend(frame.lines);
    }

    let result = runner.finish(narration);
    let metrics = &result.metrics;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("GAME OVER: {}", metrics.outcome.label());
    eprintln!("{}", "=".repeat(50));
    eprintln!("Turns: {}", metrics.turns);
    eprintln!("Kills: {}", metrics.kills);
    eprintln!("Squad losses: {}", metrics.squad.losses);
    eprintln!(
        "Damage dealt/taken: {}/{}",
        metrics.squad.damage_dealt, metrics.squad.damage_taken
    );
    if let Some(turn) = metrics.objective_turn {
        eprintln!("Objective met on turn {turn}");
    }
    eprintln!("Final state hash: {:016x}", metrics.final_state_hash);
}

/// Run batch of games for balance testing
fn cmd_batch(config: BatchConfig) {
    let output = config.output_dir.clone();

    let num_cpus = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    tracing::info!(
        scenario = %config.scenario,
        count = config.game_count,
        parallel = config.parallel_games,
        seed = config.seed_start,
        output = %output.display(),
        cpus_available = num_cpus,
        max_turns = ?config.max_turns,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!(
            "FATAL: Cannot create output directory '{}': {}",
            output.display(),
            e
        );
        std::process::exit(1);
    }

    let results = match run_batch(config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Throughput: {:.1} games/sec",
        results.games.len() as f64 / results.duration_seconds.max(0.001)
    );
    eprintln!("\nOutcomes:");
    for (outcome, count) in &summary.outcomes {
        eprintln!("  {outcome}: {count}");
    }
    eprintln!("Squad win rate: {:.1}%", summary.squad_win_rate * 100.0);
    eprintln!(
        "Turns: avg {:.1} (min {}, max {})",
        summary.avg_turns, summary.min_turns, summary.max_turns
    );
    eprintln!("Avg kills: {:.2}", summary.avg_kills);
    eprintln!("Avg squad losses: {:.2}", summary.avg_squad_losses);

    if !results.errors.is_empty() {
        eprintln!("\nGAME FAILURES:");
        for error in results.errors.iter().take(10) {
            eprintln!(
                "  Game {} (seed {}): {}",
                error.game_index, error.seed, error.message
            );
        }
        if results.errors.len() > 10 {
            eprintln!("  ... and {} more failures", results.errors.len() - 10);
        }
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, data: Option<PathBuf>, seed: u64, runs: u32) {
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario,
        seed,
        runs
    );

    match verify_determinism(scenario, data.as_deref(), seed, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}

/// Run games sequentially and report timing
fn cmd_benchmark(games: u32, scenario: &str) {
    let (scenario, registry) = match Scenario::resolve(scenario).and_then(|s| Ok((s, load_registry(None)?))) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load scenario: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Benchmarking {} games of '{}'", games, scenario.name);

    let start = Instant::now();
    let mut turns = 0u64;
    let mut completed = 0u32;
    for seed in 0..u64::from(games) {
        let config = GameConfig {
            seed,
            max_turns: None,
            game_id: format!("bench_{seed}"),
        };
        match SkirmishRunner::new(&scenario, &registry, &config) {
            Ok(runner) => {
                let result = runner.run_to_end();
                turns += result.metrics.turns;
                if result.metrics.outcome == GameOutcome::Completed {
                    completed += 1;
                }
            }
            Err(e) => {
                eprintln!("Failed to deploy scenario: {e}");
                std::process::exit(1);
            }
        }
    }
    let elapsed = start.elapsed();

    eprintln!("Benchmark complete:");
    eprintln!("  Games: {games} ({completed} completed)");
    eprintln!("  Turns: {turns}");
    eprintln!("  Time: {:.2}s", elapsed.as_secs_f64());
    eprintln!(
        "  Turns/sec: {:.0}",
        turns as f64 / elapsed.as_secs_f64().max(0.000_001)
    );
}
