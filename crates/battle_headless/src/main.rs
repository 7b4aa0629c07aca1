//! Headless battle runner.
//!
//! Plays ground battles without a host game. Designed for balance runs,
//! CI determinism checks and scenario authoring.
//!
//! # Usage
//!
//! ```bash
//! # Play one battle and print its summary as JSON
//! cargo run -p battle_headless -- run --scenario skirmish
//!
//! # Override strategies and the seed
//! cargo run -p battle_headless -- run --scenario siege --attacker charge --defender hold --seed 3
//!
//! # Run a batch over 500 seeds
//! cargo run -p battle_headless -- batch --scenario siege --count 500 --output results/
//!
//! # Verify determinism
//! cargo run -p battle_headless -- verify --scenario siege --seed 12345 --runs 5
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use battle_core::prelude::Side;
use battle_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    runner::ScenarioRunner,
    scenario::Scenario,
    strategies::StrategyKind,
};

#[derive(Parser)]
#[command(name = "battle_headless")]
#[command(about = "Headless ground battle runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single battle and print its summary
    Run {
        /// Built-in scenario name or scenario file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Battle seed (defaults to the scenario's)
        #[arg(long)]
        seed: Option<u64>,

        /// Tick limit (defaults to the scenario's)
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Attacker strategy override
        #[arg(long)]
        attacker: Option<StrategyKind>,

        /// Defender strategy override
        #[arg(long)]
        defender: Option<StrategyKind>,

        /// Write the summary to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of battles over consecutive seeds
    Batch {
        /// Built-in scenario name or scenario file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Number of battles to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel battles (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: usize,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per battle (defaults to the scenario's)
        #[arg(long)]
        max_ticks: Option<u64>,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Verify determinism by running the same seed several times
    Verify {
        /// Built-in scenario name or scenario file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// List built-in scenarios and strategies
    List,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries summaries.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            max_ticks,
            attacker,
            defender,
            output,
        } => cmd_run(&scenario, seed, max_ticks, attacker, defender, output),
        Commands::Batch {
            scenario,
            count,
            parallel,
            seed,
            max_ticks,
            output,
        } => cmd_batch(&scenario, count, parallel, seed, max_ticks, output),
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => cmd_verify(&scenario, seed, runs),
        Commands::List => cmd_list(),
    }
}

fn load_scenario(name: &str) -> Scenario {
    match Scenario::resolve(name) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, scenario = name, "Failed to load scenario");
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

/// Play one battle
fn cmd_run(
    scenario: &str,
    seed: Option<u64>,
    max_ticks: Option<u64>,
    attacker: Option<StrategyKind>,
    defender: Option<StrategyKind>,
    output: Option<PathBuf>,
) {
    let scenario = load_scenario(scenario);
    tracing::info!(scenario = %scenario.name, "Starting battle");

    let mut runner = ScenarioRunner::new(scenario);
    if let Some(seed) = seed {
        runner = runner.with_seed(seed);
    }
    if let Some(max_ticks) = max_ticks {
        runner = runner.with_max_ticks(max_ticks);
    }
    if let Some(strategy) = attacker {
        runner = runner.with_strategy(Side::Attacker, strategy);
    }
    if let Some(strategy) = defender {
        runner = runner.with_strategy(Side::Defender, strategy);
    }

    let summary = match runner.run() {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&summary) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("FATAL: Failed to serialize summary: {e}");
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                eprintln!("FATAL: Failed to write '{}': {e}", path.display());
                std::process::exit(1);
            }
            eprintln!("Summary saved to: {}", path.display());
        }
        None => println!("{json}"),
    }
}

/// Run a batch of battles
fn cmd_batch(
    scenario: &str,
    count: u32,
    parallel: usize,
    seed: u64,
    max_ticks: Option<u64>,
    output: PathBuf,
) {
    let scenario = load_scenario(scenario);
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);

    tracing::info!(
        scenario = %scenario.name,
        count,
        parallel,
        seed,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    if let Err(e) = std::fs::create_dir_all(&output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to create output directory");
        eprintln!("FATAL: Cannot create output directory '{}': {e}", output.display());
        std::process::exit(1);
    }

    let config = BatchConfig {
        game_count: count,
        seed_start: seed,
        parallel_games: parallel,
        max_ticks,
    };
    let results = run_batch(&scenario, config);

    let results_path = output.join("batch_results.json");
    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        eprintln!("FATAL: Failed to save results: {e}");
        std::process::exit(1);
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE: {}", results.scenario);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Battles played: {}", summary.total_games);
    if !results.errors.is_empty() {
        eprintln!("Battles FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("Attacker wins: {}", summary.attacker_wins);
    eprintln!("Defender wins: {}", summary.defender_wins);
    eprintln!("Undecided: {}", summary.undecided);
    eprintln!("Attacker win rate: {:.1}%", summary.attacker_win_rate * 100.0);
    eprintln!("Average length: {:.0} ticks", summary.average_ticks);

    for error in results.errors.iter().take(10) {
        eprintln!("  Battle {} (seed {}): {}", error.game_index, error.seed, error.message);
    }

    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        scenario.name,
        seed,
        runs
    );

    match verify_determinism(&scenario, seed, runs) {
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

/// List built-in scenarios and strategies
fn cmd_list() {
    println!("Scenarios:");
    for name in Scenario::BUILTIN {
        if let Some(scenario) = Scenario::builtin(name) {
            let (width, height) = scenario.dimensions();
            println!("  {name:<10} {width}x{height}  {}", scenario.description);
        }
    }
    println!("Strategies:");
    for kind in StrategyKind::ALL {
        println!("  {kind}");
    }
}
