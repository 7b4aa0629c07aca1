//! Batch runner for balance testing.
//!
//! Plays one scenario over a range of seeds in parallel using rayon. Every
//! run owns its own [`Battle`](battle_core::battle::Battle); nothing is shared
//! between threads.

use std::path::Path;
use std::time::Instant;

use battle_core::prelude::*;
use std::result::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::runner::{BattleSummary, ScenarioRunner};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of battles to run.
    pub game_count: u32,
    /// Seed of the first battle; later battles count up from it.
    pub seed_start: u64,
    /// Maximum parallel battles (0 = rayon default).
    pub parallel_games: usize,
    /// Tick limit override (`None` = the scenario's own).
    pub max_ticks: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            seed_start: 0,
            parallel_games: 0,
            max_ticks: None,
        }
    }
}

impl BatchConfig {
    /// Run `game_count` battles.
    #[must_use]
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the tick limit for every battle.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Battles completed without error.
    pub total_games: u32,
    /// Battles won by the attacker.
    pub attacker_wins: u32,
    /// Battles won by the defender.
    pub defender_wins: u32,
    /// Battles cut off by the tick limit.
    pub undecided: u32,
    /// Mean battle length in ticks.
    pub average_ticks: f64,
    /// Attacker wins over decided battles.
    pub attacker_win_rate: f64,
}

impl BatchSummary {
    /// Summarize a set of battle outcomes.
    #[must_use]
    pub fn from_games(games: &[BattleSummary]) -> Self {
        let mut summary = Self {
            total_games: games.len() as u32,
            ..Self::default()
        };
        if games.is_empty() {
            return summary;
        }

        let mut total_ticks = 0u64;
        for game in games {
            total_ticks += game.ticks;
            match game.winner {
                _ if game.timed_out => summary.undecided += 1,
                Some(Side::Attacker) => summary.attacker_wins += 1,
                Some(Side::Defender) => summary.defender_wins += 1,
                None => summary.undecided += 1,
            }
        }
        summary.average_ticks = total_ticks as f64 / games.len() as f64;
        let decided = summary.attacker_wins + summary.defender_wins;
        if decided > 0 {
            summary.attacker_win_rate = f64::from(summary.attacker_wins) / f64::from(decided);
        }
        summary
    }
}

/// A battle that could not be run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index.
    pub game_index: u32,
    /// Seed used.
    pub seed: u64,
    /// Error message.
    pub message: String,
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Scenario name.
    pub scenario: String,
    /// Configuration used.
    pub config: BatchConfig,
    /// Per-battle outcomes, in seed order.
    pub games: Vec<BattleSummary>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Errors encountered.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

fn runner_for(scenario: &Scenario, seed: u64, config: &BatchConfig) -> ScenarioRunner {
    let runner = ScenarioRunner::new(scenario.clone()).with_seed(seed);
    match config.max_ticks {
        Some(max_ticks) => runner.with_max_ticks(max_ticks),
        None => runner,
    }
}

fn play_all(scenario: &Scenario, config: &BatchConfig) -> Vec<Result<BattleSummary, BatchError>> {
    (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            runner_for(scenario, seed, config).run().map_err(|e| {
                warn!("Game {} failed: {}", i, e);
                BatchError {
                    game_index: i,
                    seed,
                    message: e.to_string(),
                }
            })
        })
        .collect()
}

/// Run a batch of battles.
pub fn run_batch(scenario: &Scenario, config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} battles of '{}'",
        config.game_count, scenario.name
    );

    let results = if config.parallel_games > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games)
            .build()
        {
            Ok(pool) => pool.install(|| play_all(scenario, &config)),
            Err(e) => {
                warn!(error = %e, "Falling back to the global thread pool");
                play_all(scenario, &config)
            }
        }
    } else {
        play_all(scenario, &config)
    };

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<BattleSummary> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} battles in {:.1}s ({:.1} battles/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(0.001)
    );

    BatchResults {
        scenario: scenario.name.clone(),
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Run the same seed several times and compare the outcomes.
///
/// Returns `Ok(true)` when every run ends in the same phase, winner, tick
/// and state hash.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32) -> Result<bool, ScenarioError> {
    let runner = ScenarioRunner::new(scenario.clone()).with_seed(seed);
    let mut results = Vec::with_capacity(runs as usize);
    for _ in 0..runs.max(1) {
        results.push(runner.run()?);
    }

    let first = &results[0];
    Ok(results.iter().all(|r| {
        r.winner == first.winner
            && r.ticks == first.ticks
            && r.phase == first.phase
            && r.final_state_hash == first.final_state_hash
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::StrategyKind;

    fn quick_scenario() -> Scenario {
        let mut scenario = Scenario::skirmish();
        scenario.attacker.strategy = StrategyKind::Idle;
        scenario.defender.strategy = StrategyKind::Idle;
        scenario.max_ticks = 30;
        scenario
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500).with_seed(12345).with_max_ticks(90);
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.max_ticks, Some(90));
        assert_eq!(BatchConfig::default().game_count, 100);
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let base = ScenarioRunner::new(quick_scenario()).run().unwrap();
        let mut attacker_win = base.clone();
        attacker_win.timed_out = false;
        attacker_win.winner = Some(Side::Attacker);
        attacker_win.ticks = 10;
        let mut defender_win = attacker_win.clone();
        defender_win.winner = Some(Side::Defender);
        defender_win.ticks = 20;

        let summary = BatchSummary::from_games(&[base, attacker_win.clone(), attacker_win, defender_win]);
        assert_eq!(summary.total_games, 4);
        assert_eq!(summary.attacker_wins, 2);
        assert_eq!(summary.defender_wins, 1);
        assert_eq!(summary.undecided, 1);
        assert!((summary.average_ticks - 17.5).abs() < 1e-9);
        assert!((summary.attacker_win_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(&quick_scenario(), BatchConfig::new(6).with_seed(100));

        assert_eq!(results.games.len(), 6);
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, (100..106).collect::<Vec<_>>());
        assert_eq!(results.summary.undecided, 6);
    }

    #[test]
    fn test_batch_with_dedicated_pool() {
        let config = BatchConfig {
            parallel_games: 2,
            ..BatchConfig::new(4)
        };
        let results = run_batch(&quick_scenario(), config);
        assert_eq!(results.games.len(), 4);
    }

    #[test]
    fn test_broken_scenario_reports_errors() {
        let mut scenario = quick_scenario();
        scenario.terrain.clear();
        let results = run_batch(&scenario, BatchConfig::new(3));

        assert!(results.games.is_empty());
        assert_eq!(results.errors.len(), 3);
        assert_eq!(results.summary.total_games, 0);
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism(&Scenario::skirmish(), 12345, 3).unwrap());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(&quick_scenario(), BatchConfig::new(2));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.scenario, "Open Skirmish");
        assert_eq!(loaded.config, results.config);
    }
}
