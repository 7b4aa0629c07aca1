//! Single-battle runner.
//!
//! Builds a [`Battle`] from a [`Scenario`], ticks it to conclusion (or the
//! scenario's tick limit) and condenses the outcome into a serializable
//! [`BattleSummary`].

use std::time::Instant;

use battle_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scenario::{Scenario, ScenarioError};
use crate::strategies::{ScriptedAi, StrategyKind};

/// Outcome of one battle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Scenario name.
    pub scenario: String,
    /// Seed the battle ran with.
    pub seed: u64,
    /// Strategies used, `[attacker, defender]`.
    pub strategies: [StrategyKind; 2],
    /// Final lifecycle phase.
    pub phase: BattlePhase,
    /// Winning side, `None` when the tick limit ran out first.
    pub winner: Option<Side>,
    /// Ticks simulated.
    pub ticks: u64,
    /// The tick limit cut the battle short.
    pub timed_out: bool,
    /// Living combat units at the end, `[attacker, defender]`.
    pub survivors: [usize; 2],
    /// Guns still standing.
    pub guns_remaining: usize,
    /// Planet owner after the battle.
    pub planet_owner: PlayerId,
    /// Accumulated counters.
    pub stats: BattleStats,
    /// State hash after the last tick.
    pub final_state_hash: u64,
}

/// Runs one scenario with per-run overrides.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    scenario: Scenario,
    seed: u64,
    max_ticks: u64,
    strategies: [StrategyKind; 2],
}

impl ScenarioRunner {
    /// Run `scenario` as written.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self {
            seed: scenario.config.seed,
            max_ticks: scenario.max_ticks,
            strategies: [scenario.attacker.strategy, scenario.defender.strategy],
            scenario,
        }
    }

    /// Override the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Override one side's strategy.
    #[must_use]
    pub fn with_strategy(mut self, side: Side, strategy: StrategyKind) -> Self {
        let slot = match side {
            Side::Attacker => 0,
            Side::Defender => 1,
        };
        self.strategies[slot] = strategy;
        self
    }

    /// The battle this runner would play, before any tick.
    pub fn build(&self) -> Result<Battle, ScenarioError> {
        let planet = self.scenario.planet()?;
        let config = BattleConfig {
            seed: self.seed,
            ..self.scenario.config.clone()
        };
        let [attack, defend] = self.strategies;
        let setup = BattleSetup::new(
            Army::new(PlayerId(self.scenario.attacker.player))
                .with_units(self.scenario.attacker.units.iter().copied())
                .with_ai(ScriptedAi::new(attack)),
            Army::new(PlayerId(self.scenario.defender.player))
                .with_units(self.scenario.defender.units.iter().copied())
                .with_ai(ScriptedAi::new(defend)),
        )
        .with_config(config);
        Ok(Battle::initiate(planet, setup))
    }

    /// Play the battle to conclusion or the tick limit.
    pub fn run(&self) -> Result<BattleSummary, ScenarioError> {
        let start = Instant::now();
        let mut battle = self.build()?;
        for side in battle.stalled_sides() {
            warn!(scenario = %self.scenario.name, ?side, "Deployment ran out of room");
        }

        while battle.phase() != BattlePhase::Concluded && battle.tick_count() < self.max_ticks {
            let events = battle.tick();
            if let Some(phase) = events.phase_changed {
                debug!(tick = battle.tick_count(), ?phase, "Phase change");
            }
        }

        let summary = self.summarize(battle);
        info!(
            scenario = %summary.scenario,
            seed = summary.seed,
            winner = ?summary.winner,
            ticks = summary.ticks,
            timed_out = summary.timed_out,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Battle run finished"
        );
        Ok(summary)
    }

    fn summarize(&self, battle: Battle) -> BattleSummary {
        let info = battle.battle_info();
        let final_state_hash = battle.state_hash();
        let phase = battle.phase();
        let planet = battle.into_planet();
        BattleSummary {
            scenario: self.scenario.name.clone(),
            seed: self.seed,
            strategies: self.strategies,
            phase,
            winner: info.winner,
            ticks: info.tick,
            timed_out: phase != BattlePhase::Concluded,
            survivors: info.combat_units,
            guns_remaining: info.guns,
            planet_owner: planet.owner,
            stats: info.stats,
            final_state_hash,
        }
    }
}

/// Run a scenario once with the given seed.
pub fn run_scenario(scenario: &Scenario, seed: u64) -> Result<BattleSummary, ScenarioError> {
    ScenarioRunner::new(scenario.clone()).with_seed(seed).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_applies_overrides() {
        let runner = ScenarioRunner::new(Scenario::skirmish())
            .with_seed(42)
            .with_strategy(Side::Defender, StrategyKind::Idle);
        let battle = runner.build().unwrap();

        assert_eq!(battle.config().seed, 42);
        assert_eq!(battle.phase(), BattlePhase::Active);
        assert_eq!(battle.units_of(Side::Attacker).len(), 5);
        assert_eq!(battle.units_of(Side::Defender).len(), 3);
        assert_eq!(battle.player(Side::Attacker), PlayerId(1));
    }

    #[test]
    fn test_tick_limit_reports_timeout() {
        let summary = ScenarioRunner::new(Scenario::skirmish())
            .with_strategy(Side::Attacker, StrategyKind::Idle)
            .with_strategy(Side::Defender, StrategyKind::Idle)
            .with_max_ticks(25)
            .run()
            .unwrap();

        assert!(summary.timed_out);
        assert_eq!(summary.ticks, 25);
        assert_eq!(summary.winner, None);
        assert_eq!(summary.phase, BattlePhase::Active);
        assert_eq!(summary.planet_owner, PlayerId(2));
        assert_eq!(summary.strategies, [StrategyKind::Idle, StrategyKind::Idle]);
    }
}
