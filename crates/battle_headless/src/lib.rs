//! Headless battle runner for scenario playback and CI verification.
//!
//! This crate drives `battle_core` battles without any host game around
//! them. A battle is described by a RON [`Scenario`], each side is commanded
//! by a scripted [`ScriptedAi`], and the outcome is reported as JSON. This
//! enables:
//!
//! - **Balance testing**: batch runs over many seeds in parallel
//! - **CI verification**: determinism checks on complete battles
//! - **Scenario authoring**: quick playback of hand-written maps
//!
//! Logs go to stderr; summaries go to stdout.
//!
//! # Example
//!
//! ```bash
//! # Play a built-in scenario
//! cargo run -p battle_headless -- run --scenario siege --seed 7
//!
//! # Run a batch of 200 seeds
//! cargo run -p battle_headless -- batch --scenario scenarios/skirmish.ron --count 200
//!
//! # Verify determinism
//! cargo run -p battle_headless -- verify --scenario siege --runs 5
//! ```

pub mod batch;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults, BatchSummary};
pub use runner::{run_scenario, BattleSummary, ScenarioRunner};
pub use scenario::{ArmySetup, BuildingPlacement, Scenario, ScenarioError};
pub use strategies::{ScriptedAi, StrategyKind};
