//! End-to-end runs of scenario files.

use std::fs;
use std::path::PathBuf;

use battle_core::prelude::*;
use battle_headless::scenario::open_terrain;
use battle_headless::{BatchConfig, Scenario, ScenarioError, ScenarioRunner, StrategyKind};
use tempfile::TempDir;

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

#[test]
fn bundled_scenarios_load() {
    for name in ["skirmish.ron", "river_crossing.ron"] {
        let scenario = Scenario::load(bundled(name)).unwrap();
        let planet = scenario.planet().unwrap();
        assert_eq!(planet.owner, PlayerId(scenario.defender.player));
    }

    let river = Scenario::load(bundled("river_crossing.ron")).unwrap();
    assert_eq!(river.dimensions(), (28, 20));
    assert_eq!(river.max_ticks, 8000);
    assert_eq!(river.config.mine_dwell_ticks, 15);
    assert_eq!(river.config.paralysis_ttl, BattleConfig::default().paralysis_ttl);

    let battle = ScenarioRunner::new(river).build().unwrap();
    assert_eq!(battle.guns().len(), 2);
    assert_eq!(battle.phase(), BattlePhase::Active);
}

#[test]
fn skirmish_file_matches_builtin() {
    let from_file = Scenario::load(bundled("skirmish.ron")).unwrap();
    let builtin = Scenario::skirmish();
    assert_eq!(from_file.terrain, builtin.terrain);

    let a = ScenarioRunner::new(from_file).with_seed(9).with_max_ticks(300).run().unwrap();
    let b = ScenarioRunner::new(builtin).with_seed(9).with_max_ticks(300).run().unwrap();
    assert_eq!(a, b);
}

#[test]
fn overwhelming_charge_takes_the_planet() {
    let mut scenario = Scenario::skirmish();
    scenario.terrain = open_terrain(24, 24);
    scenario.attacker.units = vec![UnitKind::Tank; 6];
    scenario.defender.units = vec![UnitKind::Tank];
    scenario.defender.strategy = StrategyKind::Idle;
    scenario.max_ticks = 5000;

    let summary = ScenarioRunner::new(scenario).with_seed(5).run().unwrap();
    assert!(!summary.timed_out);
    assert_eq!(summary.winner, Some(Side::Attacker));
    assert_eq!(summary.planet_owner, PlayerId(1));
    assert_eq!(summary.stats.defender.units_lost, 1);
    assert_eq!(summary.survivors[1], 0);
}

#[test]
fn scenario_written_to_disk_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("siege.ron");
    let siege = Scenario::siege();
    let text = ron::ser::to_string_pretty(&siege, ron::ser::PrettyConfig::default()).unwrap();
    fs::write(&path, text).unwrap();

    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded.name, siege.name);
    assert_eq!(loaded.terrain, siege.terrain);
    assert_eq!(loaded.buildings.len(), 3);
    assert_eq!(loaded.attacker.strategy, StrategyKind::Siege);
}

#[test]
fn malformed_scenario_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "Scenario(name: \"Broken\", terrain: [\"..\"], attacker: Army())").unwrap();

    assert!(matches!(Scenario::load(&path), Err(ScenarioError::ParseError(_))));
}

#[test]
fn batch_results_land_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut scenario = Scenario::skirmish();
    scenario.max_ticks = 40;

    let results = battle_headless::run_batch(&scenario, BatchConfig::new(3).with_seed(7));
    let path = dir.path().join("batch_results.json");
    results.save(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["scenario"], "Open Skirmish");
    assert_eq!(json["games"].as_array().map(Vec::len), Some(3));
    assert_eq!(json["summary"]["total_games"], 3);
}
