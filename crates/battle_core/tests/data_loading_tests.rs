//! Loading tuning and unit data from RON files.

use std::fs;

use battle_core::prelude::*;
use battle_test_utils::fixtures::{open_planet, ATTACKER, DEFENDER};
use tempfile::TempDir;

const HEAVY_TANKS: &str = r"
UnitTableFile(
    units: [
        UnitSpec(
            kind: Tank,
            max_hp: 420,
            damage: 30,
            min_range: 0.0,
            max_range: 4.0,
            area: 0.0,
            cooldown: 10,
            fire_phases: 3,
            speed: 0.25,
            rotation_speed: 30.0,
            projectile_speed: 0.0,
        ),
    ],
)
";

#[test]
fn config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("battle.ron");
    fs::write(&path, "BattleConfig(seed: 9, paralysis_ttl: 40, skip_outer_edge: true)").unwrap();

    let config = BattleConfig::load(&path).unwrap();
    assert_eq!(config.seed, 9);
    assert_eq!(config.paralysis_ttl, 40);
    assert!(config.skip_outer_edge);
    assert_eq!(config.explosion_phases, BattleConfig::default().explosion_phases);
}

#[test]
fn unit_table_file_feeds_new_units() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("units.ron");
    fs::write(&path, HEAVY_TANKS).unwrap();
    let table = UnitTable::load(&path).unwrap();

    let setup = BattleSetup::new(
        Army::new(ATTACKER).with_units([UnitKind::Tank, UnitKind::Artillery]),
        Army::new(DEFENDER).with_units([UnitKind::Tank]),
    )
    .with_table(table);
    let battle = Battle::initiate(open_planet(20, 20), setup);

    for unit in battle.units() {
        let expected = match unit.kind {
            UnitKind::Tank => 420,
            _ => UnitTable::standard().get(unit.kind).max_hp,
        };
        assert_eq!(unit.max_hp, expected);
        assert_eq!(unit.hp, expected);
    }
    assert_eq!(battle.units().len(), 3);
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "UnitTableFile(units: [UnitSpec(kind: Hovercraft)])").unwrap();

    match UnitTable::load(&path) {
        Err(BattleError::DataParseError { path: reported, .. }) => {
            assert!(reported.ends_with("broken.ron"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = BattleConfig::load(dir.path().join("absent.ron")).unwrap_err();
    assert!(matches!(err, BattleError::Io(_)));
}
