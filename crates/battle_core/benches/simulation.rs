//! Battle benchmarks for battle_core.
//!
//! Run with: `cargo bench -p battle_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use battle_core::grid::{Cell, PassabilityGrid, Surface};
use battle_core::pathing::CostField;
use battle_core::units::UnitKind;
use battle_test_utils::fixtures::{assault, fortified_planet};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Full assault battles, 300 ticks each.
pub fn battle_benchmark(c: &mut Criterion) {
    let attackers = [
        UnitKind::Tank,
        UnitKind::Tank,
        UnitKind::Tank,
        UnitKind::Artillery,
        UnitKind::RocketSled,
        UnitKind::Paralizer,
        UnitKind::Kamikaze,
        UnitKind::SelfRepairTank,
    ];
    let defenders = [UnitKind::Tank, UnitKind::Tank, UnitKind::Minelayer, UnitKind::RocketJammer];

    c.bench_function("assault_300_ticks", |b| {
        b.iter_batched(
            || assault(fortified_planet(), &attackers, &defenders, 7),
            |mut battle| {
                for _ in 0..300 {
                    black_box(battle.tick());
                }
                battle.state_hash()
            },
            BatchSize::SmallInput,
        );
    });
}

/// Cost-field computation on a 64x64 map with a wall.
pub fn cost_field_benchmark(c: &mut Criterion) {
    let mut surface = Surface::new(64, 64);
    for y in 0..56 {
        surface.set_cell(Cell::new(32, y), battle_core::grid::CellType::Blocked);
    }
    let grid = PassabilityGrid::build(&surface, std::iter::empty());

    c.bench_function("cost_field_64x64", |b| {
        b.iter(|| CostField::compute(black_box(&grid), Cell::new(60, 2)));
    });
}

criterion_group!(benches, battle_benchmark, cost_field_benchmark);
criterion_main!(benches);
