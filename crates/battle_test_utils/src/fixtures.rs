//! Test fixtures and helpers.
//!
//! Pre-built planets, battle setups and a simple charging AI for
//! consistent testing.

use battle_core::prelude::*;
use fixed::types::I32F32;

/// Player commanding the attacking army in fixtures.
pub const ATTACKER: PlayerId = PlayerId(1);
/// Player owning the planet in fixtures.
pub const DEFENDER: PlayerId = PlayerId(2);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

// ============================================================================
// Planets
// ============================================================================

/// An empty, fully open planet owned by [`DEFENDER`].
#[must_use]
pub fn open_planet(width: u32, height: u32) -> Planet {
    Planet::new("Open Field", DEFENDER, Surface::new(width, height))
}

/// A 2x2 defensive tower carrying `guns` guns.
#[must_use]
pub fn tower(id: u32, origin: Cell, guns: u32) -> Building {
    let mut building = Building::new(BuildingId(id), BuildingKind::Defensive, Footprint::new(origin, 2, 2), 1000)
        .with_gun(GunProfile::default(), guns);
    building.name = format!("Tower {id}");
    building
}

/// A 3x3 colony hub.
#[must_use]
pub fn hub(id: u32, origin: Cell) -> Building {
    let mut building = Building::new(BuildingId(id), BuildingKind::Main, Footprint::new(origin, 3, 3), 2000);
    building.name = "Colony Hub".to_string();
    building
}

/// A 32x32 colony with a hub, two towers and a short wall.
#[must_use]
pub fn fortified_planet() -> Planet {
    let mut surface = Surface::new(32, 32);
    for y in 4..9 {
        surface.set_cell(Cell::new(20, y), CellType::Blocked);
    }
    for x in 10..13 {
        surface.set_cell(Cell::new(x, 24), CellType::Rough);
    }

    let mut planet = Planet::new("Fortress", DEFENDER, surface);
    planet.buildings.push(hub(1, Cell::new(14, 14)));
    planet.buildings.push(tower(2, Cell::new(9, 9), 2));
    planet.buildings.push(tower(3, Cell::new(21, 21), 2));
    planet
}

// ============================================================================
// Setups
// ============================================================================

/// Both sides deployed automatically with the given seed.
#[must_use]
pub fn auto_setup(attackers: &[UnitKind], defenders: &[UnitKind], seed: u64) -> BattleSetup {
    BattleSetup::new(
        Army::new(ATTACKER).with_units(attackers.iter().copied()),
        Army::new(DEFENDER).with_units(defenders.iter().copied()),
    )
    .with_config(BattleConfig::with_seed(seed))
}

/// Tuning where both sides may deploy on any open cell.
#[must_use]
pub fn sandbox_config(seed: u64) -> BattleConfig {
    BattleConfig {
        seed,
        attacker_band_depth: 512,
        defender_ring_depth: 64,
        open_field_zone_cap: usize::MAX,
        ..BattleConfig::default()
    }
}

/// A battle where both sides are placed by hand anywhere open.
///
/// The battle stays in [`BattlePhase::Preparing`] until
/// [`Battle::start`] is called.
#[must_use]
pub fn sandbox(planet: Planet, attackers: &[UnitKind], defenders: &[UnitKind], seed: u64) -> Battle {
    let setup = BattleSetup::new(
        Army::new(ATTACKER).with_units(attackers.iter().copied()).interactive(),
        Army::new(DEFENDER).with_units(defenders.iter().copied()).interactive(),
    )
    .with_config(sandbox_config(seed));
    Battle::initiate(planet, setup)
}

/// Deploy the first queued unit of `side` on `cell`.
///
/// # Panics
///
/// Panics if the deployment is rejected.
pub fn place(battle: &mut Battle, side: Side, cell: Cell) -> UnitId {
    match battle.deploy(side, 0, cell) {
        Ok(id) => id,
        Err(e) => panic!("Failed to deploy {side:?} at ({}, {}): {e}", cell.x, cell.y),
    }
}

/// Tick until the battle concludes or `max_ticks` have run.
///
/// Returns the number of ticks run.
pub fn run_to_conclusion(battle: &mut Battle, max_ticks: u64) -> u64 {
    let mut ticks = 0;
    while battle.phase() != BattlePhase::Concluded && ticks < max_ticks {
        battle.tick();
        ticks += 1;
    }
    ticks
}

// ============================================================================
// AI
// ============================================================================

/// Sends every idle unit of its side on an attack-move toward a cell.
#[derive(Debug, Clone, Copy)]
pub struct ChargeAi {
    target: Cell,
    interval: u64,
}

impl ChargeAi {
    /// Charge toward `target`, re-issuing orders every 20 ticks.
    #[must_use]
    pub const fn toward(target: Cell) -> Self {
        Self { target, interval: 20 }
    }

    fn charge(&self, side: Side, battle: &mut Battle) {
        let idle: Vec<UnitId> = battle
            .units_of(side)
            .into_iter()
            .filter(|u| u.order.is_none() && u.cell().chebyshev(self.target) > 1)
            .map(|u| u.id)
            .collect();
        for id in idle {
            battle.attack_move(id, self.target);
        }
    }
}

impl BattleAi for ChargeAi {
    fn battle_init(&mut self, side: Side, battle: &mut Battle) {
        self.charge(side, battle);
    }

    fn battle_tick(&mut self, side: Side, battle: &mut Battle) {
        if battle.tick_count() % self.interval.max(1) == 0 {
            self.charge(side, battle);
        }
    }
}

/// An attacker charging the planet center against a guarding garrison.
#[must_use]
pub fn assault(planet: Planet, attackers: &[UnitKind], defenders: &[UnitKind], seed: u64) -> Battle {
    let center = planet.surface.center();
    let setup = BattleSetup::new(
        Army::new(ATTACKER)
            .with_units(attackers.iter().copied())
            .with_ai(ChargeAi::toward(center)),
        Army::new(DEFENDER).with_units(defenders.iter().copied()),
    )
    .with_config(BattleConfig::with_seed(seed));
    Battle::initiate(planet, setup)
}
