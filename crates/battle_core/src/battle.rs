//! Battle lifecycle controller.
//!
//! A [`Battle`] owns everything a ground war needs: the planet it is fought
//! over, the entity registry, the path planner, the seeded RNG and the
//! statistics. It moves through four phases:
//!
//! 1. **Preparing** - guns are synthesized, inventories queued and
//!    non-interactive sides deployed automatically.
//! 2. **Active** - [`Battle::tick`] runs AI hooks and every system.
//! 3. **Concluding** - a winner is known; rockets and explosions play out.
//! 4. **Concluded** - conclusion effects have been applied to the planet.
//!
//! # System Execution Order
//!
//! Each active tick:
//! 1. **AI hooks** - attacker, then defender
//! 2. **Explosions** - animation, removal of dead units at half-life
//! 3. **Rockets** - flight, jamming, detonation
//! 4. **Mines** - triggering
//! 5. **Guns** - targeting and firing
//! 6. **Units** - abilities, orders, targeting and firing
//! 7. **Movement** - path planning and stepping
//! 8. **Victory check**

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ai::BattleAi;
use crate::buildings::{BuildingId, BuildingKind, Planet};
use crate::config::BattleConfig;
use crate::entities::{
    Explosion, Gun, GunId, Mine, Order, Registry, Rocket, RocketId, Target, Unit, UnitId,
};
use crate::error::{BattleError, Result};
use crate::grid::{Cell, PassabilityGrid};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathing::PathPlanner;
use crate::placement::{deployment_zones, placement_circle, ring_scan};
use crate::stats::{BattleInfo, BattleStats, PlayerId, Side};
use crate::units::{Ability, UnitKind, UnitTable};

/// Lifecycle phase of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BattlePhase {
    /// Units are being deployed.
    Preparing,
    /// The battle is being fought.
    Active,
    /// A winner is known; remaining effects play out.
    Concluding,
    /// Conclusion effects have been applied.
    Concluded,
}

/// Events generated during a battle tick.
///
/// Hosts use these to trigger effects and sounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Units whose hit points reached zero this tick.
    pub deaths: Vec<UnitId>,
    /// Dead units taken off the field this tick.
    pub removed: Vec<UnitId>,
    /// Buildings demolished this tick.
    pub buildings_destroyed: Vec<BuildingId>,
    /// Guns lost to building damage or demolition.
    pub guns_lost: Vec<GunId>,
    /// Cells whose mine went off.
    pub mines_triggered: Vec<Cell>,
    /// Rockets brought down by a jammer.
    pub rockets_jammed: Vec<RocketId>,
    /// Phase entered during this tick.
    pub phase_changed: Option<BattlePhase>,
}

// ============================================================================
// Setup
// ============================================================================

/// One side's contribution to a battle.
pub struct Army {
    /// Commanding player.
    pub player: PlayerId,
    /// Ground inventory, deployed in order.
    pub units: Vec<UnitKind>,
    /// Deployed by hand instead of automatically.
    pub interactive: bool,
    /// Computer player for this side.
    pub ai: Option<Box<dyn BattleAi>>,
}

impl Army {
    /// A non-interactive army with no units and no AI.
    #[must_use]
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            units: Vec::new(),
            interactive: false,
            ai: None,
        }
    }

    /// Append units to the inventory.
    #[must_use]
    pub fn with_units(mut self, kinds: impl IntoIterator<Item = UnitKind>) -> Self {
        self.units.extend(kinds);
        self
    }

    /// Deploy this army by hand.
    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Let a computer player command this army.
    #[must_use]
    pub fn with_ai(mut self, ai: impl BattleAi + 'static) -> Self {
        self.ai = Some(Box::new(ai));
        self
    }
}

impl fmt::Debug for Army {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Army")
            .field("player", &self.player)
            .field("units", &self.units)
            .field("interactive", &self.interactive)
            .field("ai", &self.ai.is_some())
            .finish()
    }
}

/// Everything needed to start a battle besides the planet.
#[derive(Debug)]
pub struct BattleSetup {
    /// Invading army.
    pub attacker: Army,
    /// Garrison of the planet.
    pub defender: Army,
    /// Simulation tuning.
    pub config: BattleConfig,
    /// Unit type data.
    pub table: UnitTable,
}

impl BattleSetup {
    /// Default tuning and the standard unit table.
    #[must_use]
    pub fn new(attacker: Army, defender: Army) -> Self {
        Self {
            attacker,
            defender,
            config: BattleConfig::default(),
            table: UnitTable::standard(),
        }
    }

    /// Replace the tuning.
    #[must_use]
    pub fn with_config(mut self, config: BattleConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the unit table.
    #[must_use]
    pub fn with_table(mut self, table: UnitTable) -> Self {
        self.table = table;
        self
    }
}

struct Participant {
    player: PlayerId,
    interactive: bool,
    queue: Vec<UnitKind>,
    ai: Option<Box<dyn BattleAi>>,
    stalled: bool,
}

impl From<Army> for Participant {
    fn from(army: Army) -> Self {
        Self {
            player: army.player,
            interactive: army.interactive,
            queue: army.units,
            ai: army.ai,
            stalled: false,
        }
    }
}

const fn slot(side: Side) -> usize {
    match side {
        Side::Attacker => 0,
        Side::Defender => 1,
    }
}

// ============================================================================
// Battle
// ============================================================================

/// A ground battle over one planet.
pub struct Battle {
    pub(crate) config: BattleConfig,
    pub(crate) table: UnitTable,
    pub(crate) planet: Planet,
    pub(crate) grid: PassabilityGrid,
    pub(crate) registry: Registry,
    pub(crate) planner: PathPlanner,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) stats: BattleStats,
    pub(crate) events: TickEvents,
    phase: BattlePhase,
    tick: u64,
    winner: Option<Side>,
    retreat: bool,
    participants: [Participant; 2],
}

impl fmt::Debug for Battle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battle")
            .field("planet", &self.planet.name)
            .field("phase", &self.phase)
            .field("tick", &self.tick)
            .field("winner", &self.winner)
            .field("units", &self.registry.unit_count())
            .finish_non_exhaustive()
    }
}

impl Battle {
    /// Set up a battle over `planet`.
    ///
    /// Guns are synthesized from operational defensive buildings, both
    /// inventories are queued and non-interactive sides deployed. When one
    /// side has nothing that can fight, the battle concludes immediately.
    /// When neither side is interactive the battle starts on its own.
    #[must_use]
    pub fn initiate(planet: Planet, setup: BattleSetup) -> Self {
        let BattleSetup {
            attacker,
            defender,
            config,
            table,
        } = setup;
        let grid = PassabilityGrid::build(&planet.surface, planet.footprints());
        let planner = PathPlanner::new(&grid);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut battle = Self {
            config,
            table,
            planet,
            grid,
            registry: Registry::new(),
            planner,
            rng,
            stats: BattleStats::default(),
            events: TickEvents::default(),
            phase: BattlePhase::Preparing,
            tick: 0,
            winner: None,
            retreat: false,
            participants: [attacker.into(), defender.into()],
        };
        battle.spawn_guns();

        let combatants = |side: Side, battle: &Self| {
            battle.participants[slot(side)]
                .queue
                .iter()
                .filter(|&&kind| battle.table.get(kind).is_combatant())
                .count()
        };
        let decided = if combatants(Side::Attacker, &battle) == 0 {
            Some(Side::Defender)
        } else if combatants(Side::Defender, &battle) == 0 && battle.registry.guns().is_empty() {
            Some(Side::Attacker)
        } else {
            None
        };
        if let Some(winner) = decided {
            info!(planet = %battle.planet.name, ?winner, "No ground combat needed");
            battle.winner = Some(winner);
            battle.conclude();
            return battle;
        }

        for side in Side::BOTH {
            let participant = &battle.participants[slot(side)];
            if participant.interactive {
                continue;
            }
            let deployed = battle.deploy_queue(side).unwrap_or(0);
            let participant = &mut battle.participants[slot(side)];
            if !participant.queue.is_empty() {
                participant.stalled = true;
                debug!(?side, deployed, waiting = participant.queue.len(), "Deployment stalled");
            }
        }

        if battle.participants.iter().all(|p| !p.interactive) {
            battle.activate();
        }
        battle
    }

    fn spawn_guns(&mut self) {
        let mut mounts = Vec::new();
        for building in &self.planet.buildings {
            if building.kind != BuildingKind::Defensive || !building.is_operational() {
                continue;
            }
            let Some(profile) = building.gun.clone() else {
                continue;
            };
            let cells: Vec<Cell> = building.footprint.cells().collect();
            if cells.is_empty() {
                continue;
            }
            let count = building.gun_count();
            for index in 0..count {
                mounts.push(Gun {
                    id: GunId(0),
                    building: building.id,
                    position: Vec2Fixed::from_cell(cells[index as usize % cells.len()]),
                    index,
                    count,
                    heading: Fixed::ZERO,
                    engaged: None,
                    fire: Default::default(),
                    profile: profile.clone(),
                });
            }
        }
        mounts.sort_by_key(|g| (g.building, g.index));
        for gun in mounts {
            self.registry.insert_gun(gun);
        }
        debug!(guns = self.registry.guns().len(), "Guns mounted");
    }

    fn require_phase(&self, expected: BattlePhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(BattleError::InvalidPhase {
                expected,
                found: self.phase,
            })
        }
    }

    // ========================================================================
    // Deployment
    // ========================================================================

    /// Free cells a side may currently deploy on.
    #[must_use]
    pub fn placement_options(&self, side: Side) -> BTreeSet<Cell> {
        let mut zone = deployment_zones(
            &self.planet.surface,
            &self.grid,
            &self.planet.buildings,
            side == Side::Defender,
            self.config.skip_outer_edge,
            &self.config,
        );
        zone.retain(|&cell| !self.planner.is_claimed(cell));
        zone
    }

    /// Units of a side still waiting to be deployed.
    #[must_use]
    pub fn deployment_queue(&self, side: Side) -> &[UnitKind] {
        &self.participants[slot(side)].queue
    }

    /// Place queued unit `index` of an interactive side on `cell`.
    pub fn deploy(&mut self, side: Side, index: usize, cell: Cell) -> Result<UnitId> {
        self.require_phase(BattlePhase::Preparing)?;
        let participant = &self.participants[slot(side)];
        if !participant.interactive {
            return Err(BattleError::NotInteractive(side));
        }
        if index >= participant.queue.len() {
            return Err(BattleError::UnknownQueueEntry { side, index });
        }
        if !self.placement_options(side).contains(&cell) {
            return Err(BattleError::CellNotDeployable { side, cell });
        }
        let kind = self.participants[slot(side)].queue.remove(index);
        Ok(self.spawn_unit(side, kind, cell))
    }

    /// Deploy every queued unit of a side by ring scan.
    ///
    /// Returns the number of units placed. Units that find no room stay
    /// queued.
    pub fn auto_deploy(&mut self, side: Side) -> Result<usize> {
        self.require_phase(BattlePhase::Preparing)?;
        self.deploy_queue(side)
    }

    fn deploy_queue(&mut self, side: Side) -> Result<usize> {
        let waiting = self.participants[slot(side)].queue.len();
        if waiting == 0 {
            return Ok(0);
        }
        let zone = self.placement_options(side);
        let Some(circle) = placement_circle(&zone) else {
            return Err(BattleError::InsufficientDeploymentRoom(side));
        };
        let planner = &self.planner;
        let cells = ring_scan(circle.center, circle.radius + 1, &zone, waiting, |cell| {
            !planner.is_claimed(cell)
        });
        if cells.is_empty() {
            return Err(BattleError::InsufficientDeploymentRoom(side));
        }

        let kinds: Vec<UnitKind> = self.participants[slot(side)].queue.drain(..cells.len()).collect();
        for (kind, cell) in kinds.into_iter().zip(&cells) {
            self.spawn_unit(side, kind, *cell);
        }
        debug!(?side, placed = cells.len(), "Auto deployment");
        Ok(cells.len())
    }

    fn spawn_unit(&mut self, side: Side, kind: UnitKind, cell: Cell) -> UnitId {
        let player = self.participants[slot(side)].player;
        let unit = Unit::new(side, player, self.table.get(kind), cell);
        let id = self.registry.insert_unit(unit);
        if let Some(unit) = self.registry.unit(id) {
            self.planner.register(unit);
        }
        debug!(unit = id.0, ?kind, ?side, x = cell.x, y = cell.y, "Unit deployed");
        id
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Begin the fight.
    pub fn start(&mut self) -> Result<()> {
        self.require_phase(BattlePhase::Preparing)?;
        self.activate();
        Ok(())
    }

    fn activate(&mut self) {
        self.phase = BattlePhase::Active;
        info!(
            planet = %self.planet.name,
            attackers = self.registry.units().iter().filter(|u| u.side == Side::Attacker).count(),
            defenders = self.registry.units().iter().filter(|u| u.side == Side::Defender).count(),
            guns = self.registry.guns().len(),
            "Battle started"
        );
        for side in Side::BOTH {
            if let Some(mut ai) = self.participants[slot(side)].ai.take() {
                ai.battle_init(side, self);
                self.participants[slot(side)].ai = Some(ai);
            }
        }
    }

    /// Advance the battle by one tick.
    ///
    /// Does nothing while preparing or after conclusion.
    pub fn tick(&mut self) -> TickEvents {
        if matches!(self.phase, BattlePhase::Preparing | BattlePhase::Concluded) {
            return TickEvents::default();
        }
        self.events = TickEvents::default();
        let active = self.phase == BattlePhase::Active;

        if active {
            for side in Side::BOTH {
                if let Some(mut ai) = self.participants[slot(side)].ai.take() {
                    ai.battle_tick(side, self);
                    self.participants[slot(side)].ai = Some(ai);
                }
            }
        }

        self.run_explosion_system();
        self.run_rocket_system();

        if active {
            self.run_mine_system();
            self.run_gun_system();
            self.run_unit_system();
            self.planner.tick(
                &mut self.registry,
                &self.table,
                &self.grid,
                self.config.repath_after_blocked,
            );

            if let Some(winner) = self.check_winner() {
                self.winner = Some(winner);
                self.phase = BattlePhase::Concluding;
                self.events.phase_changed = Some(BattlePhase::Concluding);
                info!(tick = self.tick, ?winner, "Battle decided");
            }
        }

        if self.phase == BattlePhase::Concluding && !self.registry.has_pending_effects() {
            self.conclude();
        }

        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Battle state hash");
        }

        std::mem::take(&mut self.events)
    }

    /// Living combat units per side, `[attacker, defender]`.
    fn combat_units(&self) -> [usize; 2] {
        let mut counts = [0, 0];
        for unit in self.registry.units() {
            if unit.is_alive() && self.table.get(unit.kind).is_combatant() {
                counts[slot(unit.side)] += 1;
            }
        }
        counts
    }

    /// Winner, if the battle is decided.
    ///
    /// A retreat hands victory to the defender. Otherwise a side without
    /// combat units loses; guns fight for the defender.
    #[must_use]
    pub fn check_winner(&self) -> Option<Side> {
        if self.retreat {
            return Some(Side::Defender);
        }
        let [attackers, defenders] = self.combat_units();
        if attackers == 0 {
            Some(Side::Defender)
        } else if defenders + self.registry.guns().len() == 0 {
            Some(Side::Attacker)
        } else {
            None
        }
    }

    fn conclude(&mut self) {
        let winner = self.winner.unwrap_or(Side::Defender);
        match winner {
            Side::Attacker => {
                let conqueror = self.participants[slot(Side::Attacker)].player;
                debug!(from = self.planet.owner.0, to = conqueror.0, "Planet changes hands");
                self.planet.owner = conqueror;
            }
            Side::Defender => {
                self.planet.defense_bonus += self.config.defense_bonus_on_victory;
            }
        }
        self.planet.roads_need_rebuild = true;
        self.phase = BattlePhase::Concluded;
        self.events.phase_changed = Some(BattlePhase::Concluded);

        info!(
            planet = %self.planet.name,
            ?winner,
            ticks = self.tick,
            attacker_losses = self.stats.attacker.units_lost,
            defender_losses = self.stats.defender.units_lost,
            buildings_lost = self.stats.defender.buildings_lost,
            "Battle concluded"
        );

        for side in Side::BOTH {
            if let Some(mut ai) = self.participants[slot(side)].ai.take() {
                ai.battle_done(side, self);
                self.participants[slot(side)].ai = Some(ai);
            }
        }
    }

    /// Give the planet back to the host.
    #[must_use]
    pub fn into_planet(self) -> Planet {
        self.planet
    }
}

// ============================================================================
// Orders
// ============================================================================

impl Battle {
    /// A living unit that can take orders right now.
    fn commandable(&mut self, id: UnitId) -> Option<&mut Unit> {
        if self.phase != BattlePhase::Active {
            debug!(unit = id.0, phase = ?self.phase, "Order outside active phase ignored");
            return None;
        }
        let unit = self.registry.unit_mut(id).filter(|u| u.is_alive());
        if unit.is_none() {
            debug!(unit = id.0, "Order for unknown or dead unit ignored");
        }
        unit
    }

    fn begin_travel(&mut self, id: UnitId, order: Order, cell: Cell) {
        let Some(unit) = self.commandable(id) else {
            return;
        };
        unit.order = Some(order);
        unit.engaged = None;
        unit.guard = false;
        unit.fire.reset_windup();
        // Reborrow around the planner.
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        self.planner.forget_unreachable(unit);
        self.planner.set_goal(unit, cell);
    }

    /// Walk to a cell without engaging.
    pub fn move_unit(&mut self, id: UnitId, cell: Cell) {
        self.begin_travel(id, Order::MoveTo(cell), cell);
    }

    /// Walk to a cell, engaging enemies met on the way.
    pub fn attack_move(&mut self, id: UnitId, cell: Cell) {
        self.begin_travel(id, Order::AttackMove(cell), cell);
    }

    fn begin_attack(&mut self, id: UnitId, target: Target) {
        let Some(unit) = self.commandable(id) else {
            return;
        };
        let (side, kind) = (unit.side, unit.kind);
        if !self.table.get(kind).can_attack() {
            debug!(unit = id.0, "Unit cannot attack");
            return;
        }
        if !self.target_valid(side, target) {
            debug!(unit = id.0, ?target, "Invalid attack target ignored");
            return;
        }
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        unit.order = Some(match target {
            Target::Unit(t) => Order::AttackUnit(t),
            Target::Building(b) => Order::AttackBuilding(b),
        });
        unit.engaged = None;
        unit.guard = false;
        unit.fire.reset_windup();
        self.planner.clear_goal(unit);
        self.planner.forget_unreachable(unit);
    }

    /// Chase and destroy an enemy unit.
    pub fn attack_unit(&mut self, id: UnitId, target: UnitId) {
        self.begin_attack(id, Target::Unit(target));
    }

    /// Approach and demolish a building. Attackers only.
    pub fn attack_building(&mut self, id: UnitId, building: BuildingId) {
        self.begin_attack(id, Target::Building(building));
    }

    /// Drop the current order and guard in place.
    ///
    /// A step in progress is completed. Stopping a stopped unit changes
    /// nothing.
    pub fn stop(&mut self, id: UnitId) {
        let Some(unit) = self.commandable(id) else {
            return;
        };
        unit.order = None;
        unit.engaged = None;
        unit.guard = true;
        unit.fire.reset_windup();
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        self.planner.clear_goal(unit);
    }

    /// Make a gun drop its target.
    pub fn stop_gun(&mut self, id: GunId) {
        if let Some(gun) = self.registry.gun_mut(id) {
            gun.engaged = None;
            gun.fire.reset_windup();
        }
    }

    /// Point a gun at a specific attacker.
    pub fn gun_attack(&mut self, id: GunId, target: UnitId) {
        if !self.target_valid(Side::Defender, Target::Unit(target)) {
            debug!(gun = id.0, target = target.0, "Invalid gun target ignored");
            return;
        }
        if let Some(gun) = self.registry.gun_mut(id) {
            if gun.engaged != Some(target) {
                gun.fire.reset_windup();
            }
            gun.engaged = Some(target);
        }
    }

    /// Trigger a unit's special action (kamikaze detonation).
    pub fn special(&mut self, id: UnitId) {
        let Some(unit) = self.commandable(id) else {
            return;
        };
        if unit.is_paralyzed() {
            return;
        }
        let kind = unit.kind;
        match self.table.get(kind).ability {
            Ability::Kamikaze => self.self_destruct(id),
            ability => debug!(unit = id.0, ?ability, "No special action"),
        }
    }

    /// Order (or cancel) the attacker's retreat; a retreat ends the battle
    /// in the defender's favor.
    pub fn set_retreat(&mut self, retreat: bool) {
        if self.phase != BattlePhase::Active {
            return;
        }
        if retreat != self.retreat {
            info!(retreat, "Attacker retreat toggled");
        }
        self.retreat = retreat;
    }

    /// Mark a unit as selected in the host UI.
    pub fn set_selected(&mut self, id: UnitId, selected: bool) {
        if let Some(unit) = self.registry.unit_mut(id) {
            unit.selected = selected;
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

impl Battle {
    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Winner once decided.
    #[must_use]
    pub const fn winner(&self) -> Option<Side> {
        self.winner
    }

    /// Attacker ordered a retreat.
    #[must_use]
    pub const fn is_retreating(&self) -> bool {
        self.retreat
    }

    /// Tuning in use.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Unit data in use.
    #[must_use]
    pub const fn table(&self) -> &UnitTable {
        &self.table
    }

    /// The planet being fought over.
    #[must_use]
    pub const fn planet(&self) -> &Planet {
        &self.planet
    }

    /// Static passability.
    #[must_use]
    pub const fn grid(&self) -> &PassabilityGrid {
        &self.grid
    }

    /// Path planner state (goals, claims, field cache).
    #[must_use]
    pub const fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    /// Accumulated counters.
    #[must_use]
    pub const fn stats(&self) -> &BattleStats {
        &self.stats
    }

    /// Commanding player of a side.
    #[must_use]
    pub const fn player(&self, side: Side) -> PlayerId {
        self.participants[slot(side)].player
    }

    /// Sides whose automatic deployment ran out of room.
    #[must_use]
    pub fn stalled_sides(&self) -> Vec<Side> {
        Side::BOTH
            .into_iter()
            .filter(|&side| self.participants[slot(side)].stalled)
            .collect()
    }

    /// The battle RNG, for AI decisions that must stay deterministic.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// All units in id order, including dead ones awaiting removal.
    #[must_use]
    pub fn units(&self) -> Vec<&Unit> {
        self.registry.units()
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.registry.unit(id)
    }

    /// Living units of one side in id order.
    #[must_use]
    pub fn units_of(&self, side: Side) -> Vec<&Unit> {
        self.registry
            .units()
            .into_iter()
            .filter(|u| u.side == side && u.is_alive())
            .collect()
    }

    /// Guns in id order.
    #[must_use]
    pub fn guns(&self) -> Vec<&Gun> {
        self.registry.guns()
    }

    /// Look up a gun.
    #[must_use]
    pub fn gun(&self, id: GunId) -> Option<&Gun> {
        self.registry.gun(id)
    }

    /// Planted mines in cell order.
    pub fn mines(&self) -> impl Iterator<Item = &Mine> {
        self.registry.mines()
    }

    /// Rockets in flight.
    #[must_use]
    pub fn rockets(&self) -> Vec<&Rocket> {
        self.registry.rockets()
    }

    /// Running explosions.
    #[must_use]
    pub fn explosions(&self) -> Vec<&Explosion> {
        self.registry.explosions()
    }

    /// Statically open and neither held nor reserved by a unit.
    #[must_use]
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.grid.is_open(cell) && !self.planner.is_claimed(cell)
    }

    /// A mine lies on the cell.
    #[must_use]
    pub fn has_mine(&self, cell: Cell) -> bool {
        self.registry.mine_at(cell).is_some()
    }

    /// Snapshot for the host.
    #[must_use]
    pub fn battle_info(&self) -> BattleInfo {
        BattleInfo {
            attacker: self.player(Side::Attacker),
            defender: self.player(Side::Defender),
            phase: self.phase,
            tick: self.tick,
            winner: self.winner,
            retreat: self.retreat,
            combat_units: self.combat_units(),
            guns: self.registry.guns().len(),
            stats: self.stats,
        }
    }

    /// Calculate a hash of the battle state.
    ///
    /// Two battles run from the same setup and seed produce identical hashes
    /// at every tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.phase.hash(&mut hasher);
        self.winner.hash(&mut hasher);

        let units = self.registry.units();
        units.len().hash(&mut hasher);
        for unit in units {
            unit.id.hash(&mut hasher);
            unit.position.hash(&mut hasher);
            unit.heading.to_bits().hash(&mut hasher);
            unit.hp.hash(&mut hasher);
            unit.fire.hash(&mut hasher);
            unit.paralyzed_ttl.hash(&mut hasher);
            unit.order.hash(&mut hasher);
            unit.engaged.hash(&mut hasher);
            unit.cell().hash(&mut hasher);
            unit.reserved().hash(&mut hasher);
        }

        for gun in self.registry.guns() {
            gun.id.hash(&mut hasher);
            gun.heading.to_bits().hash(&mut hasher);
            gun.engaged.hash(&mut hasher);
            gun.fire.hash(&mut hasher);
        }

        for mine in self.registry.mines() {
            mine.hash(&mut hasher);
        }

        for rocket in self.registry.rockets() {
            rocket.id.hash(&mut hasher);
            rocket.position.hash(&mut hasher);
            rocket.target.hash(&mut hasher);
        }

        for explosion in self.registry.explosions() {
            explosion.id.hash(&mut hasher);
            explosion.phase.hash(&mut hasher);
            explosion.kill_target.hash(&mut hasher);
        }

        for building in &self.planet.buildings {
            building.id.hash(&mut hasher);
            building.hp.hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::{Building, GunProfile};
    use crate::grid::{Footprint, Surface};

    fn open_planet(size: u32) -> Planet {
        Planet::new("Test", PlayerId(2), Surface::new(size, size))
    }

    fn armies(attackers: Vec<UnitKind>, defenders: Vec<UnitKind>) -> BattleSetup {
        BattleSetup::new(
            Army::new(PlayerId(1)).with_units(attackers),
            Army::new(PlayerId(2)).with_units(defenders),
        )
    }

    #[test]
    fn test_no_attackers_concludes_for_defender() {
        let battle = Battle::initiate(open_planet(16), armies(vec![], vec![UnitKind::Tank]));
        assert_eq!(battle.phase(), BattlePhase::Concluded);
        assert_eq!(battle.winner(), Some(Side::Defender));
        assert_eq!(battle.planet().defense_bonus, 1);
        assert!(battle.planet().roads_need_rebuild);
    }

    #[test]
    fn test_radar_only_garrison_concludes_for_attacker() {
        let battle = Battle::initiate(
            open_planet(16),
            armies(vec![UnitKind::Tank], vec![UnitKind::Radar]),
        );
        assert_eq!(battle.phase(), BattlePhase::Concluded);
        assert_eq!(battle.winner(), Some(Side::Attacker));
        assert_eq!(battle.into_planet().owner, PlayerId(1));
    }

    #[test]
    fn test_guns_count_as_defenders() {
        let mut planet = open_planet(20);
        planet.buildings.push(
            Building::new(
                BuildingId(1),
                BuildingKind::Defensive,
                Footprint::new(Cell::new(9, 9), 2, 2),
                800,
            )
            .with_gun(GunProfile::default(), 3),
        );
        let battle = Battle::initiate(planet, armies(vec![UnitKind::Tank], vec![]));

        assert_eq!(battle.phase(), BattlePhase::Active);
        assert_eq!(battle.guns().len(), 3);
        let indexes: Vec<u32> = battle.guns().iter().map(|g| g.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(battle.guns().iter().all(|g| g.count == 3));
    }

    #[test]
    fn test_auto_start_and_deploy() {
        let mut battle = Battle::initiate(
            open_planet(16),
            armies(vec![UnitKind::Tank; 3], vec![UnitKind::Tank; 2]),
        );
        assert_eq!(battle.phase(), BattlePhase::Active);
        assert_eq!(battle.units_of(Side::Attacker).len(), 3);
        assert_eq!(battle.units_of(Side::Defender).len(), 2);
        assert!(battle.stalled_sides().is_empty());
        assert!(battle.deployment_queue(Side::Attacker).is_empty());

        for unit in battle.units() {
            assert!(!battle.is_passable(unit.cell()));
        }
        assert!(matches!(
            battle.start(),
            Err(BattleError::InvalidPhase {
                expected: BattlePhase::Preparing,
                found: BattlePhase::Active,
            })
        ));
    }

    #[test]
    fn test_interactive_side_waits_for_start() {
        let setup = BattleSetup::new(
            Army::new(PlayerId(1)).with_units([UnitKind::Tank]).interactive(),
            Army::new(PlayerId(2)).with_units([UnitKind::Tank]),
        );
        let mut battle = Battle::initiate(open_planet(16), setup);
        assert_eq!(battle.phase(), BattlePhase::Preparing);
        assert_eq!(battle.tick(), TickEvents::default());
        assert_eq!(battle.tick_count(), 0);

        let err = battle.deploy(Side::Defender, 0, Cell::new(0, 0)).unwrap_err();
        assert!(matches!(err, BattleError::NotInteractive(Side::Defender)));
        let err = battle.deploy(Side::Attacker, 5, Cell::new(0, 0)).unwrap_err();
        assert!(matches!(err, BattleError::UnknownQueueEntry { index: 5, .. }));
        let err = battle.deploy(Side::Attacker, 0, Cell::new(8, 8)).unwrap_err();
        assert!(matches!(err, BattleError::CellNotDeployable { .. }));

        let id = battle.deploy(Side::Attacker, 0, Cell::new(0, 0)).unwrap();
        assert_eq!(battle.unit(id).map(Unit::cell), Some(Cell::new(0, 0)));
        assert!(battle.deployment_queue(Side::Attacker).is_empty());

        battle.start().unwrap();
        assert_eq!(battle.phase(), BattlePhase::Active);
        assert!(matches!(
            battle.start(),
            Err(BattleError::InvalidPhase {
                expected: BattlePhase::Preparing,
                found: BattlePhase::Active
            })
        ));
    }

    #[test]
    fn test_retreat_hands_victory_to_defender() {
        let mut battle = Battle::initiate(
            open_planet(24),
            armies(vec![UnitKind::Tank], vec![UnitKind::Tank]),
        );
        battle.set_retreat(true);
        let events = battle.tick();
        assert_eq!(events.phase_changed, Some(BattlePhase::Concluded));
        assert_eq!(battle.winner(), Some(Side::Defender));
        assert_eq!(battle.planet().owner, PlayerId(2));

        let info = battle.battle_info();
        assert!(info.retreat);
        assert_eq!(info.phase, BattlePhase::Concluded);
        assert_eq!(info.combat_units, [1, 1]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut battle = Battle::initiate(
            open_planet(24),
            armies(vec![UnitKind::Tank], vec![UnitKind::Tank]),
        );
        let id = battle.units_of(Side::Attacker)[0].id;
        battle.stop(id);
        let once = battle.unit(id).cloned();
        let hash = battle.state_hash();
        battle.stop(id);
        assert_eq!(battle.unit(id).cloned(), once);
        assert_eq!(battle.state_hash(), hash);
    }

    #[test]
    fn test_orders_against_own_side_are_ignored() {
        let mut battle = Battle::initiate(
            open_planet(24),
            armies(vec![UnitKind::Tank; 2], vec![UnitKind::Tank]),
        );
        let ids: Vec<UnitId> = battle.units_of(Side::Attacker).iter().map(|u| u.id).collect();
        battle.attack_unit(ids[0], ids[1]);
        assert_eq!(battle.unit(ids[0]).and_then(|u| u.order), None);

        battle.attack_unit(ids[0], UnitId(999));
        assert_eq!(battle.unit(ids[0]).and_then(|u| u.order), None);
    }
}
