//! Targeting and combat resolution.
//!
//! Units and guns share one firing state machine ([`FireState`]): while the
//! cooldown runs nothing happens; once ready and facing an in-range target,
//! the weapon winds up one phase per tick and resolves at the type's last
//! phase, then re-arms its cooldown.
//!
//! What a resolved shot does depends on the shooter's [`Ability`] tag and is
//! decided in [`Battle::resolve_shot`] only.
//!
//! All damage math uses integers or fixed-point numbers for deterministic
//! simulation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::battle::Battle;
use crate::buildings::{BuildingId, BuildingKind};
use crate::entities::{Explosion, ExplosionId, GunId, Order, Target, UnitId};
use crate::grid::{Cell, DIRECTIONS};
use crate::math::{Fixed, Vec2Fixed};
use crate::pathing::{turn_toward, PathPlanner};
use crate::stats::Side;
use crate::units::{Ability, UnitSpec};

/// Cooldown and windup counters of a weapon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FireState {
    /// Ticks until the weapon may start a new shot.
    pub cooldown: u32,
    /// Windup phases completed for the current shot.
    pub phase: u32,
}

impl FireState {
    /// Count the cooldown down by one tick.
    pub fn cool_down(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    /// Cooldown finished.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.cooldown == 0
    }

    /// Abandon the shot being wound up.
    pub fn reset_windup(&mut self) {
        self.phase = 0;
    }

    /// Advance the windup by one phase.
    ///
    /// Returns `true` when the shot resolves; the windup is then reset and
    /// the cooldown armed.
    pub fn wind_up(&mut self, fire_phases: u32, cooldown: u32) -> bool {
        self.phase += 1;
        if self.phase < fire_phases.max(1) {
            return false;
        }
        self.phase = 0;
        self.cooldown = cooldown;
        true
    }
}

/// Firing band test: `min <= distance < max`.
#[must_use]
pub fn in_range(distance: Fixed, min_range: Fixed, max_range: Fixed) -> bool {
    distance >= min_range && distance < max_range
}

/// Area damage at `distance` from the impact point: linear falloff to zero
/// at `radius`.
#[must_use]
pub fn area_falloff(damage: u32, distance: Fixed, radius: Fixed) -> u32 {
    if radius <= Fixed::ZERO || distance >= radius {
        return 0;
    }
    let scaled = Fixed::from_num(damage) * (radius - distance) / radius;
    scaled.to_num::<u32>()
}

fn pick<T: Copy>(rng: &mut impl Rng, candidates: &[T]) -> Option<T> {
    match candidates.len() {
        0 => None,
        1 => Some(candidates[0]),
        n => Some(candidates[rng.gen_range(0..n)]),
    }
}

/// Keep only the candidates at the smallest distance seen so far.
fn consider<T>(best: &mut Vec<T>, best_distance: &mut Option<Fixed>, candidate: T, distance: Fixed) {
    match *best_distance {
        Some(d) if distance > d => {}
        Some(d) if distance == d => best.push(candidate),
        _ => {
            best.clear();
            best.push(candidate);
            *best_distance = Some(distance);
        }
    }
}

// ============================================================================
// Damage application
// ============================================================================

impl Battle {
    /// Spawn an explosion animation.
    pub(crate) fn spawn_explosion(&mut self, position: Vec2Fixed, kill_target: Option<UnitId>) -> ExplosionId {
        self.registry.insert_explosion(Explosion {
            id: ExplosionId(0),
            position,
            phase: 0,
            kill_target,
        })
    }

    /// Reduce a unit's hit points, killing it at zero.
    pub(crate) fn damage_unit(&mut self, id: UnitId, amount: u32) {
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        if !unit.is_alive() || amount == 0 {
            return;
        }
        let remaining = unit.hp.saturating_sub(amount);
        trace!(unit = id.0, amount, hp = remaining, "Unit damaged");
        if remaining == 0 {
            self.kill_unit(id);
        } else {
            unit.hp = remaining;
        }
    }

    /// Force a living unit's hit points to zero and start its death
    /// explosion.
    ///
    /// The unit stays in the registry until the explosion reaches its
    /// half-life.
    pub(crate) fn kill_unit(&mut self, id: UnitId) {
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        unit.hp = 0;
        unit.order = None;
        unit.engaged = None;
        unit.guard = false;
        unit.fire.reset_windup();
        let (side, position) = (unit.side, unit.position);
        self.planner.clear_goal(unit);

        self.stats.record_unit_loss(side);
        self.events.deaths.push(id);
        self.spawn_explosion(position, Some(id));
        debug!(unit = id.0, ?side, "Unit destroyed");
    }

    /// Apply raw weapon damage to a building.
    pub(crate) fn damage_building(&mut self, id: BuildingId, amount: u32) {
        let Some(building) = self.planet.building_mut(id) else {
            return;
        };
        let result = building.apply_damage(amount);
        let defensive = building.kind == BuildingKind::Defensive;
        trace!(building = id.0, applied = result.applied, hp = building.hp, "Building damaged");

        if result.crossed_half && defensive && !result.destroyed {
            let guns = self.registry.guns_of(id);
            let lost = guns.len() / 2;
            // Highest firing indexes go first.
            for gun in guns.iter().rev().take(lost) {
                self.remove_gun(*gun);
            }
            debug!(building = id.0, lost, "Building below half health, guns lost");
        }
        if result.destroyed {
            self.demolish_building(id);
        }
    }

    fn remove_gun(&mut self, id: GunId) {
        if self.registry.remove_gun(id).is_some() {
            self.stats.defender.guns_lost += 1;
            self.events.guns_lost.push(id);
        }
    }

    fn demolish_building(&mut self, id: BuildingId) {
        for gun in self.registry.guns_of(id) {
            self.remove_gun(gun);
        }
        let Some(index) = self.planet.buildings.iter().position(|b| b.id == id) else {
            return;
        };
        let building = self.planet.buildings.remove(index);
        self.grid.rebuild(&self.planet.surface, self.planet.footprints());

        self.stats.record_building_loss();
        self.events.buildings_destroyed.push(id);
        self.spawn_explosion(building.center(), None);
        debug!(building = id.0, name = %building.name, "Building demolished");
    }

    /// Linear-falloff damage around `center`, sparing `excluded`.
    ///
    /// Buildings are hit by footprint distance and belong to the defender.
    pub fn damage_area(&mut self, center: Vec2Fixed, damage: u32, radius: Fixed, excluded: Option<Side>) {
        for id in self.registry.sorted_unit_ids() {
            let Some(unit) = self.registry.unit(id) else {
                continue;
            };
            if !unit.is_alive() || Some(unit.side) == excluded {
                continue;
            }
            let amount = area_falloff(damage, unit.position.distance(center), radius);
            self.damage_unit(id, amount);
        }

        if excluded == Some(Side::Defender) {
            return;
        }
        let mut hits: Vec<(BuildingId, u32)> = self
            .planet
            .buildings
            .iter()
            .filter(|b| !b.is_destroyed())
            .map(|b| (b.id, area_falloff(damage, b.distance_to(center), radius)))
            .filter(|&(_, amount)| amount > 0)
            .collect();
        hits.sort_unstable();
        for (id, amount) in hits {
            self.damage_building(id, amount);
        }
    }

    /// Disable a unit for the configured time.
    ///
    /// Units the victim was paralysing are released.
    pub(crate) fn paralyze(&mut self, victim: UnitId, by: UnitId) {
        let ttl = self.config.paralysis_ttl;
        let Some(unit) = self.registry.unit_mut(victim) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        unit.paralyzed_ttl = ttl;
        unit.paralyzed_by = Some(by);
        unit.fire.reset_windup();

        for id in self.registry.sorted_unit_ids() {
            if let Some(unit) = self.registry.unit_mut(id) {
                if unit.paralyzed_by == Some(victim) {
                    unit.paralyzed_ttl = 0;
                    unit.paralyzed_by = None;
                }
            }
        }
        debug!(victim = victim.0, by = by.0, ttl, "Unit paralysed");
    }

    /// Detonate a kamikaze unit: area damage around it, then death.
    pub(crate) fn self_destruct(&mut self, id: UnitId) {
        let Some(unit) = self.registry.unit(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        let (position, side) = (unit.position, unit.side);
        let spec = *self.table.get(unit.kind);
        debug!(unit = id.0, "Self-destruct");
        self.damage_area(position, spec.damage, spec.area, Some(side));
        self.kill_unit(id);
    }

    fn hit(&mut self, target: Target, amount: u32) {
        match target {
            Target::Unit(id) => self.damage_unit(id, amount),
            Target::Building(id) => self.damage_building(id, amount),
        }
    }

    /// Apply the effect of a completed windup.
    pub(crate) fn resolve_shot(&mut self, shooter: UnitId, target: Target, aim: Vec2Fixed, spec: &UnitSpec) {
        let Some(unit) = self.registry.unit(shooter) else {
            return;
        };
        let (side, origin) = (unit.side, unit.position);
        trace!(unit = shooter.0, ?target, ability = ?spec.ability, "Shot resolved");

        match spec.ability {
            Ability::AreaDamage => self.damage_area(aim, spec.damage, spec.area, Some(side)),
            Ability::Rocket => self.launch_rocket(side, origin, aim, spec),
            Ability::Kamikaze => self.self_destruct(shooter),
            Ability::Paralyze => {
                self.hit(target, spec.damage);
                if let Target::Unit(victim) = target {
                    self.paralyze(victim, shooter);
                }
            }
            _ => self.hit(target, spec.damage),
        }
    }
}

// ============================================================================
// Targeting
// ============================================================================

impl Battle {
    /// Whether a target still exists and may be shot by `side`.
    pub(crate) fn target_valid(&self, side: Side, target: Target) -> bool {
        match target {
            Target::Unit(id) => self
                .registry
                .unit(id)
                .is_some_and(|u| u.is_alive() && u.side != side),
            Target::Building(id) => {
                side == Side::Attacker && self.planet.building(id).is_some_and(|b| !b.is_destroyed())
            }
        }
    }

    /// Aim point and range-relevant distance of a target.
    pub(crate) fn target_geometry(&self, from: Vec2Fixed, target: Target) -> Option<(Vec2Fixed, Fixed)> {
        match target {
            Target::Unit(id) => self
                .registry
                .unit(id)
                .map(|u| (u.position, from.distance(u.position))),
            Target::Building(id) => self
                .planet
                .building(id)
                .map(|b| (b.center(), b.distance_to(from))),
        }
    }

    /// Nearest enemy in the firing band; ties broken by the battle RNG.
    pub(crate) fn acquire_target(&mut self, side: Side, position: Vec2Fixed, spec: &UnitSpec) -> Option<Target> {
        let mut best = Vec::new();
        let mut best_distance = None;
        for unit in self.registry.units() {
            if !unit.is_alive() || unit.side == side {
                continue;
            }
            if spec.ability == Ability::Paralyze && unit.is_paralyzed() {
                continue;
            }
            let distance = position.distance(unit.position);
            if in_range(distance, spec.min_range, spec.max_range) {
                consider(&mut best, &mut best_distance, Target::Unit(unit.id), distance);
            }
        }

        if best.is_empty() && side == Side::Attacker {
            let mut buildings: Vec<_> = self.planet.buildings.iter().filter(|b| !b.is_destroyed()).collect();
            buildings.sort_by_key(|b| b.id);
            for building in buildings {
                let distance = building.distance_to(position);
                if in_range(distance, spec.min_range, spec.max_range) {
                    consider(&mut best, &mut best_distance, Target::Building(building.id), distance);
                }
            }
        }

        pick(&mut self.rng, &best)
    }

    /// Open neighbor of `prey` nearest to `from`, preferring cells no other
    /// unit holds.
    pub(crate) fn flank_cell(&self, hunter: UnitId, prey: Cell, from: Vec2Fixed) -> Option<Cell> {
        let mut best: Option<(bool, Fixed, Cell)> = None;
        for (dx, dy) in DIRECTIONS {
            let cell = prey.offset(dx, dy);
            if !self.grid.is_open(cell) {
                continue;
            }
            let taken = self.planner.claimant(cell).is_some_and(|owner| owner != hunter);
            let d = Vec2Fixed::from_cell(cell).distance_squared(from);
            if best.map_or(true, |(best_taken, best_d, _)| (taken, d) < (best_taken, best_d)) {
                best = Some((taken, d, cell));
            }
        }
        best.map(|(_, _, cell)| cell)
    }

    /// Open cell next to a building closest to `from`.
    pub(crate) fn approach_cell(&self, building: BuildingId, from: Vec2Fixed) -> Option<Cell> {
        let footprint = self.planet.building(building)?.footprint;
        let (ox, oy) = (footprint.origin.x, footprint.origin.y);
        let (w, h) = (footprint.width as i32, footprint.height as i32);

        let mut best: Option<(Fixed, Cell)> = None;
        for y in (oy - 1)..=(oy + h) {
            for x in (ox - 1)..=(ox + w) {
                let cell = Cell::new(x, y);
                if footprint.ring_distance(cell) != 1 || !self.grid.is_open(cell) {
                    continue;
                }
                let d = Vec2Fixed::from_cell(cell).distance_squared(from);
                if best.map_or(true, |(best_d, _)| d < best_d) {
                    best = Some((d, cell));
                }
            }
        }
        best.map(|(_, cell)| cell)
    }
}

// ============================================================================
// Per-tick systems
// ============================================================================

impl Battle {
    /// Gun targeting and firing.
    pub(crate) fn run_gun_system(&mut self) {
        for id in self.registry.sorted_gun_ids() {
            let Some(gun) = self.registry.gun_mut(id) else {
                continue;
            };
            gun.fire.cool_down();
            let (building, index, count, position) = (gun.building, gun.index, gun.count, gun.position);
            let (current, ready) = (gun.engaged, gun.fire.is_ready());
            let profile = gun.profile.clone();

            let powered = self
                .planet
                .building(building)
                .filter(|b| b.is_operational())
                .map(|b| b.gun_has_power(index, count));
            let Some(powered) = powered else {
                debug!(gun = id.0, building = building.0, "Gun lost its building");
                self.remove_gun(id);
                continue;
            };

            let in_band = |distance: Fixed| in_range(distance, profile.min_range, profile.max_range);
            let mut engaged = current.filter(|&t| {
                self.registry.unit(t).is_some_and(|u| {
                    u.is_alive() && u.side == Side::Attacker && in_band(position.distance(u.position))
                })
            });
            if engaged.is_none() && ready {
                let mut best = Vec::new();
                let mut best_distance = None;
                for unit in self.registry.units() {
                    if !unit.is_alive() || unit.side != Side::Attacker {
                        continue;
                    }
                    let distance = position.distance(unit.position);
                    if in_band(distance) {
                        consider(&mut best, &mut best_distance, unit.id, distance);
                    }
                }
                engaged = pick(&mut self.rng, &best);
            }

            let aim = engaged.and_then(|t| self.registry.unit(t)).map(|u| u.position);
            let Some(gun) = self.registry.gun_mut(id) else {
                continue;
            };
            if gun.engaged != engaged {
                gun.fire.reset_windup();
            }
            gun.engaged = engaged;

            let (Some(target), Some(aim)) = (engaged, aim) else {
                continue;
            };
            if !powered {
                gun.fire.reset_windup();
                continue;
            }
            if !ready || !turn_toward(&mut gun.heading, position, aim, profile.rotation_speed) {
                continue;
            }
            if gun.fire.wind_up(profile.fire_phases, profile.cooldown) {
                trace!(gun = id.0, target = target.0, "Gun fired");
                self.damage_unit(target, profile.damage);
            }
        }
    }

    /// Abilities, order upkeep and firing for every unit.
    pub(crate) fn run_unit_system(&mut self) {
        for id in self.registry.sorted_unit_ids() {
            let Some(unit) = self.registry.unit_mut(id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            if unit.is_paralyzed() {
                unit.paralyzed_ttl -= 1;
                if unit.paralyzed_ttl == 0 {
                    unit.paralyzed_by = None;
                }
                continue;
            }
            unit.fire.cool_down();
            let spec = *self.table.get(unit.kind);

            if !self.run_ability(id, &spec) {
                continue;
            }
            self.run_orders(id);
            if spec.can_attack() {
                self.run_engagement(id, &spec);
            }
        }
    }

    /// Passive ability upkeep. Returns `false` if the unit is gone.
    fn run_ability(&mut self, id: UnitId, spec: &UnitSpec) -> bool {
        let Some(unit) = self.registry.unit_mut(id) else {
            return false;
        };
        match spec.ability {
            Ability::Kamikaze => {
                let threshold = u64::from(self.config.kamikaze_threshold_percent);
                if u64::from(unit.hp) * 100 < u64::from(unit.max_hp) * threshold {
                    self.self_destruct(id);
                    return false;
                }
            }
            Ability::SelfRepair => {
                if unit.hp < unit.max_hp {
                    unit.dwell += 1;
                    if unit.dwell >= self.config.repair_interval.max(1) {
                        unit.dwell = 0;
                        let pulse = (unit.max_hp * self.config.repair_percent / 100).max(1);
                        unit.hp = unit.hp.saturating_add(pulse).min(unit.max_hp);
                        trace!(unit = id.0, hp = unit.hp, "Self repair");
                    }
                } else {
                    unit.dwell = 0;
                }
            }
            Ability::Minelayer => {
                let (cell, side, idle) = (unit.cell(), unit.side, unit.motion.is_idle());
                let can_plant = idle
                    && self.planner.goal_of(id).is_none()
                    && self.registry.mine_at(cell).is_none();
                let Some(unit) = self.registry.unit_mut(id) else {
                    return false;
                };
                if !can_plant {
                    unit.dwell = 0;
                    return true;
                }
                unit.dwell += 1;
                if unit.dwell >= self.config.mine_dwell_ticks.max(1) {
                    unit.dwell = 0;
                    self.plant_mine(cell, side, spec.damage);
                }
            }
            _ => {}
        }
        true
    }

    /// Drop finished or invalid orders.
    fn run_orders(&mut self, id: UnitId) {
        let Some(unit) = self.registry.unit(id) else {
            return;
        };
        let side = unit.side;
        let finished = match unit.order {
            None => false,
            Some(Order::MoveTo(_) | Order::AttackMove(_)) => {
                self.planner.goal_of(id).is_none() && !self.planner.is_pending(id) && unit.motion.is_idle()
            }
            Some(Order::AttackUnit(target)) => !self.target_valid(side, Target::Unit(target)),
            Some(Order::AttackBuilding(target)) => !self.target_valid(side, Target::Building(target)),
        };
        if !finished {
            return;
        }
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        trace!(unit = id.0, order = ?unit.order, "Order finished");
        if matches!(unit.order, Some(Order::AttackUnit(_) | Order::AttackBuilding(_))) {
            self.planner.clear_goal(unit);
        }
        unit.order = None;
        unit.engaged = None;
        unit.guard = true;
        unit.fire.reset_windup();
    }

    /// Target validation, acquisition, chasing and firing.
    fn run_engagement(&mut self, id: UnitId, spec: &UnitSpec) {
        let Some(unit) = self.registry.unit(id) else {
            return;
        };
        let (side, position, order, guard) = (unit.side, unit.position, unit.order, unit.guard);
        let ready = unit.fire.is_ready();
        let attack_move = matches!(order, Some(Order::AttackMove(_)));
        let explicit = match order {
            Some(Order::AttackUnit(t)) => Some(Target::Unit(t)),
            Some(Order::AttackBuilding(b)) => Some(Target::Building(b)),
            _ => None,
        };

        let mut engaged = explicit.or(unit.engaged).filter(|&t| self.target_valid(side, t));
        if engaged.is_none() && ready && (attack_move || (order.is_none() && guard)) {
            engaged = self.acquire_target(side, position, spec);
        }

        let geometry = engaged.and_then(|t| self.target_geometry(position, t).map(|g| (t, g)));
        let Some((target, (aim, distance))) = geometry else {
            if let Some(unit) = self.registry.unit_mut(id) {
                unit.engaged = None;
                unit.fire.reset_windup();
                if attack_move {
                    self.planner.hold(unit, false);
                }
            }
            return;
        };

        if !in_range(distance, spec.min_range, spec.max_range) {
            let Some(unit) = self.registry.unit_mut(id) else {
                return;
            };
            unit.fire.reset_windup();
            if explicit.is_some() {
                unit.engaged = Some(target);
                self.chase(id, target, aim, spec);
            } else {
                unit.engaged = None;
                if attack_move {
                    self.planner.hold(unit, false);
                }
            }
            return;
        }

        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };
        if unit.engaged != Some(target) {
            unit.fire.reset_windup();
        }
        unit.engaged = Some(target);
        if explicit.is_some() && self.planner.goal_of(id).is_some() {
            self.planner.clear_goal(unit);
        }
        if attack_move {
            self.planner.hold(unit, true);
        }
        if !unit.fire.is_ready() || !PathPlanner::rotate_step(unit, aim, spec.rotation_speed) {
            return;
        }
        if unit.fire.wind_up(spec.fire_phases, spec.cooldown) {
            self.resolve_shot(id, target, aim, spec);
        }
    }

    /// Close in on an explicitly ordered target that is out of range.
    fn chase(&mut self, id: UnitId, target: Target, aim: Vec2Fixed, spec: &UnitSpec) {
        let Some((from, here)) = self.registry.unit(id).map(|u| (u.position, u.cell())) else {
            return;
        };
        let desired = match target {
            Target::Unit(t) => {
                let Some(prey) = self.registry.unit(t).map(|u| u.cell()) else {
                    return;
                };
                if here.chebyshev(prey) <= 1 {
                    None
                } else {
                    // Keep a goal that still touches the target.
                    self.planner
                        .goal_of(id)
                        .filter(|goal| goal.chebyshev(prey) == 1)
                        .or_else(|| self.flank_cell(id, prey, from))
                }
            }
            Target::Building(b) => self.approach_cell(b, from),
        };
        let Some(unit) = self.registry.unit_mut(id) else {
            return;
        };

        match desired {
            Some(cell) if unit.motion.unreachable() != Some(cell) && unit.cell() != cell => {
                if self.planner.goal_of(id) != Some(cell) {
                    self.planner.set_goal(unit, cell);
                }
            }
            _ => {
                if spec.may_get_closer() && self.planner.goal_of(id).is_none() {
                    self.planner.get_closer(unit, aim, &self.grid);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_band_is_half_open() {
        let min = Fixed::from_num(2);
        let max = Fixed::from_num(5);
        assert!(!in_range(Fixed::from_num(1), min, max));
        assert!(in_range(Fixed::from_num(2), min, max));
        assert!(in_range(Fixed::from_num(4), min, max));
        assert!(!in_range(Fixed::from_num(5), min, max));
    }

    #[test]
    fn test_area_falloff() {
        let radius = Fixed::from_num(2);
        assert_eq!(area_falloff(100, Fixed::ZERO, radius), 100);
        assert_eq!(area_falloff(100, Fixed::ONE, radius), 50);
        assert_eq!(area_falloff(100, Fixed::from_num(2), radius), 0);
        assert_eq!(area_falloff(100, Fixed::ONE, Fixed::ZERO), 0);
    }

    #[test]
    fn test_windup_resolves_on_last_phase() {
        let mut fire = FireState::default();
        assert!(!fire.wind_up(3, 10));
        assert!(!fire.wind_up(3, 10));
        assert!(fire.wind_up(3, 10));
        assert_eq!(fire.phase, 0);
        assert_eq!(fire.cooldown, 10);
        assert!(!fire.is_ready());

        for _ in 0..10 {
            fire.cool_down();
        }
        assert!(fire.is_ready());
    }

    #[test]
    fn test_single_phase_weapon_fires_immediately() {
        let mut fire = FireState::default();
        assert!(fire.wind_up(0, 5));
        assert!(fire.wind_up(1, 5));
    }
}
