//! Mines, rockets and explosions.
//!
//! These are short-lived entities advanced once per tick before guns and
//! units act. Explosions also carry the final removal of destroyed units:
//! a dead unit stays on the field (and keeps blocking its cell) until its
//! explosion reaches half-life.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::battle::Battle;
use crate::entities::{Mine, Rocket, RocketId, UnitId};
use crate::grid::Cell;
use crate::math::{heading_of, Fixed, Vec2Fixed};
use crate::stats::Side;
use crate::units::{Ability, UnitSpec};

impl Battle {
    /// Fire a rocket from `origin` toward `target`.
    pub(crate) fn launch_rocket(&mut self, side: Side, origin: Vec2Fixed, target: Vec2Fixed, spec: &UnitSpec) {
        // A rocket without travel speed lands immediately.
        let speed = if spec.projectile_speed > Fixed::ZERO {
            spec.projectile_speed
        } else {
            Fixed::MAX
        };
        let rocket = Rocket {
            id: RocketId(0),
            side,
            position: origin,
            target,
            speed,
            heading: heading_of(target - origin),
            damage: spec.damage,
            area: spec.area,
        };
        let id = self.registry.insert_rocket(rocket);
        self.stats.side_mut(side).rockets_fired += 1;
        trace!(rocket = id.0, ?side, "Rocket launched");
    }

    /// Plant a mine unless the cell already holds one.
    pub(crate) fn plant_mine(&mut self, cell: Cell, side: Side, damage: u32) {
        if self.registry.plant_mine(Mine { cell, side, damage }) {
            debug!(x = cell.x, y = cell.y, ?side, "Mine planted");
        }
    }

    /// Advance explosion animations, removing dead units at half-life.
    pub(crate) fn run_explosion_system(&mut self) {
        let half_life = self.config.explosion_half_life();
        let phases = self.config.explosion_phases;

        for id in self.registry.sorted_explosion_ids() {
            let Some(explosion) = self.registry.explosion_mut(id) else {
                continue;
            };
            explosion.phase += 1;
            let phase = explosion.phase;
            let victim = if phase >= half_life {
                explosion.kill_target.take()
            } else {
                None
            };

            if let Some(victim) = victim {
                self.remove_unit(victim);
            }
            if phase >= phases {
                self.registry.remove_explosion(id);
            }
        }
    }

    /// Permanently take a unit off the battlefield.
    fn remove_unit(&mut self, id: UnitId) {
        let Some(unit) = self.registry.remove_unit(id) else {
            return;
        };
        self.planner.remove(&unit);
        self.events.removed.push(id);
        trace!(unit = id.0, "Unit removed");
    }

    /// Move rockets; detonate on arrival or when jammed.
    pub(crate) fn run_rocket_system(&mut self) {
        for id in self.registry.sorted_rocket_ids() {
            let Some(rocket) = self.registry.rocket(id).cloned() else {
                continue;
            };

            if self.is_jammed(&rocket) {
                debug!(rocket = id.0, "Rocket jammed");
                self.events.rockets_jammed.push(id);
                self.detonate(id);
                continue;
            }

            let Some(rocket) = self.registry.rocket_mut(id) else {
                continue;
            };
            rocket.position = rocket.position.step_toward(rocket.target, rocket.speed);
            if rocket.position == rocket.target {
                self.detonate(id);
            } else {
                rocket.heading = heading_of(rocket.target - rocket.position);
            }
        }
    }

    /// An enemy rocket jammer has the rocket within its range.
    fn is_jammed(&self, rocket: &Rocket) -> bool {
        self.registry.units().into_iter().any(|unit| {
            let spec = self.table.get(unit.kind);
            unit.is_alive()
                && !unit.is_paralyzed()
                && unit.side != rocket.side
                && spec.ability == Ability::RocketJammer
                && unit.position.distance(rocket.position) < spec.max_range
        })
    }

    fn detonate(&mut self, id: RocketId) {
        let Some(rocket) = self.registry.remove_rocket(id) else {
            return;
        };
        self.damage_area(rocket.position, rocket.damage, rocket.area, Some(rocket.side));
        self.spawn_explosion(rocket.position, None);
    }

    /// Trigger mines under enemy units.
    pub(crate) fn run_mine_system(&mut self) {
        let mut occupants: BTreeMap<Cell, (UnitId, Side)> = BTreeMap::new();
        for unit in self.registry.units() {
            if unit.is_alive() {
                occupants.insert(unit.cell(), (unit.id, unit.side));
            }
        }

        let mines: Vec<Mine> = self.registry.mines().copied().collect();
        for mine in mines {
            let Some(&(victim, side)) = occupants.get(&mine.cell) else {
                continue;
            };
            if side == mine.side {
                continue;
            }
            self.registry.remove_mine(mine.cell);
            self.stats.side_mut(mine.side).mines_triggered += 1;
            self.events.mines_triggered.push(mine.cell);
            debug!(x = mine.cell.x, y = mine.cell.y, unit = victim.0, "Mine triggered");

            self.damage_unit(victim, mine.damage);
            self.spawn_explosion(Vec2Fixed::from_cell(mine.cell), None);
        }
    }
}
