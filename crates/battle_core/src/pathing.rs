//! Path planning and movement.
//!
//! Units heading for the same destination share one [`CostField`]: a dense
//! distance map produced by a reverse breadth-first search from the
//! destination over statically passable cells. A unit's path is read off the
//! field by always stepping to a neighbor one unit closer.
//!
//! Dynamic occupancy is handled with cell claims. A unit always claims the
//! cell it stands on, and while mid-step it also claims the cell it is
//! entering. A step into a cell claimed by another unit is refused; the unit
//! holds in guard mode and retries on the next tick.
//!
//! [`PathPlanner`] is the only writer of path and claim state. The per-unit
//! part of that state lives in [`Motion`], whose fields are private to this
//! module.
//!
//! # Determinism
//!
//! Destinations, requesters and pending units are kept in ordered sets and
//! units are stepped in ascending id order; neighbor scans follow
//! [`DIRECTIONS`].

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::entities::{Registry, Unit, UnitId};
use crate::grid::{Cell, PassabilityGrid, DIRECTIONS};
use crate::math::{heading_of, normalize_angle, shortest_turn, Fixed, Vec2Fixed};
use crate::units::UnitTable;

/// Distance value marking cells the destination cannot be reached from.
const UNREACHABLE: u16 = u16::MAX;

// ============================================================================
// Cost field
// ============================================================================

/// Step counts toward a single destination cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostField {
    destination: Cell,
    width: u32,
    distances: Vec<u16>,
}

impl CostField {
    /// Reverse breadth-first search from `destination`.
    ///
    /// Moves are 8-directional without corner cutting. A statically blocked
    /// destination yields a field where every cell is unreachable.
    #[must_use]
    pub fn compute(grid: &PassabilityGrid, destination: Cell) -> Self {
        let cell_count = (grid.width() as usize) * (grid.height() as usize);
        let mut distances = vec![UNREACHABLE; cell_count];
        let mut queue = VecDeque::new();

        if let Some(index) = grid.index(destination) {
            if grid.is_open(destination) {
                distances[index] = 0;
                queue.push_back(destination);
            }
        }

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = grid.index(cell) else {
                continue;
            };
            let current = distances[current_index];
            if current >= UNREACHABLE - 1 {
                continue;
            }
            let next = current + 1;

            for (dx, dy) in DIRECTIONS {
                // Step validity is symmetric, so the reverse search matches
                // forward movement.
                if !grid.is_step_valid(cell, dx, dy) {
                    continue;
                }
                let neighbor = cell.offset(dx, dy);
                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };
                if distances[neighbor_index] <= next {
                    continue;
                }
                distances[neighbor_index] = next;
                queue.push_back(neighbor);
            }
        }

        Self {
            destination,
            width: grid.width(),
            distances,
        }
    }

    /// The cell this field leads to.
    #[must_use]
    pub const fn destination(&self) -> Cell {
        self.destination
    }

    /// Steps from `cell` to the destination, `None` if unreachable.
    #[must_use]
    pub fn distance(&self, cell: Cell) -> Option<u16> {
        if cell.x < 0 || cell.y < 0 || cell.x as u32 >= self.width {
            return None;
        }
        let index = (cell.y as usize) * (self.width as usize) + (cell.x as usize);
        self.distances
            .get(index)
            .copied()
            .filter(|&d| d != UNREACHABLE)
    }

    /// Follow the field downhill from `start`.
    ///
    /// Among equally good neighbors the first one in [`DIRECTIONS`] order
    /// for which `is_free` holds wins; occupied cells are taken only when no
    /// free neighbor leads downhill. The returned path excludes `start` and
    /// is empty when the destination is unreachable or `start` is the
    /// destination.
    pub fn descend<F>(&self, grid: &PassabilityGrid, start: Cell, mut is_free: F) -> VecDeque<Cell>
    where
        F: FnMut(Cell) -> bool,
    {
        let mut path = VecDeque::new();
        let Some(mut remaining) = self.distance(start) else {
            return path;
        };

        let mut current = start;
        while remaining > 0 {
            let mut best: Option<(Cell, bool)> = None;
            for (dx, dy) in DIRECTIONS {
                if !grid.is_step_valid(current, dx, dy) {
                    continue;
                }
                let neighbor = current.offset(dx, dy);
                if self.distance(neighbor) != Some(remaining - 1) {
                    continue;
                }
                let free = is_free(neighbor);
                match best {
                    None => best = Some((neighbor, free)),
                    Some((_, false)) if free => best = Some((neighbor, true)),
                    _ => {}
                }
            }
            let Some((next, _)) = best else {
                break;
            };
            path.push_back(next);
            current = next;
            remaining -= 1;
        }
        path
    }
}

// ============================================================================
// Per-unit motion state
// ============================================================================

/// Movement state of one unit. Written only by [`PathPlanner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    cell: Cell,
    next: Option<Cell>,
    path: VecDeque<Cell>,
    blocked_ticks: u32,
    unreachable: Option<Cell>,
    held: bool,
}

impl Motion {
    /// Standing still on `cell`.
    #[must_use]
    pub fn at(cell: Cell) -> Self {
        Self {
            cell,
            next: None,
            path: VecDeque::new(),
            blocked_ticks: 0,
            unreachable: None,
            held: false,
        }
    }

    /// Occupied cell.
    #[must_use]
    pub const fn cell(&self) -> Cell {
        self.cell
    }

    /// Cell reserved by the step in progress.
    #[must_use]
    pub const fn next(&self) -> Option<Cell> {
        self.next
    }

    /// Remaining planned cells.
    #[must_use]
    pub const fn path(&self) -> &VecDeque<Cell> {
        &self.path
    }

    /// Last destination found to be unreachable from here.
    #[must_use]
    pub const fn unreachable(&self) -> Option<Cell> {
        self.unreachable
    }

    /// Consecutive ticks the next step was refused.
    #[must_use]
    pub const fn blocked_ticks(&self) -> u32 {
        self.blocked_ticks
    }

    /// Standing still with nothing planned.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.next.is_none() && self.path.is_empty()
    }
}

/// Turn `heading` toward the direction from `from` to `towards` by at most
/// `rotation_speed` degrees. Returns `true` once aligned.
pub fn turn_toward(heading: &mut Fixed, from: Vec2Fixed, towards: Vec2Fixed, rotation_speed: Fixed) -> bool {
    let delta = towards - from;
    if delta == Vec2Fixed::ZERO {
        return true;
    }
    let desired = heading_of(delta);
    let turn = shortest_turn(*heading, desired);
    if turn.abs() <= rotation_speed {
        *heading = desired;
        return true;
    }
    let step = if turn > Fixed::ZERO {
        rotation_speed
    } else {
        -rotation_speed
    };
    *heading = normalize_angle(*heading + step);
    false
}

// ============================================================================
// Planner
// ============================================================================

/// Per-type movement parameters for one step.
#[derive(Debug, Clone, Copy)]
struct Stepping {
    speed: Fixed,
    rotation_speed: Fixed,
    repath_after_blocked: u32,
    may_get_closer: bool,
}

#[derive(Debug, Clone, Default)]
struct FieldEntry {
    requesters: BTreeSet<UnitId>,
    field: Option<CostField>,
    stale: bool,
}

/// Shared cost-field cache, goal bookkeeping and cell claims.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    fields: BTreeMap<Cell, FieldEntry>,
    goals: BTreeMap<UnitId, Cell>,
    pending: BTreeSet<UnitId>,
    claims: HashMap<Cell, UnitId>,
    grid_version: u64,
    field_computations: u64,
}

impl PathPlanner {
    /// Create a planner for a freshly built grid.
    #[must_use]
    pub fn new(grid: &PassabilityGrid) -> Self {
        Self {
            fields: BTreeMap::new(),
            goals: BTreeMap::new(),
            pending: BTreeSet::new(),
            claims: HashMap::new(),
            grid_version: grid.version(),
            field_computations: 0,
        }
    }

    /// Number of cost fields computed so far.
    #[must_use]
    pub const fn field_computations(&self) -> u64 {
        self.field_computations
    }

    /// Number of destinations currently cached.
    #[must_use]
    pub fn cached_destinations(&self) -> usize {
        self.fields.len()
    }

    /// Destination a unit is travelling to.
    #[must_use]
    pub fn goal_of(&self, unit: UnitId) -> Option<Cell> {
        self.goals.get(&unit).copied()
    }

    /// Whether a path request for the unit awaits the next tick.
    #[must_use]
    pub fn is_pending(&self, unit: UnitId) -> bool {
        self.pending.contains(&unit)
    }

    /// Unit holding or reserving a cell.
    #[must_use]
    pub fn claimant(&self, cell: Cell) -> Option<UnitId> {
        self.claims.get(&cell).copied()
    }

    /// Whether any unit holds or reserves a cell.
    #[must_use]
    pub fn is_claimed(&self, cell: Cell) -> bool {
        self.claims.contains_key(&cell)
    }

    /// Claim the cell of a newly placed unit.
    pub fn register(&mut self, unit: &Unit) {
        self.claims.insert(unit.motion.cell, unit.id);
    }

    /// Drop every claim and subscription of a unit leaving the battle.
    pub fn remove(&mut self, unit: &Unit) {
        self.unsubscribe(unit.id);
        self.release(unit.motion.cell, unit.id);
        if let Some(next) = unit.motion.next {
            self.release(next, unit.id);
        }
    }

    /// Start travelling toward `destination`.
    ///
    /// The path is derived on the next [`tick`](Self::tick). A step in
    /// progress is completed first.
    pub fn set_goal(&mut self, unit: &mut Unit, destination: Cell) {
        let id = unit.id;
        if self.goals.get(&id) == Some(&destination) {
            return;
        }
        self.unsubscribe(id);

        self.goals.insert(id, destination);
        let entry = self.fields.entry(destination).or_default();
        entry.requesters.insert(id);
        entry.stale = true;
        self.pending.insert(id);

        let motion = &mut unit.motion;
        motion.path.clear();
        motion.blocked_ticks = 0;
        motion.unreachable = None;
        motion.held = false;
    }

    /// Stop travelling. A step in progress is completed.
    pub fn clear_goal(&mut self, unit: &mut Unit) {
        self.unsubscribe(unit.id);
        let motion = &mut unit.motion;
        motion.path.clear();
        motion.blocked_ticks = 0;
        motion.held = false;
    }

    /// Pause or resume path following without dropping the goal.
    pub fn hold(&mut self, unit: &mut Unit, held: bool) {
        unit.motion.held = held;
    }

    /// Forget a remembered unreachable destination.
    pub fn forget_unreachable(&mut self, unit: &mut Unit) {
        unit.motion.unreachable = None;
    }

    /// Rotate a unit toward a point. Returns `true` once it faces it.
    pub fn rotate_step(unit: &mut Unit, towards: Vec2Fixed, rotation_speed: Fixed) -> bool {
        turn_toward(&mut unit.heading, unit.position, towards, rotation_speed)
    }

    /// Plan a single greedy step that brings an idle unit closer to `target`.
    ///
    /// Returns `false` when no free neighbor is closer than the current cell.
    pub fn get_closer(&mut self, unit: &mut Unit, target: Vec2Fixed, grid: &PassabilityGrid) -> bool {
        if !unit.motion.is_idle() {
            return false;
        }
        let here = unit.motion.cell;
        let current = Vec2Fixed::from_cell(here).distance_squared(target);
        let mut best: Option<(Fixed, Cell)> = None;

        for (dx, dy) in DIRECTIONS {
            if !grid.is_step_valid(here, dx, dy) {
                continue;
            }
            let cell = here.offset(dx, dy);
            if self.claims.get(&cell).is_some_and(|&owner| owner != unit.id) {
                continue;
            }
            let d = Vec2Fixed::from_cell(cell).distance_squared(target);
            if d < current && best.map_or(true, |(best_d, _)| d < best_d) {
                best = Some((d, cell));
            }
        }

        match best {
            Some((_, cell)) => {
                unit.motion.path.push_back(cell);
                true
            }
            None => false,
        }
    }

    fn release(&mut self, cell: Cell, unit: UnitId) {
        if self.claims.get(&cell) == Some(&unit) {
            self.claims.remove(&cell);
        }
    }

    fn unsubscribe(&mut self, unit: UnitId) {
        self.pending.remove(&unit);
        let Some(destination) = self.goals.remove(&unit) else {
            return;
        };
        if let Some(entry) = self.fields.get_mut(&destination) {
            entry.requesters.remove(&unit);
            if entry.requesters.is_empty() {
                self.fields.remove(&destination);
            }
        }
    }

    /// Recompute stale fields, derive pending paths and advance every unit.
    pub fn tick(
        &mut self,
        registry: &mut Registry,
        table: &UnitTable,
        grid: &PassabilityGrid,
        repath_after_blocked: u32,
    ) {
        if grid.version() != self.grid_version {
            self.grid_version = grid.version();
            for entry in self.fields.values_mut() {
                entry.stale = true;
            }
            self.pending.extend(self.goals.keys().copied());
            for id in registry.sorted_unit_ids() {
                if let Some(unit) = registry.unit_mut(id) {
                    unit.motion.unreachable = None;
                }
            }
            debug!(version = self.grid_version, "Terrain changed, cost fields invalidated");
        }

        self.refresh_fields(grid);
        self.derive_pending(registry, grid);

        for id in registry.sorted_unit_ids() {
            let Some(unit) = registry.unit_mut(id) else {
                continue;
            };
            if !unit.is_alive() || unit.is_paralyzed() {
                continue;
            }
            let spec = table.get(unit.kind);
            let stepping = Stepping {
                speed: spec.speed,
                rotation_speed: spec.rotation_speed,
                repath_after_blocked,
                may_get_closer: spec.may_get_closer(),
            };
            self.step_unit(unit, grid, stepping);
        }
    }

    fn refresh_fields(&mut self, grid: &PassabilityGrid) {
        for (destination, entry) in &mut self.fields {
            if !entry.stale {
                continue;
            }
            entry.field = Some(CostField::compute(grid, *destination));
            entry.stale = false;
            self.field_computations += 1;
            trace!(
                x = destination.x,
                y = destination.y,
                requesters = entry.requesters.len(),
                "Cost field computed"
            );
        }
    }

    fn derive_pending(&mut self, registry: &mut Registry, grid: &PassabilityGrid) {
        let pending: Vec<UnitId> = self.pending.iter().copied().collect();
        for id in pending {
            let Some(unit) = registry.unit_mut(id) else {
                self.unsubscribe(id);
                continue;
            };
            if unit.motion.next.is_some() {
                // Derive once the current step lands.
                continue;
            }
            let Some(&destination) = self.goals.get(&id) else {
                self.pending.remove(&id);
                continue;
            };
            self.pending.remove(&id);

            if unit.motion.cell == destination {
                self.unsubscribe(id);
                continue;
            }

            let claims = &self.claims;
            let path = self
                .fields
                .get(&destination)
                .and_then(|entry| entry.field.as_ref())
                .map(|field| {
                    field.descend(grid, unit.motion.cell, |cell| {
                        claims.get(&cell).map_or(true, |&owner| owner == id)
                    })
                })
                .unwrap_or_default();

            if path.is_empty() {
                debug!(unit = id.0, x = destination.x, y = destination.y, "Destination unreachable");
                unit.motion.unreachable = Some(destination);
                self.unsubscribe(id);
            }
            unit.motion.path = path;
            unit.motion.blocked_ticks = 0;
        }
    }

    fn step_unit(&mut self, unit: &mut Unit, grid: &PassabilityGrid, stepping: Stepping) {
        if unit.motion.next.is_some() {
            self.advance(unit, stepping.speed);
            return;
        }
        if unit.motion.held {
            return;
        }
        let Some(&step) = unit.motion.path.front() else {
            return;
        };

        let here = unit.motion.cell;
        let (dx, dy) = (step.x - here.x, step.y - here.y);
        if here.chebyshev(step) != 1 || !grid.is_step_valid(here, dx, dy) {
            // Terrain changed under the path.
            unit.motion.path.clear();
            if self.goals.contains_key(&unit.id) {
                self.pending.insert(unit.id);
            }
            return;
        }

        if !Self::rotate_step(unit, Vec2Fixed::from_cell(step), stepping.rotation_speed) {
            return;
        }

        if self.claims.get(&step).is_some_and(|&owner| owner != unit.id) {
            self.on_blocked(unit, step, grid, stepping);
            return;
        }

        if unit.motion.blocked_ticks > 0 {
            unit.guard = false;
        }
        unit.motion.blocked_ticks = 0;
        unit.motion.path.pop_front();
        unit.motion.next = Some(step);
        self.claims.insert(step, unit.id);
        self.advance(unit, stepping.speed);
    }

    /// A unit standing on `cell` with nowhere to go.
    fn is_parked(&self, cell: Cell) -> bool {
        self.claims
            .get(&cell)
            .is_some_and(|owner| !self.goals.contains_key(owner) && !self.pending.contains(owner))
    }

    fn on_blocked(&mut self, unit: &mut Unit, step: Cell, grid: &PassabilityGrid, stepping: Stepping) {
        let id = unit.id;
        unit.guard = true;
        unit.motion.blocked_ticks += 1;
        if unit.motion.blocked_ticks % stepping.repath_after_blocked.max(1) != 0 {
            return;
        }

        let Some(destination) = self.goals.get(&id).copied() else {
            // A greedy step with no goal is simply abandoned.
            unit.motion.path.clear();
            return;
        };

        if step == destination {
            if self.is_parked(step) {
                debug!(unit = id.0, "Destination occupied, holding");
                unit.motion.path.clear();
                unit.motion.blocked_ticks = 0;
                self.unsubscribe(id);
            }
            return;
        }

        let claims = &self.claims;
        let detour = self
            .fields
            .get(&destination)
            .and_then(|entry| entry.field.as_ref())
            .map(|field| {
                field.descend(grid, unit.motion.cell, |cell| {
                    claims.get(&cell).map_or(true, |&owner| owner == id)
                })
            })
            .unwrap_or_default();
        let clear = detour
            .front()
            .is_some_and(|cell| self.claims.get(cell).map_or(true, |&owner| owner == id));
        if clear {
            trace!(unit = id.0, len = detour.len(), "Path re-derived around blocker");
            unit.motion.path = detour;
            return;
        }

        if stepping.may_get_closer {
            let planned = std::mem::take(&mut unit.motion.path);
            if self.get_closer(unit, Vec2Fixed::from_cell(destination), grid) {
                trace!(unit = id.0, "Greedy step around blocker");
                return;
            }
            unit.motion.path = planned;
        }
    }

    fn advance(&mut self, unit: &mut Unit, speed: Fixed) {
        let Some(next) = unit.motion.next else {
            return;
        };
        let target = Vec2Fixed::from_cell(next);
        unit.position = unit.position.step_toward(target, speed);
        if unit.position != target {
            return;
        }

        let left = unit.motion.cell;
        self.release(left, unit.id);
        unit.motion.cell = next;
        unit.motion.next = None;

        if unit.motion.path.is_empty() {
            match self.goals.get(&unit.id) {
                Some(&goal) if goal == next => self.unsubscribe(unit.id),
                // Landed off the planned route; plan again from here.
                Some(_) => {
                    self.pending.insert(unit.id);
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellType, Surface};
    use crate::stats::{PlayerId, Side};
    use crate::units::UnitKind;

    fn open_grid(width: u32, height: u32) -> PassabilityGrid {
        PassabilityGrid::build(&Surface::new(width, height), std::iter::empty())
    }

    fn spawn(registry: &mut Registry, planner: &mut PathPlanner, cell: Cell) -> UnitId {
        let table = UnitTable::standard();
        let unit = Unit::new(Side::Attacker, PlayerId(1), table.get(UnitKind::Tank), cell);
        let id = registry.insert_unit(unit);
        planner.register(registry.unit(id).unwrap());
        id
    }

    fn run(planner: &mut PathPlanner, registry: &mut Registry, grid: &PassabilityGrid, ticks: u32) {
        let table = UnitTable::standard();
        for _ in 0..ticks {
            planner.tick(registry, &table, grid, 3);
        }
    }

    #[test]
    fn test_cost_field_distances() {
        let grid = open_grid(5, 5);
        let field = CostField::compute(&grid, Cell::new(2, 2));
        assert_eq!(field.distance(Cell::new(2, 2)), Some(0));
        assert_eq!(field.distance(Cell::new(3, 3)), Some(1));
        assert_eq!(field.distance(Cell::new(0, 0)), Some(2));
        assert_eq!(field.distance(Cell::new(5, 0)), None);
    }

    #[test]
    fn test_cost_field_respects_walls() {
        let mut surface = Surface::new(5, 3);
        for y in 0..2 {
            surface.set_cell(Cell::new(2, y), CellType::Blocked);
        }
        let grid = PassabilityGrid::build(&surface, std::iter::empty());
        let field = CostField::compute(&grid, Cell::new(4, 0));

        assert_eq!(field.distance(Cell::new(2, 0)), None);
        // Around the wall through row 2 without cutting its corner.
        assert_eq!(field.distance(Cell::new(0, 0)), Some(6));
    }

    #[test]
    fn test_blocked_destination_is_unreachable() {
        let mut surface = Surface::new(4, 4);
        surface.set_cell(Cell::new(3, 3), CellType::Blocked);
        let grid = PassabilityGrid::build(&surface, std::iter::empty());
        let field = CostField::compute(&grid, Cell::new(3, 3));
        assert_eq!(field.distance(Cell::new(0, 0)), None);
        assert!(field.descend(&grid, Cell::new(0, 0), |_| true).is_empty());
    }

    #[test]
    fn test_descend_reaches_destination() {
        let grid = open_grid(8, 8);
        let field = CostField::compute(&grid, Cell::new(6, 1));
        let path = field.descend(&grid, Cell::new(0, 1), |_| true);
        assert_eq!(path.len(), 6);
        assert_eq!(path.back(), Some(&Cell::new(6, 1)));
    }

    #[test]
    fn test_unit_walks_to_goal() {
        let grid = open_grid(10, 10);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let id = spawn(&mut registry, &mut planner, Cell::new(0, 0));

        planner.set_goal(registry.unit_mut(id).unwrap(), Cell::new(3, 0));
        run(&mut planner, &mut registry, &grid, 40);

        let unit = registry.unit(id).unwrap();
        assert_eq!(unit.cell(), Cell::new(3, 0));
        assert_eq!(unit.position, Vec2Fixed::from_ints(3, 0));
        assert!(unit.path().is_empty());
        assert_eq!(planner.goal_of(id), None);
        assert_eq!(planner.claimant(Cell::new(3, 0)), Some(id));
        assert!(!planner.is_claimed(Cell::new(0, 0)));
    }

    #[test]
    fn test_stop_right_after_move_leaves_no_reservation() {
        let grid = open_grid(10, 10);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let id = spawn(&mut registry, &mut planner, Cell::new(1, 1));

        let unit = registry.unit_mut(id).unwrap();
        planner.set_goal(unit, Cell::new(8, 8));
        planner.clear_goal(unit);

        assert!(unit.path().is_empty());
        assert_eq!(unit.reserved(), None);
        assert!(!planner.is_pending(id));
        assert_eq!(planner.cached_destinations(), 0);
    }

    #[test]
    fn test_units_share_a_destination_field() {
        let grid = open_grid(12, 12);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let a = spawn(&mut registry, &mut planner, Cell::new(0, 0));
        let b = spawn(&mut registry, &mut planner, Cell::new(0, 5));

        let dest = Cell::new(10, 3);
        planner.set_goal(registry.unit_mut(a).unwrap(), dest);
        planner.set_goal(registry.unit_mut(b).unwrap(), dest);
        run(&mut planner, &mut registry, &grid, 1);

        assert_eq!(planner.field_computations(), 1);
        assert_eq!(planner.cached_destinations(), 1);
        assert!(!registry.unit(a).unwrap().path().is_empty() || registry.unit(a).unwrap().is_moving());
    }

    #[test]
    fn test_unreachable_goal_leaves_empty_path() {
        let mut surface = Surface::new(6, 6);
        for y in 0..6 {
            surface.set_cell(Cell::new(3, y), CellType::Blocked);
        }
        let grid = PassabilityGrid::build(&surface, std::iter::empty());
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let id = spawn(&mut registry, &mut planner, Cell::new(0, 0));

        planner.set_goal(registry.unit_mut(id).unwrap(), Cell::new(5, 5));
        run(&mut planner, &mut registry, &grid, 3);

        let unit = registry.unit(id).unwrap();
        assert!(unit.path().is_empty());
        assert_eq!(unit.cell(), Cell::new(0, 0));
        assert_eq!(unit.motion.unreachable(), Some(Cell::new(5, 5)));
        assert_eq!(planner.goal_of(id), None);
    }

    #[test]
    fn test_remove_releases_claims() {
        let grid = open_grid(6, 6);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let id = spawn(&mut registry, &mut planner, Cell::new(2, 2));
        planner.set_goal(registry.unit_mut(id).unwrap(), Cell::new(5, 2));

        let unit = registry.remove_unit(id).unwrap();
        planner.remove(&unit);

        assert!(!planner.is_claimed(Cell::new(2, 2)));
        assert_eq!(planner.goal_of(id), None);
        assert_eq!(planner.cached_destinations(), 0);
    }

    #[test]
    fn test_rotation_is_rate_limited() {
        let table = UnitTable::standard();
        let mut unit = Unit::new(Side::Attacker, PlayerId(1), table.get(UnitKind::Tank), Cell::new(0, 0));
        let west = Vec2Fixed::from_ints(-1, 0);

        assert!(!PathPlanner::rotate_step(&mut unit, west, Fixed::from_num(90)));
        assert_eq!(unit.heading, Fixed::from_num(90));
        assert!(PathPlanner::rotate_step(&mut unit, west, Fixed::from_num(90)));
        assert_eq!(unit.heading, Fixed::from_num(180));
    }

    #[test]
    fn test_final_step_waits_for_a_passing_unit() {
        let grid = open_grid(10, 12);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let walker = spawn(&mut registry, &mut planner, Cell::new(1, 5));
        let leaving = spawn(&mut registry, &mut planner, Cell::new(3, 5));

        planner.set_goal(registry.unit_mut(walker).unwrap(), Cell::new(3, 5));
        planner.set_goal(registry.unit_mut(leaving).unwrap(), Cell::new(3, 9));
        run(&mut planner, &mut registry, &grid, 5);

        // Arrived next door while the destination is still being vacated.
        let waiting = registry.unit(walker).unwrap();
        assert_eq!(waiting.cell(), Cell::new(2, 5));
        assert!(waiting.guard);
        assert_eq!(planner.goal_of(walker), Some(Cell::new(3, 5)));

        run(&mut planner, &mut registry, &grid, 60);
        let arrived = registry.unit(walker).unwrap();
        assert_eq!(arrived.cell(), Cell::new(3, 5));
        assert!(!arrived.guard);
        assert_eq!(registry.unit(leaving).unwrap().cell(), Cell::new(3, 9));
        assert_eq!(planner.goal_of(walker), None);
    }

    #[test]
    fn test_parked_unit_on_destination_ends_the_goal() {
        let grid = open_grid(10, 10);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let walker = spawn(&mut registry, &mut planner, Cell::new(1, 5));
        let parked = spawn(&mut registry, &mut planner, Cell::new(3, 5));

        planner.set_goal(registry.unit_mut(walker).unwrap(), Cell::new(3, 5));
        // Four ticks to reach (2, 5), then one blocked tick.
        run(&mut planner, &mut registry, &grid, 5);
        assert_eq!(planner.goal_of(walker), Some(Cell::new(3, 5)));
        assert_eq!(registry.unit(walker).unwrap().motion.blocked_ticks(), 1);

        run(&mut planner, &mut registry, &grid, 5);
        let holding = registry.unit(walker).unwrap();
        assert_eq!(holding.cell(), Cell::new(2, 5));
        assert!(holding.guard);
        assert!(holding.path().is_empty());
        assert_eq!(planner.goal_of(walker), None);
        assert_eq!(registry.unit(parked).unwrap().cell(), Cell::new(3, 5));
    }

    #[test]
    fn test_direct_unit_sidesteps_when_every_route_is_held() {
        let grid = open_grid(24, 8);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let hunter = spawn(&mut registry, &mut planner, Cell::new(0, 0));
        spawn(&mut registry, &mut planner, Cell::new(1, 0));
        spawn(&mut registry, &mut planner, Cell::new(1, 1));

        planner.set_goal(registry.unit_mut(hunter).unwrap(), Cell::new(19, 2));
        let table = UnitTable::standard();
        let mut visited = Vec::new();
        for _ in 0..400 {
            planner.tick(&mut registry, &table, &grid, 3);
            visited.push(registry.unit(hunter).unwrap().cell());
        }

        // Both downhill neighbors stay held; the greedy step south breaks out.
        assert!(visited.contains(&Cell::new(0, 1)));
        assert_eq!(registry.unit(hunter).unwrap().cell(), Cell::new(19, 2));
        assert_eq!(planner.goal_of(hunter), None);
    }

    #[test]
    fn test_get_closer_takes_one_greedy_step() {
        let grid = open_grid(10, 10);
        let mut registry = Registry::new();
        let mut planner = PathPlanner::new(&grid);
        let id = spawn(&mut registry, &mut planner, Cell::new(2, 2));

        let unit = registry.unit_mut(id).unwrap();
        assert!(planner.get_closer(unit, Vec2Fixed::from_ints(9, 2), &grid));
        assert_eq!(unit.path().front(), Some(&Cell::new(3, 2)));
        // Already planned, no second step.
        assert!(!planner.get_closer(unit, Vec2Fixed::from_ints(9, 2), &grid));
    }
}
