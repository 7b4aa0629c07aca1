//! Deployment zones and deterministic unit placement.
//!
//! A side's deployment zone is a set of statically free cells. Units waiting
//! to be deployed are placed by scanning concentric square rings around the
//! zone's placement circle: ring 0 is the center cell; every later ring is
//! walked bottom row left to right, right column top to bottom, top row
//! right to left and left column bottom to top. Each zone cell that is still
//! free receives the next waiting unit.

use std::collections::BTreeSet;

use crate::buildings::Building;
use crate::config::BattleConfig;
use crate::grid::{Cell, PassabilityGrid, Surface};

/// Center and bounding radius of a candidate cell set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlacementCircle {
    /// Cell nearest the mean position of the set.
    pub center: Cell,
    /// Largest Chebyshev distance from the center to a member.
    pub radius: u32,
}

/// Placement circle of a cell set, `None` for an empty set.
#[must_use]
pub fn placement_circle(cells: &BTreeSet<Cell>) -> Option<PlacementCircle> {
    if cells.is_empty() {
        return None;
    }
    let n = cells.len() as i64;
    let (sum_x, sum_y) = cells
        .iter()
        .fold((0i64, 0i64), |(sx, sy), c| (sx + i64::from(c.x), sy + i64::from(c.y)));
    // Rounded mean.
    let mean = |sum: i64| (2 * sum + n).div_euclid(2 * n) as i32;
    let center = Cell::new(mean(sum_x), mean(sum_y));
    let radius = cells.iter().map(|c| c.chebyshev(center)).max().unwrap_or(0);
    Some(PlacementCircle { center, radius })
}

/// Cells of the square ring at Chebyshev distance `radius`, in scan order.
#[must_use]
pub fn ring_cells(center: Cell, radius: u32) -> Vec<Cell> {
    if radius == 0 {
        return vec![center];
    }
    let r = radius as i32;
    let (cx, cy) = (center.x, center.y);
    let mut cells = Vec::with_capacity(8 * radius as usize);

    // Bottom row, left to right.
    cells.extend(((cx - r)..=(cx + r)).map(|x| Cell::new(x, cy + r)));
    // Right column, top to bottom.
    cells.extend(((cy - r)..(cy + r)).map(|y| Cell::new(cx + r, y)));
    // Top row, right to left.
    cells.extend(((cx - r)..(cx + r)).rev().map(|x| Cell::new(x, cy - r)));
    // Left column, bottom to top.
    cells.extend(((cy - r + 1)..(cy + r)).rev().map(|y| Cell::new(cx - r, y)));

    cells
}

/// Pick up to `count` cells for waiting units.
///
/// Rings `0..=max_radius` around `center` are scanned in order; a cell is
/// taken when it belongs to `zone` and `is_free` accepts it.
pub fn ring_scan<F>(center: Cell, max_radius: u32, zone: &BTreeSet<Cell>, count: usize, mut is_free: F) -> Vec<Cell>
where
    F: FnMut(Cell) -> bool,
{
    let mut picked = Vec::with_capacity(count);
    if count == 0 {
        return picked;
    }
    for radius in 0..=max_radius {
        for cell in ring_cells(center, radius) {
            if zone.contains(&cell) && is_free(cell) {
                picked.push(cell);
                if picked.len() == count {
                    return picked;
                }
            }
        }
    }
    picked
}

/// Statically free cells a side may deploy on.
///
/// Defenders deploy in rings around their standing buildings, or around the
/// buildable spot nearest the map center when none stand. Attackers deploy
/// in bands along the map edges, optionally skipping the outermost ring.
/// Exclusion cells are never part of a zone.
#[must_use]
pub fn deployment_zones(
    surface: &Surface,
    grid: &PassabilityGrid,
    buildings: &[Building],
    for_defender: bool,
    skip_outer_edge: bool,
    config: &BattleConfig,
) -> BTreeSet<Cell> {
    let usable = |cell: Cell| grid.is_open(cell) && !surface.exclusions().contains(&cell);
    let mut zone = BTreeSet::new();

    if !for_defender {
        let start = u32::from(skip_outer_edge);
        let end = start + config.attacker_band_depth;
        let (w, h) = (surface.width() as i32, surface.height() as i32);
        for y in 0..h {
            for x in 0..w {
                let edge = x.min(y).min(w - 1 - x).min(h - 1 - y) as u32;
                let cell = Cell::new(x, y);
                if edge >= start && edge < end && usable(cell) {
                    zone.insert(cell);
                }
            }
        }
        return zone;
    }

    let standing: Vec<&Building> = buildings.iter().filter(|b| !b.is_destroyed()).collect();
    if !standing.is_empty() {
        let depth = config.defender_ring_depth as i32;
        for building in standing {
            let fp = building.footprint;
            for y in (fp.origin.y - depth)..(fp.origin.y + fp.height as i32 + depth) {
                for x in (fp.origin.x - depth)..(fp.origin.x + fp.width as i32 + depth) {
                    let cell = Cell::new(x, y);
                    let d = fp.ring_distance(cell);
                    if d >= 1 && d <= depth as u32 && usable(cell) {
                        zone.insert(cell);
                    }
                }
            }
        }
        return zone;
    }

    let max_radius = surface.width().max(surface.height());
    let spot = (0..=max_radius)
        .flat_map(|r| ring_cells(surface.center(), r))
        .find(|&cell| surface.is_buildable(cell) && usable(cell));
    let Some(spot) = spot else {
        return zone;
    };
    for radius in 0..=max_radius {
        for cell in ring_cells(spot, radius) {
            if usable(cell) {
                zone.insert(cell);
                if zone.len() >= config.open_field_zone_cap {
                    return zone;
                }
            }
        }
    }
    zone
}
