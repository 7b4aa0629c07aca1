//! Battle surface and static passability.
//!
//! [`Surface`] is the terrain handed in by the host: which cells can be
//! walked on, which can hold a building, and which are excluded from
//! deployment. [`PassabilityGrid`] folds the live building footprints on top
//! of it and is rebuilt whenever a building is demolished. Dynamic occupancy
//! by units lives in the pathing module.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A grid cell coordinate.
///
/// Coordinates are signed so ring scans may step outside the map; such
/// cells are simply out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row (grows downward).
    pub y: i32,
}

impl Cell {
    /// Create a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset by a delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev distance (king moves).
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Direction offsets for 8-directional movement.
pub const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Terrain types of the battle surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellType {
    /// Open ground: walkable, buildings may stand here.
    #[default]
    Open,
    /// Rough ground: walkable, but nothing can be built on it.
    Rough,
    /// Impassable terrain feature.
    Blocked,
}

impl CellType {
    /// Returns true if this cell is walkable.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, Self::Blocked)
    }
}

/// Static terrain of a planet surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surface {
    width: u32,
    height: u32,
    cells: Vec<CellType>,
    exclusions: BTreeSet<Cell>,
}

impl Surface {
    /// Create a new surface with all cells open.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "Surface width must be positive");
        assert!(height > 0, "Surface height must be positive");

        Self {
            width,
            height,
            cells: vec![CellType::Open; (width as usize) * (height as usize)],
            exclusions: BTreeSet::new(),
        }
    }

    /// Surface width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Surface height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Check if a cell is within bounds.
    #[must_use]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    /// Terrain at a cell, `None` out of bounds.
    #[must_use]
    pub fn get_cell(&self, cell: Cell) -> Option<CellType> {
        self.index(cell).map(|i| self.cells[i])
    }

    /// Set terrain at a cell. Returns `false` if out of bounds.
    pub fn set_cell(&mut self, cell: Cell, cell_type: CellType) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.cells[i] = cell_type;
                true
            }
            None => false,
        }
    }

    /// Terrain-only walkability.
    #[must_use]
    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.get_cell(cell).is_some_and(CellType::is_walkable)
    }

    /// Terrain-only building test (ignores existing buildings).
    #[must_use]
    pub fn is_buildable(&self, cell: Cell) -> bool {
        self.get_cell(cell) == Some(CellType::Open)
    }

    /// Exclude a cell from every deployment zone.
    pub fn add_exclusion(&mut self, cell: Cell) {
        self.exclusions.insert(cell);
    }

    /// Cells excluded from deployment.
    #[must_use]
    pub fn exclusions(&self) -> &BTreeSet<Cell> {
        &self.exclusions
    }

    /// The center cell of the map.
    #[must_use]
    pub fn center(&self) -> Cell {
        Cell::new((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

/// Static passability: terrain plus live building footprints.
#[derive(Debug, Clone)]
pub struct PassabilityGrid {
    width: u32,
    height: u32,
    blocked: Vec<bool>,
    version: u64,
}

impl PassabilityGrid {
    /// Build from a surface and the footprints of standing buildings.
    pub fn build<'a>(surface: &Surface, footprints: impl IntoIterator<Item = &'a Footprint>) -> Self {
        let mut grid = Self {
            width: surface.width(),
            height: surface.height(),
            blocked: Vec::new(),
            version: 0,
        };
        grid.rebuild(surface, footprints);
        grid
    }

    /// Recompute after the set of standing buildings changed.
    pub fn rebuild<'a>(
        &mut self,
        surface: &Surface,
        footprints: impl IntoIterator<Item = &'a Footprint>,
    ) {
        self.blocked = surface.cells.iter().map(|c| !c.is_walkable()).collect();
        for footprint in footprints {
            for cell in footprint.cells() {
                if let Some(i) = surface.index(cell) {
                    self.blocked[i] = true;
                }
            }
        }
        self.version += 1;
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Increments each time the grid is rebuilt.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Check if a cell is within bounds.
    #[must_use]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Row-major index of an in-bounds cell.
    #[must_use]
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y as usize) * (self.width as usize) + (cell.x as usize))
    }

    /// Whether terrain and buildings allow a unit to stand on the cell.
    #[must_use]
    pub fn is_open(&self, cell: Cell) -> bool {
        self.index(cell).is_some_and(|i| !self.blocked[i])
    }

    /// Check if a diagonal move is valid (no corner cutting through blocked cells).
    #[must_use]
    pub fn is_step_valid(&self, from: Cell, dx: i32, dy: i32) -> bool {
        if !self.is_open(from.offset(dx, dy)) {
            return false;
        }
        if dx != 0 && dy != 0 {
            self.is_open(from.offset(dx, 0)) && self.is_open(from.offset(0, dy))
        } else {
            true
        }
    }
}

/// Rectangular area covered by a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Top-left cell.
    pub origin: Cell,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Footprint {
    /// Create a new footprint.
    #[must_use]
    pub const fn new(origin: Cell, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// All cells covered, row by row.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.height as i32).flat_map(move |dy| {
            (0..self.width as i32).map(move |dx| self.origin.offset(dx, dy))
        })
    }

    /// Check if the footprint covers a cell.
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= self.origin.x
            && cell.y >= self.origin.y
            && cell.x < self.origin.x + self.width as i32
            && cell.y < self.origin.y + self.height as i32
    }

    /// Chebyshev distance from a cell to the footprint (0 when inside).
    #[must_use]
    pub fn ring_distance(&self, cell: Cell) -> u32 {
        let max_x = self.origin.x + self.width as i32 - 1;
        let max_y = self.origin.y + self.height as i32 - 1;
        let dx = if cell.x < self.origin.x {
            self.origin.x - cell.x
        } else if cell.x > max_x {
            cell.x - max_x
        } else {
            0
        };
        let dy = if cell.y < self.origin.y {
            self.origin.y - cell.y
        } else if cell.y > max_y {
            cell.y - max_y
        } else {
            0
        };
        dx.max(dy) as u32
    }
}
