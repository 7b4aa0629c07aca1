//! Scenario loading and configuration.
//!
//! A scenario describes one complete battle: the planet's terrain and
//! buildings, both armies with the strategy driving each, the battle tuning
//! and a tick limit. Scenarios are RON files; terrain is drawn as rows of
//! characters so maps stay readable in the file:
//!
//! | Char | Terrain |
//! |------|---------|
//! | `.`  | open |
//! | `~`  | rough |
//! | `#`  | blocked |
//! | `x`  | open, excluded from deployment |

use std::path::Path;

use battle_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::strategies::StrategyKind;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Terrain rows or building placements do not describe a valid map.
    #[error("Invalid scenario map: {0}")]
    InvalidMap(String),
}

/// Ticks a scenario may run before it is called undecided.
pub const DEFAULT_MAX_TICKS: u64 = 6000;

const fn default_max_ticks() -> u64 {
    DEFAULT_MAX_TICKS
}

/// A complete battle scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Terrain rows, top row first.
    pub terrain: Vec<String>,
    /// Colony buildings standing on the planet.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// The invading army.
    pub attacker: ArmySetup,
    /// The garrison; its player owns the planet.
    pub defender: ArmySetup,
    /// Battle tuning. The seed is replaced per run.
    #[serde(default)]
    pub config: BattleConfig,
    /// Ticks before the run is cut off undecided.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Scenario {
    /// Names accepted by [`Scenario::builtin`].
    pub const BUILTIN: [&'static str; 2] = ["skirmish", "siege"];

    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// A built-in scenario by name, or a scenario file at that path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::builtin(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Look up a built-in scenario.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "skirmish" => Some(Self::skirmish()),
            "siege" => Some(Self::siege()),
            _ => None,
        }
    }

    /// A mixed fight on an open 24x24 field with no colony buildings.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Open Skirmish".to_string(),
            description: "Mixed armies meet on an empty field".to_string(),
            terrain: open_terrain(24, 24),
            buildings: Vec::new(),
            attacker: ArmySetup {
                player: 1,
                units: vec![
                    UnitKind::Tank,
                    UnitKind::Tank,
                    UnitKind::Tank,
                    UnitKind::Artillery,
                    UnitKind::Kamikaze,
                ],
                strategy: StrategyKind::Charge,
            },
            defender: ArmySetup {
                player: 2,
                units: vec![UnitKind::Tank, UnitKind::SelfRepairTank, UnitKind::Paralizer],
                strategy: StrategyKind::FocusFire,
            },
            config: BattleConfig::default(),
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// An assault on a walled colony with a hub and two gun towers.
    #[must_use]
    pub fn siege() -> Self {
        let mut terrain = open_terrain(32, 32);
        for row in terrain.iter_mut().take(9).skip(4) {
            row.replace_range(20..21, "#");
        }
        terrain[24].replace_range(10..13, "~~~");

        Self {
            name: "Colony Siege".to_string(),
            description: "Rocket-backed assault on a fortified colony".to_string(),
            terrain,
            buildings: vec![
                BuildingPlacement {
                    id: 1,
                    name: "Colony Hub".to_string(),
                    kind: BuildingKind::Main,
                    origin: (14, 14),
                    size: (3, 3),
                    max_hp: 2000,
                    guns: 0,
                    energy: None,
                    gun: None,
                },
                BuildingPlacement::tower(2, (9, 9), 2),
                BuildingPlacement::tower(3, (21, 21), 2),
            ],
            attacker: ArmySetup {
                player: 1,
                units: vec![
                    UnitKind::Tank,
                    UnitKind::Tank,
                    UnitKind::Tank,
                    UnitKind::Artillery,
                    UnitKind::Artillery,
                    UnitKind::RocketSled,
                    UnitKind::Kamikaze,
                    UnitKind::Radar,
                ],
                strategy: StrategyKind::Siege,
            },
            defender: ArmySetup {
                player: 2,
                units: vec![
                    UnitKind::Tank,
                    UnitKind::Paralizer,
                    UnitKind::RocketJammer,
                    UnitKind::Minelayer,
                ],
                strategy: StrategyKind::Hold,
            },
            config: BattleConfig::default(),
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// Map width and height in cells.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let width = self.terrain.first().map_or(0, |row| row.chars().count());
        (width as u32, self.terrain.len() as u32)
    }

    /// Check terrain shape, legend and building footprints.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return Err(ScenarioError::InvalidMap("terrain is empty".to_string()));
        }
        for (y, row) in self.terrain.iter().enumerate() {
            if row.chars().count() as u32 != width {
                return Err(ScenarioError::InvalidMap(format!(
                    "row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            if let Some(ch) = row.chars().find(|&c| terrain_of(c).is_none()) {
                return Err(ScenarioError::InvalidMap(format!("unknown terrain '{ch}' in row {y}")));
            }
        }
        for placement in &self.buildings {
            let (x, y) = placement.origin;
            let (w, h) = placement.size;
            let fits = x >= 0
                && y >= 0
                && w > 0
                && h > 0
                && x as u32 + w <= width
                && y as u32 + h <= height;
            if !fits {
                return Err(ScenarioError::InvalidMap(format!(
                    "building {} does not fit the map",
                    placement.id
                )));
            }
        }
        if self.attacker.player == self.defender.player {
            return Err(ScenarioError::InvalidMap(
                "attacker and defender must be different players".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the planet the battle is fought over.
    pub fn planet(&self) -> Result<Planet, ScenarioError> {
        self.validate()?;
        let (width, height) = self.dimensions();
        let mut surface = Surface::new(width, height);
        for (y, row) in self.terrain.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let cell = Cell::new(x as i32, y as i32);
                // Legend checked by validate()
                let cell_type = terrain_of(ch).unwrap_or_default();
                surface.set_cell(cell, cell_type);
                if ch == 'x' {
                    surface.add_exclusion(cell);
                }
            }
        }

        let mut planet = Planet::new(self.name.clone(), PlayerId(self.defender.player), surface);
        planet.buildings = self.buildings.iter().map(BuildingPlacement::to_building).collect();
        Ok(planet)
    }
}

/// Terrain for one legend character.
fn terrain_of(ch: char) -> Option<CellType> {
    match ch {
        '.' | 'x' => Some(CellType::Open),
        '~' => Some(CellType::Rough),
        '#' => Some(CellType::Blocked),
        _ => None,
    }
}

/// Rows of an all-open map.
#[must_use]
pub fn open_terrain(width: usize, height: usize) -> Vec<String> {
    vec![".".repeat(width); height]
}

/// One side of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmySetup {
    /// Commanding player id.
    pub player: u32,
    /// Ground inventory, deployed in order.
    pub units: Vec<UnitKind>,
    /// Computer player driving the side.
    #[serde(default)]
    pub strategy: StrategyKind,
}

/// Placement of a colony building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building id, unique per scenario.
    pub id: u32,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Building category.
    #[serde(default)]
    pub kind: BuildingKind,
    /// Top-left cell (x, y).
    pub origin: (i32, i32),
    /// Footprint (width, height).
    pub size: (u32, u32),
    /// Hit points at full health.
    pub max_hp: u32,
    /// Guns mounted; a nonzero count makes the building defensive.
    #[serde(default)]
    pub guns: u32,
    /// Energy supply (assigned, required).
    #[serde(default)]
    pub energy: Option<(u32, u32)>,
    /// Weapon profile; the standard gun when omitted.
    #[serde(default)]
    pub gun: Option<GunProfile>,
}

impl BuildingPlacement {
    /// A 2x2 gun tower with the standard gun profile.
    #[must_use]
    pub fn tower(id: u32, origin: (i32, i32), guns: u32) -> Self {
        Self {
            id,
            name: format!("Tower {id}"),
            kind: BuildingKind::Defensive,
            origin,
            size: (2, 2),
            max_hp: 1000,
            guns,
            energy: None,
            gun: None,
        }
    }

    /// The building this placement describes.
    #[must_use]
    pub fn to_building(&self) -> Building {
        let footprint = Footprint::new(Cell::new(self.origin.0, self.origin.1), self.size.0, self.size.1);
        let mut building = Building::new(BuildingId(self.id), self.kind, footprint, self.max_hp);
        building.name.clone_from(&self.name);
        if self.guns > 0 {
            building = building.with_gun(self.gun.clone().unwrap_or_default(), self.guns);
        }
        if let Some((assigned, required)) = self.energy {
            building = building.with_energy(assigned, required);
        }
        building
    }
}
