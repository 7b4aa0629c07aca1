//! # Battle Core
//!
//! Deterministic ground battle simulation.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond loading RON data files on request
//! - No system randomness (a ChaCha8 RNG seeded from the config)
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch runs
//! - Replays from a seed
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`battle`] - Lifecycle controller and tick loop
//! - [`placement`] - Deployment zones and ring-scan placement
//! - [`pathing`] - Shared cost fields, claims and stepping
//! - [`combat`] - Targeting, firing and damage
//! - [`ordnance`] - Mines, rockets and explosions
//! - [`entities`] - Entity types and the registry
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod battle;
pub mod buildings;
pub mod combat;
pub mod config;
pub mod entities;
pub mod error;
pub mod grid;
pub mod math;
pub mod ordnance;
pub mod pathing;
pub mod placement;
pub mod stats;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{BattleAi, IdleAi};
    pub use crate::battle::{Army, Battle, BattlePhase, BattleSetup, TickEvents};
    pub use crate::buildings::{Building, BuildingId, BuildingKind, GunProfile, Planet};
    pub use crate::config::BattleConfig;
    pub use crate::entities::{
        Explosion, ExplosionId, Gun, GunId, Mine, Order, Rocket, RocketId, Target, Unit, UnitId,
    };
    pub use crate::error::{BattleError, Result};
    pub use crate::grid::{Cell, CellType, Footprint, Surface};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::stats::{BattleInfo, BattleStats, PlayerId, Side};
    pub use crate::units::{Ability, UnitKind, UnitSpec, UnitTable};
}
