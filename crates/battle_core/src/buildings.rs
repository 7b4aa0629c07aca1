//! Colony buildings as seen by a ground battle.
//!
//! The battle receives the defender's [`Planet`] by value, mutates building
//! hit points while it runs and hands the planet back when concluded.
//!
//! All damage scaling uses integer or fixed-point math for deterministic
//! simulation.

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, Footprint, Surface};
use crate::math::{fixed_decimal, Fixed, Vec2Fixed};
use crate::stats::PlayerId;

/// Stable identifier of a colony building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

/// Broad building categories relevant to ground combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Carries guns.
    Defensive,
    /// The colony hub.
    Main,
    /// Anything else.
    #[default]
    Other,
}

/// Weapon profile shared by every gun of a defensive building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GunProfile {
    /// Damage per shot.
    pub damage: u32,
    /// Inclusive lower bound of the firing band.
    #[serde(with = "fixed_decimal")]
    pub min_range: Fixed,
    /// Exclusive upper bound of the firing band.
    #[serde(with = "fixed_decimal")]
    pub max_range: Fixed,
    /// Ticks between shots.
    pub cooldown: u32,
    /// Windup phases before a shot resolves.
    pub fire_phases: u32,
    /// Degrees turned per tick.
    #[serde(with = "fixed_decimal")]
    pub rotation_speed: Fixed,
}

impl Default for GunProfile {
    fn default() -> Self {
        Self {
            damage: 40,
            min_range: Fixed::ZERO,
            max_range: Fixed::from_num(7),
            cooldown: 15,
            fire_phases: 3,
            rotation_speed: Fixed::from_num(20),
        }
    }
}

// ============================================================================
// Building
// ============================================================================

/// A colony building placed on the battle surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Stable id.
    pub id: BuildingId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Category.
    #[serde(default)]
    pub kind: BuildingKind,
    /// Covered cells.
    pub footprint: Footprint,
    /// Current hit points, in base units.
    pub hp: u32,
    /// Hit points of the building type.
    pub base_max_hp: u32,
    /// Hit points after the owner's technology bonuses.
    pub owner_max_hp: u32,
    /// Upgrade level; defensive buildings carry one gun per level.
    #[serde(default)]
    pub upgrade_level: u32,
    /// Energy delivered to the building.
    #[serde(default)]
    pub assigned_energy: u32,
    /// Energy the building needs to run at full capacity.
    #[serde(default)]
    pub required_energy: u32,
    /// Switched on by the owner.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Weapon carried by defensive buildings.
    #[serde(default)]
    pub gun: Option<GunProfile>,
}

const fn enabled_default() -> bool {
    true
}

/// Outcome of a hit on a building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildingDamage {
    /// Hit points actually removed.
    pub applied: u32,
    /// Hit points dropped below half with this hit.
    pub crossed_half: bool,
    /// Hit points reached zero with this hit.
    pub destroyed: bool,
}

impl Building {
    /// Create a full-health building with no gun.
    #[must_use]
    pub fn new(id: BuildingId, kind: BuildingKind, footprint: Footprint, max_hp: u32) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            footprint,
            hp: max_hp,
            base_max_hp: max_hp,
            owner_max_hp: max_hp,
            upgrade_level: 0,
            assigned_energy: 0,
            required_energy: 0,
            enabled: true,
            gun: None,
        }
    }

    /// Attach a gun profile and mark the building defensive.
    #[must_use]
    pub fn with_gun(mut self, profile: GunProfile, upgrade_level: u32) -> Self {
        self.kind = BuildingKind::Defensive;
        self.gun = Some(profile);
        self.upgrade_level = upgrade_level;
        self
    }

    /// Set the energy supply.
    #[must_use]
    pub const fn with_energy(mut self, assigned: u32, required: u32) -> Self {
        self.assigned_energy = assigned;
        self.required_energy = required;
        self
    }

    /// Hit points reached zero.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.hp == 0
    }

    /// Standing and switched on.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        self.hp > 0 && self.enabled
    }

    /// Below half of its base hit points.
    #[must_use]
    pub const fn is_damaged(&self) -> bool {
        (self.hp as u64) * 2 < self.base_max_hp as u64
    }

    /// Number of guns the building fields at battle start.
    #[must_use]
    pub fn gun_count(&self) -> u32 {
        if self.kind == BuildingKind::Defensive && self.gun.is_some() {
            self.upgrade_level.max(1)
        } else {
            0
        }
    }

    /// Whether gun `index` out of `count` has enough power to fire.
    ///
    /// Guns switch off from the top index down as the energy ratio drops:
    /// gun `i` fires while `(i + 0.5) / count < assigned / required`.
    #[must_use]
    pub fn gun_has_power(&self, index: u32, count: u32) -> bool {
        if self.required_energy == 0 {
            return true;
        }
        if count == 0 {
            return false;
        }
        // (2i + 1) * required < 2 * count * assigned, all integer
        let lhs = u64::from(2 * index + 1) * u64::from(self.required_energy);
        let rhs = 2 * u64::from(count) * u64::from(self.assigned_energy);
        lhs < rhs
    }

    /// Scale raw weapon damage to base hit points and subtract it.
    pub fn apply_damage(&mut self, raw: u32) -> BuildingDamage {
        if self.hp == 0 {
            return BuildingDamage::default();
        }
        let owner_max = u64::from(self.owner_max_hp.max(1));
        let scaled = u64::from(raw) * u64::from(self.base_max_hp) / owner_max;
        let applied = scaled.min(u64::from(self.hp)) as u32;

        let was_damaged = self.is_damaged();
        self.hp -= applied;

        BuildingDamage {
            applied,
            crossed_half: !was_damaged && self.is_damaged(),
            destroyed: self.hp == 0,
        }
    }

    /// Position of the footprint center.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        let fp = &self.footprint;
        let half = |origin: i32, len: u32| {
            Fixed::from_num(origin) + Fixed::from_num(len.saturating_sub(1)) / 2
        };
        Vec2Fixed::new(half(fp.origin.x, fp.width), half(fp.origin.y, fp.height))
    }

    /// Distance from a point to the nearest cell center of the footprint.
    #[must_use]
    pub fn distance_to(&self, point: Vec2Fixed) -> Fixed {
        let fp = &self.footprint;
        let clamp = |value: Fixed, origin: i32, len: u32| {
            let lo = Fixed::from_num(origin);
            let hi = Fixed::from_num(origin + len.max(1) as i32 - 1);
            value.clamp(lo, hi)
        };
        let nearest = Vec2Fixed::new(
            clamp(point.x, fp.origin.x, fp.width),
            clamp(point.y, fp.origin.y, fp.height),
        );
        point.distance(nearest)
    }
}

// ============================================================================
// Planet
// ============================================================================

/// The colony a ground battle is fought over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    /// Display name.
    pub name: String,
    /// Current owner.
    pub owner: PlayerId,
    /// Battle surface.
    pub surface: Surface,
    /// Standing buildings.
    pub buildings: Vec<Building>,
    /// Accumulated defense bonus.
    #[serde(default)]
    pub defense_bonus: u32,
    /// The road network must be recomputed after the battle.
    #[serde(default)]
    pub roads_need_rebuild: bool,
}

impl Planet {
    /// Create a planet with no buildings.
    #[must_use]
    pub fn new(name: impl Into<String>, owner: PlayerId, surface: Surface) -> Self {
        Self {
            name: name.into(),
            owner,
            surface,
            buildings: Vec::new(),
            defense_bonus: 0,
            roads_need_rebuild: false,
        }
    }

    /// Look up a building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.iter().find(|b| b.id == id)
    }

    /// Mutable lookup by id.
    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.iter_mut().find(|b| b.id == id)
    }

    /// Building covering a cell.
    #[must_use]
    pub fn building_at(&self, cell: Cell) -> Option<&Building> {
        self.buildings.iter().find(|b| b.footprint.contains(cell))
    }

    /// Footprints of all standing buildings.
    pub fn footprints(&self) -> impl Iterator<Item = &Footprint> {
        self.buildings
            .iter()
            .filter(|b| !b.is_destroyed())
            .map(|b| &b.footprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower(level: u32) -> Building {
        Building::new(
            BuildingId(1),
            BuildingKind::Defensive,
            Footprint::new(Cell::new(4, 4), 2, 2),
            1000,
        )
        .with_gun(GunProfile::default(), level)
    }

    #[test]
    fn test_gun_count_follows_upgrade_level() {
        assert_eq!(tower(0).gun_count(), 1);
        assert_eq!(tower(3).gun_count(), 3);

        let mut plain = tower(2);
        plain.kind = BuildingKind::Main;
        assert_eq!(plain.gun_count(), 0);
    }

    #[test]
    fn test_power_gating_at_forty_percent() {
        let building = tower(3).with_energy(4, 10);
        assert!(building.gun_has_power(0, 3));
        assert!(!building.gun_has_power(1, 3));
        assert!(!building.gun_has_power(2, 3));
    }

    #[test]
    fn test_unpowered_requirement_always_fires() {
        let building = tower(3).with_energy(0, 0);
        assert!((0..3).all(|i| building.gun_has_power(i, 3)));
    }

    #[test]
    fn test_damage_scales_by_owner_max() {
        let mut building = tower(1);
        building.owner_max_hp = 2000;
        let result = building.apply_damage(100);
        assert_eq!(result.applied, 50);
        assert_eq!(building.hp, 950);
    }

    #[test]
    fn test_half_crossing_reported_once() {
        let mut building = tower(2);
        assert!(!building.apply_damage(400).crossed_half);
        assert!(building.apply_damage(200).crossed_half);
        assert!(!building.apply_damage(100).crossed_half);
        let last = building.apply_damage(10_000);
        assert!(last.destroyed);
        assert_eq!(building.hp, 0);
        assert_eq!(building.apply_damage(5), BuildingDamage::default());
    }

    #[test]
    fn test_distance_to_footprint() {
        let building = tower(1);
        // footprint spans cells 4..=5 on both axes
        assert_eq!(building.distance_to(Vec2Fixed::from_ints(5, 5)), Fixed::ZERO);
        assert_eq!(building.distance_to(Vec2Fixed::from_ints(8, 5)), Fixed::from_num(3));
        assert_eq!(building.distance_to(Vec2Fixed::from_ints(4, 1)), Fixed::from_num(3));
    }
}
