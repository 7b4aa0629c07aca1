//! Data-driven unit types.
//!
//! Every per-type decision in the simulation (range band, cooldown, windup,
//! movement class, special ability) is read from a [`UnitSpec`] row in the
//! [`UnitTable`]. Behavior that differs by type is dispatched on the
//! [`Ability`] tag in exactly one place per concern.
//!
//! The built-in table can be overridden from RON:
//!
//! ```ron
//! UnitTableFile(
//!     units: [
//!         UnitSpec(
//!             kind: Tank,
//!             max_hp: 400,
//!             damage: 35,
//!             min_range: 0.0,
//!             max_range: 4.0,
//!             area: 0.0,
//!             cooldown: 10,
//!             fire_phases: 3,
//!             speed: 0.25,
//!             rotation_speed: 30.0,
//!             projectile_speed: 0.0,
//!             ability: None,
//!             movement: Direct,
//!         ),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::math::{fixed_decimal, Fixed};

/// Ground unit type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    /// Direct-fire main battle tank.
    Tank,
    /// Indirect area-damage artillery.
    Artillery,
    /// Tank that slowly repairs itself.
    SelfRepairTank,
    /// Explosive carrier that detonates on its target.
    Kamikaze,
    /// Disables enemy units for a while.
    Paralizer,
    /// Launches rockets that travel to the target position.
    RocketSled,
    /// Neutralizes enemy rockets within its range.
    RocketJammer,
    /// Plants mines where it stands still.
    Minelayer,
    /// Sensor vehicle, non-combat.
    Radar,
    /// Sensor jammer, non-combat.
    RadarJammer,
}

impl UnitKind {
    /// Every unit kind, in table order.
    pub const ALL: [Self; 10] = [
        Self::Tank,
        Self::Artillery,
        Self::SelfRepairTank,
        Self::Kamikaze,
        Self::Paralizer,
        Self::RocketSled,
        Self::RocketJammer,
        Self::Minelayer,
        Self::Radar,
        Self::RadarJammer,
    ];
}

/// Special ability tag dispatched by the combat systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Ability {
    /// Plain direct damage.
    #[default]
    None,
    /// Damage falls off linearly around the impact point.
    AreaDamage,
    /// Damage plus a paralysis period on the target.
    Paralyze,
    /// Self-destructs into area damage.
    Kamikaze,
    /// Fires a rocket projectile.
    Rocket,
    /// Neutralizes enemy rockets in range.
    RocketJammer,
    /// Plants mines after standing still.
    Minelayer,
    /// Regains hit points over time.
    SelfRepair,
    /// Sensor, no battle effect.
    Radar,
    /// Sensor jammer, no battle effect.
    RadarJammer,
}

/// How a unit closes distance on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementClass {
    /// Closes in directly; may take greedy "get closer" steps.
    #[default]
    Direct,
    /// Fires from a distance; never takes greedy steps.
    Indirect,
    /// Does not engage.
    Support,
}

/// Behavior parameters of one unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Type tag this row describes.
    pub kind: UnitKind,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Damage per shot (mine damage for minelayers, blast damage for kamikazes).
    pub damage: u32,
    /// Inclusive lower bound of the firing band.
    #[serde(with = "fixed_decimal")]
    pub min_range: Fixed,
    /// Exclusive upper bound of the firing band (jamming radius for jammers).
    #[serde(with = "fixed_decimal")]
    pub max_range: Fixed,
    /// Blast radius for area weapons.
    #[serde(with = "fixed_decimal")]
    pub area: Fixed,
    /// Ticks between shots.
    pub cooldown: u32,
    /// Windup phases before a shot resolves.
    pub fire_phases: u32,
    /// Cells travelled per tick.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
    /// Degrees turned per tick.
    #[serde(with = "fixed_decimal")]
    pub rotation_speed: Fixed,
    /// Rocket travel speed in cells per tick.
    #[serde(with = "fixed_decimal")]
    pub projectile_speed: Fixed,
    /// Special ability tag.
    #[serde(default)]
    pub ability: Ability,
    /// Movement class.
    #[serde(default)]
    pub movement: MovementClass,
}

impl UnitSpec {
    /// Units of this type count toward victory.
    #[must_use]
    pub const fn is_combatant(&self) -> bool {
        !matches!(self.ability, Ability::Radar | Ability::RadarJammer)
    }

    /// Units of this type pick and shoot targets.
    #[must_use]
    pub const fn can_attack(&self) -> bool {
        self.damage > 0
            && !matches!(
                self.ability,
                Ability::RocketJammer | Ability::Minelayer | Ability::Radar | Ability::RadarJammer
            )
    }

    /// Greedy single-cell approach steps are allowed.
    #[must_use]
    pub fn may_get_closer(&self) -> bool {
        self.movement == MovementClass::Direct
    }
}

fn ratio(num: i32, den: i32) -> Fixed {
    Fixed::from_num(num) / Fixed::from_num(den)
}

/// Arguments for building a standard row; keeps the table below readable.
struct Row {
    max_hp: u32,
    damage: u32,
    range: (Fixed, Fixed),
    area: Fixed,
    cooldown: u32,
    fire_phases: u32,
    speed: Fixed,
    rotation_speed: i32,
    projectile_speed: Fixed,
    ability: Ability,
    movement: MovementClass,
}

impl Row {
    fn into_spec(self, kind: UnitKind) -> UnitSpec {
        UnitSpec {
            kind,
            max_hp: self.max_hp,
            damage: self.damage,
            min_range: self.range.0,
            max_range: self.range.1,
            area: self.area,
            cooldown: self.cooldown,
            fire_phases: self.fire_phases,
            speed: self.speed,
            rotation_speed: Fixed::from_num(self.rotation_speed),
            projectile_speed: self.projectile_speed,
            ability: self.ability,
            movement: self.movement,
        }
    }
}

fn standard_spec(kind: UnitKind) -> UnitSpec {
    let zero = Fixed::ZERO;
    let support = |max_hp: u32, damage: u32, range: i32, ability: Ability| Row {
        max_hp,
        damage,
        range: (zero, Fixed::from_num(range)),
        area: zero,
        cooldown: 0,
        fire_phases: 1,
        speed: ratio(1, 5),
        rotation_speed: 30,
        projectile_speed: zero,
        ability,
        movement: MovementClass::Support,
    };

    let row = match kind {
        UnitKind::Tank => Row {
            max_hp: 300,
            damage: 30,
            range: (zero, Fixed::from_num(4)),
            area: zero,
            cooldown: 10,
            fire_phases: 3,
            speed: ratio(1, 4),
            rotation_speed: 30,
            projectile_speed: zero,
            ability: Ability::None,
            movement: MovementClass::Direct,
        },
        UnitKind::Artillery => Row {
            max_hp: 200,
            damage: 60,
            range: (Fixed::from_num(3), Fixed::from_num(9)),
            area: Fixed::from_num(2),
            cooldown: 25,
            fire_phases: 4,
            speed: ratio(1, 6),
            rotation_speed: 15,
            projectile_speed: zero,
            ability: Ability::AreaDamage,
            movement: MovementClass::Indirect,
        },
        UnitKind::SelfRepairTank => Row {
            max_hp: 350,
            damage: 35,
            range: (zero, Fixed::from_num(4)),
            area: zero,
            cooldown: 12,
            fire_phases: 3,
            speed: ratio(1, 5),
            rotation_speed: 25,
            projectile_speed: zero,
            ability: Ability::SelfRepair,
            movement: MovementClass::Direct,
        },
        UnitKind::Kamikaze => Row {
            max_hp: 150,
            damage: 200,
            range: (zero, ratio(3, 2)),
            area: Fixed::from_num(3),
            cooldown: 10,
            fire_phases: 1,
            speed: ratio(1, 3),
            rotation_speed: 45,
            projectile_speed: zero,
            ability: Ability::Kamikaze,
            movement: MovementClass::Direct,
        },
        UnitKind::Paralizer => Row {
            max_hp: 180,
            damage: 10,
            range: (zero, Fixed::from_num(5)),
            area: zero,
            cooldown: 20,
            fire_phases: 2,
            speed: ratio(1, 4),
            rotation_speed: 30,
            projectile_speed: zero,
            ability: Ability::Paralyze,
            movement: MovementClass::Direct,
        },
        UnitKind::RocketSled => Row {
            max_hp: 180,
            damage: 80,
            range: (Fixed::from_num(2), Fixed::from_num(10)),
            area: ratio(3, 2),
            cooldown: 30,
            fire_phases: 3,
            speed: ratio(1, 5),
            rotation_speed: 20,
            projectile_speed: ratio(1, 2),
            ability: Ability::Rocket,
            movement: MovementClass::Indirect,
        },
        UnitKind::RocketJammer => support(150, 0, 5, Ability::RocketJammer),
        UnitKind::Minelayer => support(150, 100, 0, Ability::Minelayer),
        UnitKind::Radar => support(100, 0, 0, Ability::Radar),
        UnitKind::RadarJammer => support(100, 0, 0, Ability::RadarJammer),
    };
    row.into_spec(kind)
}

/// On-disk shape of a unit table override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTableFile {
    /// Rows replacing the built-in ones.
    pub units: Vec<UnitSpec>,
}

/// The per-type behavior table.
///
/// Always holds a row for every [`UnitKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTable {
    specs: BTreeMap<UnitKind, UnitSpec>,
}

impl UnitTable {
    /// The built-in balance table.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            specs: UnitKind::ALL
                .iter()
                .map(|&kind| (kind, standard_spec(kind)))
                .collect(),
        }
    }

    /// Look up the row for a unit kind.
    #[must_use]
    pub fn get(&self, kind: UnitKind) -> &UnitSpec {
        // Every constructor fills all kinds.
        &self.specs[&kind]
    }

    /// Replace a row.
    pub fn set(&mut self, spec: UnitSpec) {
        self.specs.insert(spec.kind, spec);
    }

    /// Iterate rows in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitSpec> {
        self.specs.values()
    }

    /// Built-in table with rows overridden from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        Self::parse(source, "<inline>")
    }

    /// Built-in table with rows overridden from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, &path.display().to_string())
    }

    fn parse(source: &str, label: &str) -> Result<Self> {
        let file: UnitTableFile = ron::from_str(source).map_err(|e| BattleError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })?;
        let mut table = Self::standard();
        for spec in file.units {
            table.set(spec);
        }
        Ok(table)
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::standard()
    }
}
