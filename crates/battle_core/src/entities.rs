//! Battle entities and the registry that owns them.
//!
//! Every live object of a battle (units, guns, mines, rockets, explosions)
//! lives in the [`Registry`]. Entities refer to each other only through
//! stable ids; a reference to something that no longer exists is a lookup
//! miss, never a dangling pointer.
//!
//! # Determinism
//!
//! Storage uses hash maps for O(1) lookup. Every system iterates over a
//! sorted id snapshot and re-checks each id before use, so entities removed
//! mid-tick are neither skipped nor processed twice.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::buildings::{BuildingId, GunProfile};
use crate::combat::FireState;
use crate::grid::Cell;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::pathing::Motion;
use crate::stats::{PlayerId, Side};
use crate::units::{UnitKind, UnitSpec};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

entity_id!(
    /// Stable identifier of a unit.
    UnitId
);
entity_id!(
    /// Stable identifier of a gun.
    GunId
);
entity_id!(
    /// Stable identifier of a rocket.
    RocketId
);
entity_id!(
    /// Stable identifier of an explosion.
    ExplosionId
);

/// Something a unit can shoot at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// An enemy unit.
    Unit(UnitId),
    /// A defender building.
    Building(BuildingId),
}

/// The single active order of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Walk to a cell, ignoring enemies.
    MoveTo(Cell),
    /// Chase and destroy a unit.
    AttackUnit(UnitId),
    /// Approach and demolish a building.
    AttackBuilding(BuildingId),
    /// Walk to a cell, engaging enemies met on the way.
    AttackMove(Cell),
}

// ============================================================================
// Units and guns
// ============================================================================

/// A ground unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Stable id.
    pub id: UnitId,
    /// Side the unit fights for.
    pub side: Side,
    /// Owning player.
    pub owner: PlayerId,
    /// Type tag.
    pub kind: UnitKind,
    /// Position in cell units.
    pub position: Vec2Fixed,
    /// Facing in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Cooldown and windup counters.
    pub fire: FireState,
    /// Remaining paralysis ticks.
    pub paralyzed_ttl: u32,
    /// Paralizer that disabled this unit.
    pub paralyzed_by: Option<UnitId>,
    /// Active order.
    pub order: Option<Order>,
    /// Target currently being shot at.
    pub engaged: Option<Target>,
    /// Hold position and engage anything in range.
    pub guard: bool,
    /// Selected in the UI.
    pub selected: bool,
    /// Ticks spent on the ability timer (mine dwell, repair pulse).
    pub dwell: u32,
    pub(crate) motion: Motion,
}

impl Unit {
    /// A fresh unit standing on `cell`, guarding, at full health.
    ///
    /// The id is assigned by [`Registry::insert_unit`].
    #[must_use]
    pub fn new(side: Side, owner: PlayerId, spec: &UnitSpec, cell: Cell) -> Self {
        Self {
            id: UnitId(0),
            side,
            owner,
            kind: spec.kind,
            position: Vec2Fixed::from_cell(cell),
            heading: Fixed::ZERO,
            hp: spec.max_hp,
            max_hp: spec.max_hp,
            fire: FireState::default(),
            paralyzed_ttl: 0,
            paralyzed_by: None,
            order: None,
            engaged: None,
            guard: true,
            selected: false,
            dwell: 0,
            motion: Motion::at(cell),
        }
    }

    /// Hit points above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Currently disabled by a paralizer.
    #[must_use]
    pub const fn is_paralyzed(&self) -> bool {
        self.paralyzed_ttl > 0
    }

    /// Cell the unit occupies (the one it is leaving while mid-step).
    #[must_use]
    pub fn cell(&self) -> Cell {
        self.motion.cell()
    }

    /// Remaining planned cells, next step first.
    #[must_use]
    pub fn path(&self) -> &VecDeque<Cell> {
        self.motion.path()
    }

    /// Cell reserved for the step in progress.
    #[must_use]
    pub fn reserved(&self) -> Option<Cell> {
        self.motion.next()
    }

    /// Mid-step between two cells.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.motion.next().is_some()
    }
}

/// A gun mounted on a defensive building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gun {
    /// Stable id.
    pub id: GunId,
    /// Owning building.
    pub building: BuildingId,
    /// Barrel position.
    pub position: Vec2Fixed,
    /// Firing index within the building.
    pub index: u32,
    /// Number of guns the building started with.
    pub count: u32,
    /// Facing in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Unit currently being shot at.
    pub engaged: Option<UnitId>,
    /// Cooldown and windup counters.
    pub fire: FireState,
    /// Weapon parameters.
    pub profile: GunProfile,
}

// ============================================================================
// Ordnance
// ============================================================================

/// A planted mine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mine {
    /// Cell the mine sits on.
    pub cell: Cell,
    /// Side that planted it.
    pub side: Side,
    /// Damage dealt to the unit that triggers it.
    pub damage: u32,
}

/// A rocket in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rocket {
    /// Stable id.
    pub id: RocketId,
    /// Side that fired it.
    pub side: Side,
    /// Current position.
    pub position: Vec2Fixed,
    /// Impact point.
    pub target: Vec2Fixed,
    /// Cells per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Flight direction in degrees.
    #[serde(with = "fixed_serde")]
    pub heading: Fixed,
    /// Payload damage.
    pub damage: u32,
    /// Blast radius.
    #[serde(with = "fixed_serde")]
    pub area: Fixed,
}

/// An explosion animation, optionally carrying the removal of a dead unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explosion {
    /// Stable id.
    pub id: ExplosionId,
    /// Where it happens.
    pub position: Vec2Fixed,
    /// Animation phase.
    pub phase: u32,
    /// Unit removed from the battle at half-life.
    pub kill_target: Option<UnitId>,
}

// ============================================================================
// Registry
// ============================================================================

/// Owner of every battle entity.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    units: HashMap<UnitId, Unit>,
    guns: HashMap<GunId, Gun>,
    mines: BTreeMap<Cell, Mine>,
    rockets: HashMap<RocketId, Rocket>,
    explosions: HashMap<ExplosionId, Explosion>,
    next_id: u64,
}

fn sorted_keys<K: Copy + Ord, V>(map: &HashMap<K, V>) -> Vec<K> {
    let mut ids: Vec<_> = map.keys().copied().collect();
    ids.sort_unstable();
    ids
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Insert a unit and return its assigned id.
    pub fn insert_unit(&mut self, mut unit: Unit) -> UnitId {
        let id = UnitId(self.allocate());
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Mutable unit lookup.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Unit ids in ascending order.
    #[must_use]
    pub fn sorted_unit_ids(&self) -> Vec<UnitId> {
        sorted_keys(&self.units)
    }

    /// Units in id order.
    #[must_use]
    pub fn units(&self) -> Vec<&Unit> {
        self.sorted_unit_ids()
            .into_iter()
            .filter_map(|id| self.units.get(&id))
            .collect()
    }

    /// Number of units, dead or alive.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Insert a gun and return its assigned id.
    pub fn insert_gun(&mut self, mut gun: Gun) -> GunId {
        let id = GunId(self.allocate());
        gun.id = id;
        self.guns.insert(id, gun);
        id
    }

    /// Remove a gun.
    pub fn remove_gun(&mut self, id: GunId) -> Option<Gun> {
        self.guns.remove(&id)
    }

    /// Look up a gun.
    #[must_use]
    pub fn gun(&self, id: GunId) -> Option<&Gun> {
        self.guns.get(&id)
    }

    /// Mutable gun lookup.
    pub fn gun_mut(&mut self, id: GunId) -> Option<&mut Gun> {
        self.guns.get_mut(&id)
    }

    /// Gun ids in ascending order.
    #[must_use]
    pub fn sorted_gun_ids(&self) -> Vec<GunId> {
        sorted_keys(&self.guns)
    }

    /// Guns in id order.
    #[must_use]
    pub fn guns(&self) -> Vec<&Gun> {
        self.sorted_gun_ids()
            .into_iter()
            .filter_map(|id| self.guns.get(&id))
            .collect()
    }

    /// Guns of one building, ordered by firing index.
    #[must_use]
    pub fn guns_of(&self, building: BuildingId) -> Vec<GunId> {
        let mut guns: Vec<_> = self
            .guns
            .values()
            .filter(|g| g.building == building)
            .map(|g| (g.index, g.id))
            .collect();
        guns.sort_unstable();
        guns.into_iter().map(|(_, id)| id).collect()
    }

    /// Plant a mine. Returns `false` if the cell already holds one.
    pub fn plant_mine(&mut self, mine: Mine) -> bool {
        if self.mines.contains_key(&mine.cell) {
            return false;
        }
        self.mines.insert(mine.cell, mine);
        true
    }

    /// Mine on a cell.
    #[must_use]
    pub fn mine_at(&self, cell: Cell) -> Option<&Mine> {
        self.mines.get(&cell)
    }

    /// Remove the mine on a cell.
    pub fn remove_mine(&mut self, cell: Cell) -> Option<Mine> {
        self.mines.remove(&cell)
    }

    /// Mines in cell order.
    pub fn mines(&self) -> impl Iterator<Item = &Mine> {
        self.mines.values()
    }

    /// Insert a rocket and return its assigned id.
    pub fn insert_rocket(&mut self, mut rocket: Rocket) -> RocketId {
        let id = RocketId(self.allocate());
        rocket.id = id;
        self.rockets.insert(id, rocket);
        id
    }

    /// Remove a rocket.
    pub fn remove_rocket(&mut self, id: RocketId) -> Option<Rocket> {
        self.rockets.remove(&id)
    }

    /// Look up a rocket.
    #[must_use]
    pub fn rocket(&self, id: RocketId) -> Option<&Rocket> {
        self.rockets.get(&id)
    }

    /// Mutable rocket lookup.
    pub fn rocket_mut(&mut self, id: RocketId) -> Option<&mut Rocket> {
        self.rockets.get_mut(&id)
    }

    /// Rocket ids in ascending order.
    #[must_use]
    pub fn sorted_rocket_ids(&self) -> Vec<RocketId> {
        sorted_keys(&self.rockets)
    }

    /// Rockets in id order.
    #[must_use]
    pub fn rockets(&self) -> Vec<&Rocket> {
        self.sorted_rocket_ids()
            .into_iter()
            .filter_map(|id| self.rockets.get(&id))
            .collect()
    }

    /// Insert an explosion and return its assigned id.
    pub fn insert_explosion(&mut self, mut explosion: Explosion) -> ExplosionId {
        let id = ExplosionId(self.allocate());
        explosion.id = id;
        self.explosions.insert(id, explosion);
        id
    }

    /// Remove an explosion.
    pub fn remove_explosion(&mut self, id: ExplosionId) -> Option<Explosion> {
        self.explosions.remove(&id)
    }

    /// Mutable explosion lookup.
    pub fn explosion_mut(&mut self, id: ExplosionId) -> Option<&mut Explosion> {
        self.explosions.get_mut(&id)
    }

    /// Explosion ids in ascending order.
    #[must_use]
    pub fn sorted_explosion_ids(&self) -> Vec<ExplosionId> {
        sorted_keys(&self.explosions)
    }

    /// Explosions in id order.
    #[must_use]
    pub fn explosions(&self) -> Vec<&Explosion> {
        self.sorted_explosion_ids()
            .into_iter()
            .filter_map(|id| self.explosions.get(&id))
            .collect()
    }

    /// Rockets or explosions still in progress.
    #[must_use]
    pub fn has_pending_effects(&self) -> bool {
        !self.rockets.is_empty() || !self.explosions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitTable;

    fn tank(side: Side, cell: Cell) -> Unit {
        let table = UnitTable::standard();
        Unit::new(side, PlayerId(1), table.get(UnitKind::Tank), cell)
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut registry = Registry::new();
        let a = registry.insert_unit(tank(Side::Attacker, Cell::new(0, 0)));
        let e = registry.insert_explosion(Explosion {
            id: ExplosionId(0),
            position: Vec2Fixed::ZERO,
            phase: 0,
            kill_target: None,
        });
        let b = registry.insert_unit(tank(Side::Defender, Cell::new(1, 0)));

        assert_eq!(a, UnitId(1));
        assert_eq!(e, ExplosionId(2));
        assert_eq!(b, UnitId(3));
    }

    #[test]
    fn test_sorted_unit_ids() {
        let mut registry = Registry::new();
        for x in 0..5 {
            registry.insert_unit(tank(Side::Attacker, Cell::new(x, 0)));
        }
        registry.remove_unit(UnitId(3));

        let ids = registry.sorted_unit_ids();
        assert_eq!(ids, vec![UnitId(1), UnitId(2), UnitId(4), UnitId(5)]);
        assert_eq!(registry.units().len(), 4);
    }

    #[test]
    fn test_one_mine_per_cell() {
        let mut registry = Registry::new();
        let mine = Mine {
            cell: Cell::new(2, 2),
            side: Side::Defender,
            damage: 50,
        };
        assert!(registry.plant_mine(mine));
        assert!(!registry.plant_mine(mine));
        assert!(registry.mine_at(Cell::new(2, 2)).is_some());
        assert!(registry.remove_mine(Cell::new(2, 2)).is_some());
        assert!(registry.mine_at(Cell::new(2, 2)).is_none());
    }

    #[test]
    fn test_new_unit_guards_at_full_health() {
        let unit = tank(Side::Attacker, Cell::new(3, 4));
        assert!(unit.guard);
        assert!(unit.is_alive());
        assert_eq!(unit.hp, unit.max_hp);
        assert_eq!(unit.cell(), Cell::new(3, 4));
        assert!(unit.path().is_empty());
        assert!(!unit.is_moving());
    }
}
