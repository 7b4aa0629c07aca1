//! Scripted AI strategies for headless battles.
//!
//! Each scenario side names a [`StrategyKind`]; [`ScriptedAi`] turns it into
//! a [`BattleAi`] that commands the side through the ordinary order API.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use battle_core::prelude::*;
use std::result::Result;
use battle_core::units::MovementClass;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ticks between order sweeps.
const SWEEP_INTERVAL: u64 = 20;
/// Focus-fire retargets faster so kills are followed up.
const FOCUS_INTERVAL: u64 = 10;

/// Named battle strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Issue no orders; units guard where they were deployed.
    #[default]
    Idle,
    /// Guard in place; kamikazes detonate on adjacent enemies.
    Hold,
    /// Attack-move every idle unit to the map center.
    Charge,
    /// Charge, but retreat once half the combat units are lost.
    Cautious,
    /// Gang up on the weakest enemy unit.
    FocusFire,
    /// Demolish the nearest colony building, then charge.
    Siege,
}

impl StrategyKind {
    /// Every strategy, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Hold,
        Self::Charge,
        Self::Cautious,
        Self::FocusFire,
        Self::Siege,
    ];

    /// Lowercase name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Hold => "hold",
            Self::Charge => "charge",
            Self::Cautious => "cautious",
            Self::FocusFire => "focus_fire",
            Self::Siege => "siege",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| format!("unknown strategy '{s}'"))
    }
}

/// A [`BattleAi`] following one [`StrategyKind`].
#[derive(Debug, Clone)]
pub struct ScriptedAi {
    kind: StrategyKind,
    starting_strength: usize,
    orders_issued: u64,
}

impl ScriptedAi {
    /// Create an AI for a strategy.
    #[must_use]
    pub const fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            starting_strength: 0,
            orders_issued: 0,
        }
    }

    /// The strategy being followed.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Orders issued so far.
    #[must_use]
    pub const fn orders_issued(&self) -> u64 {
        self.orders_issued
    }

    fn sweep(&mut self, side: Side, battle: &mut Battle) {
        match self.kind {
            StrategyKind::Idle => {}
            StrategyKind::Hold => self.detonate_adjacent(side, battle),
            StrategyKind::Charge => self.charge(side, battle),
            StrategyKind::Cautious => {
                if side == Side::Attacker && combat_strength(side, battle) * 2 < self.starting_strength {
                    debug!(?side, "Cautious strategy retreats");
                    battle.set_retreat(true);
                } else {
                    self.charge(side, battle);
                }
            }
            StrategyKind::FocusFire => self.focus_fire(side, battle),
            StrategyKind::Siege => {
                if side == Side::Attacker {
                    self.siege(side, battle);
                } else {
                    self.detonate_adjacent(side, battle);
                }
            }
        }
    }

    fn sweep_due(&self, battle: &Battle) -> bool {
        let interval = match self.kind {
            StrategyKind::FocusFire => FOCUS_INTERVAL,
            StrategyKind::Hold => 1,
            _ => SWEEP_INTERVAL,
        };
        battle.tick_count() % interval == 0
    }

    /// Attack-move idle units toward the map center.
    fn charge(&mut self, side: Side, battle: &mut Battle) {
        let target = battle.planet().surface.center();
        let idle: Vec<UnitId> = battle
            .units_of(side)
            .into_iter()
            .filter(|u| u.order.is_none() && u.cell().chebyshev(target) > 1)
            .map(|u| u.id)
            .collect();
        for id in idle {
            battle.attack_move(id, target);
            self.orders_issued += 1;
        }
    }

    /// Every armed unit chases the enemy with the fewest hit points.
    fn focus_fire(&mut self, side: Side, battle: &mut Battle) {
        let weakest = battle
            .units_of(side.opponent())
            .into_iter()
            .filter(|u| battle.table().get(u.kind).is_combatant())
            .min_by_key(|u| (u.hp, u.id))
            .map(|u| u.id);
        let Some(target) = weakest else {
            self.charge(side, battle);
            return;
        };

        let hunters: Vec<UnitId> = battle
            .units_of(side)
            .into_iter()
            .filter(|u| {
                let spec = battle.table().get(u.kind);
                spec.can_attack() && u.order != Some(Order::AttackUnit(target))
            })
            .map(|u| u.id)
            .collect();
        for id in hunters {
            battle.attack_unit(id, target);
            self.orders_issued += 1;
        }
    }

    /// Armed units demolish the nearest building; support units follow to
    /// the center.
    fn siege(&mut self, side: Side, battle: &mut Battle) {
        if battle.planet().buildings.is_empty() {
            self.charge(side, battle);
            return;
        }

        let mut plan = BTreeMap::new();
        for unit in battle.units_of(side) {
            if unit.order.is_some() {
                continue;
            }
            let spec = battle.table().get(unit.kind);
            let order = if spec.can_attack() {
                battle
                    .planet()
                    .buildings
                    .iter()
                    .filter(|b| !b.is_destroyed())
                    .min_by_key(|b| (b.distance_to(unit.position), b.id))
                    .map(|b| Order::AttackBuilding(b.id))
            } else if spec.movement == MovementClass::Support {
                Some(Order::MoveTo(battle.planet().surface.center()))
            } else {
                None
            };
            if let Some(order) = order {
                plan.insert(unit.id, order);
            }
        }

        for (id, order) in plan {
            match order {
                Order::AttackBuilding(building) => battle.attack_building(id, building),
                Order::MoveTo(cell) => battle.move_unit(id, cell),
                Order::AttackUnit(target) => battle.attack_unit(id, target),
                Order::AttackMove(cell) => battle.attack_move(id, cell),
            }
            self.orders_issued += 1;
        }
    }

    /// Kamikazes blow up when an enemy stands next to them.
    fn detonate_adjacent(&mut self, side: Side, battle: &mut Battle) {
        let enemies: Vec<Cell> = battle.units_of(side.opponent()).iter().map(|u| u.cell()).collect();
        let bombers: Vec<UnitId> = battle
            .units_of(side)
            .into_iter()
            .filter(|u| u.kind == UnitKind::Kamikaze && !u.is_paralyzed())
            .filter(|u| enemies.iter().any(|&e| e.chebyshev(u.cell()) <= 1))
            .map(|u| u.id)
            .collect();
        for id in bombers {
            battle.special(id);
            self.orders_issued += 1;
        }
    }
}

/// Living units of a side that count toward victory.
fn combat_strength(side: Side, battle: &Battle) -> usize {
    battle
        .units_of(side)
        .iter()
        .filter(|u| battle.table().get(u.kind).is_combatant())
        .count()
}

impl BattleAi for ScriptedAi {
    fn battle_init(&mut self, side: Side, battle: &mut Battle) {
        self.starting_strength = combat_strength(side, battle);
        debug!(?side, strategy = %self.kind, strength = self.starting_strength, "Strategy engaged");
        self.sweep(side, battle);
    }

    fn battle_tick(&mut self, side: Side, battle: &mut Battle) {
        if self.sweep_due(battle) {
            self.sweep(side, battle);
        }
    }

    fn battle_done(&mut self, side: Side, _battle: &Battle) {
        debug!(?side, strategy = %self.kind, orders = self.orders_issued, "Strategy finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_test_utils::fixtures::{open_planet, place, sandbox};

    #[test]
    fn test_strategy_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>(), Ok(kind));
        }
        assert_eq!("Focus-Fire".parse::<StrategyKind>(), Ok(StrategyKind::FocusFire));
        assert!("turtle".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_charge_orders_idle_units() {
        let mut battle = sandbox(open_planet(16, 16), &[UnitKind::Tank, UnitKind::Tank], &[UnitKind::Tank], 1);
        let a = place(&mut battle, Side::Attacker, Cell::new(1, 1));
        let b = place(&mut battle, Side::Attacker, Cell::new(1, 3));
        place(&mut battle, Side::Defender, Cell::new(14, 14));
        battle.start().unwrap();

        let mut ai = ScriptedAi::new(StrategyKind::Charge);
        ai.battle_init(Side::Attacker, &mut battle);

        let center = Cell::new(8, 8);
        assert_eq!(battle.unit(a).unwrap().order, Some(Order::AttackMove(center)));
        assert_eq!(battle.unit(b).unwrap().order, Some(Order::AttackMove(center)));
        assert_eq!(ai.orders_issued(), 2);
    }

    #[test]
    fn test_focus_fire_picks_weakest() {
        let mut battle = sandbox(
            open_planet(16, 16),
            &[UnitKind::Tank, UnitKind::Minelayer],
            &[UnitKind::Tank, UnitKind::Tank],
            1,
        );
        let hunter = place(&mut battle, Side::Attacker, Cell::new(1, 1));
        let layer = place(&mut battle, Side::Attacker, Cell::new(1, 3));
        place(&mut battle, Side::Defender, Cell::new(14, 14));
        let weak = place(&mut battle, Side::Defender, Cell::new(14, 10));
        battle.start().unwrap();
        battle.damage_area(Vec2Fixed::from_ints(14, 10), 50, Fixed::from_num(1), None);

        let mut ai = ScriptedAi::new(StrategyKind::FocusFire);
        ai.battle_init(Side::Attacker, &mut battle);

        assert_eq!(battle.unit(hunter).unwrap().order, Some(Order::AttackUnit(weak)));
        assert_eq!(battle.unit(layer).unwrap().order, None);
    }

    #[test]
    fn test_siege_targets_nearest_building() {
        let mut planet = open_planet(20, 20);
        planet.buildings.push(battle_test_utils::fixtures::tower(2, Cell::new(15, 15), 1));
        planet.buildings.push(battle_test_utils::fixtures::hub(1, Cell::new(4, 4)));
        let mut battle = sandbox(planet, &[UnitKind::Tank, UnitKind::RocketJammer], &[UnitKind::Tank], 1);
        let tank = place(&mut battle, Side::Attacker, Cell::new(0, 0));
        let jammer = place(&mut battle, Side::Attacker, Cell::new(0, 2));
        place(&mut battle, Side::Defender, Cell::new(19, 0));
        battle.start().unwrap();

        let mut ai = ScriptedAi::new(StrategyKind::Siege);
        ai.battle_init(Side::Attacker, &mut battle);

        assert_eq!(battle.unit(tank).unwrap().order, Some(Order::AttackBuilding(BuildingId(1))));
        assert_eq!(battle.unit(jammer).unwrap().order, Some(Order::MoveTo(Cell::new(10, 10))));
    }

    #[test]
    fn test_hold_detonates_next_to_enemy() {
        let mut battle = sandbox(open_planet(12, 12), &[UnitKind::Tank], &[UnitKind::Kamikaze], 1);
        place(&mut battle, Side::Attacker, Cell::new(5, 5));
        let bomber = place(&mut battle, Side::Defender, Cell::new(6, 6));
        battle.start().unwrap();

        let mut ai = ScriptedAi::new(StrategyKind::Hold);
        ai.battle_init(Side::Defender, &mut battle);

        assert!(!battle.unit(bomber).unwrap().is_alive());
    }

    #[test]
    fn test_cautious_retreats_after_losses() {
        let mut battle = sandbox(
            open_planet(16, 16),
            &[UnitKind::Tank, UnitKind::Tank, UnitKind::Tank],
            &[UnitKind::Tank],
            1,
        );
        place(&mut battle, Side::Attacker, Cell::new(1, 1));
        place(&mut battle, Side::Attacker, Cell::new(1, 4));
        place(&mut battle, Side::Attacker, Cell::new(1, 7));
        place(&mut battle, Side::Defender, Cell::new(14, 14));
        battle.start().unwrap();

        let mut ai = ScriptedAi::new(StrategyKind::Cautious);
        ai.battle_init(Side::Attacker, &mut battle);
        assert!(!battle.is_retreating());

        battle.damage_area(Vec2Fixed::from_ints(1, 1), 1000, Fixed::from_num(1), None);
        battle.damage_area(Vec2Fixed::from_ints(1, 4), 1000, Fixed::from_num(1), None);
        ai.battle_tick(Side::Attacker, &mut battle);
        assert!(battle.is_retreating());
    }
}
