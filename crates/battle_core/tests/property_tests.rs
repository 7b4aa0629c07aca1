//! Property-based tests for damage, repair and occupancy.

use std::collections::HashSet;

use battle_core::prelude::*;
use battle_test_utils::determinism::strategies::{arb_army, arb_damage, arb_seed};
use battle_test_utils::fixtures::{assault, fixed, open_planet, place, sandbox};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Hit points never underflow and a unit dies exactly when they reach zero.
    #[test]
    fn hit_points_stay_in_bounds(damages in proptest::collection::vec(arb_damage(), 1..8)) {
        let mut battle = sandbox(open_planet(10, 10), &[UnitKind::Tank], &[UnitKind::Tank], 1);
        place(&mut battle, Side::Attacker, Cell::new(0, 0));
        let target = place(&mut battle, Side::Defender, Cell::new(6, 6));
        let max_hp = battle.unit(target).unwrap().max_hp;

        let mut total: u32 = 0;
        for damage in damages {
            battle.damage_area(Vec2Fixed::from_ints(6, 6), damage, fixed(1), Some(Side::Attacker));
            total = total.saturating_add(damage);

            let unit = battle.unit(target).unwrap();
            prop_assert!(unit.hp <= max_hp);
            prop_assert_eq!(unit.hp, max_hp.saturating_sub(total));
            prop_assert_eq!(unit.is_alive(), total < max_hp);
        }
        let expected_losses = u32::from(total >= max_hp);
        prop_assert_eq!(battle.stats().defender.units_lost, expected_losses);
    }

    /// Self-repair restores hit points in pulses and never overshoots.
    #[test]
    fn self_repair_never_exceeds_max(damage in 1u32..350) {
        let mut battle = sandbox(open_planet(16, 16), &[UnitKind::Tank], &[UnitKind::SelfRepairTank], 1);
        place(&mut battle, Side::Attacker, Cell::new(0, 0));
        let repairer = place(&mut battle, Side::Defender, Cell::new(15, 15));
        battle.start().unwrap();

        battle.damage_area(Vec2Fixed::from_ints(15, 15), damage, fixed(1), Some(Side::Attacker));
        let max_hp = battle.unit(repairer).unwrap().max_hp;
        let start = max_hp - damage;

        let mut previous = start;
        for _ in 0..100 {
            battle.tick();
            let hp = battle.unit(repairer).unwrap().hp;
            prop_assert!(hp <= max_hp);
            prop_assert!(hp >= previous);
            previous = hp;
        }
        let pulse = max_hp * battle.config().repair_percent / 100;
        prop_assert_eq!(previous, (start + 10 * pulse).min(max_hp));
    }

    /// No two units ever hold the same cell, whatever the armies.
    #[test]
    fn units_never_share_a_cell(
        attackers in arb_army(6),
        defenders in arb_army(5),
        seed in arb_seed(),
    ) {
        let mut battle = assault(open_planet(20, 20), &attackers, &defenders, seed);
        for _ in 0..120 {
            battle.tick();
            let mut cells = HashSet::new();
            for unit in battle.units() {
                prop_assert!(cells.insert(unit.cell()));
                if let Some(next) = unit.reserved() {
                    prop_assert!(cells.insert(next));
                }
            }
        }
    }
}
