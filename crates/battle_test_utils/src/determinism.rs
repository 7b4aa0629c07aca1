//! Replay checks for battles.
//!
//! A battle built twice from the same planet, setup and seed must stay
//! bit-identical tick for tick. These helpers build a battle several times,
//! tick each copy and compare [`Battle::state_hash`] values.

use std::thread;

use battle_core::battle::Battle;

/// Final state hashes of several runs of one battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// One hash per run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks each run was advanced.
    pub ticks: u64,
}

impl ReplayReport {
    /// Every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Distinct final hashes.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs ended in different states.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "battle diverged after {} ticks: {} distinct hashes over {} runs {:?}",
            self.ticks,
            self.unique_hashes().len(),
            self.hashes.len(),
            self.hashes
        );
    }
}

fn play(mut battle: Battle, ticks: u64) -> u64 {
    for _ in 0..ticks {
        battle.tick();
    }
    battle.state_hash()
}

/// Build and play the battle `runs` times in sequence.
pub fn replay_battle<F>(build: F, runs: usize, ticks: u64) -> ReplayReport
where
    F: Fn() -> Battle,
{
    ReplayReport {
        hashes: (0..runs).map(|_| play(build(), ticks)).collect(),
        ticks,
    }
}

/// Build and play the battle once per scoped thread.
///
/// # Panics
///
/// Panics if a battle thread panics.
pub fn replay_on_threads<F>(build: F, threads: usize, ticks: u64) -> ReplayReport
where
    F: Fn() -> Battle + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..threads).map(|_| s.spawn(|| play(build(), ticks))).collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });
    ReplayReport { hashes, ticks }
}

/// First tick after which two copies of the battle disagree, if any.
pub fn first_divergence<F>(build: F, ticks: u64) -> Option<u64>
where
    F: Fn() -> Battle,
{
    let (mut first, mut second) = (build(), build());
    if first.state_hash() != second.state_hash() {
        return Some(0);
    }
    (1..=ticks).find(|_| {
        first.tick();
        second.tick();
        first.state_hash() != second.state_hash()
    })
}

/// Proptest strategies for battle testing.
pub mod strategies {
    use battle_core::grid::Cell;
    use battle_core::units::UnitKind;
    use proptest::prelude::*;

    /// Any unit type.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        proptest::sample::select(UnitKind::ALL.to_vec())
    }

    /// Unit types that count toward victory and can shoot.
    pub fn arb_fighter_kind() -> impl Strategy<Value = UnitKind> {
        proptest::sample::select(vec![
            UnitKind::Tank,
            UnitKind::Artillery,
            UnitKind::SelfRepairTank,
            UnitKind::Paralizer,
            UnitKind::RocketSled,
        ])
    }

    /// An army inventory of 1 to `max_len` units.
    pub fn arb_army(max_len: usize) -> impl Strategy<Value = Vec<UnitKind>> {
        proptest::collection::vec(arb_fighter_kind(), 1..max_len.max(2))
    }

    /// A cell inside a `width` x `height` map.
    pub fn arb_cell(width: i32, height: i32) -> impl Strategy<Value = Cell> {
        (0..width, 0..height).prop_map(|(x, y)| Cell::new(x, y))
    }

    /// Damage values (1-500).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..500u32
    }

    /// Battle seeds.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assault, auto_setup, fortified_planet, open_planet};
    use battle_core::units::UnitKind;
    use proptest::prelude::*;

    #[test]
    fn test_assault_is_deterministic() {
        let report = replay_battle(
            || {
                assault(
                    fortified_planet(),
                    &[UnitKind::Tank, UnitKind::Artillery, UnitKind::Tank, UnitKind::RocketSled],
                    &[UnitKind::Tank, UnitKind::Paralizer],
                    42,
                )
            },
            3,
            200,
        );
        report.assert_deterministic();
        assert_eq!(report.unique_hashes().len(), 1);
    }

    #[test]
    fn test_parallel_battles_match() {
        let report = replay_on_threads(
            || assault(open_planet(24, 24), &[UnitKind::Tank; 4], &[UnitKind::Tank; 3], 9),
            4,
            150,
        );
        report.assert_deterministic();
        assert_eq!(report.hashes.len(), 4);
    }

    #[test]
    fn test_no_divergence() {
        let divergence = first_divergence(
            || Battle::initiate(fortified_planet(), auto_setup(&[UnitKind::Kamikaze; 3], &[UnitKind::Minelayer], 5)),
            100,
        );
        assert_eq!(divergence, None);
    }

    #[test]
    fn test_report_spots_mismatch() {
        let report = ReplayReport {
            hashes: vec![7, 7, 9],
            ticks: 10,
        };
        assert!(!report.is_deterministic());
        assert_eq!(report.unique_hashes(), vec![7, 9]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_random_armies_replay(
            attackers in strategies::arb_army(6),
            defenders in strategies::arb_army(6),
            seed in strategies::arb_seed(),
        ) {
            let report = replay_battle(
                || assault(open_planet(20, 20), &attackers, &defenders, seed),
                2,
                80,
            );
            prop_assert!(report.is_deterministic());
        }
    }
}
