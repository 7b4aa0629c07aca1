//! Sides, participants and battle statistics.

use serde::{Deserialize, Serialize};

use crate::battle::BattlePhase;

/// Which side of a ground battle an entity fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    /// The invading force.
    Attacker,
    /// The planet owner.
    Defender,
}

impl Side {
    /// Both sides, attacker first.
    pub const BOTH: [Self; 2] = [Self::Attacker, Self::Defender];

    /// The opposing side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Attacker => Self::Defender,
            Self::Defender => Self::Attacker,
        }
    }
}

/// Identifier of a player taking part in a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Loss and kill counters for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideStats {
    /// Own units destroyed.
    pub units_lost: u32,
    /// Enemy units destroyed.
    pub units_destroyed: u32,
    /// Own guns lost (defender only).
    pub guns_lost: u32,
    /// Own buildings demolished (defender only).
    pub buildings_lost: u32,
    /// Enemy buildings demolished.
    pub buildings_destroyed: u32,
    /// Mines that went off under an enemy.
    pub mines_triggered: u32,
    /// Rockets launched.
    pub rockets_fired: u32,
}

/// Statistics accumulated over a battle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleStats {
    /// Attacker counters.
    pub attacker: SideStats,
    /// Defender counters.
    pub defender: SideStats,
}

impl BattleStats {
    /// Counters of one side.
    #[must_use]
    pub const fn side(&self, side: Side) -> &SideStats {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }

    /// Mutable counters of one side.
    pub fn side_mut(&mut self, side: Side) -> &mut SideStats {
        match side {
            Side::Attacker => &mut self.attacker,
            Side::Defender => &mut self.defender,
        }
    }

    /// Record a destroyed unit belonging to `victim`.
    pub fn record_unit_loss(&mut self, victim: Side) {
        self.side_mut(victim).units_lost += 1;
        self.side_mut(victim.opponent()).units_destroyed += 1;
    }

    /// Record a demolished defender building.
    pub fn record_building_loss(&mut self) {
        self.defender.buildings_lost += 1;
        self.attacker.buildings_destroyed += 1;
    }
}

/// Snapshot of a battle handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleInfo {
    /// Attacking player.
    pub attacker: PlayerId,
    /// Defending player.
    pub defender: PlayerId,
    /// Current lifecycle phase.
    pub phase: BattlePhase,
    /// Ticks simulated since the battle started.
    pub tick: u64,
    /// Winner once decided.
    pub winner: Option<Side>,
    /// Whether the attacker ordered a retreat.
    pub retreat: bool,
    /// Living combat units per side, `[attacker, defender]`.
    pub combat_units: [usize; 2],
    /// Live guns.
    pub guns: usize,
    /// Accumulated counters.
    pub stats: BattleStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involution() {
        for side in Side::BOTH {
            assert_eq!(side.opponent().opponent(), side);
            assert_ne!(side.opponent(), side);
        }
    }

    #[test]
    fn test_unit_loss_updates_both_sides() {
        let mut stats = BattleStats::default();
        stats.record_unit_loss(Side::Defender);
        stats.record_unit_loss(Side::Defender);
        stats.record_unit_loss(Side::Attacker);

        assert_eq!(stats.defender.units_lost, 2);
        assert_eq!(stats.attacker.units_destroyed, 2);
        assert_eq!(stats.attacker.units_lost, 1);
        assert_eq!(stats.defender.units_destroyed, 1);
    }
}
