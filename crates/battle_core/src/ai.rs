//! Computer player hooks.
//!
//! A side may hand the battle a [`BattleAi`]. Its hooks run at fixed points
//! of the lifecycle and act through the same order API a human player uses,
//! so an AI can never bypass order validation.

use crate::battle::Battle;
use crate::stats::Side;

/// Decision-making for one side of a battle.
pub trait BattleAi: Send {
    /// Called once when the battle becomes active.
    fn battle_init(&mut self, _side: Side, _battle: &mut Battle) {}

    /// Called at the start of every active tick, attacker first.
    fn battle_tick(&mut self, side: Side, battle: &mut Battle);

    /// Called once when the battle has concluded.
    fn battle_done(&mut self, _side: Side, _battle: &Battle) {}
}

/// An AI that never issues orders; units rely on guard mode alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleAi;

impl BattleAi for IdleAi {
    fn battle_tick(&mut self, _side: Side, _battle: &mut Battle) {}
}
