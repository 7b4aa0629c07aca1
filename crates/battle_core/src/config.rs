//! Battle tuning parameters.
//!
//! [`BattleConfig`] collects every constant the simulation consults that is
//! not a per-unit-type value. All fields have defaults, so a RON file only
//! needs to list what it overrides:
//!
//! ```ron
//! BattleConfig(
//!     seed: 7,
//!     paralysis_ttl: 80,
//! )
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};

/// Simulation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed for the battle RNG (target tie-breaks, AI choices).
    pub seed: u64,
    /// Wall-clock length of one tick at normal speed.
    pub tick_interval_ms: u64,
    /// Ticks a paralysed unit stays disabled.
    pub paralysis_ttl: u32,
    /// Ticks a minelayer must stand still before planting.
    pub mine_dwell_ticks: u32,
    /// Animation length of an explosion, in ticks.
    pub explosion_phases: u32,
    /// Kamikaze units self-destruct below this percentage of max hp.
    pub kamikaze_threshold_percent: u32,
    /// Ticks between self-repair pulses.
    pub repair_interval: u32,
    /// Percentage of max hp restored per self-repair pulse.
    pub repair_percent: u32,
    /// Blocked ticks before a unit re-derives its path.
    pub repath_after_blocked: u32,
    /// Depth of the deployment ring around defender buildings.
    pub defender_ring_depth: u32,
    /// Depth of the attacker's edge bands.
    pub attacker_band_depth: u32,
    /// Skip the outermost map ring when deploying attackers.
    pub skip_outer_edge: bool,
    /// Cell budget for the defender zone when no building stands.
    pub open_field_zone_cap: usize,
    /// Defense bonus granted to the planet after a successful defense.
    pub defense_bonus_on_victory: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_interval_ms: 100,
            paralysis_ttl: 150,
            mine_dwell_ticks: 20,
            explosion_phases: 12,
            kamikaze_threshold_percent: 10,
            repair_interval: 10,
            repair_percent: 2,
            repath_after_blocked: 3,
            defender_ring_depth: 3,
            attacker_band_depth: 3,
            skip_outer_edge: false,
            open_field_zone_cap: 64,
            defense_bonus_on_victory: 1,
        }
    }
}

impl BattleConfig {
    /// Default configuration with a specific seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Wall-clock interval between ticks at a speed multiplier.
    ///
    /// A multiplier of zero is treated as one.
    #[must_use]
    pub fn tick_interval(&self, speed: u32) -> Duration {
        Duration::from_millis(self.tick_interval_ms / u64::from(speed.max(1)))
    }

    /// Half-life phase of an explosion: the point where its kill target is
    /// removed from the battle.
    #[must_use]
    pub const fn explosion_half_life(&self) -> u32 {
        self.explosion_phases / 2
    }

    /// Parse from a RON string.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| BattleError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        ron::from_str(&contents).map_err(|e| BattleError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_scales_with_speed() {
        let config = BattleConfig::default();
        assert_eq!(config.tick_interval(1), Duration::from_millis(100));
        assert_eq!(config.tick_interval(2), Duration::from_millis(50));
        assert_eq!(config.tick_interval(4), Duration::from_millis(25));
        assert_eq!(config.tick_interval(0), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = BattleConfig::from_ron_str("BattleConfig(seed: 7, paralysis_ttl: 80)").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.paralysis_ttl, 80);
        assert_eq!(config.mine_dwell_ticks, BattleConfig::default().mine_dwell_ticks);
    }

    #[test]
    fn test_half_life() {
        let config = BattleConfig {
            explosion_phases: 9,
            ..BattleConfig::default()
        };
        assert_eq!(config.explosion_half_life(), 4);
    }

    #[test]
    fn test_invalid_ron_is_parse_error() {
        let err = BattleConfig::from_ron_str("BattleConfig(seed: \"x\")").unwrap_err();
        assert!(matches!(err, BattleError::DataParseError { .. }));
    }
}
