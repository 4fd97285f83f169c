//! Tunable constants for the battle resolver.
//!
//! [`CombatConfig`] collects every number the resolver treats as a rule of the
//! game rather than a property of a participant: grid dimensions, the turn
//! ceiling, missile limits and initiative bonuses. The defaults reproduce the
//! standard tactical rules; scenario tooling may load overrides from JSON.
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::CombatConfig;
//!
//! let config = CombatConfig::default();
//! assert_eq!(config.grid_width, 10);
//! assert_eq!(config.max_rounds, 100);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Rule constants consumed by the resolver, scheduler and entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Number of grid columns.
    pub grid_width: i32,
    /// Number of grid rows.
    pub grid_height: i32,
    /// Rounds played before the attacker is forced to withdraw.
    pub max_rounds: u32,
    /// Per-round chance that any single asteroid cell erodes away.
    pub asteroid_erosion_chance: f64,
    /// Turns a missile salvo survives before self-destructing.
    pub missile_max_turns: u32,
    /// Separation (grid units) at which a pursuing missile detonates.
    pub missile_fire_distance: f32,
    /// Initiative bonus for a cloaked stack.
    pub cloak_initiative_bonus: i32,
    /// Initiative bonus for a teleport-capable stack (not applied on top of cloak).
    pub teleport_initiative_bonus: i32,
    /// Missiles fired per missile base per round.
    pub colony_missiles_per_base: u32,
    /// Random attempts made by the nearest-free-cell search before it falls back
    /// to the deterministic scan-order choice.
    pub nearest_cell_attempts: u32,
    /// Colony population killed per point of damage that reaches the planet.
    pub population_per_damage: f32,
    /// Fraction of a colony's rebels suppressed when its owner holds the field.
    pub rebel_suppression_fraction: f32,
    /// Hostile-to-own strength ratio at which default captains consider the
    /// opposition overwhelming.
    pub retreat_strength_ratio: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            grid_width: 10,
            grid_height: 8,
            max_rounds: 100,
            asteroid_erosion_chance: 0.02,
            missile_max_turns: 10,
            missile_fire_distance: 0.7,
            cloak_initiative_bonus: 200,
            teleport_initiative_bonus: 100,
            colony_missiles_per_base: 3,
            nearest_cell_attempts: 5,
            population_per_damage: 0.05,
            rebel_suppression_fraction: 0.5,
            retreat_strength_ratio: 3.0,
        }
    }
}

impl CombatConfig {
    /// Smallest grid edge the deployment rules can work with.
    pub const MIN_GRID_EDGE: i32 = 4;

    /// Largest grid edge; keeps the cell count well inside `i32`.
    pub const MAX_GRID_EDGE: i32 = 256;

    /// Checks that the configuration describes a playable battle.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width < Self::MIN_GRID_EDGE || self.grid_height < Self::MIN_GRID_EDGE {
            return Err(ConfigError::GridTooSmall {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.grid_width > Self::MAX_GRID_EDGE || self.grid_height > Self::MAX_GRID_EDGE {
            return Err(ConfigError::GridTooLarge {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroTurnCeiling);
        }
        if !(0.0..=1.0).contains(&self.asteroid_erosion_chance) {
            return Err(ConfigError::ProbabilityOutOfRange {
                field: "asteroid_erosion_chance",
                value: self.asteroid_erosion_chance,
            });
        }
        if self.missile_fire_distance <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "missile_fire_distance",
            });
        }
        if self.missile_max_turns == 0 {
            return Err(ConfigError::NonPositive {
                field: "missile_max_turns",
            });
        }
        if !(0.0..=1.0).contains(&self.rebel_suppression_fraction) {
            return Err(ConfigError::ProbabilityOutOfRange {
                field: "rebel_suppression_fraction",
                value: f64::from(self.rebel_suppression_fraction),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_standard_rules() {
        let config = CombatConfig::default();
        assert_eq!(config.grid_width, 10);
        assert_eq!(config.grid_height, 8);
        assert_eq!(config.max_rounds, 100);
        assert_eq!(config.missile_max_turns, 10);
        assert!((config.missile_fire_distance - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.cloak_initiative_bonus, 200);
        assert_eq!(config.teleport_initiative_bonus, 100);
        assert_eq!(config.colony_missiles_per_base, 3);
    }

    #[test]
    fn default_is_valid() {
        assert!(CombatConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_tiny_grid() {
        let config = CombatConfig {
            grid_width: 3,
            ..CombatConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooSmall { width: 3, .. })
        ));
    }

    #[test]
    fn rejects_huge_grid() {
        let config = CombatConfig {
            grid_width: 65_536,
            grid_height: 65_536,
            ..CombatConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GridTooLarge { width: 65_536, .. })
        ));
        let edge = CombatConfig {
            grid_width: CombatConfig::MAX_GRID_EDGE,
            grid_height: CombatConfig::MAX_GRID_EDGE,
            ..CombatConfig::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn rejects_zero_ceiling() {
        let config = CombatConfig {
            max_rounds: 0,
            ..CombatConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTurnCeiling)));
    }

    #[test]
    fn rejects_bad_erosion_chance() {
        let config = CombatConfig {
            asteroid_erosion_chance: 1.5,
            ..CombatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: CombatConfig = serde_json::from_str(r#"{ "max_rounds": 20 }"#).unwrap();
        assert_eq!(config.max_rounds, 20);
        assert_eq!(config.grid_width, 10);
    }
}
