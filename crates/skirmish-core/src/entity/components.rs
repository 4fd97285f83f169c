//! Variant payloads and status flags for stacks.
//!
//! Every stack shares the fields on [`Stack`](super::Stack); the structs here
//! hold what only one variant needs.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::faction::FactionId;

bitflags! {
    /// Status flags shared by every stack variant.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StackFlags: u16 {
        /// Hidden from enemy targeting.
        const CLOAKED = 1 << 0;
        /// Frozen for its next turn.
        const IN_STASIS = 1 << 1;
        /// May teleport this turn (capability present and no interdiction).
        const CAN_TELEPORT = 1 << 2;
        /// Destroyed and removed from the grid.
        const DESTROYED = 1 << 3;
        /// Left the battle.
        const RETREATED = 1 << 4;
        /// Carries a cloaking device.
        const CLOAKING_DEVICE = 1 << 5;
        /// Carries a teleporter.
        const TELEPORTER = 1 << 6;
    }
}

/// Who decides a stack's actions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// A captain chooses every action.
    #[default]
    Ai,
    /// Actions come from the caller through player commands.
    Player,
}

/// Ship squadron state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipState {
    /// Fleet the squadron belongs to.
    pub fleet: u32,
    /// Design id within the scenario.
    pub design: u32,
    /// System the squadron withdraws to, if any.
    pub retreat_to: Option<u32>,
    /// Units in the squadron when the battle began.
    pub starting_num: u32,
}

/// Planetary defense state. The stack's `num` is the missile base count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyState {
    /// Owning faction.
    pub owner: FactionId,
    /// Population in millions.
    pub population: f32,
    /// Population when the battle began.
    pub starting_population: f32,
    /// Missile bases when the battle began.
    pub starting_bases: u32,
    /// Planetary shield level, protecting the planet even with no bases left.
    pub planetary_shield: f32,
    /// Colony blocks teleporters for the whole battle.
    pub interdiction: bool,
    /// Rebel population.
    pub rebels: f32,
    /// Population killed per point of damage reaching the planet.
    pub population_per_damage: f32,
}

/// Amoeba growth and splitting state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmoebaState {
    /// Damage taken since the last split.
    pub damage_since_split: f32,
    /// Damage that triggers a split.
    pub split_threshold: f32,
    /// Hit points below which the amoeba no longer splits.
    pub min_split_hits: f32,
    /// Siblings this amoeba has spawned.
    #[serde(default)]
    pub splits: u32,
}

impl AmoebaState {
    /// Returns `true` once enough damage has built up to split.
    #[must_use]
    pub fn wants_split(&self, max_hits: f32) -> bool {
        self.damage_since_split >= self.split_threshold && max_hits / 2.0 >= self.min_split_hits
    }
}
