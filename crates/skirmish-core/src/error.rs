//! Error types for the battle resolver.
//!
//! Nothing at this layer uses errors for control flow. An [`ActionError`] is
//! the answer to an action request that was refused; a refused request has
//! not mutated any battle state.

use thiserror::Error;

use crate::arena::GridPos;
use crate::entity::StackId;
use crate::faction::FactionId;

/// Reasons an action request (move, attack, fire, retreat) is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The stack id does not name any stack in this battle.
    #[error("unknown stack {0}")]
    UnknownStack(StackId),

    /// The stack was destroyed or has left the battle.
    #[error("stack {0} is no longer active")]
    NotActive(StackId),

    /// Only the stack whose turn is in progress may act.
    #[error("it is not stack {0}'s turn")]
    NotYourTurn(StackId),

    /// The destination is off the grid or blocked by an asteroid.
    #[error("cell {0} is not a valid position")]
    InvalidCell(GridPos),

    /// Another stack holds the destination cell.
    #[error("cell {0} is occupied")]
    Occupied(GridPos),

    /// The destination lies beyond the stack's remaining move.
    #[error("stack {stack} cannot reach {to} this turn")]
    OutOfMoves {
        /// Moving stack.
        stack: StackId,
        /// Requested destination.
        to: GridPos,
    },

    /// No weapon slot can currently engage the target.
    #[error("stack {attacker} has no usable weapon against {target}")]
    NoUsableWeapon {
        /// Firing stack.
        attacker: StackId,
        /// Intended target.
        target: StackId,
    },

    /// The slot index does not exist on the stack.
    #[error("stack {stack} has no weapon slot {slot}")]
    NoSuchSlot {
        /// Firing stack.
        stack: StackId,
        /// Requested slot.
        slot: usize,
    },

    /// The target lies beyond the weapon's reach.
    #[error("stack {target} is out of range of {attacker}")]
    OutOfRange {
        /// Firing stack.
        attacker: StackId,
        /// Intended target.
        target: StackId,
    },

    /// The target cannot be engaged right now (cloaked, in stasis or immune
    /// to the weapon class).
    #[error("stack {0} cannot be targeted")]
    TargetUnavailable(StackId),

    /// The two stacks are not hostile to each other.
    #[error("stack {attacker} is not hostile to {target}")]
    NotHostile {
        /// Firing stack.
        attacker: StackId,
        /// Intended target.
        target: StackId,
    },

    /// The stack cannot retreat: it has no destination or is not a ship.
    #[error("stack {0} has nowhere to retreat to")]
    NoRetreatDestination(StackId),

    /// The battle has already been finalized.
    #[error("the battle is over")]
    BattleFinished,
}

/// Problems with the battle inputs detected during setup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    /// A fleet carries no ships.
    #[error("fleet {0} has no ships")]
    EmptyFleet(u32),

    /// Two fleets share an id.
    #[error("fleet id {0} is used twice")]
    DuplicateFleet(u32),

    /// A fleet or colony references a faction missing from the roster.
    #[error("faction {0} is not part of the scenario")]
    UnknownFaction(FactionId),

    /// A fleet references a design missing from the scenario.
    #[error("design {0} is not part of the scenario")]
    UnknownDesign(u32),

    /// The system has a colony but no owning faction.
    #[error("system {0} has a colony but no owner")]
    UnownedColony(u32),

    /// A ship design has no hit points.
    #[error("design '{0}' has no hit points")]
    HitlessDesign(String),

    /// A side has more stacks than its deployment zone can hold.
    #[error("not enough deployment cells for {count} stacks")]
    DeploymentOverflow {
        /// Stacks that needed a cell.
        count: usize,
    },

    /// The combat configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Invalid [`CombatConfig`](crate::config::CombatConfig) values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The grid cannot host two deployment zones.
    #[error("grid {width}x{height} is too small")]
    GridTooSmall {
        /// Configured width.
        width: i32,
        /// Configured height.
        height: i32,
    },

    /// The grid exceeds the largest supported edge.
    #[error("grid {width}x{height} is too large")]
    GridTooLarge {
        /// Configured width.
        width: i32,
        /// Configured height.
        height: i32,
    },

    /// A battle must last at least one round.
    #[error("max_rounds must be at least 1")]
    ZeroTurnCeiling,

    /// A probability-like field is outside `[0, 1]`.
    #[error("{field} = {value} is outside [0, 1]")]
    ProbabilityOutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A field that must be positive is not.
    #[error("{field} must be positive")]
    NonPositive {
        /// Field name.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_error_messages_name_the_stack() {
        let err = ActionError::NotActive(StackId::new(7));
        assert_eq!(err.to_string(), "stack 7 is no longer active");
    }

    #[test]
    fn scenario_error_wraps_config_error() {
        let err: ScenarioError = ConfigError::ZeroTurnCeiling.into();
        assert!(matches!(err, ScenarioError::Config(ConfigError::ZeroTurnCeiling)));
    }

    #[test]
    fn invalid_cell_displays_coordinates() {
        let err = ActionError::InvalidCell(GridPos::new(3, 4));
        assert_eq!(err.to_string(), "cell (3, 4) is not a valid position");
    }
}
