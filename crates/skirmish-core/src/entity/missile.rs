//! Missile salvo pursuit.
//!
//! A salvo is launched at the firer's cell and chases its target. Pursuit is
//! driven by the target: every time the target moves, the salvo advances by
//! its closing ratio times the distance the target covered. Whatever movement
//! the salvo has left when its owner ends its turn is spent at once.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::weapons::WeaponSpec;
use super::StackId;
use crate::arena::GridPos;

/// Result of advancing a salvo.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pursuit {
    /// Still in flight.
    Closing,
    /// Within detonation distance of the target.
    Detonate,
    /// Flight range used up.
    Exhausted,
}

/// State of an in-flight salvo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissileState {
    /// Launching stack.
    pub owner: StackId,
    /// Pursued stack.
    pub target: StackId,
    /// Warhead description.
    pub weapon: WeaponSpec,
    /// Missiles in the salvo.
    pub salvo: u32,
    /// Owner's attack level at launch.
    pub attack_level: i32,
    /// Cells per turn.
    pub speed: f32,
    /// `speed / max(target max move, 1)`.
    pub closing_ratio: f32,
    /// Flight distance remaining.
    pub range_left: f32,
    /// Turns before self-destruct.
    pub turns_left: u32,
    /// Movement remaining this turn.
    pub move_left: f32,
    /// Continuous position.
    pub position: Vec2,
}

impl MissileState {
    /// Launches a salvo from `from` towards `target`.
    #[must_use]
    #[allow(clippy::too_many_arguments, clippy::cast_precision_loss)]
    pub fn launch(
        owner: StackId,
        target: StackId,
        weapon: WeaponSpec,
        salvo: u32,
        attack_level: i32,
        from: GridPos,
        target_max_move: f32,
        max_turns: u32,
    ) -> Self {
        let speed = weapon.missile_speed;
        let range_left = weapon.range as f32;
        Self {
            owner,
            target,
            closing_ratio: speed / target_max_move.max(1.0),
            speed,
            range_left,
            turns_left: max_turns,
            move_left: speed,
            position: from.to_vec2(),
            weapon,
            salvo,
            attack_level,
        }
    }

    /// Restores a full turn of movement. Called when the target begins its turn.
    pub fn refresh_move(&mut self) {
        self.move_left = self.speed;
    }

    /// Chases a target that just moved `step` cells.
    pub fn pursue(&mut self, target: Vec2, step: f32, fire_distance: f32) -> Pursuit {
        self.advance(target, self.closing_ratio * step, fire_distance)
    }

    /// Spends all remaining movement this turn.
    pub fn finish_move(&mut self, target: Vec2, fire_distance: f32) -> Pursuit {
        self.advance(target, self.move_left, fire_distance)
    }

    fn advance(&mut self, target: Vec2, wanted: f32, fire_distance: f32) -> Pursuit {
        let to_target = target - self.position;
        let dist = to_target.length();
        if dist <= fire_distance {
            return Pursuit::Detonate;
        }
        let step = wanted.min(self.move_left).min(dist).max(0.0);
        if step > 0.0 {
            self.position += to_target / dist * step;
            self.move_left -= step;
            self.range_left -= step;
        }
        if self.position.distance(target) <= fire_distance {
            Pursuit::Detonate
        } else if self.range_left <= 0.0 {
            Pursuit::Exhausted
        } else {
            Pursuit::Closing
        }
    }

    /// Out of turns or out of range.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.turns_left == 0 || self.range_left <= 0.0
    }

    /// Counts down one turn of flight.
    pub fn tick_turn(&mut self) {
        self.turns_left = self.turns_left.saturating_sub(1);
    }
}
