//! Weapon descriptions and per-slot ammo/cooldown bookkeeping.
//!
//! A [`WeaponSpec`] is the static description of a weapon component as it
//! appears in a ship design or monster stat block. A [`WeaponSlot`] attaches
//! that component to a stack and tracks the mutable firing state: shots left
//! this round, remaining ammunition and the cooldown counter.
//!
//! # Slot lifecycle
//!
//! ```text
//! begin_turn()   refresh shots if the cooldown has elapsed
//! take_shots()   consume 1 or all shots; the first volley of a turn uses a round of ammo
//! end_turn()     fired: cooldown restarts; idle: cooldown ticks towards ready
//! ```

use serde::{Deserialize, Serialize};

/// Broad class of a weapon component.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Direct-fire energy weapon; benefits from beam range bonuses.
    Beam,
    /// Direct-fire heavy projectile.
    Torpedo,
    /// Launches a missile salvo that pursues its target.
    Missile,
    /// Ground-attack ordnance; only engages colonies.
    Bomb,
    /// Special device with a non-damage effect.
    Special,
}

/// Effects delivered by [`WeaponKind::Special`] components.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "effect")]
pub enum SpecialEffect {
    /// Percentage attrition of the target's unit count.
    BlackHole {
        /// Base fraction of units destroyed, before shields and defenses.
        pct: f32,
    },
    /// Freezes the target for its next turn.
    Stasis,
}

/// Static description of a weapon component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSpec {
    /// Display name.
    pub name: String,
    /// Weapon class.
    pub kind: WeaponKind,
    /// Lowest damage of a single hit.
    #[serde(default)]
    pub damage_low: f32,
    /// Highest damage of a single hit.
    #[serde(default)]
    pub damage_high: f32,
    /// Reach in cells (Chebyshev). For missiles, also the flight range.
    #[serde(default = "default_range")]
    pub range: i32,
    /// Shots each weapon in the slot gets per round.
    #[serde(default = "default_shots")]
    pub shots_per_round: u32,
    /// Missile flight speed in cells per turn.
    #[serde(default)]
    pub missile_speed: f32,
    /// Damage overflows from one unit into the next.
    #[serde(default)]
    pub streaming: bool,
    /// Multiplier applied to the target's shield level.
    #[serde(default = "default_shield_adj")]
    pub shield_adj: f32,
    /// Can engage stacks held in stasis.
    #[serde(default)]
    pub ignores_stasis: bool,
    /// Kills colony population directly.
    #[serde(default)]
    pub bioweapon: bool,
    /// Hits every stack adjacent to the firer instead of a single target.
    #[serde(default)]
    pub area: bool,
    /// Effect of a special component.
    #[serde(default)]
    pub special: Option<SpecialEffect>,
}

fn default_range() -> i32 {
    1
}

fn default_shots() -> u32 {
    1
}

fn default_shield_adj() -> f32 {
    1.0
}

impl WeaponSpec {
    /// A single-shot beam weapon.
    #[must_use]
    pub fn beam(name: impl Into<String>, low: f32, high: f32, range: i32) -> Self {
        Self {
            name: name.into(),
            kind: WeaponKind::Beam,
            damage_low: low,
            damage_high: high,
            range,
            shots_per_round: 1,
            missile_speed: 0.0,
            streaming: false,
            shield_adj: 1.0,
            ignores_stasis: false,
            bioweapon: false,
            area: false,
            special: None,
        }
    }

    /// A direct-fire torpedo.
    #[must_use]
    pub fn torpedo(name: impl Into<String>, low: f32, high: f32, range: i32) -> Self {
        Self {
            kind: WeaponKind::Torpedo,
            ..Self::beam(name, low, high, range)
        }
    }

    /// A missile launcher.
    #[must_use]
    pub fn missile(name: impl Into<String>, damage: f32, speed: f32, range: i32) -> Self {
        Self {
            kind: WeaponKind::Missile,
            missile_speed: speed,
            ..Self::beam(name, damage, damage, range)
        }
    }

    /// A bomb bay.
    #[must_use]
    pub fn bomb(name: impl Into<String>, low: f32, high: f32) -> Self {
        Self {
            kind: WeaponKind::Bomb,
            ..Self::beam(name, low, high, 1)
        }
    }

    /// A special device.
    #[must_use]
    pub fn special(name: impl Into<String>, effect: SpecialEffect, range: i32) -> Self {
        Self {
            kind: WeaponKind::Special,
            special: Some(effect),
            ..Self::beam(name, 0.0, 0.0, range)
        }
    }

    /// Effective reach including a stack's beam range bonus.
    #[must_use]
    pub fn reach(&self, beam_range_bonus: i32) -> i32 {
        match self.kind {
            WeaponKind::Beam => self.range + beam_range_bonus,
            _ => self.range,
        }
    }

    /// Highest damage one firing of the full slot can deal, used for strength estimates.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn peak_damage(&self) -> f32 {
        self.damage_high.max(self.damage_low) * self.shots_per_round as f32
    }
}

/// A weapon component mounted on a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSlot {
    /// Component description.
    pub spec: WeaponSpec,
    /// Weapons of this type carried by each unit.
    pub count: u32,
    /// Shots remaining this round.
    pub shots_left: u32,
    /// Remaining volleys of ammunition; `None` is unlimited.
    pub rounds: Option<u32>,
    /// Turns between volleys. 1 fires every turn.
    pub cooldown: u32,
    /// Turns until the slot can fire again.
    pub turns_to_ready: u32,
    /// Fired during the current turn.
    pub fired: bool,
}

impl WeaponSlot {
    /// A ready slot with unlimited ammunition that fires every turn.
    #[must_use]
    pub fn new(spec: WeaponSpec, count: u32) -> Self {
        let shots_left = spec.shots_per_round;
        Self {
            spec,
            count,
            shots_left,
            rounds: None,
            cooldown: 1,
            turns_to_ready: 0,
            fired: false,
        }
    }

    /// Limits the slot to `rounds` volleys.
    #[must_use]
    pub fn with_ammo(mut self, rounds: Option<u32>) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the number of turns between volleys.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: u32) -> Self {
        self.cooldown = cooldown.max(1);
        self
    }

    /// Has ammunition left.
    #[must_use]
    pub fn has_ammo(&self) -> bool {
        self.rounds != Some(0)
    }

    /// Cooldown elapsed, ammunition remaining and shots left this round.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.turns_to_ready == 0 && self.has_ammo() && self.shots_left > 0 && self.count > 0
    }

    /// Refreshes shots for the new turn once the cooldown has elapsed.
    pub fn begin_turn(&mut self) {
        self.fired = false;
        if self.turns_to_ready == 0 {
            self.shots_left = self.spec.shots_per_round;
        }
    }

    /// Consumes one or all remaining shots and returns how many were taken.
    ///
    /// Returns 0 without touching ammunition when the slot is not ready.
    pub fn take_shots(&mut self, all: bool) -> u32 {
        if !self.is_ready() {
            return 0;
        }
        let taken = if all { self.shots_left } else { 1 };
        self.shots_left -= taken;
        if !self.fired {
            if let Some(rounds) = self.rounds.as_mut() {
                *rounds = rounds.saturating_sub(1);
            }
        }
        self.fired = true;
        taken
    }

    /// Restarts the cooldown after firing, otherwise ticks it down.
    pub fn end_turn(&mut self) {
        if self.fired {
            self.turns_to_ready = self.cooldown.saturating_sub(1);
            self.fired = false;
        } else {
            self.turns_to_ready = self.turns_to_ready.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laser() -> WeaponSpec {
        WeaponSpec::beam("Laser", 1.0, 4.0, 1)
    }

    #[test]
    fn new_slot_is_ready() {
        let slot = WeaponSlot::new(laser(), 2);
        assert!(slot.is_ready());
        assert!(slot.has_ammo());
    }

    #[test]
    fn single_shot_consumes_one() {
        let mut spec = laser();
        spec.shots_per_round = 3;
        let mut slot = WeaponSlot::new(spec, 1);
        assert_eq!(slot.take_shots(false), 1);
        assert_eq!(slot.shots_left, 2);
        assert!(slot.is_ready());
        assert_eq!(slot.take_shots(true), 2);
        assert!(!slot.is_ready());
    }

    #[test]
    fn ammo_is_spent_once_per_turn() {
        let mut spec = laser();
        spec.shots_per_round = 2;
        let mut slot = WeaponSlot::new(spec, 1).with_ammo(Some(2));
        slot.take_shots(false);
        slot.take_shots(false);
        assert_eq!(slot.rounds, Some(1));
        slot.end_turn();
        slot.begin_turn();
        slot.take_shots(true);
        assert_eq!(slot.rounds, Some(0));
        slot.end_turn();
        slot.begin_turn();
        assert!(!slot.is_ready());
        assert_eq!(slot.take_shots(true), 0);
    }

    #[test]
    fn unlimited_ammo_never_runs_out() {
        let mut slot = WeaponSlot::new(laser(), 1);
        for _ in 0..50 {
            slot.begin_turn();
            assert_eq!(slot.take_shots(true), 1);
            slot.end_turn();
        }
        assert_eq!(slot.rounds, None);
    }

    #[test]
    fn cooldown_restarts_after_firing() {
        let mut slot = WeaponSlot::new(laser(), 1).with_cooldown(3);
        slot.begin_turn();
        slot.take_shots(true);
        slot.end_turn();
        assert_eq!(slot.turns_to_ready, 2);

        slot.begin_turn();
        assert!(!slot.is_ready());
        slot.end_turn();
        slot.begin_turn();
        assert!(!slot.is_ready());
        slot.end_turn();
        slot.begin_turn();
        assert!(slot.is_ready());
    }

    #[test]
    fn beam_reach_includes_bonus() {
        assert_eq!(laser().reach(2), 3);
        assert_eq!(WeaponSpec::torpedo("Torp", 5.0, 10.0, 2).reach(2), 2);
    }

    #[test]
    fn spec_defaults_from_json() {
        let spec: WeaponSpec =
            serde_json::from_str(r#"{ "name": "Mass Driver", "kind": "beam", "damage_low": 2, "damage_high": 5 }"#)
                .unwrap();
        assert_eq!(spec.range, 1);
        assert_eq!(spec.shots_per_round, 1);
        assert!((spec.shield_adj - 1.0).abs() < f32::EPSILON);
        assert!(spec.special.is_none());
    }
}
