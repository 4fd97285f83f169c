//! Per-shot hit and damage rolls.
//!
//! The resolver decides who fires what at whom; a [`ShotModel`] decides
//! whether each individual shot lands and how hard. Shields, unit loss and
//! every other consequence are applied by the resolver afterwards, so a model
//! only has to produce raw damage.

use rand::{Rng, RngCore};

use crate::entity::WeaponSpec;

/// Everything a model needs to roll one shot.
#[derive(Debug, Clone, Copy)]
pub struct ShotRoll<'a> {
    /// Weapon firing.
    pub weapon: &'a WeaponSpec,
    /// Firer's attack level.
    pub attack_level: i32,
    /// Target's defense against this weapon class.
    pub defense: i32,
}

/// Rolls individual shots.
///
/// Implementations must draw all randomness from the provided generator so
/// battles replay identically from the same seed.
pub trait ShotModel: Send + Sync {
    /// Raw damage of one shot, or `None` for a miss.
    fn roll(&self, shot: &ShotRoll<'_>, rng: &mut dyn RngCore) -> Option<f32>;
}

/// Default model: hit chance moves 10% per level of attack over defense from
/// a 50% baseline, clamped to 5..95%; damage is uniform over the weapon's
/// range.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardShots;

impl StandardShots {
    /// Probability that a shot hits.
    #[must_use]
    pub fn hit_chance(attack_level: i32, defense: i32) -> f64 {
        (0.5 + 0.1 * f64::from(attack_level - defense)).clamp(0.05, 0.95)
    }
}

impl ShotModel for StandardShots {
    fn roll(&self, shot: &ShotRoll<'_>, rng: &mut dyn RngCore) -> Option<f32> {
        if !rng.gen_bool(Self::hit_chance(shot.attack_level, shot.defense)) {
            return None;
        }
        let low = shot.weapon.damage_low.min(shot.weapon.damage_high);
        let high = shot.weapon.damage_low.max(shot.weapon.damage_high);
        if high <= low {
            return Some(low);
        }
        Some(rng.gen_range(low..=high))
    }
}

/// Every shot hits for the weapon's maximum damage. Useful for scripted
/// scenarios and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDamageShots;

impl ShotModel for MaxDamageShots {
    fn roll(&self, shot: &ShotRoll<'_>, _rng: &mut dyn RngCore) -> Option<f32> {
        Some(shot.weapon.damage_high.max(shot.weapon.damage_low))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn hit_chance_is_clamped() {
        assert!((StandardShots::hit_chance(0, 0) - 0.5).abs() < 1e-9);
        assert!((StandardShots::hit_chance(3, 1) - 0.7).abs() < 1e-9);
        assert!((StandardShots::hit_chance(20, 0) - 0.95).abs() < 1e-9);
        assert!((StandardShots::hit_chance(0, 20) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn damage_stays_in_weapon_range() {
        let laser = WeaponSpec::beam("Laser", 2.0, 6.0, 1);
        let roll = ShotRoll {
            weapon: &laser,
            attack_level: 10,
            defense: 0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            if let Some(d) = StandardShots.roll(&roll, &mut rng) {
                assert!((2.0..=6.0).contains(&d));
            }
        }
    }

    #[test]
    fn same_seed_same_rolls() {
        let laser = WeaponSpec::beam("Laser", 2.0, 6.0, 1);
        let roll = ShotRoll {
            weapon: &laser,
            attack_level: 0,
            defense: 0,
        };
        let mut a = ChaCha8Rng::seed_from_u64(5);
        let mut b = ChaCha8Rng::seed_from_u64(5);
        let xs: Vec<_> = (0..20).map(|_| StandardShots.roll(&roll, &mut a)).collect();
        let ys: Vec<_> = (0..20).map(|_| StandardShots.roll(&roll, &mut b)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn max_damage_always_hits() {
        let torp = WeaponSpec::torpedo("Torpedo", 10.0, 25.0, 2);
        let roll = ShotRoll {
            weapon: &torp,
            attack_level: -10,
            defense: 10,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(MaxDamageShots.roll(&roll, &mut rng), Some(25.0));
    }
}
