//! Damage model shared by every stack variant.
//!
//! Ordinary hits lose at most one unit per application. Streaming hits carry
//! overflow into the next unit. Black-hole attrition removes a fraction of the
//! stack outright. Colonies additionally lose population to whatever damage
//! reaches the planet.

use serde::{Deserialize, Serialize};

use super::{Stack, StackFlags, StackInner, Targetable, WeaponSpec};

/// What one damage application did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Damage {
    /// Damage left after shields.
    pub applied: f32,
    /// Whole units destroyed.
    pub units_lost: u32,
}

impl Damage {
    fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.units_lost += other.units_lost;
    }
}

impl Stack {
    /// Applies one hit: `max(0, raw - shield_level * shield_adj)`.
    ///
    /// A zero result changes nothing. Otherwise the lead unit loses that many
    /// hit points and, if it drops to zero, exactly one unit is lost and the
    /// next unit steps up at full hits and shields. Excess damage is
    /// discarded.
    pub fn take_damage(&mut self, raw: f32, shield_adj: f32) -> Damage {
        let dmg = (raw - self.shield_level() * shield_adj).max(0.0);
        if dmg <= 0.0 {
            return Damage::default();
        }
        let mut result = Damage {
            applied: dmg,
            units_lost: 0,
        };
        if self.num > 0 {
            self.hits -= dmg;
            if self.hits <= 0.0 {
                self.lose_unit();
                result.units_lost = 1;
            }
        }
        self.after_damage(dmg);
        result
    }

    /// Applies a streaming hit whose overflow keeps consuming units until the
    /// damage pool is spent or the stack is gone.
    pub fn take_streaming_damage(&mut self, raw: f32, shield_adj: f32) -> Damage {
        let mut pool = (raw - self.shield_level() * shield_adj).max(0.0);
        if pool <= 0.0 {
            return Damage::default();
        }
        let mut result = Damage::default();
        if self.num == 0 {
            result.applied = pool;
            self.after_damage(pool);
            return result;
        }
        while pool > 0.0 && self.num > 0 {
            let step = pool.min(self.hits.max(0.0));
            self.hits -= step;
            pool -= step;
            result.merge(Damage {
                applied: step,
                units_lost: 0,
            });
            if self.hits <= 0.0 {
                self.lose_unit();
                result.units_lost += 1;
            }
            if step <= 0.0 {
                break;
            }
        }
        self.after_damage(result.applied);
        result
    }

    /// Percentage attrition independent of per-unit hit points:
    /// `num = floor(num * (1 - (pct - shield_level / 50 - black_hole_defense)))`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn take_black_hole_damage(&mut self, pct: f32) -> Damage {
        let kill = (pct - self.shield_level() / 50.0 - self.black_hole_defense).clamp(0.0, 1.0);
        let before = self.num;
        let after = ((before as f32) * (1.0 - kill)).floor().max(0.0) as u32;
        let lost = before.saturating_sub(after.min(before));
        self.num = before - lost;
        if self.num == 0 {
            self.hits = 0.0;
        }
        Damage {
            applied: 0.0,
            units_lost: lost,
        }
    }

    /// Biological attack on a colony: damage after shields kills population
    /// directly. Returns the population killed; other stacks are unaffected.
    pub fn take_bio_damage(&mut self, raw: f32, shield_adj: f32) -> f32 {
        let dmg = (raw - self.shield_level() * shield_adj).max(0.0);
        match self.as_colony_mut() {
            Some(colony) if dmg > 0.0 => {
                let killed = dmg.min(colony.population);
                colony.population -= killed;
                killed
            }
            _ => 0.0,
        }
    }

    /// Total hit points across every remaining unit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_pool(&self) -> f32 {
        if self.num == 0 {
            0.0
        } else {
            (self.num - 1) as f32 * self.max_hits + self.hits.max(0.0)
        }
    }

    fn lose_unit(&mut self) {
        self.num = self.num.saturating_sub(1);
        if self.num > 0 {
            self.hits = self.max_hits;
            self.shield = self.max_shield;
        } else {
            self.hits = 0.0;
        }
    }

    /// Variant hook run after any damage got through the shields.
    fn after_damage(&mut self, dmg: f32) {
        match &mut self.inner {
            StackInner::Colony(colony) => {
                let killed = (dmg * colony.population_per_damage).min(colony.population);
                colony.population -= killed;
            }
            StackInner::Amoeba(state) => state.damage_since_split += dmg,
            _ => {}
        }
    }
}

impl Targetable for Stack {
    fn shield_level(&self) -> f32 {
        match &self.inner {
            StackInner::Colony(colony) if self.num > 0 => self.shield.max(colony.planetary_shield),
            StackInner::Colony(colony) => colony.planetary_shield,
            StackInner::Missile(_) => 0.0,
            _ => self.shield,
        }
    }

    fn destroyed(&self) -> bool {
        if self.flags.contains(StackFlags::DESTROYED) {
            return true;
        }
        match &self.inner {
            StackInner::Colony(colony) => colony.population <= 0.0,
            _ => self.num == 0 || self.max_hits <= 0.0,
        }
    }

    fn can_be_targeted_with(&self, weapon: &WeaponSpec) -> bool {
        !self.destroyed()
            && self.engageable_by(weapon)
            && !self.is_cloaked()
            && (!self.in_stasis() || weapon.ignores_stasis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::GridPos;
    use crate::tests::helpers::{colony_stack, ship_stack};
    use crate::entity::MonsterKind;

    fn shielded(shield: f32, num: u32, hits: f32) -> Stack {
        let mut s = ship_stack(1, GridPos::new(0, 0));
        s.num = num;
        s.hits = hits;
        s.max_hits = hits;
        s.starting_max_hits = hits;
        s.shield = shield;
        s.max_shield = shield;
        s
    }

    mod shield_tests {
        use super::*;

        #[test]
        fn shields_subtract_from_raw_damage() {
            let mut s = shielded(3.0, 2, 20.0);
            let d = s.take_damage(10.0, 1.0);
            assert!((d.applied - 7.0).abs() < f32::EPSILON);
            assert!((s.hits - 13.0).abs() < f32::EPSILON);
        }

        #[test]
        fn shields_never_produce_negative_damage() {
            let mut s = shielded(3.0, 2, 20.0);
            let before = s.clone();
            let d = s.take_damage(2.0, 1.0);
            assert_eq!(d, Damage::default());
            assert_eq!(s, before);
        }

        #[test]
        fn shield_adjustment_scales_shield() {
            let mut s = shielded(4.0, 1, 20.0);
            let d = s.take_damage(10.0, 0.5);
            assert!((d.applied - 8.0).abs() < f32::EPSILON);
        }
    }

    mod unit_loss_tests {
        use super::*;

        #[test]
        fn lethal_hit_loses_exactly_one_unit() {
            let mut s = shielded(0.0, 3, 10.0);
            let d = s.take_damage(100.0, 1.0);
            assert_eq!(d.units_lost, 1);
            assert_eq!(s.num, 2);
            assert!((s.hits - 10.0).abs() < f32::EPSILON);
        }

        #[test]
        fn streaming_damage_carries_over() {
            let mut s = shielded(0.0, 3, 10.0);
            let d = s.take_streaming_damage(25.0, 1.0);
            assert_eq!(d.units_lost, 2);
            assert_eq!(s.num, 1);
            assert!((s.hits - 5.0).abs() < f32::EPSILON);
            assert!((d.applied - 25.0).abs() < f32::EPSILON);
        }

        #[test]
        fn streaming_stops_at_empty_stack() {
            let mut s = shielded(0.0, 2, 10.0);
            let d = s.take_streaming_damage(500.0, 1.0);
            assert_eq!(d.units_lost, 2);
            assert_eq!(s.num, 0);
            assert!(s.destroyed());
        }

        #[test]
        fn destroyed_iff_no_units() {
            let mut s = shielded(0.0, 1, 5.0);
            assert!(!s.destroyed());
            s.take_damage(5.0, 1.0);
            assert_eq!(s.num, 0);
            assert!(s.destroyed());
        }
    }

    mod black_hole_tests {
        use super::*;

        #[test]
        fn attrition_floors_unit_count() {
            let mut s = shielded(0.0, 10, 5.0);
            let d = s.take_black_hole_damage(0.25);
            assert_eq!(s.num, 7);
            assert_eq!(d.units_lost, 3);
        }

        #[test]
        fn shields_and_defense_resist() {
            let mut s = shielded(5.0, 10, 5.0);
            s.black_hole_defense = 0.1;
            // 0.45 - 5/50 - 0.1 = 0.25
            s.take_black_hole_damage(0.45);
            assert_eq!(s.num, 7);
        }

        #[test]
        fn full_resistance_is_harmless() {
            let mut s = shielded(50.0, 4, 5.0);
            let d = s.take_black_hole_damage(0.5);
            assert_eq!(d.units_lost, 0);
            assert_eq!(s.num, 4);
        }
    }

    mod colony_tests {
        use super::*;

        #[test]
        fn planetary_shield_backs_up_bases() {
            let mut c = colony_stack(1, 2, 50.0);
            c.shield = 2.0;
            if let Some(colony) = c.as_colony_mut() {
                colony.planetary_shield = 5.0;
            }
            assert!((c.shield_level() - 5.0).abs() < f32::EPSILON);
            c.num = 0;
            assert!((c.shield_level() - 5.0).abs() < f32::EPSILON);
        }

        #[test]
        fn damage_kills_population() {
            let mut c = colony_stack(1, 2, 50.0);
            c.take_damage(40.0, 1.0);
            let pop = c.as_colony().map(|col| col.population).unwrap();
            assert!(pop < 50.0);
        }

        #[test]
        fn colony_destroyed_by_population_not_bases() {
            let mut c = colony_stack(1, 0, 10.0);
            assert!(!c.destroyed());
            let killed = c.take_bio_damage(25.0, 1.0);
            assert!((killed - 10.0).abs() < f32::EPSILON);
            assert!(c.destroyed());
        }

        #[test]
        fn bio_damage_spares_ships() {
            let mut s = shielded(0.0, 2, 10.0);
            assert!(s.take_bio_damage(50.0, 1.0).abs() < f32::EPSILON);
            assert_eq!(s.num, 2);
        }
    }

    #[test]
    fn amoeba_tracks_damage_since_split() {
        let mut a = Stack::monster(&MonsterKind::Amoeba.template());
        a.take_damage(120.0, 1.0);
        a.take_damage(80.0, 1.0);
        if let StackInner::Amoeba(state) = &a.inner {
            assert!((state.damage_since_split - 200.0).abs() < 1e-3);
        } else {
            panic!("not an amoeba");
        }
    }
}
