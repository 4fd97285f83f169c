//! Hand-authored monster stat blocks.
//!
//! Each [`MonsterKind`] maps to a fixed [`MonsterTemplate`]. Templates are
//! plain values: the resolver builds one per monster stack and an amoeba
//! split clones the parent stack rather than consulting any shared instance.

use serde::{Deserialize, Serialize};

use super::components::AmoebaState;
use super::weapons::{WeaponSlot, WeaponSpec};

/// Monster varieties.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    /// Immobile sentinel guarding a system.
    Guardian,
    /// Space amoeba; splits when badly hurt and feeds on unarmed ships.
    Amoeba,
    /// Crystal entity with a short-range area pulse.
    Crystal,
}

impl MonsterKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Guardian => "Guardian",
            Self::Amoeba => "Space Amoeba",
            Self::Crystal => "Space Crystal",
        }
    }

    /// Fixed stat block for this kind.
    #[must_use]
    pub fn template(self) -> MonsterTemplate {
        match self {
            Self::Guardian => MonsterTemplate {
                kind: self,
                hits: 2000.0,
                shield: 5.0,
                max_move: 0.0,
                initiative: 20,
                attack_level: 8,
                beam_defense: 6,
                missile_defense: 6,
                repair_pct: 0.1,
                black_hole_defense: 0.5,
                weapons: vec![
                    WeaponSlot::new(WeaponSpec::beam("Death Ray", 30.0, 90.0, 3), 2),
                    WeaponSlot::new(WeaponSpec::torpedo("Plasma Torpedo", 60.0, 120.0, 4), 1)
                        .with_cooldown(2),
                ],
                amoeba: None,
            },
            Self::Amoeba => MonsterTemplate {
                kind: self,
                hits: 1000.0,
                shield: 0.0,
                max_move: 1.0,
                initiative: 5,
                attack_level: 4,
                beam_defense: 2,
                missile_defense: 2,
                repair_pct: 0.05,
                black_hole_defense: 0.0,
                weapons: vec![WeaponSlot::new(
                    WeaponSpec {
                        streaming: true,
                        ..WeaponSpec::beam("Engulf", 40.0, 120.0, 1)
                    },
                    1,
                )],
                amoeba: Some(AmoebaState {
                    damage_since_split: 0.0,
                    split_threshold: 300.0,
                    min_split_hits: 125.0,
                    splits: 0,
                }),
            },
            Self::Crystal => MonsterTemplate {
                kind: self,
                hits: 3000.0,
                shield: 10.0,
                max_move: 1.0,
                initiative: 10,
                attack_level: 6,
                beam_defense: 4,
                missile_defense: 4,
                repair_pct: 0.0,
                black_hole_defense: 1.0,
                weapons: vec![WeaponSlot::new(
                    WeaponSpec {
                        area: true,
                        shield_adj: 0.5,
                        ..WeaponSpec::beam("Crystal Pulse", 100.0, 300.0, 1)
                    },
                    1,
                )
                .with_cooldown(3)],
                amoeba: None,
            },
        }
    }
}

/// Stats a monster stack starts with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    /// Variety.
    pub kind: MonsterKind,
    /// Hit points.
    pub hits: f32,
    /// Shield level.
    pub shield: f32,
    /// Cells per turn.
    pub max_move: f32,
    /// Base initiative.
    pub initiative: i32,
    /// Attack level.
    pub attack_level: i32,
    /// Defense against direct fire.
    pub beam_defense: i32,
    /// Defense against missiles.
    pub missile_defense: i32,
    /// Fraction of hit points regenerated per turn.
    pub repair_pct: f32,
    /// Resistance to black-hole attrition.
    pub black_hole_defense: f32,
    /// Weapon loadout.
    pub weapons: Vec<WeaponSlot>,
    /// Splitting state, amoebas only.
    pub amoeba: Option<AmoebaState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_monster_is_armed() {
        for kind in [MonsterKind::Guardian, MonsterKind::Amoeba, MonsterKind::Crystal] {
            let t = kind.template();
            assert!(!t.weapons.is_empty(), "{} has no weapons", kind.name());
            assert!(t.hits > 0.0);
        }
    }

    #[test]
    fn only_amoeba_splits() {
        assert!(MonsterKind::Amoeba.template().amoeba.is_some());
        assert!(MonsterKind::Guardian.template().amoeba.is_none());
        assert!(MonsterKind::Crystal.template().amoeba.is_none());
    }

    #[test]
    fn guardian_never_moves() {
        assert!(MonsterKind::Guardian.template().max_move.abs() < f32::EPSILON);
    }

    #[test]
    fn crystal_pulse_recharges() {
        let t = MonsterKind::Crystal.template();
        assert!(t.weapons[0].spec.area);
        assert_eq!(t.weapons[0].cooldown, 3);
    }
}
