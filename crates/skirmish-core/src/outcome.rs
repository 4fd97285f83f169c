//! Battle results.
//!
//! A [`CombatOutcome`] is created when a battle is set up, filled in while it
//! runs, and finalized exactly once when the battle ends. The strategic layer
//! consumes it for incidents, colony adjustments and fleet bookkeeping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{MonsterKind, Stack, StackKind};
use crate::faction::FactionId;

/// Why a battle ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No armed, hostile pair remained.
    NoConflict,
    /// The round ceiling was passed; the attacker withdrew.
    TurnCeiling,
    /// Resolution was cancelled; treated like the ceiling.
    Cancelled,
    /// Nobody was left to fight once setup finished.
    NoParticipants,
}

/// Losses for one design of one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTally {
    /// Owning faction.
    pub faction: FactionId,
    /// Design id.
    pub design: u32,
    /// Design name.
    pub name: String,
    /// Ships destroyed.
    pub destroyed: u32,
    /// Surviving squadrons that ended the battle damaged (0 or 1).
    pub damaged: u32,
    /// Ships that retreated.
    pub retreated: u32,
}

/// What happened to the colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonyReport {
    /// Owning faction.
    pub owner: FactionId,
    /// Population before the battle.
    pub population_before: f32,
    /// Population after the battle.
    pub population_after: f32,
    /// Missile bases before the battle.
    pub bases_before: u32,
    /// Missile bases after the battle.
    pub bases_after: u32,
    /// Population wiped out.
    pub destroyed: bool,
    /// Rebels suppressed because the owner held the field.
    pub rebels_suppressed: f32,
}

/// A squadron that left the battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetreatRecord {
    /// Owning faction.
    pub faction: FactionId,
    /// Fleet id.
    pub fleet: u32,
    /// Design id.
    pub design: u32,
    /// Ships that left.
    pub count: u32,
    /// System withdrawn to.
    pub destination: Option<u32>,
}

/// A hostile design seen by a faction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScannedDesign {
    /// Owning faction.
    pub owner: FactionId,
    /// Design id.
    pub design: u32,
    /// Design name.
    pub name: String,
}

/// Designs a faction should register as scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Observing faction.
    pub faction: FactionId,
    /// Hostile designs seen.
    pub seen: Vec<ScannedDesign>,
}

/// Diplomatic incident raised by the battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "incident", rename_all = "snake_case")]
pub enum Incident {
    /// Two factions exchanged fire.
    Skirmish {
        /// Faction that fired.
        aggressor: FactionId,
        /// Faction fired upon.
        victim: FactionId,
    },
    /// A colony was attacked.
    ColonyAttacked {
        /// Attacker.
        aggressor: FactionId,
        /// Colony owner.
        victim: FactionId,
    },
    /// A colony was wiped out.
    ColonyDestroyed {
        /// Attacker.
        aggressor: FactionId,
        /// Colony owner.
        victim: FactionId,
    },
    /// Biological weapons were used on a colony.
    BioweaponUsed {
        /// User.
        aggressor: FactionId,
        /// Colony owner.
        victim: FactionId,
    },
}

/// Finalized battle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatOutcome {
    /// System fought over.
    pub system: u32,
    /// Attacking faction.
    pub attacker: Option<FactionId>,
    /// Defending faction; `None` when the defender is a monster or the
    /// contest is neutral.
    pub defender: Option<FactionId>,
    /// Monster present.
    pub monster: Option<MonsterKind>,
    /// Factions that took part.
    pub participants: Vec<FactionId>,
    /// Factions dropped from the roster before the first round.
    pub passive: Vec<FactionId>,
    /// Losses by design.
    pub tallies: Vec<DesignTally>,
    /// Missile bases destroyed.
    pub bases_destroyed: u32,
    /// Monster stacks destroyed.
    pub monsters_destroyed: u32,
    /// Factions that used biological weapons.
    pub bioweapon_users: BTreeSet<FactionId>,
    /// Colony report, when a colony took part.
    pub colony: Option<ColonyReport>,
    /// Squadrons that retreated.
    pub retreats: Vec<RetreatRecord>,
    /// Scanned designs per faction.
    pub scans: Vec<ScanReport>,
    /// Incidents for the diplomacy layer.
    pub incidents: Vec<Incident>,
    /// Rounds played.
    pub rounds: u32,
    /// Winning faction.
    pub victor: Option<FactionId>,
    /// A monster held the field.
    pub monster_victorious: bool,
    /// Why the battle ended.
    pub termination: Termination,
    /// Set once the outcome is final.
    pub finalized: bool,
}

impl CombatOutcome {
    /// Blank outcome for a battle about to start.
    #[must_use]
    pub fn new(
        system: u32,
        attacker: Option<FactionId>,
        defender: Option<FactionId>,
        monster: Option<MonsterKind>,
    ) -> Self {
        Self {
            system,
            attacker,
            defender,
            monster,
            participants: Vec::new(),
            passive: Vec::new(),
            tallies: Vec::new(),
            bases_destroyed: 0,
            monsters_destroyed: 0,
            bioweapon_users: BTreeSet::new(),
            colony: None,
            retreats: Vec::new(),
            scans: Vec::new(),
            incidents: Vec::new(),
            rounds: 0,
            victor: None,
            monster_victorious: false,
            termination: Termination::NoConflict,
            finalized: false,
        }
    }

    fn tally_mut(&mut self, faction: FactionId, design: u32, name: &str) -> &mut DesignTally {
        let index = match self
            .tallies
            .iter()
            .position(|t| t.faction == faction && t.design == design)
        {
            Some(i) => i,
            None => {
                self.tallies.push(DesignTally {
                    faction,
                    design,
                    name: name.to_owned(),
                    destroyed: 0,
                    damaged: 0,
                    retreated: 0,
                });
                self.tallies.len() - 1
            }
        };
        &mut self.tallies[index]
    }

    /// Tally for a design, if it lost anything.
    #[must_use]
    pub fn tally(&self, faction: FactionId, design: u32) -> Option<&DesignTally> {
        self.tallies
            .iter()
            .find(|t| t.faction == faction && t.design == design)
    }

    /// Books units lost by a stack.
    pub fn record_losses(&mut self, stack: &Stack, units: u32) {
        if units == 0 {
            return;
        }
        match stack.kind() {
            StackKind::Ship => {
                if let (Some(faction), Some(ship)) = (stack.faction, stack.as_ship()) {
                    self.tally_mut(faction, ship.design, &stack.name).destroyed += units;
                }
            }
            StackKind::Colony => self.bases_destroyed += units,
            _ => {}
        }
    }

    /// Books a monster killed outright.
    pub fn record_monster_destroyed(&mut self) {
        self.monsters_destroyed += 1;
    }

    /// Books a squadron leaving the battle.
    pub fn record_retreat(&mut self, stack: &Stack) {
        let (Some(faction), Some(ship)) = (stack.faction, stack.as_ship()) else {
            return;
        };
        self.tally_mut(faction, ship.design, &stack.name).retreated += stack.num;
        self.retreats.push(RetreatRecord {
            faction,
            fleet: ship.fleet,
            design: ship.design,
            count: stack.num,
            destination: ship.retreat_to,
        });
    }

    /// Books a surviving squadron that ends the battle below full health.
    pub fn record_damaged(&mut self, stack: &Stack) {
        if let (Some(faction), Some(ship)) = (stack.faction, stack.as_ship()) {
            if stack.num > 0 && stack.hits < stack.max_hits {
                self.tally_mut(faction, ship.design, &stack.name).damaged = 1;
            }
        }
    }

    /// Total ships destroyed for a faction.
    #[must_use]
    pub fn ships_lost(&self, faction: FactionId) -> u32 {
        self.tallies
            .iter()
            .filter(|t| t.faction == faction)
            .map(|t| t.destroyed)
            .sum()
    }

    /// Victor among the surviving stacks: the faction of the first non-colony
    /// stack, else the colony's faction, else nobody. A surviving monster
    /// counts as a win for no faction.
    #[must_use]
    pub fn pick_victor<'a>(survivors: impl IntoIterator<Item = &'a Stack>) -> (Option<FactionId>, bool) {
        let mut colony = None;
        for stack in survivors {
            if stack.is_missile() {
                continue;
            }
            if stack.is_colony() {
                colony = colony.or(stack.faction);
                continue;
            }
            return (stack.faction, stack.is_monster());
        }
        (colony, false)
    }

    /// Raises incidents from the battle's engagements.
    ///
    /// `engagements` holds (firing faction, target faction) pairs;
    /// `colony_attackers` the factions that fired on the colony.
    pub fn raise_incidents(
        &mut self,
        engagements: &BTreeSet<(FactionId, FactionId)>,
        colony_attackers: &BTreeSet<FactionId>,
    ) {
        let mut incidents = BTreeSet::new();
        for &(aggressor, victim) in engagements {
            incidents.insert(Incident::Skirmish { aggressor, victim });
        }
        if let Some(colony) = &self.colony {
            let victim = colony.owner;
            for &aggressor in colony_attackers {
                incidents.insert(Incident::ColonyAttacked { aggressor, victim });
                if colony.destroyed {
                    incidents.insert(Incident::ColonyDestroyed { aggressor, victim });
                }
            }
            for &aggressor in &self.bioweapon_users {
                incidents.insert(Incident::BioweaponUsed { aggressor, victim });
            }
        }
        self.incidents = incidents.into_iter().collect();
    }

    /// Suppresses a share of the colony's rebels if its owner won.
    pub fn suppress_rebels(&mut self, rebels: f32, fraction: f32) {
        let victor = self.victor;
        if let Some(colony) = self.colony.as_mut() {
            if !colony.destroyed && victor == Some(colony.owner) {
                colony.rebels_suppressed = rebels * fraction;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::GridPos;
    use crate::tests::helpers::{colony_stack, ship_stack};

    fn outcome() -> CombatOutcome {
        CombatOutcome::new(1, Some(FactionId::new(1)), Some(FactionId::new(2)), None)
    }

    mod victor_tests {
        use super::*;

        #[test]
        fn first_ship_wins_over_colony() {
            let colony = colony_stack(2, 1, 10.0);
            let ship = ship_stack(1, GridPos::new(0, 0));
            let (victor, monster) = CombatOutcome::pick_victor([&colony, &ship]);
            assert_eq!(victor, Some(FactionId::new(1)));
            assert!(!monster);
        }

        #[test]
        fn lone_colony_wins() {
            let colony = colony_stack(2, 0, 10.0);
            let (victor, _) = CombatOutcome::pick_victor([&colony]);
            assert_eq!(victor, Some(FactionId::new(2)));
        }

        #[test]
        fn nobody_left_means_no_victor() {
            let (victor, monster) = CombatOutcome::pick_victor(std::iter::empty::<&Stack>());
            assert_eq!(victor, None);
            assert!(!monster);
        }

        #[test]
        fn surviving_monster_wins_for_nobody() {
            let m = Stack::monster(&MonsterKind::Guardian.template());
            let colony = colony_stack(2, 0, 10.0);
            let (victor, monster) = CombatOutcome::pick_victor([&colony, &m]);
            assert_eq!(victor, None);
            assert!(monster);
        }
    }

    mod tally_tests {
        use super::*;

        #[test]
        fn losses_and_retreats_accumulate_per_design() {
            let mut o = outcome();
            let ship = ship_stack(1, GridPos::new(0, 0));
            o.record_losses(&ship, 2);
            o.record_losses(&ship, 1);
            o.record_retreat(&ship);
            let design = ship.as_ship().map(|s| s.design).unwrap();
            let t = o.tally(FactionId::new(1), design).unwrap();
            assert_eq!(t.destroyed, 3);
            assert_eq!(t.retreated, ship.num);
            assert_eq!(o.retreats.len(), 1);
            assert_eq!(o.ships_lost(FactionId::new(1)), 3);
        }

        #[test]
        fn base_losses_count_separately() {
            let mut o = outcome();
            o.record_losses(&colony_stack(2, 3, 10.0), 2);
            assert_eq!(o.bases_destroyed, 2);
            assert!(o.tallies.is_empty());
        }

        #[test]
        fn damaged_only_when_hurt() {
            let mut o = outcome();
            let mut ship = ship_stack(1, GridPos::new(0, 0));
            o.record_damaged(&ship);
            assert!(o.tallies.is_empty());
            ship.hits -= 1.0;
            o.record_damaged(&ship);
            assert_eq!(o.tallies[0].damaged, 1);
        }
    }

    mod incident_tests {
        use super::*;

        fn with_colony(destroyed: bool) -> CombatOutcome {
            let mut o = outcome();
            o.colony = Some(ColonyReport {
                owner: FactionId::new(2),
                population_before: 10.0,
                population_after: if destroyed { 0.0 } else { 10.0 },
                bases_before: 1,
                bases_after: 0,
                destroyed,
                rebels_suppressed: 0.0,
            });
            o
        }

        #[test]
        fn colony_destruction_raises_both_incidents() {
            let mut o = with_colony(true);
            let attackers = BTreeSet::from([FactionId::new(1)]);
            o.raise_incidents(&BTreeSet::new(), &attackers);
            assert!(o.incidents.contains(&Incident::ColonyAttacked {
                aggressor: FactionId::new(1),
                victim: FactionId::new(2)
            }));
            assert!(o.incidents.contains(&Incident::ColonyDestroyed {
                aggressor: FactionId::new(1),
                victim: FactionId::new(2)
            }));
        }

        #[test]
        fn bioweapons_are_reported() {
            let mut o = with_colony(false);
            o.bioweapon_users.insert(FactionId::new(1));
            o.raise_incidents(&BTreeSet::new(), &BTreeSet::new());
            assert_eq!(
                o.incidents,
                vec![Incident::BioweaponUsed {
                    aggressor: FactionId::new(1),
                    victim: FactionId::new(2)
                }]
            );
        }

        #[test]
        fn rebels_suppressed_only_for_winning_owner() {
            let mut o = with_colony(false);
            o.victor = Some(FactionId::new(1));
            o.suppress_rebels(4.0, 0.5);
            assert!(o.colony.as_ref().unwrap().rebels_suppressed.abs() < f32::EPSILON);
            o.victor = Some(FactionId::new(2));
            o.suppress_rebels(4.0, 0.5);
            assert!((o.colony.as_ref().unwrap().rebels_suppressed - 2.0).abs() < f32::EPSILON);
        }
    }
}
