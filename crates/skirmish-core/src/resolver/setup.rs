//! Battle setup: roles, deployment and pre-battle retreats.
//!
//! [`Engagement::prepare`] turns a [`Scenario`] into one of three things:
//! a battle to resolve, a bombardment of an undefended colony, or an
//! encounter in which nobody can fight at all.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::CombatResolver;
use crate::arena::{Arena, GridPos};
use crate::config::CombatConfig;
use crate::entity::{Stack, StackId, WeaponBearer, WeaponKind};
use crate::error::ScenarioError;
use crate::faction::{Diplomacy, FactionId};
use crate::outcome::{ColonyReport, CombatOutcome, Termination};
use crate::scenario::Scenario;

/// Hostile fleets over a colony that has nothing to fight with.
///
/// No ship combat takes place; the strategic layer handles the orbital
/// bombardment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BombardmentReport {
    /// System id.
    pub system: u32,
    /// Colony owner.
    pub owner: FactionId,
    /// Hostile factions in orbit, in fleet order.
    pub attackers: Vec<FactionId>,
    /// Colony population.
    pub population: f32,
    /// Some attacker carries bombs.
    pub bombers: bool,
}

impl BombardmentReport {
    /// Outcome record for the strategic layer: the attackers hold the field
    /// and the colony is untouched.
    #[must_use]
    pub fn into_outcome(self) -> CombatOutcome {
        let mut outcome = CombatOutcome::new(
            self.system,
            self.attackers.first().copied(),
            Some(self.owner),
            None,
        );
        outcome.participants = std::iter::once(self.owner)
            .chain(self.attackers.iter().copied())
            .collect();
        outcome.colony = Some(ColonyReport {
            owner: self.owner,
            population_before: self.population,
            population_after: self.population,
            bases_before: 0,
            bases_after: 0,
            destroyed: false,
            rebels_suppressed: 0.0,
        });
        outcome.victor = self.attackers.first().copied();
        outcome.termination = Termination::NoConflict;
        outcome.finalized = true;
        outcome
    }
}

/// What an encounter turns into once setup has run.
#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Engagement {
    /// A battle ready to resolve.
    Battle(CombatResolver),
    /// An unarmed colony with hostile fleets overhead.
    Bombardment(BombardmentReport),
    /// Nobody left who can fight; the outcome is already final.
    NoConflict(CombatOutcome),
}

impl Engagement {
    /// Runs the setup protocol for an encounter.
    ///
    /// 1. Validate the configuration and scenario.
    /// 2. Assign attacker and defender roles.
    /// 3. Build and deploy every stack, with faction bonuses applied.
    /// 4. Divert an undefended colony to bombardment.
    /// 5. Let AI ships retreat until nobody else wants to.
    /// 6. Drop passive factions and short-circuit if nothing can fight.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] for an invalid scenario or configuration,
    /// or when a side has more stacks than its deployment columns can hold.
    pub fn prepare(scenario: &Scenario, config: &CombatConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        scenario.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(scenario.seed);
        let diplomacy = Diplomacy::from_factions(&scenario.factions);

        let mut ships = Vec::new();
        for fleet in &scenario.fleets {
            for entry in fleet.ships.iter().filter(|e| e.count > 0) {
                let design = scenario
                    .design(entry.design)
                    .ok_or(ScenarioError::UnknownDesign(entry.design))?;
                ships.push(design.build_stack(fleet, entry.count));
            }
        }
        let monsters: Vec<Stack> = scenario
            .monsters
            .iter()
            .map(|kind| Stack::monster(&kind.template()))
            .collect();

        let roles = Roles::assign(scenario, &diplomacy, &mut rng);
        let owner = scenario.system.owner;
        let home_fleet = owner.is_some_and(|o| {
            scenario
                .fleets
                .iter()
                .any(|f| diplomacy.allied(o, f.faction))
        });

        let mut arena = Arena::from_config(config);
        place_asteroids(&mut arena, scenario, &mut rng);
        let right = |stack: &Stack| {
            stack.faction.is_some_and(|f| {
                roles
                    .defender
                    .is_some_and(|d| diplomacy.allied(d, f))
            })
        };
        let (defenders, attackers): (Vec<Stack>, Vec<Stack>) = ships.into_iter().partition(right);
        let mut deployment = Deployment::new(&mut arena);
        deployment.place_side(defenders, Side::Right, &diplomacy)?;
        deployment.place_side(attackers, Side::Left, &diplomacy)?;
        deployment.place_monsters(monsters)?;

        if let (Some(owner), Some(spec)) = (owner, &scenario.system.colony) {
            if spec.is_armed() || home_fleet {
                deployment.place_colony(spec.build_stack(owner, config), &diplomacy);
            } else if scenario.monsters.is_empty() && !any_conflict(deployment.arena(), &diplomacy) {
                let attackers = hostile_factions(scenario, &diplomacy, owner);
                if !attackers.is_empty() {
                    let bombers = deployment.arena().stacks().any(|s| {
                        s.faction.is_some_and(|f| diplomacy.hostile(f, owner))
                            && s.weapon_slots().iter().any(|w| w.spec.kind == WeaponKind::Bomb)
                    });
                    info!(system = scenario.system.id, %owner, "undefended colony; diverting to bombardment");
                    return Ok(Self::Bombardment(BombardmentReport {
                        system: scenario.system.id,
                        owner,
                        attackers,
                        population: spec.population,
                        bombers,
                    }));
                }
            }
        }

        let outcome = CombatOutcome::new(
            scenario.system.id,
            roles.attacker,
            roles.defender,
            scenario.monsters.first().copied(),
        );
        let mut resolver =
            CombatResolver::with_rng(arena, diplomacy, config.clone(), rng, outcome);
        resolver.pre_battle_retreats();
        resolver.drop_passive_factions();

        if !resolver.conflict_remains() {
            let termination = if resolver.arena.stacks().any(Stack::is_combatant) {
                Termination::NoConflict
            } else {
                Termination::NoParticipants
            };
            resolver.finalize(termination);
            return Ok(Self::NoConflict(resolver.into_outcome()));
        }

        info!(
            system = scenario.system.id,
            attacker = ?roles.attacker,
            defender = ?roles.defender,
            stacks = resolver.arena.stack_count(),
            interactive = resolver.interactive,
            "battle prepared"
        );
        Ok(Self::Battle(resolver))
    }

    /// Resolves whatever setup produced and returns the final outcome.
    #[must_use]
    pub fn resolve(self) -> CombatOutcome {
        match self {
            Self::Battle(mut resolver) => {
                resolver.run();
                resolver.into_outcome()
            }
            Self::Bombardment(report) => report.into_outcome(),
            Self::NoConflict(outcome) => outcome,
        }
    }
}

/// Prepares and auto-resolves an encounter in one call.
///
/// # Errors
///
/// See [`Engagement::prepare`].
pub fn auto_resolve(scenario: &Scenario, config: &CombatConfig) -> Result<CombatOutcome, ScenarioError> {
    Ok(Engagement::prepare(scenario, config)?.resolve())
}

// =============================================================================
// Roles
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Roles {
    attacker: Option<FactionId>,
    defender: Option<FactionId>,
}

impl Roles {
    /// The owner defends its colony, or a fleet allied with the owner defends
    /// the system. Monsters defend nothing. Any other contest gets its roles
    /// by coin flip, so stalling until the turn ceiling wins nothing.
    fn assign(scenario: &Scenario, diplomacy: &Diplomacy, rng: &mut ChaCha8Rng) -> Self {
        let fleet_factions = fleet_factions(scenario);
        let owner = scenario.system.owner;
        let defender = owner.and_then(|o| {
            if scenario.system.colony.is_some() {
                Some(o)
            } else {
                fleet_factions.iter().copied().find(|f| diplomacy.allied(o, *f))
            }
        });
        if let Some(defender) = defender {
            let attacker = fleet_factions
                .iter()
                .copied()
                .find(|f| diplomacy.hostile(defender, *f));
            return Self {
                attacker,
                defender: Some(defender),
            };
        }
        if !scenario.monsters.is_empty() {
            return Self {
                attacker: fleet_factions.first().copied(),
                defender: None,
            };
        }
        let Some(&first) = fleet_factions.first() else {
            return Self {
                attacker: None,
                defender: None,
            };
        };
        let Some(second) = fleet_factions
            .iter()
            .copied()
            .find(|f| diplomacy.hostile(first, *f))
        else {
            return Self {
                attacker: Some(first),
                defender: None,
            };
        };
        let (attacker, defender) = if rng.gen_bool(0.5) {
            (first, second)
        } else {
            (second, first)
        };
        debug!(%attacker, %defender, "neutral contest; roles by coin flip");
        Self {
            attacker: Some(attacker),
            defender: Some(defender),
        }
    }
}

fn fleet_factions(scenario: &Scenario) -> Vec<FactionId> {
    let mut seen = Vec::new();
    for fleet in &scenario.fleets {
        if !seen.contains(&fleet.faction) {
            seen.push(fleet.faction);
        }
    }
    seen
}

fn hostile_factions(scenario: &Scenario, diplomacy: &Diplomacy, owner: FactionId) -> Vec<FactionId> {
    fleet_factions(scenario)
        .into_iter()
        .filter(|f| diplomacy.hostile(owner, *f))
        .collect()
}

fn any_conflict(arena: &Arena, diplomacy: &Diplomacy) -> bool {
    arena.stacks().any(|a| {
        a.is_combatant() && a.is_armed() && arena.stacks().any(|b| a.could_engage(b, diplomacy))
    })
}

// =============================================================================
// Deployment
// =============================================================================

/// Explicit asteroid cells first, then random ones in the middle columns.
fn place_asteroids(arena: &mut Arena, scenario: &Scenario, rng: &mut ChaCha8Rng) {
    for &cell in &scenario.system.asteroid_cells {
        arena.set_asteroid(cell, true);
    }
    let (lo, hi) = (2, arena.width() - 3);
    if hi < lo {
        return;
    }
    let mut placed = 0;
    let mut attempts = scenario.system.asteroids.saturating_mul(10);
    while placed < scenario.system.asteroids && attempts > 0 {
        attempts -= 1;
        let cell = GridPos::new(rng.gen_range(lo..=hi), rng.gen_range(0..arena.height()));
        if !arena.is_asteroid(cell) {
            arena.set_asteroid(cell, true);
            placed += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Places stacks on a fresh arena. The colony cell at the centre of the
/// right edge is kept clear for the colony.
struct Deployment<'a> {
    arena: &'a mut Arena,
    colony_cell: GridPos,
}

impl<'a> Deployment<'a> {
    fn new(arena: &'a mut Arena) -> Self {
        let colony_cell = GridPos::new(arena.width() - 1, arena.height() / 2);
        arena.set_asteroid(colony_cell, false);
        Self { arena, colony_cell }
    }

    fn arena(&self) -> &Arena {
        self.arena
    }

    fn open(&self, pos: GridPos) -> bool {
        pos != self.colony_cell && self.arena.is_valid(pos) && !self.arena.is_occupied(pos, None)
    }

    fn add(&mut self, mut stack: Stack, pos: GridPos, diplomacy: &Diplomacy) -> StackId {
        let attack = diplomacy.attack_bonus(stack.faction);
        let defense = diplomacy.defense_bonus(stack.faction);
        stack.attack_level += attack;
        stack.beam_defense += defense;
        stack.missile_defense += defense;
        stack.pos = pos;
        self.arena.spawn(stack)
    }

    fn place_colony(&mut self, stack: Stack, diplomacy: &Diplomacy) {
        let pos = self.colony_cell;
        self.add(stack, pos, diplomacy);
    }

    /// Rows from the centre outwards.
    fn rows(&self) -> Vec<i32> {
        let h = self.arena.height();
        let mid = h / 2;
        let mut rows = vec![mid];
        for d in 1..h {
            for row in [mid - d, mid + d] {
                if (0..h).contains(&row) {
                    rows.push(row);
                }
            }
        }
        rows
    }

    fn place_side(&mut self, stacks: Vec<Stack>, side: Side, diplomacy: &Diplomacy) -> Result<(), ScenarioError> {
        let count = stacks.len();
        let w = self.arena.width();
        let columns = match side {
            Side::Left => [0, 1],
            Side::Right => [w - 2, w - 1],
        };
        let rows = self.rows();
        let mut slots = columns
            .iter()
            .flat_map(|&x| rows.iter().map(move |&y| GridPos::new(x, y)))
            .filter(|&pos| self.open(pos))
            .collect::<Vec<_>>()
            .into_iter();
        for stack in stacks {
            let pos = slots.next().ok_or(ScenarioError::DeploymentOverflow { count })?;
            self.add(stack, pos, diplomacy);
        }
        Ok(())
    }

    fn place_monsters(&mut self, monsters: Vec<Stack>) -> Result<(), ScenarioError> {
        let count = monsters.len();
        let centre = GridPos::new(self.arena.width() / 2, self.arena.height() / 2);
        for stack in monsters {
            let mut cells: Vec<GridPos> = self
                .arena
                .cells()
                .filter(|&c| self.open(c))
                .collect();
            cells.sort_by_key(|c| c.chebyshev(centre));
            let pos = cells
                .first()
                .copied()
                .ok_or(ScenarioError::DeploymentOverflow { count })?;
            self.add(stack, pos, &Diplomacy::default());
        }
        Ok(())
    }
}

// =============================================================================
// Pre-battle
// =============================================================================

impl CombatResolver {
    /// Asks every AI ship whether it wants out, withdrawing those with
    /// somewhere to go, until a full pass withdraws nobody.
    fn pre_battle_retreats(&mut self) {
        loop {
            let candidates: Vec<StackId> = self
                .arena
                .stacks()
                .filter(|s| s.is_ship() && !s.is_player())
                .map(|s| s.id)
                .collect();
            let mut withdrawn = 0;
            for id in candidates {
                let view = self.view();
                let leaves = self.captains.get(&id).is_some_and(|captain| {
                    captain.want_to_retreat(&view, id)
                        && captain.retreat_destination(&view, id).is_some()
                });
                if leaves {
                    self.withdraw(id);
                    withdrawn += 1;
                }
            }
            if withdrawn == 0 {
                break;
            }
            debug!(withdrawn, "pre-battle retreat pass");
        }
    }

    /// Factions left with nothing but unarmed colonies sit the battle out.
    fn drop_passive_factions(&mut self) {
        let passive: Vec<FactionId> = self
            .outcome
            .participants
            .iter()
            .copied()
            .filter(|&f| {
                let own: Vec<&Stack> = self
                    .arena
                    .stacks()
                    .filter(|s| s.faction == Some(f) && s.is_combatant())
                    .collect();
                !own.is_empty() && own.iter().all(|s| s.is_colony() && !s.is_armed())
            })
            .collect();
        for faction in passive {
            let stacks: Vec<StackId> = self
                .arena
                .stacks()
                .filter(|s| s.faction == Some(faction))
                .map(|s| s.id)
                .collect();
            for id in stacks {
                if let Some(stack) = self.arena.despawn(id) {
                    self.captains.remove(&id);
                    self.departed.insert(id, stack);
                }
            }
            debug!(%faction, "faction is passive");
            self.outcome.participants.retain(|f| *f != faction);
            self.outcome.passive.push(faction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{MonsterKind, WeaponSpec};
    use crate::faction::FactionInfo;
    use crate::scenario::{ColonySpec, DesignWeapon, FleetSpec, ShipDesign, StarSystem};

    fn a() -> FactionId {
        FactionId::new(1)
    }

    fn b() -> FactionId {
        FactionId::new(2)
    }

    fn scenario() -> Scenario {
        let mut gun = ShipDesign::new(1, "Gunship", 20.0);
        gun.weapons
            .push(DesignWeapon::new(WeaponSpec::beam("Laser", 1.0, 4.0, 2), 1));
        Scenario::new(3, StarSystem::new(9, "Rigel"))
            .with_faction(FactionInfo::new(a(), "A"))
            .with_faction(FactionInfo::new(b(), "B"))
            .with_design(gun)
            .with_design(ShipDesign::new(2, "Freighter", 5.0))
    }

    mod role_tests {
        use super::*;

        #[test]
        fn colony_owner_defends() {
            let mut s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 2))
                .with_fleet(FleetSpec::new(2, b()).with_ships(1, 2));
            s.system = StarSystem::new(9, "Rigel").colonized(b(), ColonySpec::new(10.0, 2));
            let roles = Roles::assign(&s, &Diplomacy::from_factions(&s.factions), &mut ChaCha8Rng::seed_from_u64(1));
            assert_eq!(roles.defender, Some(b()));
            assert_eq!(roles.attacker, Some(a()));
        }

        #[test]
        fn neutral_contest_assigns_both_roles() {
            let s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 2))
                .with_fleet(FleetSpec::new(2, b()).with_ships(1, 2));
            let roles = Roles::assign(&s, &Diplomacy::from_factions(&s.factions), &mut ChaCha8Rng::seed_from_u64(1));
            let pair = (roles.attacker, roles.defender);
            assert!(pair == (Some(a()), Some(b())) || pair == (Some(b()), Some(a())));
        }

        #[test]
        fn monsters_defend_nothing() {
            let s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 2))
                .with_monster(MonsterKind::Guardian);
            let roles = Roles::assign(&s, &Diplomacy::from_factions(&s.factions), &mut ChaCha8Rng::seed_from_u64(1));
            assert_eq!(roles.attacker, Some(a()));
            assert_eq!(roles.defender, None);
        }
    }

    mod deployment_tests {
        use super::*;

        #[test]
        fn sides_deploy_in_opposite_columns() {
            let s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 2))
                .with_fleet(FleetSpec::new(2, b()).with_ships(1, 2));
            let Engagement::Battle(resolver) = Engagement::prepare(&s, &CombatConfig::default()).unwrap() else {
                panic!("expected a battle");
            };
            let xs: Vec<(Option<FactionId>, i32)> =
                resolver.arena().stacks().map(|s| (s.faction, s.pos.x)).collect();
            let left: Vec<_> = xs.iter().filter(|(_, x)| *x <= 1).collect();
            let right: Vec<_> = xs.iter().filter(|(_, x)| *x >= 8).collect();
            assert_eq!(left.len(), 1);
            assert_eq!(right.len(), 1);
            assert_ne!(left[0].0, right[0].0);
        }

        #[test]
        fn too_many_stacks_overflow() {
            let mut s = scenario();
            for id in 0..20 {
                let design = 100 + id;
                let mut d = ShipDesign::new(design, format!("Hull {id}"), 5.0);
                d.weapons
                    .push(DesignWeapon::new(WeaponSpec::beam("Laser", 1.0, 2.0, 1), 1));
                s = s.with_design(d).with_fleet(FleetSpec::new(design, a()).with_ships(design, 1));
            }
            s = s.with_fleet(FleetSpec::new(1, b()).with_ships(1, 1));
            let err = Engagement::prepare(&s, &CombatConfig::default()).unwrap_err();
            assert!(matches!(err, ScenarioError::DeploymentOverflow { .. }));
        }

        #[test]
        fn explicit_asteroids_are_kept() {
            let mut s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 1))
                .with_fleet(FleetSpec::new(2, b()).with_ships(1, 1));
            s.system.asteroid_cells = vec![GridPos::new(5, 5)];
            let Engagement::Battle(resolver) = Engagement::prepare(&s, &CombatConfig::default()).unwrap() else {
                panic!("expected a battle");
            };
            assert!(resolver.arena().is_asteroid(GridPos::new(5, 5)));
        }

        #[test]
        fn faction_bonuses_apply() {
            let mut s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 1))
                .with_fleet(FleetSpec::new(2, b()).with_ships(1, 1));
            s.factions[0].attack_bonus = 2;
            s.factions[0].defense_bonus = 1;
            let Engagement::Battle(resolver) = Engagement::prepare(&s, &CombatConfig::default()).unwrap() else {
                panic!("expected a battle");
            };
            let boosted = resolver
                .arena()
                .stacks()
                .find(|s| s.faction == Some(a()))
                .unwrap();
            assert_eq!(boosted.attack_level, 2);
            assert_eq!(boosted.beam_defense, 1);
            assert_eq!(boosted.missile_defense, 1);
        }
    }

    mod classification_tests {
        use super::*;

        #[test]
        fn unarmed_colony_without_home_fleet_is_bombarded() {
            let mut s = scenario().with_fleet(FleetSpec::new(1, a()).with_ships(1, 2));
            s.system = StarSystem::new(9, "Rigel").colonized(b(), ColonySpec::new(10.0, 0));
            match Engagement::prepare(&s, &CombatConfig::default()).unwrap() {
                Engagement::Bombardment(report) => {
                    assert_eq!(report.owner, b());
                    assert_eq!(report.attackers, vec![a()]);
                    assert!(!report.bombers);
                }
                other => panic!("expected bombardment, got {other:?}"),
            }
        }

        #[test]
        fn unarmed_fleets_never_fight() {
            let s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(2, 2))
                .with_fleet(FleetSpec::new(2, b()).with_ships(2, 2));
            match Engagement::prepare(&s, &CombatConfig::default()).unwrap() {
                Engagement::NoConflict(outcome) => {
                    assert!(outcome.finalized);
                    assert_eq!(outcome.rounds, 0);
                    assert_eq!(outcome.termination, Termination::NoConflict);
                }
                other => panic!("expected no conflict, got {other:?}"),
            }
        }

        #[test]
        fn empty_scenario_has_no_participants() {
            let s = scenario();
            match Engagement::prepare(&s, &CombatConfig::default()).unwrap() {
                Engagement::NoConflict(outcome) => {
                    assert_eq!(outcome.termination, Termination::NoParticipants);
                    assert_eq!(outcome.victor, None);
                }
                other => panic!("expected no conflict, got {other:?}"),
            }
        }

        #[test]
        fn unarmed_colony_with_home_fleet_is_passive() {
            let mut s = scenario()
                .with_fleet(FleetSpec::new(1, a()).with_ships(1, 2))
                .with_fleet(FleetSpec::new(2, b()).with_ships(2, 1).retreating_to(4));
            s.system = StarSystem::new(9, "Rigel").colonized(b(), ColonySpec::new(10.0, 0));
            let outcome = auto_resolve(&s, &CombatConfig::default()).unwrap();
            assert!(outcome.passive.contains(&b()));
            assert!(!outcome.participants.contains(&b()));
        }
    }
}
