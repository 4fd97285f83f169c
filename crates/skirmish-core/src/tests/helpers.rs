//! Stack and scenario factories shared by the unit and integration tests.

use crate::arena::{Arena, GridPos};
use crate::config::CombatConfig;
use crate::entity::{ShipState, Stack, StackId, StackInner, WeaponSlot, WeaponSpec};
use crate::faction::{Diplomacy, FactionId, FactionInfo};
use crate::resolver::CombatResolver;
use crate::scenario::{ColonySpec, DesignWeapon, FleetSpec, Scenario, ShipDesign, StarSystem};

// =============================================================================
// Stacks
// =============================================================================

/// Three unarmed, unshielded ships of 10 hits each, moving one cell a turn.
pub fn ship_stack(faction: u32, pos: GridPos) -> Stack {
    let mut stack = Stack::new(
        "Freighter",
        Some(FactionId::new(faction)),
        3,
        10.0,
        StackInner::Ship(ShipState {
            fleet: 1,
            design: 1,
            retreat_to: None,
            starting_num: 3,
        }),
    );
    stack.max_move = 1.0;
    stack.move_points = 1.0;
    stack.pos = pos;
    stack
}

/// [`ship_stack`] carrying one short-range laser per ship.
pub fn armed_ship(faction: u32, pos: GridPos) -> Stack {
    let mut stack = ship_stack(faction, pos);
    stack.name = "Gunship".into();
    stack
        .weapons
        .push(WeaponSlot::new(WeaponSpec::beam("Laser", 1.0, 4.0, 1), 1));
    stack
}

/// Planetary defenses with `bases` missile bases of 10 hits.
pub fn colony_stack(owner: u32, bases: u32, population: f32) -> Stack {
    let mut spec = ColonySpec::new(population, bases);
    spec.base_hits = 10.0;
    spec.build_stack(FactionId::new(owner), &CombatConfig::default())
}

// =============================================================================
// Resolvers
// =============================================================================

/// Spawns `stacks` on a default-sized arena and returns the resolver with the
/// spawned ids in order. Faction 1 attacks, faction 2 defends.
pub fn resolver_with(stacks: Vec<Stack>, seed: u64) -> (CombatResolver, Vec<StackId>) {
    let config = CombatConfig::default();
    let mut arena = Arena::new(config.grid_width, config.grid_height);
    let ids = stacks.into_iter().map(|s| arena.spawn(s)).collect();
    let resolver = CombatResolver::new(
        arena,
        Diplomacy::default(),
        config,
        seed,
        Some(FactionId::new(1)),
        Some(FactionId::new(2)),
    );
    (resolver, ids)
}

// =============================================================================
// Scenarios
// =============================================================================

fn gunship(id: u32) -> ShipDesign {
    let mut design = ShipDesign::new(id, "Gunship", 20.0);
    design.weapons.push(DesignWeapon::new(
        WeaponSpec::beam("Laser", 2.0, 8.0, 2),
        2,
    ));
    design
}

fn two_factions(seed: u64) -> Scenario {
    Scenario::new(seed, StarSystem::new(7, "Procyon"))
        .with_faction(FactionInfo::new(FactionId::new(1), "Blue"))
        .with_faction(FactionInfo::new(FactionId::new(2), "Red"))
}

/// Two evenly matched gunship fleets in an empty system.
pub fn duel_scenario(seed: u64) -> Scenario {
    two_factions(seed)
        .with_design(gunship(1))
        .with_fleet(FleetSpec::new(1, FactionId::new(1)).with_ships(1, 3))
        .with_fleet(FleetSpec::new(2, FactionId::new(2)).with_ships(1, 3))
}

/// Two unarmed freighter fleets; nobody can fight.
pub fn idle_scenario() -> Scenario {
    two_factions(1)
        .with_design(ShipDesign::new(1, "Freighter", 10.0))
        .with_fleet(FleetSpec::new(1, FactionId::new(1)).with_ships(1, 2))
        .with_fleet(FleetSpec::new(2, FactionId::new(2)).with_ships(1, 2))
}

/// A raiding gunship fleet against a colony with missile bases.
pub fn siege_scenario(seed: u64) -> Scenario {
    let system = StarSystem::new(3, "Altair").colonized(FactionId::new(2), ColonySpec::new(40.0, 2));
    Scenario::new(seed, system)
        .with_faction(FactionInfo::new(FactionId::new(1), "Raiders"))
        .with_faction(FactionInfo::new(FactionId::new(2), "Settlers"))
        .with_design(gunship(1))
        .with_fleet(FleetSpec::new(1, FactionId::new(1)).with_ships(1, 4))
}
