use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skirmish_core::batch::run_batch;
use skirmish_core::entity::{MonsterKind, WeaponSpec};
use skirmish_core::faction::{FactionId, FactionInfo};
use skirmish_core::path::find_path;
use skirmish_core::scenario::{ColonySpec, DesignWeapon, FleetSpec, ShipDesign, StarSystem};
use skirmish_core::{auto_resolve, Arena, CombatConfig, GridPos, Scenario};

fn fleet_battle(seed: u64) -> Scenario {
    let (a, b) = (FactionId::new(1), FactionId::new(2));
    let mut cruiser = ShipDesign::new(1, "Cruiser", 40.0);
    cruiser.shield = 2.0;
    cruiser
        .weapons
        .push(DesignWeapon::new(WeaponSpec::beam("Laser", 2.0, 8.0, 2), 3));
    let mut frigate = ShipDesign::new(2, "Frigate", 15.0);
    frigate.speed = 2.0;
    frigate
        .weapons
        .push(DesignWeapon::new(WeaponSpec::missile("Hyper-V", 6.0, 3.0, 8), 2));
    Scenario::new(seed, StarSystem::new(1, "Vega").colonized(b, ColonySpec::new(60.0, 3)))
        .with_faction(FactionInfo::new(a, "Red"))
        .with_faction(FactionInfo::new(b, "Blue"))
        .with_design(cruiser)
        .with_design(frigate)
        .with_fleet(FleetSpec::new(1, a).with_ships(1, 6).with_ships(2, 10))
        .with_fleet(FleetSpec::new(2, b).with_ships(1, 4).with_ships(2, 6))
}

fn bench_single_battle(c: &mut Criterion) {
    let config = CombatConfig::default();
    let scenario = fleet_battle(7);
    c.bench_function("auto_resolve_fleet_battle", |b| {
        b.iter(|| auto_resolve(black_box(&scenario), &config))
    });
}

fn bench_monster_battle(c: &mut Criterion) {
    let config = CombatConfig::default();
    let scenario = fleet_battle(3).with_monster(MonsterKind::Amoeba);
    c.bench_function("auto_resolve_amoeba", |b| {
        b.iter(|| auto_resolve(black_box(&scenario), &config))
    });
}

fn bench_batch(c: &mut Criterion) {
    let config = CombatConfig::default();
    let scenario = fleet_battle(0);
    let seeds: Vec<u64> = (0..64).collect();
    c.bench_function("batch_64_seeds", |b| {
        b.iter(|| run_batch(black_box(&scenario), &config, &seeds))
    });
}

fn bench_find_path(c: &mut Criterion) {
    let mut arena = Arena::new(10, 8);
    for cell in [(4, 2), (4, 3), (4, 4), (4, 5), (6, 1), (6, 6)] {
        arena.set_asteroid(GridPos::new(cell.0, cell.1), true);
    }
    let mut ship = fleet_battle(0).designs[0].build_stack(&FleetSpec::new(1, FactionId::new(1)), 1);
    ship.pos = GridPos::new(0, 4);
    c.bench_function("find_path_across_asteroids", |b| {
        b.iter(|| find_path(black_box(&arena), &ship, GridPos::new(9, 3)))
    });
}

criterion_group!(
    benches,
    bench_single_battle,
    bench_monster_battle,
    bench_batch,
    bench_find_path
);
criterion_main!(benches);
