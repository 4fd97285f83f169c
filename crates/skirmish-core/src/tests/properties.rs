//! Property tests for damage resolution, pathing and seeded replay.

use proptest::prelude::*;

use crate::arena::{Arena, GridPos};
use crate::config::CombatConfig;
use crate::entity::{Stack, Targetable};
use crate::path::find_path;
use crate::resolver::auto_resolve;

use super::helpers::{duel_scenario, ship_stack};

// =============================================================================
// Strategies
// =============================================================================

/// A ship squadron with random size, hull and shields.
fn arb_squadron() -> impl Strategy<Value = Stack> {
    (1u32..20, 1.0f32..200.0, 0.0f32..20.0).prop_map(|(num, hits, shield)| {
        let mut s = ship_stack(1, GridPos::new(0, 0));
        s.num = num;
        s.hits = hits;
        s.max_hits = hits;
        s.starting_max_hits = hits;
        s.shield = shield;
        s.max_shield = shield;
        s
    })
}

fn arb_raw_damage() -> impl Strategy<Value = f32> {
    0.0f32..500.0
}

fn arb_cell() -> impl Strategy<Value = GridPos> {
    (0i32..10, 0i32..8).prop_map(|(x, y)| GridPos::new(x, y))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn single_shot_loses_at_most_one_unit(mut s in arb_squadron(), raw in arb_raw_damage()) {
        let before = s.num;
        let d = s.take_damage(raw, 1.0);
        prop_assert!(d.applied >= 0.0);
        prop_assert!(d.units_lost <= 1);
        prop_assert_eq!(s.num + d.units_lost, before);
        if s.num > 0 {
            prop_assert!(s.hits > 0.0 && s.hits <= s.max_hits);
        }
    }

    #[test]
    fn streaming_accounts_for_every_unit(mut s in arb_squadron(), raw in arb_raw_damage()) {
        let before = s.num;
        let d = s.take_streaming_damage(raw, 1.0);
        prop_assert!(d.applied >= 0.0);
        prop_assert_eq!(s.num + d.units_lost, before);
        prop_assert_eq!(s.destroyed(), s.num == 0);
    }

    #[test]
    fn black_hole_never_adds_units(mut s in arb_squadron(), pct in 0.0f32..1.0) {
        let before = s.num;
        let d = s.take_black_hole_damage(pct);
        prop_assert!(s.num <= before);
        prop_assert_eq!(s.num + d.units_lost, before);
    }

    #[test]
    fn open_space_paths_are_as_long_as_the_distance(from in arb_cell(), to in arb_cell()) {
        let arena = Arena::new(10, 8);
        let mover = ship_stack(1, from);
        let route = find_path(&arena, &mover, to);
        prop_assert!(route.is_some());
        let len = route.map_or(0, |r| r.len());
        prop_assert_eq!(len, usize::try_from(from.chebyshev(to)).unwrap_or(0));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn any_seed_replays_identically(seed in any::<u64>()) {
        let scenario = duel_scenario(seed);
        let a = auto_resolve(&scenario, &CombatConfig::default()).unwrap();
        let b = auto_resolve(&scenario, &CombatConfig::default()).unwrap();
        prop_assert!(a.finalized);
        prop_assert!(a.rounds <= CombatConfig::default().max_rounds + 1);
        prop_assert_eq!(a, b);
    }
}
