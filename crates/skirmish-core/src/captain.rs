//! Decision providers for AI-controlled stacks.
//!
//! A [`Captain`] is handed a [`TurnContext`] once per turn and requests
//! actions through it; it never touches a stack directly. The resolver also
//! consults captains outside their turns: before the battle (retreat) and
//! when an amoeba splits (where to put the sibling).
//!
//! Default captains, one per stack variant:
//!
//! | Variant | Captain | Behaviour |
//! |---|---|---|
//! | Ship | [`BasicCaptain`] | retreats when outmatched, else closes on the nearest target and fires |
//! | Colony, guardian | [`StationaryCaptain`] | fires at whatever is in reach, never moves |
//! | Amoeba | [`AmoebaCaptain`] | feeds on unarmed ships, otherwise hunts |
//! | Crystal | [`CrystalCaptain`] | closes to pulse range |

use tracing::debug;

use crate::arena::GridPos;
use crate::entity::{Stack, StackId, StackKind, WeaponBearer};
use crate::path::{self, FlightPath};
use crate::resolver::{BattleView, TurnContext};

/// Per-stack decision provider.
pub trait Captain: Send {
    /// Plays one turn.
    fn perform_turn(&mut self, ctx: &mut TurnContext<'_>);

    /// Whether the stack wants to leave the battle.
    fn want_to_retreat(&self, _view: &BattleView<'_>, _id: StackId) -> bool {
        false
    }

    /// Where the stack would retreat to.
    fn retreat_destination(&self, view: &BattleView<'_>, id: StackId) -> Option<u32> {
        view.stack(id)
            .and_then(Stack::as_ship)
            .and_then(|ship| ship.retreat_to)
    }

    /// Hostile armed strength is at least `retreat_strength_ratio` times the
    /// strength of the stack's own side.
    fn facing_overwhelming_force(&self, view: &BattleView<'_>, id: StackId) -> bool {
        let (own, hostile) = view.strength_balance(id);
        hostile > 0.0 && hostile >= own * view.config().retreat_strength_ratio
    }

    /// Route to a cell.
    fn path_to(&self, view: &BattleView<'_>, id: StackId, to: GridPos) -> Option<FlightPath> {
        let me = view.stack(id)?;
        path::find_path(view.arena(), me, to)
    }

    /// Cell for the sibling when this stack splits.
    fn split_destination(&mut self, view: &BattleView<'_>, id: StackId) -> Option<GridPos> {
        adjacent_free_cell(view, id)
    }
}

/// The default captain for a stack's variant.
#[must_use]
pub fn default_captain(stack: &Stack) -> Box<dyn Captain> {
    match stack.kind() {
        StackKind::Ship => Box::new(BasicCaptain),
        StackKind::Colony | StackKind::Guardian | StackKind::Missile => Box::new(StationaryCaptain),
        StackKind::Amoeba => Box::new(AmoebaCaptain),
        StackKind::Crystal => Box::new(CrystalCaptain),
    }
}

/// First free neighbour of a stack, scanning rows top to bottom.
#[must_use]
pub fn adjacent_free_cell(view: &BattleView<'_>, id: StackId) -> Option<GridPos> {
    let me = view.stack(id)?;
    (-1..=1)
        .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
        .filter(|&offset| offset != (0, 0))
        .map(|(dx, dy)| me.pos.offset(dx, dy))
        .find(|&cell| view.arena().is_free(cell, None))
}

/// Flies as far along the route to `to` as this turn's movement allows.
fn fly_towards(ctx: &mut TurnContext<'_>, to: GridPos) -> bool {
    let step = {
        let view = ctx.view();
        let Some(me) = view.stack(ctx.id()) else {
            return false;
        };
        path::find_path(view.arena(), me, to).and_then(|route| route.for_stack(me).destination())
    };
    step.is_some_and(|cell| ctx.move_to(cell).is_ok())
}

/// Hostile stacks the acting stack can fire at right now, nearest first.
fn targets_in_reach(ctx: &TurnContext<'_>) -> Vec<StackId> {
    let view = ctx.view();
    let Some(me) = view.stack(ctx.id()) else {
        return Vec::new();
    };
    let mut targets: Vec<&Stack> = view
        .hostiles(me.id)
        .filter(|t| me.can_attack(t, view.diplomacy()))
        .collect();
    targets.sort_by_key(|t| me.pos.chebyshev(t.pos));
    targets.into_iter().map(|t| t.id).collect()
}

/// Fires at `target`, logging the reason if the resolver refuses.
pub fn open_fire(ctx: &mut TurnContext<'_>, target: StackId) -> bool {
    match ctx.attack(target) {
        Ok(_) => true,
        Err(err) => {
            debug!(stack = %ctx.id(), %target, %err, "attack refused");
            false
        }
    }
}

// =============================================================================
// Ships
// =============================================================================

/// Default ship captain.
///
/// Retreats when threatened and either unarmed or facing overwhelming force.
/// Otherwise fires at the nearest target, closes to a firing position, and
/// fires again.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCaptain;

impl Captain for BasicCaptain {
    fn perform_turn(&mut self, ctx: &mut TurnContext<'_>) {
        let id = ctx.id();
        let leaving = {
            let view = ctx.view();
            self.want_to_retreat(&view, id) && self.retreat_destination(&view, id).is_some()
        };
        if leaving && ctx.retreat().is_ok() {
            return;
        }

        let Some(target) = ctx.view().nearest_target(id).map(|t| t.id) else {
            return;
        };
        open_fire(ctx, target);
        if ctx.is_turn_complete() {
            return;
        }
        let step = {
            let view = ctx.view();
            view.firing_position(id, target)
                .and_then(|cell| self.path_to(&view, id, cell))
                .zip(view.stack(id))
                .and_then(|(route, me)| route.for_stack(me).destination())
        };
        if let Some(cell) = step {
            if ctx.move_to(cell).is_ok() {
                open_fire(ctx, target);
            }
        }
    }

    fn want_to_retreat(&self, view: &BattleView<'_>, id: StackId) -> bool {
        let Some(me) = view.stack(id).filter(|s| s.is_ship()) else {
            return false;
        };
        let threatened = view
            .hostiles(id)
            .any(|h| h.is_armed() && h.could_engage(me, view.diplomacy()));
        threatened && (!me.is_armed() || self.facing_overwhelming_force(view, id))
    }
}

// =============================================================================
// Colonies and guardians
// =============================================================================

/// Never moves; fires at every target in reach, nearest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct StationaryCaptain;

impl Captain for StationaryCaptain {
    fn perform_turn(&mut self, ctx: &mut TurnContext<'_>) {
        for target in targets_in_reach(ctx) {
            open_fire(ctx, target);
        }
    }
}

// =============================================================================
// Monsters that move
// =============================================================================

/// Space amoeba: flies onto unarmed hostile ships to consume them, and
/// otherwise hunts the nearest target.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmoebaCaptain;

impl Captain for AmoebaCaptain {
    fn perform_turn(&mut self, ctx: &mut TurnContext<'_>) {
        let id = ctx.id();
        let prey = {
            let view = ctx.view();
            let Some(me) = view.stack(id) else {
                return;
            };
            view.hostiles(id)
                .filter(|p| me.can_consume(p, view.diplomacy()))
                .min_by_key(|p| me.pos.chebyshev(p.pos))
                .map(|p| (p.id, p.pos))
        };
        if let Some((prey, pos)) = prey {
            match ctx.nearest_free_cell(pos, |s| s.id == prey) {
                Some(cell) => {
                    fly_towards(ctx, cell);
                }
                None => ctx.remove_stalled(),
            }
            return;
        }
        hunt(ctx);
    }
}

/// Space crystal: closes until its pulse reaches the nearest target.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrystalCaptain;

impl Captain for CrystalCaptain {
    fn perform_turn(&mut self, ctx: &mut TurnContext<'_>) {
        hunt(ctx);
    }
}

/// Fires at what is in reach, otherwise approaches the nearest target and
/// tries again. A monster with no reachable cell left is removed.
fn hunt(ctx: &mut TurnContext<'_>) {
    let id = ctx.id();
    let in_reach = targets_in_reach(ctx);
    if let Some(&target) = in_reach.first() {
        open_fire(ctx, target);
        return;
    }
    let Some(goal) = ctx.view().nearest_target(id).map(|t| t.pos) else {
        return;
    };
    let Some(cell) = ctx.nearest_free_cell(goal, |_| false) else {
        ctx.remove_stalled();
        return;
    };
    if fly_towards(ctx, cell) {
        if let Some(&target) = targets_in_reach(ctx).first() {
            open_fire(ctx, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::config::CombatConfig;
    use crate::entity::MonsterKind;
    use crate::faction::{Diplomacy, FactionId};
    use crate::resolver::CombatResolver;
    use crate::tests::helpers::{armed_ship, ship_stack};

    fn resolver(stacks: Vec<crate::entity::Stack>) -> (CombatResolver, Vec<StackId>) {
        let mut arena = Arena::new(10, 8);
        let ids = stacks.into_iter().map(|s| arena.spawn(s)).collect();
        let r = CombatResolver::new(
            arena,
            Diplomacy::default(),
            CombatConfig::default(),
            1,
            Some(FactionId::new(1)),
            Some(FactionId::new(2)),
        );
        (r, ids)
    }

    mod assignment_tests {
        use super::*;

        #[test]
        fn every_variant_has_a_captain() {
            let amoeba = Stack::monster(&MonsterKind::Amoeba.template());
            let guardian = Stack::monster(&MonsterKind::Guardian.template());
            let ship = ship_stack(1, GridPos::new(0, 0));
            for stack in [amoeba, guardian, ship] {
                let _captain = default_captain(&stack);
            }
        }
    }

    mod fire_tests {
        use super::*;
        use std::sync::{Arc, Mutex};

        /// Fires once at a fixed target and keeps the verdict.
        struct Gunner {
            target: StackId,
            verdict: Arc<Mutex<Option<bool>>>,
        }

        impl Captain for Gunner {
            fn perform_turn(&mut self, ctx: &mut TurnContext<'_>) {
                let fired = open_fire(ctx, self.target);
                if let Ok(mut verdict) = self.verdict.lock() {
                    *verdict = Some(fired);
                }
            }
        }

        fn first_shot(target_at: GridPos) -> Option<bool> {
            let (r, ids) = resolver(vec![
                armed_ship(1, GridPos::new(4, 4)),
                armed_ship(2, target_at),
            ]);
            let verdict = Arc::new(Mutex::new(None));
            let mut r = r.with_captain(
                ids[0],
                Gunner {
                    target: ids[1],
                    verdict: Arc::clone(&verdict),
                },
            );
            r.step();
            verdict.lock().map(|v| *v).unwrap_or(None)
        }

        #[test]
        fn refused_attack_reports_false() {
            assert_eq!(first_shot(GridPos::new(9, 7)), Some(false));
        }

        #[test]
        fn attack_in_reach_reports_true() {
            assert_eq!(first_shot(GridPos::new(5, 4)), Some(true));
        }
    }

    mod retreat_tests {
        use super::*;

        #[test]
        fn unarmed_ship_under_threat_wants_out() {
            let (r, ids) = resolver(vec![
                ship_stack(2, GridPos::new(5, 4)),
                armed_ship(1, GridPos::new(0, 4)),
            ]);
            assert!(BasicCaptain.want_to_retreat(&r.view(), ids[0]));
        }

        #[test]
        fn even_fight_is_not_overwhelming() {
            let (r, ids) = resolver(vec![
                armed_ship(2, GridPos::new(5, 4)),
                armed_ship(1, GridPos::new(0, 4)),
            ]);
            assert!(!BasicCaptain.facing_overwhelming_force(&r.view(), ids[0]));
            assert!(!BasicCaptain.want_to_retreat(&r.view(), ids[0]));
        }

        #[test]
        fn lopsided_fight_is_overwhelming() {
            let mut big = armed_ship(1, GridPos::new(0, 4));
            big.num = 30;
            let (r, ids) = resolver(vec![armed_ship(2, GridPos::new(5, 4)), big]);
            assert!(BasicCaptain.want_to_retreat(&r.view(), ids[0]));
        }

        #[test]
        fn retreat_destination_comes_from_the_fleet() {
            let mut ship = ship_stack(1, GridPos::new(0, 0));
            if let crate::entity::StackInner::Ship(state) = &mut ship.inner {
                state.retreat_to = Some(12);
            }
            let (r, ids) = resolver(vec![ship]);
            assert_eq!(BasicCaptain.retreat_destination(&r.view(), ids[0]), Some(12));
        }
    }

    mod placement_tests {
        use super::*;

        #[test]
        fn adjacent_cell_skips_occupied_neighbours() {
            let (r, ids) = resolver(vec![
                ship_stack(1, GridPos::new(0, 0)),
                ship_stack(1, GridPos::new(0, 1)),
            ]);
            let cell = adjacent_free_cell(&r.view(), ids[0]).unwrap();
            assert_eq!(cell, GridPos::new(1, 0));
        }

        #[test]
        fn boxed_in_stack_has_no_adjacent_cell() {
            let mut stacks = vec![ship_stack(1, GridPos::new(0, 0))];
            for cell in [GridPos::new(1, 0), GridPos::new(0, 1), GridPos::new(1, 1)] {
                stacks.push(ship_stack(1, cell));
            }
            let (r, ids) = resolver(stacks);
            assert_eq!(adjacent_free_cell(&r.view(), ids[0]), None);
        }

        #[test]
        fn amoeba_splits_beside_itself() {
            let (r, ids) = resolver(vec![Stack::monster(&MonsterKind::Amoeba.template())]);
            let mut captain = AmoebaCaptain;
            assert_eq!(
                captain.split_destination(&r.view(), ids[0]),
                Some(GridPos::new(1, 0))
            );
        }
    }
}
