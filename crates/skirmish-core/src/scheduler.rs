//! Turn order within a round.
//!
//! Stacks act in descending initiative rank. The order is computed once at
//! the start of each round and stays fixed until the round ends, even if a
//! stack cloaks or loses its teleporter mid-round. Ties keep the order of the
//! previous round; stacks new to the battle (amoeba splits) go after their
//! equals.

use tracing::debug;

use crate::arena::Arena;
use crate::config::CombatConfig;
use crate::entity::{Stack, StackFlags, StackId};

/// Initiative rank: base initiative plus the cloak bonus, or failing that the
/// teleport bonus. The bonuses do not stack.
#[must_use]
pub fn initiative_rank(stack: &Stack, config: &CombatConfig) -> i32 {
    let bonus = if stack.is_cloaked() {
        config.cloak_initiative_bonus
    } else if stack.flags.contains(StackFlags::TELEPORTER) {
        config.teleport_initiative_bonus
    } else {
        0
    };
    stack.initiative + bonus
}

/// Per-round turn queue.
#[derive(Debug, Clone, Default)]
pub struct TurnScheduler {
    order: Vec<StackId>,
    cursor: usize,
}

impl TurnScheduler {
    /// Empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the order for a new round and rewinds the queue.
    ///
    /// Missiles never take turns of their own and are left out.
    pub fn start_round(&mut self, arena: &Arena, config: &CombatConfig) {
        let mut next: Vec<StackId> = self
            .order
            .iter()
            .copied()
            .filter(|id| arena.get(*id).is_some_and(Stack::is_combatant))
            .collect();
        for stack in arena.stacks() {
            if stack.is_combatant() && !next.contains(&stack.id) {
                next.push(stack.id);
            }
        }
        // stable sort keeps the previous order among equal ranks
        next.sort_by_key(|id| {
            std::cmp::Reverse(arena.get(*id).map_or(i32::MIN, |s| initiative_rank(s, config)))
        });
        debug!(order = ?next, "initiative order");
        self.order = next;
        self.cursor = 0;
    }

    /// Next stack still on the grid, advancing past any that have left.
    pub fn next_stack(&mut self, arena: &Arena) -> Option<StackId> {
        while let Some(id) = self.order.get(self.cursor).copied() {
            self.cursor += 1;
            if arena.contains(id) {
                return Some(id);
            }
        }
        None
    }

    /// Every stack in the current order has had its turn.
    #[must_use]
    pub fn round_complete(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Order for the current round.
    #[must_use]
    pub fn order(&self) -> &[StackId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::GridPos;
    use crate::tests::helpers::ship_stack;

    fn ranked(arena: &mut Arena, initiative: i32, flags: StackFlags) -> StackId {
        let mut s = ship_stack(1, GridPos::new(arena.stack_count() as i32, 0));
        s.initiative = initiative;
        s.flags = flags;
        arena.spawn(s)
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn cloak_dominates_teleport() {
            let config = CombatConfig::default();
            let mut s = ship_stack(1, GridPos::new(0, 0));
            s.initiative = 5;
            assert_eq!(initiative_rank(&s, &config), 5);
            s.flags.insert(StackFlags::TELEPORTER);
            assert_eq!(initiative_rank(&s, &config), 105);
            s.flags.insert(StackFlags::CLOAKED);
            assert_eq!(initiative_rank(&s, &config), 205);
        }
    }

    mod order_tests {
        use super::*;

        #[test]
        fn cloaked_goes_first_among_equals() {
            let config = CombatConfig::default();
            let mut arena = Arena::new(10, 8);
            let plain = ranked(&mut arena, 10, StackFlags::empty());
            let cloaked = ranked(&mut arena, 10, StackFlags::CLOAKED);
            let porter = ranked(&mut arena, 10, StackFlags::TELEPORTER);
            let mut sched = TurnScheduler::new();
            sched.start_round(&arena, &config);
            assert_eq!(sched.order(), &[cloaked, porter, plain]);
        }

        #[test]
        fn ties_keep_previous_order() {
            let config = CombatConfig::default();
            let mut arena = Arena::new(10, 8);
            let a = ranked(&mut arena, 3, StackFlags::empty());
            let b = ranked(&mut arena, 3, StackFlags::CLOAKED);
            let mut sched = TurnScheduler::new();
            sched.start_round(&arena, &config);
            assert_eq!(sched.order(), &[b, a]);
            // b loses its cloak: equal ranks now, prior order holds
            if let Some(s) = arena.get_mut(b) {
                s.flags.remove(StackFlags::CLOAKED);
            }
            sched.start_round(&arena, &config);
            assert_eq!(sched.order(), &[b, a]);
        }

        #[test]
        fn order_is_fixed_within_a_round() {
            let config = CombatConfig::default();
            let mut arena = Arena::new(10, 8);
            let a = ranked(&mut arena, 5, StackFlags::empty());
            let b = ranked(&mut arena, 1, StackFlags::empty());
            let mut sched = TurnScheduler::new();
            sched.start_round(&arena, &config);
            assert_eq!(sched.next_stack(&arena), Some(a));
            if let Some(s) = arena.get_mut(b) {
                s.initiative = 50;
            }
            assert_eq!(sched.next_stack(&arena), Some(b));
            assert!(sched.round_complete());
            assert_eq!(sched.next_stack(&arena), None);
        }

        #[test]
        fn departed_stacks_are_skipped() {
            let config = CombatConfig::default();
            let mut arena = Arena::new(10, 8);
            let a = ranked(&mut arena, 5, StackFlags::empty());
            let b = ranked(&mut arena, 1, StackFlags::empty());
            let mut sched = TurnScheduler::new();
            sched.start_round(&arena, &config);
            arena.despawn(a);
            assert_eq!(sched.next_stack(&arena), Some(b));
            sched.start_round(&arena, &config);
            assert_eq!(sched.order(), &[b]);
        }
    }
}
