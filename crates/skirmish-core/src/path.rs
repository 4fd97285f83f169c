//! Grid pathfinding.
//!
//! [`find_path`] searches for the shortest route between two cells, breaking
//! ties in favour of straight runs: every route is ranked by its sort value
//! `length + turns / 100`, and neighbours are expanded in a fixed priority
//! order that depends on the general direction of the goal. Paths never pass
//! through asteroids or other stacks; only the goal cell may be occupied, so
//! callers decide whether that is acceptable.
//!
//! [`nearest_free_cell`] is the monster pursuit helper: it picks the cell
//! closest to a point with a bounded number of random tie-breaking attempts,
//! then falls back to a deterministic scan.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arena::{Arena, GridPos};
use crate::entity::{Movable, Stack};

/// Unit steps in direction order: E, NE, N, NW, W, SW, S, SE (`y` grows down).
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Offsets from the approach direction, straightest first.
const PREFERENCE: [usize; 8] = [0, 1, 7, 2, 6, 3, 5, 4];

const fn build_priorities() -> [[usize; 8]; 8] {
    let mut tables = [[0; 8]; 8];
    let mut dir = 0;
    while dir < 8 {
        let mut i = 0;
        while i < 8 {
            tables[dir][i] = (dir + PREFERENCE[i]) % 8;
            i += 1;
        }
        dir += 1;
    }
    tables
}

/// Neighbour expansion order for each approach direction.
const PRIORITIES: [[usize; 8]; 8] = build_priorities();

/// Direction index pointing from `from` towards `to`.
fn approach_direction(from: GridPos, to: GridPos) -> usize {
    let step = ((to.x - from.x).signum(), (to.y - from.y).signum());
    DIRECTIONS.iter().position(|d| *d == step).unwrap_or(0)
}

/// A route across the grid, excluding the starting cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightPath {
    cells: Vec<GridPos>,
    turns: u32,
}

impl FlightPath {
    /// Cells visited in order; the last is the destination.
    #[must_use]
    pub fn cells(&self) -> &[GridPos] {
        &self.cells
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// No movement required.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Direction changes along the route.
    #[must_use]
    pub const fn turns(&self) -> u32 {
        self.turns
    }

    /// Ranking value: `length + turns / 100`. Lower is better.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sort_value(&self) -> f32 {
        self.cells.len() as f32 + self.turns as f32 / 100.0
    }

    /// Final cell.
    #[must_use]
    pub fn destination(&self) -> Option<GridPos> {
        self.cells.last().copied()
    }

    /// The first `steps` cells of the route.
    #[must_use]
    pub fn truncated(&self, steps: usize) -> Self {
        let cells: Vec<GridPos> = self.cells.iter().take(steps).copied().collect();
        let turns = count_turns(&cells);
        Self { cells, turns }
    }

    /// The portion of the route a stack can fly this turn. A teleporting
    /// stack jumps straight to the destination instead.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_stack(&self, stack: &Stack) -> Self {
        if stack.can_teleport() {
            return match self.destination() {
                Some(dest) => Self {
                    cells: vec![dest],
                    turns: 0,
                },
                None => Self::default(),
            };
        }
        self.truncated(stack.move_points.max(0.0).floor() as usize)
    }
}

fn count_turns(cells: &[GridPos]) -> u32 {
    let steps: Vec<(i32, i32)> = cells
        .windows(2)
        .map(|w| (w[1].x - w[0].x, w[1].y - w[0].y))
        .collect();
    let changes = steps.windows(2).filter(|w| w[0] != w[1]).count();
    u32::try_from(changes).unwrap_or(u32::MAX)
}

/// Shortest, straightest route for `mover` from its cell to `to`.
///
/// Intermediate cells must be valid and unoccupied; the goal only has to be
/// valid. Returns `None` when the goal is unreachable, and an empty path when
/// the mover is already there.
#[must_use]
pub fn find_path(arena: &Arena, mover: &Stack, to: GridPos) -> Option<FlightPath> {
    let from = mover.pos;
    if from == to {
        return Some(FlightPath::default());
    }
    if !arena.is_valid(to) {
        return None;
    }

    let width = usize::try_from(arena.width()).ok()?;
    let height = usize::try_from(arena.height()).ok()?;
    // Direction slot 8 means "no step taken yet".
    let states = width * height * 9;
    let index = |pos: GridPos, dir: usize| -> Option<usize> {
        let x = usize::try_from(pos.x).ok()?;
        let y = usize::try_from(pos.y).ok()?;
        Some((y * width + x) * 9 + dir)
    };

    let mut best = vec![u32::MAX; states];
    let mut parent: Vec<Option<(GridPos, usize)>> = vec![None; states];
    let mut heap = BinaryHeap::new();
    let mut seq = 0_u64;

    let start = index(from, 8)?;
    best[start] = 0;
    heap.push(Reverse((0_u32, seq, from, 8_usize)));

    while let Some(Reverse((cost, _, pos, dir))) = heap.pop() {
        let here = index(pos, dir)?;
        if cost > best[here] {
            continue;
        }
        if pos == to {
            return Some(reconstruct(&parent, index, pos, dir));
        }
        for &next_dir in &PRIORITIES[approach_direction(pos, to)] {
            let (dx, dy) = DIRECTIONS[next_dir];
            let next = pos.offset(dx, dy);
            let passable = if next == to {
                arena.is_valid(next)
            } else {
                arena.is_free(next, Some(mover.id))
            };
            if !passable {
                continue;
            }
            let turn = u32::from(dir != 8 && dir != next_dir);
            let next_cost = cost + 100 + turn;
            let Some(slot) = index(next, next_dir) else {
                continue;
            };
            if next_cost < best[slot] {
                best[slot] = next_cost;
                parent[slot] = Some((pos, dir));
                seq += 1;
                heap.push(Reverse((next_cost, seq, next, next_dir)));
            }
        }
    }
    None
}

fn reconstruct(
    parent: &[Option<(GridPos, usize)>],
    index: impl Fn(GridPos, usize) -> Option<usize>,
    goal: GridPos,
    dir: usize,
) -> FlightPath {
    let mut cells = vec![goal];
    let mut cursor = index(goal, dir).and_then(|i| parent[i]);
    while let Some((pos, d)) = cursor {
        if d == 8 {
            break;
        }
        cells.push(pos);
        cursor = index(pos, d).and_then(|i| parent[i]);
    }
    cells.reverse();
    let turns = count_turns(&cells);
    FlightPath { cells, turns }
}

/// Whether `stack` may move to `to` this turn.
///
/// Off-grid, asteroid and occupied cells are refused. A stack able to
/// teleport may go anywhere else; otherwise the Chebyshev distance must fit
/// in the remaining movement.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn is_valid_move(arena: &Arena, stack: &Stack, to: GridPos) -> bool {
    if !arena.is_valid(to) || arena.is_occupied(to, Some(stack.id)) {
        return false;
    }
    if stack.can_teleport() {
        return true;
    }
    stack.move_cost(to) as f32 <= stack.move_points
}

fn reachable(arena: &Arena, mover: &Stack, cell: GridPos) -> bool {
    cell == mover.pos || mover.can_teleport() || find_path(arena, mover, cell).is_some()
}

/// Closest cell to `point` that `mover` can reach.
///
/// Candidates are valid cells that are free, or held by a stack `can_take`
/// accepts (prey the mover may consume). Up to `attempts` random picks are
/// made among the candidates at minimum distance, discarding unreachable
/// ones; after that the first reachable candidate in distance-then-scan
/// order wins. Returns `None` only if no candidate is reachable at all.
pub fn nearest_free_cell<R, F>(
    arena: &Arena,
    mover: &Stack,
    point: GridPos,
    attempts: u32,
    rng: &mut R,
    can_take: F,
) -> Option<GridPos>
where
    R: Rng + ?Sized,
    F: Fn(&Stack) -> bool,
{
    let mut candidates: Vec<(i32, GridPos)> = arena
        .cells()
        .filter(|cell| arena.is_valid(*cell))
        .filter(|cell| match arena.stack_at(*cell) {
            None => true,
            Some(id) if id == mover.id => true,
            Some(id) => arena.get(id).is_some_and(&can_take),
        })
        .map(|cell| (cell.chebyshev(point), cell))
        .collect();
    // stable: keeps scan order within a distance
    candidates.sort_by_key(|(dist, _)| *dist);

    for _ in 0..attempts {
        let Some(&(nearest, _)) = candidates.first() else {
            break;
        };
        let tier = candidates.iter().take_while(|(d, _)| *d == nearest).count();
        let pick = rng.gen_range(0..tier);
        let cell = candidates[pick].1;
        if reachable(arena, mover, cell) {
            return Some(cell);
        }
        candidates.remove(pick);
    }

    let fallback = candidates
        .iter()
        .map(|(_, cell)| *cell)
        .find(|cell| reachable(arena, mover, *cell));
    if fallback.is_some() && attempts > 0 {
        warn!(stack = %mover.id, "nearest-cell search fell back to scan order");
    }
    fallback
}
