//! Battle grid and stack storage.
//!
//! The [`Arena`] is the container for every stack taking part in a battle. It
//! provides:
//! - A fixed-size grid of cells with asteroid obstacles
//! - Stack storage with deterministic iteration order (`BTreeMap`)
//! - Stack lifecycle management (spawn/despawn)
//! - Occupancy and position-validity queries
//!
//! # Coordinates
//!
//! Cells are addressed by [`GridPos`]. `(0, 0)` is the top-left corner, `x`
//! grows to the right and `y` grows downwards. Movement cost between two cells
//! is their Chebyshev distance: diagonal steps cost the same as straight ones.
//!
//! # Missiles
//!
//! Missile salvos live in the arena like any other stack but do not occupy
//! their cell: they fly over stacks and asteroids alike and never block
//! movement or deployment.
//!
//! # Example
//!
//! ```
//! use skirmish_core::arena::{Arena, GridPos};
//!
//! let mut arena = Arena::new(10, 8);
//! arena.set_asteroid(GridPos::new(4, 3), true);
//!
//! assert!(arena.is_valid(GridPos::new(0, 0)));
//! assert!(!arena.is_valid(GridPos::new(4, 3)));
//! assert!(!arena.is_valid(GridPos::new(10, 0)));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::CombatConfig;
use crate::entity::{Stack, StackId};

// =============================================================================
// Grid positions
// =============================================================================

/// Integer cell coordinate on the battle grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Creates a grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: the number of single-cell moves between two cells.
    ///
    /// ```
    /// use skirmish_core::arena::GridPos;
    ///
    /// assert_eq!(GridPos::new(0, 0).chebyshev(GridPos::new(3, 2)), 3);
    /// assert_eq!(GridPos::new(5, 5).chebyshev(GridPos::new(4, 4)), 1);
    /// ```
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Centre of the cell in continuous grid units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Cell containing a continuous position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_vec2(v: Vec2) -> Self {
        Self::new(v.x.round() as i32, v.y.round() as i32)
    }

    /// Returns the cell offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Battle grid plus every stack currently on it.
///
/// Stacks are stored in a `BTreeMap` keyed by monotonically assigned
/// [`StackId`]s, so iteration order is the spawn order on every platform.
/// Stacks that leave the battle (destroyed or retreated) are despawned; the
/// resolver keeps them elsewhere for outcome bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    width: i32,
    height: i32,
    /// Row-major asteroid map, `y * width + x`.
    asteroids: Vec<bool>,
    stacks: BTreeMap<StackId, Stack>,
    next_id: u64,
}

impl Arena {
    /// Creates an empty arena of the given size with no asteroids.
    ///
    /// Each edge is clamped to `0..=CombatConfig::MAX_GRID_EDGE`.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.clamp(0, CombatConfig::MAX_GRID_EDGE);
        let height = height.clamp(0, CombatConfig::MAX_GRID_EDGE);
        let cells = (width * height).unsigned_abs() as usize;
        Self {
            width,
            height,
            asteroids: vec![false; cells],
            stacks: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Creates an empty arena sized from the configuration.
    #[must_use]
    pub fn from_config(config: &CombatConfig) -> Self {
        Self::new(config.grid_width, config.grid_height)
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Returns `true` if the cell lies on the grid.
    #[must_use]
    pub const fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if self.in_bounds(pos) {
            usize::try_from(pos.y * self.width + pos.x).ok()
        } else {
            None
        }
    }

    /// Returns `true` if the cell holds an asteroid.
    #[must_use]
    pub fn is_asteroid(&self, pos: GridPos) -> bool {
        self.index(pos)
            .and_then(|i| self.asteroids.get(i).copied())
            .unwrap_or(false)
    }

    /// Places or clears an asteroid. Out-of-bounds cells are ignored.
    pub fn set_asteroid(&mut self, pos: GridPos, present: bool) {
        if let Some(cell) = self.index(pos).and_then(|i| self.asteroids.get_mut(i)) {
            *cell = present;
        }
    }

    /// In bounds and not an asteroid.
    #[must_use]
    pub fn is_valid(&self, pos: GridPos) -> bool {
        self.in_bounds(pos) && !self.is_asteroid(pos)
    }

    /// All cells in scan order: column by column, top to bottom.
    pub fn cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| GridPos::new(x, y)))
    }

    /// Cells currently holding an asteroid, in scan order.
    pub fn asteroid_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.cells().filter(move |pos| self.is_asteroid(*pos))
    }

    /// Removes each asteroid independently with probability `chance`.
    ///
    /// Returns the eroded cells in scan order.
    pub fn erode_asteroids<R: Rng + ?Sized>(&mut self, chance: f64, rng: &mut R) -> Vec<GridPos> {
        let candidates: Vec<GridPos> = self.asteroid_cells().collect();
        let mut eroded = Vec::new();
        for pos in candidates {
            if rng.gen_bool(chance.clamp(0.0, 1.0)) {
                self.set_asteroid(pos, false);
                eroded.push(pos);
            }
        }
        eroded
    }

    // -------------------------------------------------------------------------
    // Stack storage
    // -------------------------------------------------------------------------

    /// Adds a stack to the arena, assigning it a fresh id.
    ///
    /// Whatever id the stack carried before is overwritten.
    pub fn spawn(&mut self, mut stack: Stack) -> StackId {
        let id = StackId::new(self.next_id);
        self.next_id += 1;
        stack.id = id;
        self.stacks.insert(id, stack);
        id
    }

    /// Removes a stack from the arena.
    pub fn despawn(&mut self, id: StackId) -> Option<Stack> {
        self.stacks.remove(&id)
    }

    /// Returns a stack by id.
    #[must_use]
    pub fn get(&self, id: StackId) -> Option<&Stack> {
        self.stacks.get(&id)
    }

    /// Returns a mutable stack by id.
    #[must_use]
    pub fn get_mut(&mut self, id: StackId) -> Option<&mut Stack> {
        self.stacks.get_mut(&id)
    }

    /// Returns `true` if the id names a stack on the grid.
    #[must_use]
    pub fn contains(&self, id: StackId) -> bool {
        self.stacks.contains_key(&id)
    }

    /// Stack ids in deterministic (spawn) order.
    pub fn stack_ids(&self) -> impl Iterator<Item = StackId> + '_ {
        self.stacks.keys().copied()
    }

    /// Stacks in deterministic (spawn) order.
    pub fn stacks(&self) -> impl Iterator<Item = &Stack> + '_ {
        self.stacks.values()
    }

    /// Mutable stacks in deterministic order.
    pub fn stacks_mut(&mut self) -> impl Iterator<Item = &mut Stack> + '_ {
        self.stacks.values_mut()
    }

    /// Number of stacks on the grid, missiles included.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Returns `true` if no stacks remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// The stack physically holding a cell. Missiles never hold cells.
    #[must_use]
    pub fn stack_at(&self, pos: GridPos) -> Option<StackId> {
        self.stacks
            .values()
            .find(|s| !s.is_missile() && s.pos == pos)
            .map(|s| s.id)
    }

    /// Returns `true` if a stack other than `ignoring` holds the cell.
    #[must_use]
    pub fn is_occupied(&self, pos: GridPos, ignoring: Option<StackId>) -> bool {
        self.stacks
            .values()
            .any(|s| !s.is_missile() && s.pos == pos && Some(s.id) != ignoring)
    }

    /// Valid and not held by any stack other than `ignoring`.
    #[must_use]
    pub fn is_free(&self, pos: GridPos, ignoring: Option<StackId>) -> bool {
        self.is_valid(pos) && !self.is_occupied(pos, ignoring)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::ship_stack;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    mod grid_pos_tests {
        use super::*;

        #[test]
        fn chebyshev_counts_diagonals_as_one() {
            assert_eq!(GridPos::new(0, 0).chebyshev(GridPos::new(2, 2)), 2);
            assert_eq!(GridPos::new(0, 0).chebyshev(GridPos::new(0, 0)), 0);
            assert_eq!(GridPos::new(9, 0).chebyshev(GridPos::new(0, 7)), 9);
        }

        #[test]
        fn vec2_round_trip_is_lossless_for_cells() {
            let pos = GridPos::new(7, 3);
            assert_eq!(GridPos::from_vec2(pos.to_vec2()), pos);
        }

        #[test]
        fn from_vec2_rounds_to_nearest_cell() {
            assert_eq!(GridPos::from_vec2(Vec2::new(2.4, 5.6)), GridPos::new(2, 6));
        }

        #[test]
        fn displays_as_tuple() {
            assert_eq!(GridPos::new(-1, 4).to_string(), "(-1, 4)");
        }
    }

    mod grid_tests {
        use super::*;

        #[test]
        fn new_arena_is_clear() {
            let arena = Arena::new(10, 8);
            assert_eq!(arena.cells().count(), 80);
            assert_eq!(arena.asteroid_cells().count(), 0);
            assert!(arena.is_empty());
        }

        #[test]
        fn oversized_arena_is_clamped() {
            let mut arena = Arena::new(65_536, 65_536);
            let edge = CombatConfig::MAX_GRID_EDGE;
            assert_eq!(arena.width(), edge);
            assert_eq!(arena.height(), edge);
            let corner = GridPos::new(edge - 1, edge - 1);
            arena.set_asteroid(corner, true);
            assert!(arena.is_asteroid(corner));
            assert!(!arena.in_bounds(GridPos::new(edge, 0)));
        }

        #[test]
        fn bounds_are_exclusive_at_far_edge() {
            let arena = Arena::new(10, 8);
            assert!(arena.in_bounds(GridPos::new(9, 7)));
            assert!(!arena.in_bounds(GridPos::new(10, 7)));
            assert!(!arena.in_bounds(GridPos::new(9, 8)));
            assert!(!arena.in_bounds(GridPos::new(-1, 0)));
        }

        #[test]
        fn asteroid_invalidates_cell() {
            let mut arena = Arena::new(10, 8);
            let rock = GridPos::new(5, 5);
            arena.set_asteroid(rock, true);
            assert!(arena.is_asteroid(rock));
            assert!(!arena.is_valid(rock));
            arena.set_asteroid(rock, false);
            assert!(arena.is_valid(rock));
        }

        #[test]
        fn out_of_bounds_asteroid_is_ignored() {
            let mut arena = Arena::new(4, 4);
            arena.set_asteroid(GridPos::new(7, 7), true);
            assert_eq!(arena.asteroid_cells().count(), 0);
        }

        #[test]
        fn scan_order_is_column_major() {
            let arena = Arena::new(4, 4);
            let first: Vec<_> = arena.cells().take(5).collect();
            assert_eq!(first[0], GridPos::new(0, 0));
            assert_eq!(first[3], GridPos::new(0, 3));
            assert_eq!(first[4], GridPos::new(1, 0));
        }

        #[test]
        fn full_erosion_clears_every_asteroid() {
            let mut arena = Arena::new(10, 8);
            arena.set_asteroid(GridPos::new(3, 3), true);
            arena.set_asteroid(GridPos::new(6, 1), true);
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let eroded = arena.erode_asteroids(1.0, &mut rng);
            assert_eq!(eroded, vec![GridPos::new(3, 3), GridPos::new(6, 1)]);
            assert_eq!(arena.asteroid_cells().count(), 0);
        }

        #[test]
        fn zero_erosion_keeps_asteroids() {
            let mut arena = Arena::new(10, 8);
            arena.set_asteroid(GridPos::new(3, 3), true);
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            assert!(arena.erode_asteroids(0.0, &mut rng).is_empty());
            assert!(arena.is_asteroid(GridPos::new(3, 3)));
        }
    }

    mod storage_tests {
        use super::*;

        #[test]
        fn spawn_assigns_monotonic_ids() {
            let mut arena = Arena::new(10, 8);
            let a = arena.spawn(ship_stack(1, GridPos::new(0, 0)));
            let b = arena.spawn(ship_stack(2, GridPos::new(9, 0)));
            assert!(a < b);
            assert_eq!(arena.get(a).map(|s| s.id), Some(a));
            let ids: Vec<_> = arena.stack_ids().collect();
            assert_eq!(ids, vec![a, b]);
        }

        #[test]
        fn despawn_frees_cell() {
            let mut arena = Arena::new(10, 8);
            let pos = GridPos::new(2, 2);
            let id = arena.spawn(ship_stack(1, pos));
            assert!(arena.is_occupied(pos, None));
            assert!(!arena.is_occupied(pos, Some(id)));
            assert!(arena.despawn(id).is_some());
            assert!(arena.is_free(pos, None));
            assert!(arena.despawn(id).is_none());
        }

        #[test]
        fn stack_at_finds_holder() {
            let mut arena = Arena::new(10, 8);
            let pos = GridPos::new(4, 4);
            let id = arena.spawn(ship_stack(1, pos));
            assert_eq!(arena.stack_at(pos), Some(id));
            assert_eq!(arena.stack_at(GridPos::new(0, 0)), None);
        }
    }
}
