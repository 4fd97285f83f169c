//! Combat stacks: the polymorphic units of a battle.
//!
//! This module provides the core entity types for the battle resolver:
//! - [`StackId`]: Unique identifier for stacks
//! - [`StackKind`]: Variant tag (ship, colony, missile, three monsters)
//! - [`StackInner`]: Variant payload
//! - [`Stack`]: Shared fields plus the payload
//!
//! # Architecture
//!
//! Every variant shares the same hit-point, shield, movement and weapon
//! fields. Behaviour that differs per variant is expressed as match arms
//! behind three small capability traits:
//! - [`Targetable`]: shields, destruction and who may shoot at it
//! - [`WeaponBearer`]: weapon slots and readiness
//! - [`Movable`]: movement budget and teleporting
//!
//! # Example
//!
//! ```
//! use skirmish_core::arena::GridPos;
//! use skirmish_core::entity::{ShipState, Stack, StackInner, StackKind, Targetable};
//! use skirmish_core::faction::FactionId;
//!
//! let mut stack = Stack::new(
//!     "Scout",
//!     Some(FactionId::new(1)),
//!     3,
//!     5.0,
//!     StackInner::Ship(ShipState { fleet: 1, design: 1, retreat_to: None, starting_num: 3 }),
//! );
//! stack.pos = GridPos::new(0, 3);
//!
//! assert_eq!(stack.kind(), StackKind::Ship);
//! assert!(!stack.destroyed());
//! ```

pub mod components;
mod damage;
pub mod missile;
pub mod monster;
pub mod weapons;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arena::GridPos;
use crate::error::ActionError;
use crate::faction::{Diplomacy, FactionId};

pub use components::{AmoebaState, ColonyState, Controller, ShipState, StackFlags};
pub use damage::Damage;
pub use missile::{MissileState, Pursuit};
pub use monster::{MonsterKind, MonsterTemplate};
pub use weapons::{SpecialEffect, WeaponKind, WeaponSlot, WeaponSpec};

/// Unique identifier for a stack.
///
/// Ids are assigned by the [`Arena`](crate::arena::Arena) in spawn order and
/// never reused within a battle, so ordering by id is a stable iteration
/// order.
///
/// ```
/// use skirmish_core::entity::StackId;
///
/// let a = StackId::new(1);
/// let b = StackId::new(2);
/// assert!(a < b);
/// assert_eq!(a.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StackId(u64);

impl StackId {
    /// Creates a stack id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StackId({})", self.0)
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variant tag of a stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    /// Squadron of identical ships.
    Ship,
    /// Planetary missile bases.
    Colony,
    /// In-flight missile salvo.
    Missile,
    /// Guardian monster.
    Guardian,
    /// Amoeba monster.
    Amoeba,
    /// Crystal monster.
    Crystal,
}

impl StackKind {
    /// Guardian, amoeba or crystal.
    #[must_use]
    pub const fn is_monster(self) -> bool {
        matches!(self, Self::Guardian | Self::Amoeba | Self::Crystal)
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ship => write!(f, "Ship"),
            Self::Colony => write!(f, "Colony"),
            Self::Missile => write!(f, "Missile"),
            Self::Guardian => write!(f, "Guardian"),
            Self::Amoeba => write!(f, "Amoeba"),
            Self::Crystal => write!(f, "Crystal"),
        }
    }
}

/// Variant payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StackInner {
    /// Ship squadron.
    Ship(ShipState),
    /// Planetary defenses.
    Colony(ColonyState),
    /// Missile salvo.
    Missile(MissileState),
    /// Guardian monster.
    Guardian,
    /// Amoeba monster.
    Amoeba(AmoebaState),
    /// Crystal monster.
    Crystal,
}

impl StackInner {
    /// Tag for this payload.
    #[must_use]
    pub const fn kind(&self) -> StackKind {
        match self {
            Self::Ship(_) => StackKind::Ship,
            Self::Colony(_) => StackKind::Colony,
            Self::Missile(_) => StackKind::Missile,
            Self::Guardian => StackKind::Guardian,
            Self::Amoeba(_) => StackKind::Amoeba,
            Self::Crystal => StackKind::Crystal,
        }
    }
}

/// A group of identical units acting as one combat entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    /// Id, assigned on spawn.
    pub id: StackId,
    /// Design or monster name.
    pub name: String,
    /// Owning faction; `None` for monsters.
    pub faction: Option<FactionId>,
    /// Who chooses this stack's actions.
    pub controller: Controller,
    /// Units remaining.
    pub num: u32,
    /// Hit points of the lead unit.
    pub hits: f32,
    /// Hit points of a fresh unit.
    pub max_hits: f32,
    /// `max_hits` at the start of the battle; regeneration cap.
    pub starting_max_hits: f32,
    /// Current shield level.
    pub shield: f32,
    /// Shield level of a fresh unit.
    pub max_shield: f32,
    /// Movement left this turn.
    pub move_points: f32,
    /// Movement per turn.
    pub max_move: f32,
    /// Cell.
    pub pos: GridPos,
    /// Status flags.
    pub flags: StackFlags,
    /// Current target.
    pub target: Option<StackId>,
    /// Stack this one escorts.
    pub ward: Option<StackId>,
    /// Weapon slots in firing order.
    pub weapons: Vec<WeaponSlot>,
    /// Slot the weapon rotation currently points at.
    pub weapon_index: usize,
    /// Base initiative.
    pub initiative: i32,
    /// Attack level, faction bonus included.
    pub attack_level: i32,
    /// Defense against direct fire, faction bonus included.
    pub beam_defense: i32,
    /// Defense against missiles, faction bonus included.
    pub missile_defense: i32,
    /// Fraction of `starting_max_hits` regenerated per turn.
    pub repair_pct: f32,
    /// Resistance to black-hole attrition.
    pub black_hole_defense: f32,
    /// Extra reach for beam weapons.
    pub beam_range_bonus: i32,
    /// Variant payload.
    pub inner: StackInner,
}

impl Stack {
    /// Creates a stack with no weapons, shields or movement.
    ///
    /// The id is a placeholder until the stack is spawned into an arena.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        faction: Option<FactionId>,
        num: u32,
        hits: f32,
        inner: StackInner,
    ) -> Self {
        Self {
            id: StackId::new(u64::MAX),
            name: name.into(),
            faction,
            controller: Controller::Ai,
            num,
            hits,
            max_hits: hits,
            starting_max_hits: hits,
            shield: 0.0,
            max_shield: 0.0,
            move_points: 0.0,
            max_move: 0.0,
            pos: GridPos::new(0, 0),
            flags: StackFlags::empty(),
            target: None,
            ward: None,
            weapons: Vec::new(),
            weapon_index: 0,
            initiative: 0,
            attack_level: 0,
            beam_defense: 0,
            missile_defense: 0,
            repair_pct: 0.0,
            black_hole_defense: 0.0,
            beam_range_bonus: 0,
            inner,
        }
    }

    /// Builds a monster stack from its stat block.
    #[must_use]
    pub fn monster(template: &MonsterTemplate) -> Self {
        let inner = match template.kind {
            MonsterKind::Guardian => StackInner::Guardian,
            MonsterKind::Amoeba => StackInner::Amoeba(template.amoeba.clone().unwrap_or(
                AmoebaState {
                    damage_since_split: 0.0,
                    split_threshold: f32::INFINITY,
                    min_split_hits: f32::INFINITY,
                    splits: 0,
                },
            )),
            MonsterKind::Crystal => StackInner::Crystal,
        };
        let mut stack = Self::new(template.kind.name(), None, 1, template.hits, inner);
        stack.shield = template.shield;
        stack.max_shield = template.shield;
        stack.max_move = template.max_move;
        stack.move_points = template.max_move;
        stack.initiative = template.initiative;
        stack.attack_level = template.attack_level;
        stack.beam_defense = template.beam_defense;
        stack.missile_defense = template.missile_defense;
        stack.repair_pct = template.repair_pct;
        stack.black_hole_defense = template.black_hole_defense;
        stack.weapons = template.weapons.clone();
        stack
    }

    /// Variant tag.
    #[must_use]
    pub const fn kind(&self) -> StackKind {
        self.inner.kind()
    }

    /// Ship squadron.
    #[must_use]
    pub const fn is_ship(&self) -> bool {
        matches!(self.inner, StackInner::Ship(_))
    }

    /// Planetary defenses.
    #[must_use]
    pub const fn is_colony(&self) -> bool {
        matches!(self.inner, StackInner::Colony(_))
    }

    /// Missile salvo.
    #[must_use]
    pub const fn is_missile(&self) -> bool {
        matches!(self.inner, StackInner::Missile(_))
    }

    /// Guardian, amoeba or crystal.
    #[must_use]
    pub const fn is_monster(&self) -> bool {
        self.kind().is_monster()
    }

    /// Ship payload.
    #[must_use]
    pub const fn as_ship(&self) -> Option<&ShipState> {
        match &self.inner {
            StackInner::Ship(state) => Some(state),
            _ => None,
        }
    }

    /// Colony payload.
    #[must_use]
    pub const fn as_colony(&self) -> Option<&ColonyState> {
        match &self.inner {
            StackInner::Colony(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable colony payload.
    pub fn as_colony_mut(&mut self) -> Option<&mut ColonyState> {
        match &mut self.inner {
            StackInner::Colony(state) => Some(state),
            _ => None,
        }
    }

    /// Missile payload.
    #[must_use]
    pub const fn as_missile(&self) -> Option<&MissileState> {
        match &self.inner {
            StackInner::Missile(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable missile payload.
    pub fn as_missile_mut(&mut self) -> Option<&mut MissileState> {
        match &mut self.inner {
            StackInner::Missile(state) => Some(state),
            _ => None,
        }
    }

    /// Mutable amoeba payload.
    pub fn as_amoeba_mut(&mut self) -> Option<&mut AmoebaState> {
        match &mut self.inner {
            StackInner::Amoeba(state) => Some(state),
            _ => None,
        }
    }

    /// Cloaked and therefore untargetable.
    #[must_use]
    pub fn is_cloaked(&self) -> bool {
        self.flags.contains(StackFlags::CLOAKED)
    }

    /// Frozen for its next turn.
    #[must_use]
    pub fn in_stasis(&self) -> bool {
        self.flags.contains(StackFlags::IN_STASIS)
    }

    /// Under player command.
    #[must_use]
    pub fn is_player(&self) -> bool {
        self.controller == Controller::Player
    }

    /// Takes part in termination checks, turn order and victory.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        !self.is_missile()
    }

    // -------------------------------------------------------------------------
    // Hostility and targeting
    // -------------------------------------------------------------------------

    /// Variant hostility rules.
    ///
    /// Missiles are hostile to nobody. Guardians and crystals are hostile to
    /// everyone; amoebas to everyone except other amoebas. Faction stacks
    /// follow the alliance graph, and a faction stack is always hostile to a
    /// monster.
    #[must_use]
    pub fn hostile_to(&self, other: &Self, diplomacy: &Diplomacy) -> bool {
        if self.id == other.id {
            return false;
        }
        match (self.kind(), other.kind()) {
            (StackKind::Missile, _) | (_, StackKind::Missile) => false,
            (StackKind::Guardian | StackKind::Crystal, _)
            | (_, StackKind::Guardian | StackKind::Crystal) => true,
            (StackKind::Amoeba, StackKind::Amoeba) => false,
            (StackKind::Amoeba, _) | (_, StackKind::Amoeba) => true,
            _ => match (self.faction, other.faction) {
                (Some(a), Some(b)) => diplomacy.hostile(a, b),
                _ => true,
            },
        }
    }

    /// Whether a weapon class can ever engage this kind of stack, ignoring
    /// range, cooldowns and temporary states.
    #[must_use]
    pub fn engageable_by(&self, weapon: &WeaponSpec) -> bool {
        match (&self.inner, weapon.kind) {
            (StackInner::Missile(_), _) => false,
            (StackInner::Colony(_), WeaponKind::Bomb) => true,
            (_, WeaponKind::Bomb) => false,
            (StackInner::Colony(_), _) => self.num > 0,
            _ => true,
        }
    }

    /// Checks whether `slot` can fire at `target` right now.
    ///
    /// # Errors
    ///
    /// Returns the [`ActionError`] describing the first failed precondition.
    pub fn check_slot(
        &self,
        slot: usize,
        target: &Self,
        diplomacy: &Diplomacy,
    ) -> Result<(), ActionError> {
        let weapon = self.weapons.get(slot).ok_or(ActionError::NoSuchSlot {
            stack: self.id,
            slot,
        })?;
        if !self.hostile_to(target, diplomacy) {
            return Err(ActionError::NotHostile {
                attacker: self.id,
                target: target.id,
            });
        }
        if !weapon.is_ready() || self.num == 0 {
            return Err(ActionError::NoUsableWeapon {
                attacker: self.id,
                target: target.id,
            });
        }
        if !target.can_be_targeted_with(&weapon.spec) {
            return Err(ActionError::TargetUnavailable(target.id));
        }
        if self.pos.chebyshev(target.pos) > weapon.spec.reach(self.beam_range_bonus) {
            return Err(ActionError::OutOfRange {
                attacker: self.id,
                target: target.id,
            });
        }
        Ok(())
    }

    /// Some weapon slot can fire at the target right now.
    #[must_use]
    pub fn can_attack(&self, target: &Self, diplomacy: &Diplomacy) -> bool {
        (0..self.weapons.len()).any(|slot| self.check_slot(slot, target, diplomacy).is_ok())
    }

    /// Advances the weapon rotation to the next slot able to fire at the
    /// target, wrapping around. Leaves the rotation unchanged if none can.
    pub fn rotate_to_usable_weapon(&mut self, target: &Self, diplomacy: &Diplomacy) -> Option<usize> {
        let n = self.weapons.len();
        let start = self.weapon_index;
        for step in 0..n {
            let slot = (start + step) % n;
            if self.check_slot(slot, target, diplomacy).is_ok() {
                self.weapon_index = slot;
                return Some(slot);
            }
        }
        None
    }

    /// Usable slot with the highest peak damage against the target.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn select_best_weapon(&self, target: &Self, diplomacy: &Diplomacy) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (slot, weapon) in self.weapons.iter().enumerate() {
            if self.check_slot(slot, target, diplomacy).is_err() {
                continue;
            }
            let score = weapon.spec.peak_damage() * weapon.count as f32
                + if weapon.spec.special.is_some() { 1.0 } else { 0.0 };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((slot, score));
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Could ever fight `target`: hostile, with some loaded weapon whose class
    /// can engage it. Range, cooldowns, cloaking and stasis are ignored.
    #[must_use]
    pub fn could_engage(&self, target: &Self, diplomacy: &Diplomacy) -> bool {
        self.num > 0
            && self.hostile_to(target, diplomacy)
            && self
                .weapons
                .iter()
                .any(|w| w.count > 0 && w.has_ammo() && target.engageable_by(&w.spec))
    }

    /// A feeding amoeba may fly onto an unarmed hostile ship and consume it.
    #[must_use]
    pub fn can_consume(&self, prey: &Self, diplomacy: &Diplomacy) -> bool {
        matches!(self.inner, StackInner::Amoeba(_))
            && prey.is_ship()
            && !prey.is_armed()
            && self.hostile_to(prey, diplomacy)
    }

    /// Defense level used against a weapon class.
    #[must_use]
    pub const fn defense_against(&self, kind: WeaponKind) -> i32 {
        match kind {
            WeaponKind::Missile => self.missile_defense,
            _ => self.beam_defense,
        }
    }

    /// Per-variant damage multiplier for a weapon class.
    ///
    /// Hardened planetary bases halve direct fire; crystals shrug off half of
    /// any missile warhead. Everything else takes full damage.
    #[must_use]
    pub const fn damage_multiplier(&self, kind: WeaponKind) -> f32 {
        match (self.kind(), kind) {
            (StackKind::Colony, WeaponKind::Beam | WeaponKind::Torpedo)
            | (StackKind::Crystal, WeaponKind::Missile) => 0.5,
            _ => 1.0,
        }
    }

    /// Rough fighting value used by captains to compare sides.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn strength(&self) -> f32 {
        let firepower: f32 = self
            .weapons
            .iter()
            .filter(|w| w.has_ammo())
            .map(|w| w.spec.peak_damage() * w.count as f32)
            .sum();
        self.num as f32 * (self.max_hits.max(0.0) + self.shield * 2.0 + firepower)
    }

    // -------------------------------------------------------------------------
    // Turn lifecycle
    // -------------------------------------------------------------------------

    /// Per-stack part of the begin-turn contract: refresh movement, teleport
    /// availability and weapons, then regenerate.
    pub fn begin_turn(&mut self, interdiction: bool) {
        self.move_points = self.max_move;
        self.flags.set(
            StackFlags::CAN_TELEPORT,
            self.flags.contains(StackFlags::TELEPORTER) && !interdiction,
        );
        for slot in &mut self.weapons {
            slot.begin_turn();
        }
        self.regenerate();
    }

    fn regenerate(&mut self) {
        if self.repair_pct <= 0.0 || self.num == 0 {
            return;
        }
        let amount = self.starting_max_hits * self.repair_pct;
        self.max_hits = (self.max_hits + amount).min(self.starting_max_hits);
        self.hits = (self.hits + amount).min(self.max_hits);
    }

    /// Per-stack part of the end-turn contract: cycle weapon cooldowns,
    /// re-cloak if nothing fired and thaw from stasis.
    pub fn end_turn(&mut self) {
        let fired = self.weapons.iter().any(|w| w.fired);
        for slot in &mut self.weapons {
            slot.end_turn();
        }
        if self.flags.contains(StackFlags::CLOAKING_DEVICE) && !fired {
            self.flags.insert(StackFlags::CLOAKED);
        }
        self.flags.remove(StackFlags::IN_STASIS);
    }

    /// Splits an amoeba that has taken enough damage.
    ///
    /// The parent's maximum hit points are halved, and so is the ceiling
    /// regeneration restores them to. The parent counts the split; the
    /// returned sibling is an identical copy at full (halved) health with no
    /// splits of its own. Returns `None` for any other stack or when the
    /// amoeba is too small to split.
    pub fn split_off(&mut self) -> Option<Self> {
        let max_hits = self.max_hits;
        let state = self.as_amoeba_mut()?;
        if !state.wants_split(max_hits) {
            return None;
        }
        state.damage_since_split = 0.0;
        state.splits += 1;
        self.max_hits = max_hits / 2.0;
        self.starting_max_hits = self.max_hits;
        self.hits = self.hits.min(self.max_hits);
        let mut child = self.clone();
        child.hits = child.max_hits;
        child.target = None;
        if let Some(state) = child.as_amoeba_mut() {
            state.splits = 0;
        }
        for slot in &mut child.weapons {
            slot.fired = false;
        }
        Some(child)
    }
}

// =============================================================================
// Capability traits
// =============================================================================

/// Can be shot at.
pub trait Targetable {
    /// Flat damage reduction per hit, before the weapon's shield multiplier.
    fn shield_level(&self) -> f32;

    /// Out of the fight.
    fn destroyed(&self) -> bool;

    /// May currently be engaged by this weapon.
    fn can_be_targeted_with(&self, weapon: &WeaponSpec) -> bool;
}

/// Carries weapons.
pub trait WeaponBearer {
    /// Weapon slots.
    fn weapon_slots(&self) -> &[WeaponSlot];

    /// Has any loaded weapon.
    fn is_armed(&self) -> bool;

    /// Has a slot ready to fire this turn.
    fn has_ready_weapon(&self) -> bool {
        self.weapon_slots().iter().any(WeaponSlot::is_ready)
    }
}

/// Moves on the grid.
pub trait Movable {
    /// Has at least one cell of movement left and is not frozen.
    fn can_move(&self) -> bool;

    /// May jump to any free cell this turn.
    fn can_teleport(&self) -> bool;

    /// Movement points needed to reach a cell.
    fn move_cost(&self, to: GridPos) -> i32;
}

impl WeaponBearer for Stack {
    fn weapon_slots(&self) -> &[WeaponSlot] {
        match self.inner {
            StackInner::Missile(_) => &[],
            _ => &self.weapons,
        }
    }

    fn is_armed(&self) -> bool {
        self.num > 0
            && self
                .weapon_slots()
                .iter()
                .any(|w| w.count > 0 && w.has_ammo())
    }
}

impl Movable for Stack {
    fn can_move(&self) -> bool {
        match self.inner {
            StackInner::Colony(_) | StackInner::Missile(_) | StackInner::Guardian => false,
            _ => !self.in_stasis() && self.move_points >= 1.0,
        }
    }

    fn can_teleport(&self) -> bool {
        self.flags.contains(StackFlags::CAN_TELEPORT) && !self.in_stasis()
    }

    fn move_cost(&self, to: GridPos) -> i32 {
        self.pos.chebyshev(to)
    }
}
