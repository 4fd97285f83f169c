//! The combat resolver: setup, action requests, the turn loop and
//! termination.
//!
//! # Architecture
//!
//! [`CombatResolver`] exclusively owns the arena and every stack on it for the
//! lifetime of a battle. Nothing outside the resolver mutates a stack:
//! captains and player commands only *request* actions through the
//! resolver's own methods, and a refused request leaves the battle untouched.
//!
//! The work is split across submodules:
//! - `setup`: turns a [`Scenario`](crate::scenario::Scenario) into an
//!   [`Engagement`]: roles, deployment, pre-battle retreats
//! - `actions`: move, attack, fire, retreat and everything they trigger
//!   (missile launch and pursuit, destruction, amoeba splits)
//! - `turn`: the round loop, stack turns, termination and finalization
//!
//! # Execution modes
//!
//! [`CombatResolver::step`] advances the battle by one stack turn. In
//! interactive mode it stops before a player-controlled stack acts and
//! returns [`StepResult::AwaitingCommand`]; the caller then issues
//! [`PlayerCommand`]s and ends the turn with
//! [`CombatResolver::end_player_turn`]. [`CombatResolver::run`] auto-resolves,
//! playing player stacks with their default captain, and
//! [`CombatResolver::spawn_auto_resolve`] does the same on a worker thread.
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::CombatConfig;
//! use skirmish_core::entity::WeaponSpec;
//! use skirmish_core::faction::{FactionId, FactionInfo};
//! use skirmish_core::resolver::Engagement;
//! use skirmish_core::scenario::{DesignWeapon, FleetSpec, Scenario, ShipDesign, StarSystem};
//!
//! let (a, b) = (FactionId::new(1), FactionId::new(2));
//! let mut gunship = ShipDesign::new(1, "Gunship", 20.0);
//! gunship.weapons.push(DesignWeapon::new(WeaponSpec::beam("Laser", 2.0, 8.0, 2), 2));
//!
//! let scenario = Scenario::new(42, StarSystem::new(1, "Vega"))
//!     .with_faction(FactionInfo::new(a, "Red"))
//!     .with_faction(FactionInfo::new(b, "Blue"))
//!     .with_design(gunship)
//!     .with_fleet(FleetSpec::new(1, a).with_ships(1, 3))
//!     .with_fleet(FleetSpec::new(2, b).with_ships(1, 3));
//!
//! let engagement = Engagement::prepare(&scenario, &CombatConfig::default()).unwrap();
//! let outcome = engagement.resolve();
//! assert!(outcome.finalized);
//! ```

mod actions;
mod setup;
mod turn;

pub use setup::{auto_resolve, BombardmentReport, Engagement};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::arena::{Arena, GridPos};
use crate::captain::{default_captain, Captain};
use crate::config::CombatConfig;
use crate::entity::{Stack, StackId, WeaponBearer};
use crate::error::ActionError;
use crate::event::{CombatEvent, CombatObserver, EventEnvelope};
use crate::faction::{Diplomacy, FactionId};
use crate::outcome::{CombatOutcome, ScanReport, ScannedDesign};
use crate::path;
use crate::scheduler::TurnScheduler;
use crate::shots::{ShotModel, StandardShots};

// =============================================================================
// Stepping
// =============================================================================

/// Result of advancing the battle by one step.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// A stack took its turn; call `step` again.
    Continue,
    /// A player-controlled stack is waiting for commands.
    AwaitingCommand(StackId),
    /// The outcome is final.
    Finished,
}

/// An order for the player-controlled stack whose turn it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlayerCommand {
    /// Fly to a cell.
    MoveTo {
        /// Destination.
        to: GridPos,
    },
    /// Fire every weapon that can reach the target.
    Attack {
        /// Target stack.
        target: StackId,
    },
    /// Fire one weapon slot.
    FireWeapon {
        /// Target stack.
        target: StackId,
        /// Slot index.
        slot: usize,
        /// Fire every remaining shot rather than one.
        all_shots: bool,
    },
    /// Leave the battle.
    Retreat,
}

// =============================================================================
// Resolver
// =============================================================================

/// Owns one battle from setup to the finalized outcome.
pub struct CombatResolver {
    config: CombatConfig,
    arena: Arena,
    diplomacy: Diplomacy,
    rng: ChaCha8Rng,
    shots: Box<dyn ShotModel>,
    captains: BTreeMap<StackId, Box<dyn Captain>>,
    scheduler: TurnScheduler,
    observer: Option<Box<dyn CombatObserver>>,
    outcome: CombatOutcome,
    /// Stacks that left the grid, destroyed or retreated.
    departed: BTreeMap<StackId, Stack>,
    engagements: BTreeSet<(FactionId, FactionId)>,
    colony_attackers: BTreeSet<FactionId>,
    colony: Option<StackId>,
    cancel: Arc<AtomicBool>,
    round: u32,
    sequence: u64,
    interactive: bool,
    interdiction: bool,
    /// Stack whose turn is in progress.
    acting: Option<StackId>,
    awaiting_player: bool,
    finished: bool,
}

impl fmt::Debug for CombatResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatResolver")
            .field("arena", &self.arena)
            .field("round", &self.round)
            .field("captains", &format!("[{} captains]", self.captains.len()))
            .field("observer", &self.observer.is_some())
            .field("interactive", &self.interactive)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl CombatResolver {
    /// Creates a resolver for stacks already deployed on an arena.
    ///
    /// Every stack gets the default captain for its variant. The attacker and
    /// defender roles drive the forced retreat at the turn ceiling and the
    /// incident report; setup normally decides them (see
    /// [`Engagement::prepare`]).
    #[must_use]
    pub fn new(
        arena: Arena,
        diplomacy: Diplomacy,
        config: CombatConfig,
        seed: u64,
        attacker: Option<FactionId>,
        defender: Option<FactionId>,
    ) -> Self {
        Self::with_rng(
            arena,
            diplomacy,
            config,
            ChaCha8Rng::seed_from_u64(seed),
            CombatOutcome::new(0, attacker, defender, None),
        )
    }

    pub(crate) fn with_rng(
        arena: Arena,
        diplomacy: Diplomacy,
        config: CombatConfig,
        rng: ChaCha8Rng,
        mut outcome: CombatOutcome,
    ) -> Self {
        let captains = arena
            .stacks()
            .filter(|s| s.is_combatant())
            .map(|s| (s.id, default_captain(s)))
            .collect();
        let colony = arena.stacks().find(|s| s.is_colony()).map(|s| s.id);
        let interdiction = arena
            .stacks()
            .filter_map(Stack::as_colony)
            .any(|c| c.interdiction);
        outcome.participants = participants(&arena);
        outcome.scans = scan_reports(&arena, &diplomacy, &outcome.participants);
        let interactive = arena.stacks().any(Stack::is_player);
        Self {
            config,
            arena,
            diplomacy,
            rng,
            shots: Box::new(StandardShots),
            captains,
            scheduler: TurnScheduler::new(),
            observer: None,
            outcome,
            departed: BTreeMap::new(),
            engagements: BTreeSet::new(),
            colony_attackers: BTreeSet::new(),
            colony,
            cancel: Arc::new(AtomicBool::new(false)),
            round: 0,
            sequence: 0,
            interactive,
            interdiction,
            acting: None,
            awaiting_player: false,
            finished: false,
        }
    }

    /// Replaces the per-shot model.
    #[must_use]
    pub fn with_shot_model(mut self, model: impl ShotModel + 'static) -> Self {
        self.shots = Box::new(model);
        self
    }

    /// Attaches an event observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl CombatObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Replaces the captain of one stack.
    #[must_use]
    pub fn with_captain(mut self, stack: StackId, captain: impl Captain + 'static) -> Self {
        if self.arena.contains(stack) {
            self.captains.insert(stack, Box::new(captain));
        }
        self
    }

    /// Turns interactive mode on or off. Interactive mode is on by default
    /// when any stack is player-controlled.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Read-only view of the battle.
    #[must_use]
    pub fn view(&self) -> BattleView<'_> {
        BattleView {
            arena: &self.arena,
            diplomacy: &self.diplomacy,
            config: &self.config,
            round: self.round,
        }
    }

    /// The grid and every stack on it.
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Current round; 0 before the first round starts.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Outcome so far; final once [`is_finished`](Self::is_finished).
    #[must_use]
    pub const fn outcome(&self) -> &CombatOutcome {
        &self.outcome
    }

    /// Consumes the resolver, returning its outcome.
    #[must_use]
    pub fn into_outcome(self) -> CombatOutcome {
        self.outcome
    }

    /// The battle has been finalized.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stack whose turn is in progress.
    #[must_use]
    pub const fn acting(&self) -> Option<StackId> {
        self.acting
    }

    /// A stack that has left the battle.
    #[must_use]
    pub fn departed(&self, id: StackId) -> Option<&Stack> {
        self.departed.get(&id)
    }

    /// Shared flag that cancels resolution when set.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Auto-resolve
    // -------------------------------------------------------------------------

    /// Resolves the battle without yielding, playing player stacks with
    /// their default captain.
    pub fn run(&mut self) -> &CombatOutcome {
        self.interactive = false;
        if self.awaiting_player {
            self.end_player_turn();
        }
        while self.step() != StepResult::Finished {}
        &self.outcome
    }

    /// Moves the resolver onto a worker thread and auto-resolves there.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn_auto_resolve(mut self) -> io::Result<AutoResolveHandle> {
        let cancel = self.cancel_flag();
        let handle = thread::Builder::new()
            .name("skirmish-auto-resolve".into())
            .spawn(move || {
                self.run();
                self.into_outcome()
            })?;
        Ok(AutoResolveHandle { cancel, handle })
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn emit(&mut self, event: CombatEvent) {
        let envelope = EventEnvelope {
            round: self.round,
            sequence: self.sequence,
            event,
        };
        self.sequence += 1;
        trace!(?envelope, "combat event");
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&envelope);
        }
    }

    fn check_actor(&self, id: StackId) -> Result<(), ActionError> {
        if self.finished {
            return Err(ActionError::BattleFinished);
        }
        if !self.arena.contains(id) {
            return Err(if self.departed.contains_key(&id) {
                ActionError::NotActive(id)
            } else {
                ActionError::UnknownStack(id)
            });
        }
        if self.acting != Some(id) {
            return Err(ActionError::NotYourTurn(id));
        }
        Ok(())
    }

    fn require_active(&self, id: StackId) -> Result<&Stack, ActionError> {
        match self.arena.get(id) {
            Some(stack) => Ok(stack),
            None if self.departed.contains_key(&id) => Err(ActionError::NotActive(id)),
            None => Err(ActionError::UnknownStack(id)),
        }
    }
}

fn participants(arena: &Arena) -> Vec<FactionId> {
    let mut seen = Vec::new();
    for faction in arena
        .stacks()
        .filter(|s| s.is_combatant())
        .filter_map(|s| s.faction)
    {
        if !seen.contains(&faction) {
            seen.push(faction);
        }
    }
    seen
}

fn scan_reports(arena: &Arena, diplomacy: &Diplomacy, factions: &[FactionId]) -> Vec<ScanReport> {
    factions
        .iter()
        .map(|&faction| {
            let seen: BTreeSet<ScannedDesign> = arena
                .stacks()
                .filter_map(|s| Some((s, s.faction?, s.as_ship()?)))
                .filter(|(_, owner, _)| diplomacy.hostile(faction, *owner))
                .map(|(s, owner, ship)| ScannedDesign {
                    owner,
                    design: ship.design,
                    name: s.name.clone(),
                })
                .collect();
            ScanReport {
                faction,
                seen: seen.into_iter().collect(),
            }
        })
        .collect()
}

// =============================================================================
// Worker thread handle
// =============================================================================

/// A battle being auto-resolved on a worker thread.
///
/// The resolver was moved into the thread, so no other code can drive the
/// same battle concurrently.
#[derive(Debug)]
pub struct AutoResolveHandle {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<CombatOutcome>,
}

impl AutoResolveHandle {
    /// Asks the worker to stop after the current stack turn. The battle is
    /// then finalized as if the turn ceiling had been reached.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// The worker has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the worker panicked.
    pub fn join(self) -> thread::Result<CombatOutcome> {
        self.handle.join()
    }
}

// =============================================================================
// Views for captains
// =============================================================================

/// Read-only snapshot of a battle for decision making.
#[derive(Debug, Clone, Copy)]
pub struct BattleView<'a> {
    arena: &'a Arena,
    diplomacy: &'a Diplomacy,
    config: &'a CombatConfig,
    round: u32,
}

impl<'a> BattleView<'a> {
    /// The grid.
    #[must_use]
    pub const fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// Alliances.
    #[must_use]
    pub const fn diplomacy(&self) -> &'a Diplomacy {
        self.diplomacy
    }

    /// Rule constants.
    #[must_use]
    pub const fn config(&self) -> &'a CombatConfig {
        self.config
    }

    /// Current round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// A stack on the grid.
    #[must_use]
    pub fn stack(&self, id: StackId) -> Option<&'a Stack> {
        self.arena.get(id)
    }

    /// Combatant stacks hostile to `id`, in id order.
    pub fn hostiles(&self, id: StackId) -> impl Iterator<Item = &'a Stack> + 'a {
        let me = self.arena.get(id);
        let diplomacy = self.diplomacy;
        self.arena
            .stacks()
            .filter(move |s| s.is_combatant() && me.is_some_and(|m| m.hostile_to(s, diplomacy)))
    }

    /// Nearest hostile stack `id` could ever fight, ties to the lower id.
    #[must_use]
    pub fn nearest_target(&self, id: StackId) -> Option<&'a Stack> {
        let me = self.arena.get(id)?;
        self.hostiles(id)
            .filter(|t| !t.is_cloaked() && me.could_engage(t, self.diplomacy))
            .min_by_key(|t| me.pos.chebyshev(t.pos))
    }

    /// Total strength of `id`'s side and of everything hostile to it.
    #[must_use]
    pub fn strength_balance(&self, id: StackId) -> (f32, f32) {
        let Some(me) = self.arena.get(id) else {
            return (0.0, 0.0);
        };
        let mut own = 0.0;
        let mut hostile = 0.0;
        for stack in self.arena.stacks().filter(|s| s.is_combatant()) {
            if !me.hostile_to(stack, self.diplomacy) {
                own += stack.strength();
            } else if stack.is_armed() {
                hostile += stack.strength();
            }
        }
        (own, hostile)
    }

    /// Best free cell from which `id` can hit `target`: within weapon reach,
    /// reachable, closest to the stack's current cell.
    #[must_use]
    pub fn firing_position(&self, id: StackId, target: StackId) -> Option<GridPos> {
        let me = self.arena.get(id)?;
        let foe = self.arena.get(target)?;
        let reach = me
            .weapon_slots()
            .iter()
            .filter(|w| w.has_ammo() && foe.engageable_by(&w.spec))
            .map(|w| w.spec.reach(me.beam_range_bonus))
            .max()?
            .max(1);
        if me.pos.chebyshev(foe.pos) <= reach {
            return Some(me.pos);
        }
        let mut cells: Vec<GridPos> = self
            .arena
            .cells()
            .filter(|c| c.chebyshev(foe.pos) <= reach && self.arena.is_free(*c, Some(id)))
            .collect();
        cells.sort_by_key(|c| me.pos.chebyshev(*c));
        cells
            .into_iter()
            .find(|c| path::find_path(self.arena, me, *c).is_some())
    }
}

/// A captain's handle on the battle during its stack's turn.
///
/// Every action goes through the resolver and is refused with an
/// [`ActionError`] if its preconditions fail.
pub struct TurnContext<'a> {
    resolver: &'a mut CombatResolver,
    stack: StackId,
}

impl fmt::Debug for TurnContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnContext")
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

impl<'a> TurnContext<'a> {
    /// Acting stack.
    #[must_use]
    pub const fn id(&self) -> StackId {
        self.stack
    }

    /// Read-only view of the battle.
    #[must_use]
    pub fn view(&self) -> BattleView<'_> {
        self.resolver.view()
    }

    /// The acting stack, while it is still on the grid.
    #[must_use]
    pub fn me(&self) -> Option<&Stack> {
        self.resolver.arena.get(self.stack)
    }

    /// Flies to a cell.
    ///
    /// # Errors
    ///
    /// See [`CombatResolver::move_to`].
    pub fn move_to(&mut self, to: GridPos) -> Result<(), ActionError> {
        self.resolver.move_to(self.stack, to)
    }

    /// Fires every weapon that can reach the target.
    ///
    /// # Errors
    ///
    /// See [`CombatResolver::attack`].
    pub fn attack(&mut self, target: StackId) -> Result<u32, ActionError> {
        self.resolver.attack(self.stack, target)
    }

    /// Fires one weapon slot.
    ///
    /// # Errors
    ///
    /// See [`CombatResolver::fire_weapon`].
    pub fn fire_weapon(
        &mut self,
        target: StackId,
        slot: usize,
        all_shots: bool,
    ) -> Result<(), ActionError> {
        self.resolver.fire_weapon(self.stack, target, slot, all_shots)
    }

    /// Leaves the battle.
    ///
    /// # Errors
    ///
    /// See [`CombatResolver::retreat`].
    pub fn retreat(&mut self) -> Result<(), ActionError> {
        self.resolver.retreat(self.stack)
    }

    /// Nearest cell to `point` the acting stack can reach, counting cells
    /// held by stacks `can_take` accepts as free.
    pub fn nearest_free_cell(
        &mut self,
        point: GridPos,
        can_take: impl Fn(&Stack) -> bool,
    ) -> Option<GridPos> {
        let resolver = &mut *self.resolver;
        let mover = resolver.arena.get(self.stack)?;
        path::nearest_free_cell(
            &resolver.arena,
            mover,
            point,
            resolver.config.nearest_cell_attempts,
            &mut resolver.rng,
            can_take,
        )
    }

    /// Removes the acting monster from the battle when it has nowhere to go.
    pub fn remove_stalled(&mut self) {
        self.resolver.remove_stalled(self.stack);
    }

    /// Nothing left to do this turn.
    #[must_use]
    pub fn is_turn_complete(&self) -> bool {
        self.resolver.is_turn_complete(self.stack)
    }
}
