//! Domain events for presentation and telemetry.
//!
//! The resolver describes everything visible that happens in a battle as a
//! [`CombatEvent`] wrapped in an [`EventEnvelope`], and hands each envelope to
//! an optional [`CombatObserver`]. Observers are strictly passive: the
//! resolver never reads anything back from them, so a battle resolved with
//! an observer attached plays out exactly like one resolved without.
//!
//! [`EventLog`] is the stock observer. It records envelopes behind a shared
//! mutex so a caller can keep a handle while the resolver owns another, even
//! across a worker thread.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::arena::GridPos;
use crate::entity::{StackId, StackKind};

/// Something that happened during a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombatEvent {
    /// A new round began.
    RoundStarted {
        /// Round number, starting at 1.
        round: u32,
    },
    /// A stack moved between cells.
    UnitMoved {
        /// Mover.
        stack: StackId,
        /// Cell left.
        from: GridPos,
        /// Cell entered.
        to: GridPos,
        /// Jumped rather than flew.
        teleported: bool,
    },
    /// A direct-fire or special weapon was fired.
    WeaponFired {
        /// Firing stack.
        attacker: StackId,
        /// Primary target.
        target: StackId,
        /// Weapon name.
        weapon: String,
        /// Shots rolled.
        shots: u32,
        /// Shots that landed.
        hits: u32,
        /// Damage that got through shields.
        damage: f32,
    },
    /// A missile salvo was launched.
    MissileLaunched {
        /// New missile stack.
        missile: StackId,
        /// Launching stack.
        owner: StackId,
        /// Pursued stack.
        target: StackId,
        /// Missiles in the salvo.
        salvo: u32,
    },
    /// A salvo reached its target and fired.
    MissileDetonated {
        /// Missile stack.
        missile: StackId,
        /// Stack hit.
        target: StackId,
        /// Missiles that landed.
        hits: u32,
        /// Damage that got through shields.
        damage: f32,
    },
    /// A salvo self-destructed without firing.
    MissileExpired {
        /// Missile stack.
        missile: StackId,
    },
    /// A stack was destroyed.
    UnitDestroyed {
        /// Destroyed stack.
        stack: StackId,
        /// Its variant.
        kind: StackKind,
    },
    /// A stack left the battle.
    UnitRetreated {
        /// Retreating stack.
        stack: StackId,
        /// System it withdrew to.
        destination: Option<u32>,
    },
    /// An amoeba split in two.
    AmoebaSplit {
        /// Original amoeba.
        parent: StackId,
        /// New sibling.
        child: StackId,
    },
    /// An amoeba consumed an unarmed stack.
    StackConsumed {
        /// Amoeba.
        predator: StackId,
        /// Consumed stack.
        prey: StackId,
    },
    /// A monster could not find any reachable cell and was removed.
    MonsterStalled {
        /// Removed monster.
        stack: StackId,
    },
    /// An asteroid crumbled.
    AsteroidEroded {
        /// Cleared cell.
        pos: GridPos,
    },
}

/// An event stamped with its position in the battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Round in which the event happened.
    pub round: u32,
    /// Battle-wide sequence number, starting at 0.
    pub sequence: u64,
    /// What happened.
    pub event: CombatEvent,
}

/// Receives battle events as they happen.
pub trait CombatObserver: Send {
    /// Called once per event, in order.
    fn on_event(&mut self, envelope: &EventEnvelope);
}

/// Shared, clonable event recorder.
///
/// Clones share the same log, so one handle can be given to the resolver and
/// another kept to drain events afterwards.
///
/// ```
/// use skirmish_core::event::{CombatEvent, CombatObserver, EventEnvelope, EventLog};
///
/// let log = EventLog::new();
/// let mut observer = log.clone();
/// observer.on_event(&EventEnvelope {
///     round: 1,
///     sequence: 0,
///     event: CombatEvent::RoundStarted { round: 1 },
/// });
/// assert_eq!(log.len(), 1);
/// assert_eq!(log.take_events().len(), 1);
/// assert!(log.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns every recorded event, oldest first.
    pub fn take_events(&self) -> Vec<EventEnvelope> {
        let mut log = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *log)
    }

    /// Events currently recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CombatObserver for EventLog {
    fn on_event(&mut self, envelope: &EventEnvelope) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(envelope.clone());
    }
}
