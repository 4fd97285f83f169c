//! Faction collaborator: identities, alliances and racial combat bonuses.
//!
//! The strategic layer owns empires; the resolver only needs to know who is
//! allied with whom and which flat bonuses a faction's crews bring into
//! battle. Everything the battle wants to *write* back to an empire (kills,
//! scanned designs, incidents) is reported through the
//! [`CombatOutcome`](crate::outcome::CombatOutcome) instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a participating empire.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(u32);

impl FactionId {
    /// Creates a faction id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FactionId({})", self.0)
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only description of an empire taking part in a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionInfo {
    /// Faction id.
    pub id: FactionId,
    /// Display name.
    pub name: String,
    /// Factions this empire is allied with.
    #[serde(default)]
    pub allies: Vec<FactionId>,
    /// Racial bonus added to every stack's attack level.
    #[serde(default)]
    pub attack_bonus: i32,
    /// Racial bonus added to every stack's beam and missile defense.
    #[serde(default)]
    pub defense_bonus: i32,
}

impl FactionInfo {
    /// Creates a faction with no allies and no bonuses.
    #[must_use]
    pub fn new(id: FactionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            allies: Vec::new(),
            attack_bonus: 0,
            defense_bonus: 0,
        }
    }
}

/// Alliance graph and faction roster for one battle.
///
/// Alliances are symmetric: declaring `a` allied with `b` makes `b` allied
/// with `a`. Two stacks of different factions that are not allied are
/// hostile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diplomacy {
    factions: BTreeMap<FactionId, FactionInfo>,
    alliances: BTreeSet<(FactionId, FactionId)>,
}

impl Diplomacy {
    /// Builds the roster and alliance graph from faction descriptions.
    #[must_use]
    pub fn from_factions(factions: &[FactionInfo]) -> Self {
        let mut diplomacy = Self::default();
        for info in factions {
            diplomacy.factions.insert(info.id, info.clone());
        }
        for info in factions {
            for ally in &info.allies {
                diplomacy.ally(info.id, *ally);
            }
        }
        diplomacy
    }

    /// Records a symmetric alliance.
    pub fn ally(&mut self, a: FactionId, b: FactionId) {
        if a != b {
            self.alliances.insert(Self::key(a, b));
        }
    }

    /// Returns `true` for the same faction or an allied pair.
    #[must_use]
    pub fn allied(&self, a: FactionId, b: FactionId) -> bool {
        a == b || self.alliances.contains(&Self::key(a, b))
    }

    /// Returns `true` when two factions would fight each other.
    #[must_use]
    pub fn hostile(&self, a: FactionId, b: FactionId) -> bool {
        !self.allied(a, b)
    }

    /// Looks up a faction description.
    #[must_use]
    pub fn faction(&self, id: FactionId) -> Option<&FactionInfo> {
        self.factions.get(&id)
    }

    /// Returns `true` if the faction is on the roster.
    #[must_use]
    pub fn contains(&self, id: FactionId) -> bool {
        self.factions.contains_key(&id)
    }

    /// Attack bonus of a faction, zero for unknown factions and monsters.
    #[must_use]
    pub fn attack_bonus(&self, id: Option<FactionId>) -> i32 {
        id.and_then(|id| self.factions.get(&id))
            .map_or(0, |info| info.attack_bonus)
    }

    /// Defense bonus of a faction, zero for unknown factions and monsters.
    #[must_use]
    pub fn defense_bonus(&self, id: Option<FactionId>) -> i32 {
        id.and_then(|id| self.factions.get(&id))
            .map_or(0, |info| info.defense_bonus)
    }

    fn key(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}
