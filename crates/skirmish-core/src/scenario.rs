//! Battle inputs.
//!
//! A [`Scenario`] is everything the strategic layer knows about an encounter
//! before the shooting starts: the star system and its colony, the factions
//! involved, the ship designs in play, the fleets present and any monsters.
//! Scenarios are plain serde data so tooling can load them from JSON.
//!
//! ```
//! use skirmish_core::entity::WeaponSpec;
//! use skirmish_core::faction::{FactionId, FactionInfo};
//! use skirmish_core::scenario::{DesignWeapon, FleetSpec, Scenario, ShipDesign, StarSystem};
//!
//! let human = FactionId::new(1);
//! let alien = FactionId::new(2);
//! let mut fighter = ShipDesign::new(1, "Fighter", 10.0);
//! fighter.weapons.push(DesignWeapon::new(WeaponSpec::beam("Laser", 1.0, 4.0, 1), 1));
//!
//! let scenario = Scenario::new(7, StarSystem::new(1, "Sol"))
//!     .with_faction(FactionInfo::new(human, "Humans"))
//!     .with_faction(FactionInfo::new(alien, "Aliens"))
//!     .with_design(fighter)
//!     .with_fleet(FleetSpec::new(1, human).with_ships(1, 4))
//!     .with_fleet(FleetSpec::new(2, alien).with_ships(1, 4));
//!
//! assert!(scenario.validate().is_ok());
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::arena::GridPos;
use crate::config::CombatConfig;
use crate::entity::{
    ColonyState, Controller, MonsterKind, ShipState, Stack, StackFlags, StackInner, WeaponSlot,
    WeaponSpec,
};
use crate::error::ScenarioError;
use crate::faction::{FactionId, FactionInfo};

/// A complete encounter description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Seed for every random draw in the battle.
    #[serde(default)]
    pub seed: u64,
    /// Where the battle takes place.
    pub system: StarSystem,
    /// Factions referenced by the system and fleets.
    #[serde(default)]
    pub factions: Vec<FactionInfo>,
    /// Ship designs referenced by fleets.
    #[serde(default)]
    pub designs: Vec<ShipDesign>,
    /// Fleets present.
    #[serde(default)]
    pub fleets: Vec<FleetSpec>,
    /// Monsters present.
    #[serde(default)]
    pub monsters: Vec<MonsterKind>,
}

impl Scenario {
    /// Empty encounter in a system.
    #[must_use]
    pub fn new(seed: u64, system: StarSystem) -> Self {
        Self {
            seed,
            system,
            factions: Vec::new(),
            designs: Vec::new(),
            fleets: Vec::new(),
            monsters: Vec::new(),
        }
    }

    /// Adds a faction.
    #[must_use]
    pub fn with_faction(mut self, faction: FactionInfo) -> Self {
        self.factions.push(faction);
        self
    }

    /// Adds a ship design.
    #[must_use]
    pub fn with_design(mut self, design: ShipDesign) -> Self {
        self.designs.push(design);
        self
    }

    /// Adds a fleet.
    #[must_use]
    pub fn with_fleet(mut self, fleet: FleetSpec) -> Self {
        self.fleets.push(fleet);
        self
    }

    /// Adds a monster.
    #[must_use]
    pub fn with_monster(mut self, monster: MonsterKind) -> Self {
        self.monsters.push(monster);
        self
    }

    /// The same encounter with a different seed.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    /// Looks up a design by id.
    #[must_use]
    pub fn design(&self, id: u32) -> Option<&ShipDesign> {
        self.designs.iter().find(|d| d.id == id)
    }

    /// Checks references and basic sanity.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScenarioError`] found.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let known: BTreeSet<FactionId> = self.factions.iter().map(|f| f.id).collect();
        if let Some(owner) = self.system.owner {
            if !known.contains(&owner) {
                return Err(ScenarioError::UnknownFaction(owner));
            }
        }
        if self.system.colony.is_some() && self.system.owner.is_none() {
            return Err(ScenarioError::UnownedColony(self.system.id));
        }
        if let Some(design) = self.designs.iter().find(|d| d.hits <= 0.0) {
            return Err(ScenarioError::HitlessDesign(design.name.clone()));
        }
        let mut fleet_ids = BTreeSet::new();
        for fleet in &self.fleets {
            if !fleet_ids.insert(fleet.id) {
                return Err(ScenarioError::DuplicateFleet(fleet.id));
            }
            if !known.contains(&fleet.faction) {
                return Err(ScenarioError::UnknownFaction(fleet.faction));
            }
            if fleet.ship_count() == 0 {
                return Err(ScenarioError::EmptyFleet(fleet.id));
            }
            if let Some(missing) = fleet.ships.iter().find(|s| self.design(s.design).is_none()) {
                return Err(ScenarioError::UnknownDesign(missing.design));
            }
        }
        Ok(())
    }
}

/// The system being fought over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    /// System id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Faction owning the colony, if any.
    #[serde(default)]
    pub owner: Option<FactionId>,
    /// Planetary defenses.
    #[serde(default)]
    pub colony: Option<ColonySpec>,
    /// Asteroids scattered at random over the middle of the grid.
    #[serde(default)]
    pub asteroids: u32,
    /// Asteroids at fixed cells, placed before the random ones.
    #[serde(default)]
    pub asteroid_cells: Vec<GridPos>,
}

impl StarSystem {
    /// Uncolonized system without asteroids.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: None,
            colony: None,
            asteroids: 0,
            asteroid_cells: Vec::new(),
        }
    }

    /// Gives the system an owner and a colony.
    #[must_use]
    pub fn colonized(mut self, owner: FactionId, colony: ColonySpec) -> Self {
        self.owner = Some(owner);
        self.colony = Some(colony);
        self
    }
}

/// Colony and planetary defenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColonySpec {
    /// Population in millions.
    pub population: f32,
    /// Missile bases.
    #[serde(default)]
    pub bases: u32,
    /// Hit points of each base.
    #[serde(default = "default_base_hits")]
    pub base_hits: f32,
    /// Shield of each base.
    #[serde(default)]
    pub base_shield: f32,
    /// Planetary shield.
    #[serde(default)]
    pub planetary_shield: f32,
    /// Base missile.
    #[serde(default = "default_base_missile")]
    pub missile: WeaponSpec,
    /// Optional second base weapon.
    #[serde(default)]
    pub scatter_pack: Option<WeaponSpec>,
    /// Rebel population.
    #[serde(default)]
    pub rebels: f32,
    /// Blocks teleporters for the battle.
    #[serde(default)]
    pub interdiction: bool,
    /// Attack level of the bases.
    #[serde(default)]
    pub attack_level: i32,
    /// Defense against direct fire.
    #[serde(default)]
    pub beam_defense: i32,
    /// Defense against missiles.
    #[serde(default)]
    pub missile_defense: i32,
}

fn default_base_hits() -> f32 {
    50.0
}

fn default_base_missile() -> WeaponSpec {
    WeaponSpec::missile("Nuclear Missile", 8.0, 2.0, 10)
}

impl ColonySpec {
    /// Colony with the given population and bases and default equipment.
    #[must_use]
    pub fn new(population: f32, bases: u32) -> Self {
        Self {
            population,
            bases,
            base_hits: default_base_hits(),
            base_shield: 0.0,
            planetary_shield: 0.0,
            missile: default_base_missile(),
            scatter_pack: None,
            rebels: 0.0,
            interdiction: false,
            attack_level: 0,
            beam_defense: 0,
            missile_defense: 0,
        }
    }

    /// Has missile bases to fight with.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.bases > 0
    }

    /// Builds the colony-defense stack.
    ///
    /// The base missile slot carries `colony_missiles_per_base` launchers per
    /// base, so one volley from `n` bases is `3n` missiles by default.
    #[must_use]
    pub fn build_stack(&self, owner: FactionId, config: &CombatConfig) -> Stack {
        let mut stack = Stack::new(
            "Planetary Defenses",
            Some(owner),
            self.bases,
            self.base_hits,
            StackInner::Colony(ColonyState {
                owner,
                population: self.population,
                starting_population: self.population,
                starting_bases: self.bases,
                planetary_shield: self.planetary_shield,
                interdiction: self.interdiction,
                rebels: self.rebels,
                population_per_damage: config.population_per_damage,
            }),
        );
        stack.shield = self.base_shield;
        stack.max_shield = self.base_shield;
        stack.attack_level = self.attack_level;
        stack.beam_defense = self.beam_defense;
        stack.missile_defense = self.missile_defense;
        stack.weapons.push(WeaponSlot::new(
            self.missile.clone(),
            config.colony_missiles_per_base,
        ));
        if let Some(pack) = &self.scatter_pack {
            stack.weapons.push(WeaponSlot::new(pack.clone(), 1));
        }
        stack
    }
}

/// One weapon hardpoint in a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignWeapon {
    /// Component.
    pub weapon: WeaponSpec,
    /// Weapons per ship.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Volleys of ammunition; `None` is unlimited.
    #[serde(default)]
    pub ammo: Option<u32>,
    /// Turns between volleys.
    #[serde(default = "default_count")]
    pub cooldown: u32,
}

fn default_count() -> u32 {
    1
}

impl DesignWeapon {
    /// Unlimited hardpoint firing every turn.
    #[must_use]
    pub fn new(weapon: WeaponSpec, count: u32) -> Self {
        Self {
            weapon,
            count,
            ammo: None,
            cooldown: 1,
        }
    }

    fn slot(&self) -> WeaponSlot {
        WeaponSlot::new(self.weapon.clone(), self.count)
            .with_ammo(self.ammo)
            .with_cooldown(self.cooldown)
    }
}

/// A ship design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipDesign {
    /// Design id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Hit points per ship.
    pub hits: f32,
    /// Shield level.
    #[serde(default)]
    pub shield: f32,
    /// Combat speed in cells per turn.
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Base initiative.
    #[serde(default)]
    pub initiative: i32,
    /// Attack level.
    #[serde(default)]
    pub attack_level: i32,
    /// Defense against direct fire.
    #[serde(default)]
    pub beam_defense: i32,
    /// Defense against missiles.
    #[serde(default)]
    pub missile_defense: i32,
    /// Fraction of hit points repaired per turn.
    #[serde(default)]
    pub repair_pct: f32,
    /// Carries a cloaking device.
    #[serde(default)]
    pub cloaking: bool,
    /// Carries a teleporter.
    #[serde(default)]
    pub teleporter: bool,
    /// Resistance to black-hole attrition.
    #[serde(default)]
    pub black_hole_defense: f32,
    /// Extra beam reach.
    #[serde(default)]
    pub beam_range_bonus: i32,
    /// Weapon hardpoints in firing order.
    #[serde(default)]
    pub weapons: Vec<DesignWeapon>,
}

fn default_speed() -> f32 {
    1.0
}

impl ShipDesign {
    /// Unarmed design with the given hull.
    #[must_use]
    pub fn new(id: u32, name: impl Into<String>, hits: f32) -> Self {
        Self {
            id,
            name: name.into(),
            hits,
            shield: 0.0,
            speed: default_speed(),
            initiative: 0,
            attack_level: 0,
            beam_defense: 0,
            missile_defense: 0,
            repair_pct: 0.0,
            cloaking: false,
            teleporter: false,
            black_hole_defense: 0.0,
            beam_range_bonus: 0,
            weapons: Vec::new(),
        }
    }

    /// Builds the squadron stack for `count` ships of this design.
    #[must_use]
    pub fn build_stack(&self, fleet: &FleetSpec, count: u32) -> Stack {
        let mut stack = Stack::new(
            self.name.clone(),
            Some(fleet.faction),
            count,
            self.hits,
            StackInner::Ship(ShipState {
                fleet: fleet.id,
                design: self.id,
                retreat_to: fleet.retreat_to,
                starting_num: count,
            }),
        );
        stack.controller = if fleet.player {
            Controller::Player
        } else {
            Controller::Ai
        };
        stack.shield = self.shield;
        stack.max_shield = self.shield;
        stack.max_move = self.speed;
        stack.move_points = self.speed;
        stack.initiative = self.initiative;
        stack.attack_level = self.attack_level;
        stack.beam_defense = self.beam_defense;
        stack.missile_defense = self.missile_defense;
        stack.repair_pct = self.repair_pct;
        stack.black_hole_defense = self.black_hole_defense;
        stack.beam_range_bonus = self.beam_range_bonus;
        stack.weapons = self.weapons.iter().map(DesignWeapon::slot).collect();
        if self.cloaking {
            stack.flags |= StackFlags::CLOAKING_DEVICE | StackFlags::CLOAKED;
        }
        if self.teleporter {
            stack.flags |= StackFlags::TELEPORTER;
        }
        stack
    }
}

/// Ships of one design within a fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipCount {
    /// Design id.
    pub design: u32,
    /// Number of ships.
    pub count: u32,
}

/// A fleet present in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSpec {
    /// Fleet id.
    pub id: u32,
    /// Owning faction.
    pub faction: FactionId,
    /// Ships by design.
    #[serde(default)]
    pub ships: Vec<ShipCount>,
    /// Commanded by the player rather than captains.
    #[serde(default)]
    pub player: bool,
    /// System the fleet withdraws to when it retreats.
    #[serde(default)]
    pub retreat_to: Option<u32>,
}

impl FleetSpec {
    /// Empty AI fleet with nowhere to retreat.
    #[must_use]
    pub fn new(id: u32, faction: FactionId) -> Self {
        Self {
            id,
            faction,
            ships: Vec::new(),
            player: false,
            retreat_to: None,
        }
    }

    /// Adds ships of a design.
    #[must_use]
    pub fn with_ships(mut self, design: u32, count: u32) -> Self {
        self.ships.push(ShipCount { design, count });
        self
    }

    /// Sets the retreat destination.
    #[must_use]
    pub fn retreating_to(mut self, system: u32) -> Self {
        self.retreat_to = Some(system);
        self
    }

    /// Total ships.
    #[must_use]
    pub fn ship_count(&self) -> u32 {
        self.ships.iter().map(|s| s.count).sum()
    }
}
