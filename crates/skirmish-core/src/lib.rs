//! # Skirmish Core
//!
//! Tactical battle resolver for a turn-based space-strategy game.
//!
//! Given the forces present in a star system (ship squadrons, a planetary
//! defense installation and monsters), the resolver plays out a battle on a
//! small grid, one stack turn at a time, until one side is eliminated, a side
//! retreats, or the turn ceiling is reached. The result is a
//! [`CombatOutcome`](outcome::CombatOutcome) for the strategic layer.
//!
//! ## Architecture
//!
//! - **Stacks** ([`entity`]): groups of identical units, one tagged variant
//!   per kind (ship, colony, missile, guardian, amoeba, crystal)
//! - **Arena** ([`arena`]): the grid, asteroids and stack storage
//! - **Resolver** ([`resolver`]): setup, action requests, turn loop,
//!   termination; sole owner of every stack during a battle
//! - **Captains** ([`captain`]): per-stack decision providers that request
//!   actions through the resolver
//! - **Events** ([`event`]): observational domain events for presentation
//!
//! Every random draw comes from one seeded ChaCha stream per battle, so a
//! scenario and seed always produce the same outcome.
//!
//! ## Usage
//!
//! ```
//! use skirmish_core::config::CombatConfig;
//! use skirmish_core::entity::WeaponSpec;
//! use skirmish_core::faction::{FactionId, FactionInfo};
//! use skirmish_core::resolver::auto_resolve;
//! use skirmish_core::scenario::{
//!     ColonySpec, DesignWeapon, FleetSpec, Scenario, ShipDesign, StarSystem,
//! };
//!
//! let (raiders, settlers) = (FactionId::new(1), FactionId::new(2));
//! let mut cruiser = ShipDesign::new(1, "Cruiser", 30.0);
//! cruiser.weapons.push(DesignWeapon::new(WeaponSpec::beam("Laser", 2.0, 6.0, 2), 2));
//!
//! let scenario = Scenario::new(9, StarSystem::new(3, "Altair").colonized(settlers, ColonySpec::new(40.0, 2)))
//!     .with_faction(FactionInfo::new(raiders, "Raiders"))
//!     .with_faction(FactionInfo::new(settlers, "Settlers"))
//!     .with_design(cruiser)
//!     .with_fleet(FleetSpec::new(1, raiders).with_ships(1, 4));
//!
//! let outcome = auto_resolve(&scenario, &CombatConfig::default()).unwrap();
//! assert!(outcome.finalized);
//! assert_eq!(outcome.defender, Some(settlers));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod arena;
pub mod batch;
pub mod captain;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod faction;
pub mod outcome;
pub mod path;
pub mod resolver;
pub mod scenario;
pub mod scheduler;
pub mod shots;

pub use arena::{Arena, GridPos};
pub use config::CombatConfig;
pub use entity::{Stack, StackId, StackKind};
pub use error::{ActionError, ConfigError, ScenarioError};
pub use event::{CombatEvent, CombatObserver, EventEnvelope, EventLog};
pub use outcome::CombatOutcome;
pub use resolver::{auto_resolve, CombatResolver, Engagement, PlayerCommand, StepResult};
pub use scenario::Scenario;

#[cfg(test)]
mod tests;
