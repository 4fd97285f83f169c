//! Crate-level tests.
//!
//! - `determinism.rs`: the same scenario and seed replay identically
//! - `integration.rs`: whole battles through setup, turns and finalization
//! - `properties.rs`: proptest invariants for damage and pathing
//! - `helpers.rs`: stack, resolver and scenario factories

pub mod helpers;
mod properties;
