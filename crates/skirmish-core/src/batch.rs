//! Monte-Carlo auto-resolve.
//!
//! Every seed is an independent battle, so batches run in parallel on the
//! rayon pool. Results are folded in seed order, so a batch summary is as
//! deterministic as a single battle.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CombatConfig;
use crate::error::ScenarioError;
use crate::outcome::{CombatOutcome, Termination};
use crate::resolver::Engagement;
use crate::scenario::Scenario;

/// Label used for battles won by a monster.
pub const MONSTER_VICTOR: &str = "monster";

/// Label used for battles nobody won.
pub const NO_VICTOR: &str = "none";

/// Aggregate results of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Battles resolved, bombardments and no-conflict encounters included.
    pub battles: u32,
    /// Wins by faction id, plus [`MONSTER_VICTOR`] and [`NO_VICTOR`].
    pub wins: BTreeMap<String, u32>,
    /// Ships destroyed per faction id, summed over the batch.
    pub ships_lost: BTreeMap<String, u32>,
    /// Mean rounds over battles that were actually fought.
    pub average_rounds: f64,
    /// Battles that hit the turn ceiling.
    pub ceiling_hits: u32,
    /// Encounters diverted to bombardment.
    pub bombardments: u32,
    /// Encounters in which nobody could fight.
    pub no_conflicts: u32,
}

enum Resolved {
    Fought(CombatOutcome),
    Bombardment,
    Idle,
}

/// Resolves the scenario once per seed and summarises the results.
///
/// # Errors
///
/// Returns the first [`ScenarioError`] hit by any seed.
pub fn run_batch(scenario: &Scenario, config: &CombatConfig, seeds: &[u64]) -> Result<BatchSummary, ScenarioError> {
    let results: Vec<Resolved> = seeds
        .par_iter()
        .map(|&seed| {
            Ok(match Engagement::prepare(&scenario.with_seed(seed), config)? {
                Engagement::Battle(mut resolver) => {
                    resolver.run();
                    Resolved::Fought(resolver.into_outcome())
                }
                Engagement::Bombardment(_) => Resolved::Bombardment,
                Engagement::NoConflict(_) => Resolved::Idle,
            })
        })
        .collect::<Result<_, ScenarioError>>()?;

    let mut summary = BatchSummary::default();
    let mut fought = 0_u32;
    let mut rounds = 0_u64;
    for result in results {
        summary.battles += 1;
        let outcome = match result {
            Resolved::Fought(outcome) => outcome,
            Resolved::Bombardment => {
                summary.bombardments += 1;
                continue;
            }
            Resolved::Idle => {
                summary.no_conflicts += 1;
                continue;
            }
        };
        fought += 1;
        rounds += u64::from(outcome.rounds);
        if outcome.termination == Termination::TurnCeiling {
            summary.ceiling_hits += 1;
        }
        let label = match (outcome.victor, outcome.monster_victorious) {
            (_, true) => MONSTER_VICTOR.to_owned(),
            (Some(faction), false) => faction.to_string(),
            (None, false) => NO_VICTOR.to_owned(),
        };
        *summary.wins.entry(label).or_default() += 1;
        for tally in &outcome.tallies {
            *summary.ships_lost.entry(tally.faction.to_string()).or_default() += tally.destroyed;
        }
    }
    if fought > 0 {
        #[allow(clippy::cast_precision_loss)]
        let mean = rounds as f64 / f64::from(fought);
        summary.average_rounds = mean;
    }
    info!(
        battles = summary.battles,
        fought,
        average_rounds = summary.average_rounds,
        "batch complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{duel_scenario, idle_scenario};

    #[test]
    fn batch_is_deterministic() {
        let scenario = duel_scenario(1);
        let seeds: Vec<u64> = (0..8).collect();
        let a = run_batch(&scenario, &CombatConfig::default(), &seeds).unwrap();
        let b = run_batch(&scenario, &CombatConfig::default(), &seeds).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.battles, 8);
        assert_eq!(a.wins.values().sum::<u32>(), 8);
    }

    #[test]
    fn idle_encounters_are_counted_separately() {
        let summary = run_batch(&idle_scenario(), &CombatConfig::default(), &[1, 2, 3]).unwrap();
        assert_eq!(summary.no_conflicts, 3);
        assert!(summary.wins.is_empty());
        assert!(summary.average_rounds.abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_config_is_reported() {
        let config = CombatConfig {
            max_rounds: 0,
            ..CombatConfig::default()
        };
        assert!(run_batch(&duel_scenario(1), &config, &[1]).is_err());
    }
}
