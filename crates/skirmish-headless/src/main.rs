//! Headless battle runner.
//!
//! Resolves encounters described in JSON without any presentation layer.
//! Designed for balance testing, CI and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Resolve one encounter and print the outcome
//! cargo run -p skirmish-headless -- run --scenario scenario.json
//!
//! # Include the full event stream
//! cargo run -p skirmish-headless -- run --scenario scenario.json --events
//!
//! # Monte-Carlo batch over 500 seeds
//! cargo run -p skirmish-headless -- batch --scenario scenario.json --count 500
//! ```
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skirmish_core::batch::{run_batch, BatchSummary};
use skirmish_core::resolver::BombardmentReport;
use skirmish_core::{CombatConfig, CombatOutcome, Engagement, EventEnvelope, EventLog, Scenario};

#[derive(Parser)]
#[command(name = "skirmish-headless")]
#[command(about = "Headless tactical battle resolver")]
#[command(version)]
struct Cli {
    /// Enable debug logging to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single encounter
    Run {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Rule overrides (JSON); missing fields keep their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Include every combat event in the output
        #[arg(long)]
        events: bool,
    },

    /// Resolve an encounter once per seed and summarise
    Batch {
        /// Scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Rule overrides (JSON); missing fields keep their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of battles
        #[arg(short = 'n', long, default_value = "100")]
        count: u64,

        /// First seed; battles use consecutive seeds from here
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

/// What a single run produced.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RunReport {
    Battle {
        outcome: CombatOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        events: Option<Vec<EventEnvelope>>,
    },
    Bombardment {
        report: BombardmentReport,
    },
    NoConflict {
        outcome: CombatOutcome,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            config,
            seed,
            events,
        } => {
            let mut scenario = load_scenario(&scenario)?;
            if let Some(seed) = seed {
                scenario.seed = seed;
            }
            let config = load_config(config.as_deref())?;
            let report = cmd_run(&scenario, &config, events)?;
            print_json(&report)
        }
        Commands::Batch {
            scenario,
            config,
            count,
            seed,
        } => {
            let scenario = load_scenario(&scenario)?;
            let config = load_config(config.as_deref())?;
            let summary = cmd_batch(&scenario, &config, seed, count)?;
            print_json(&summary)
        }
    }
}

fn cmd_run(scenario: &Scenario, config: &CombatConfig, events: bool) -> Result<RunReport> {
    let engagement = Engagement::prepare(scenario, config).context("encounter setup failed")?;
    Ok(match engagement {
        Engagement::Battle(resolver) => {
            let log = EventLog::new();
            let mut resolver = if events {
                resolver.with_observer(log.clone())
            } else {
                resolver
            };
            resolver.run();
            let outcome = resolver.into_outcome();
            info!(
                rounds = outcome.rounds,
                victor = ?outcome.victor,
                termination = ?outcome.termination,
                "battle resolved"
            );
            RunReport::Battle {
                outcome,
                events: events.then(|| log.take_events()),
            }
        }
        Engagement::Bombardment(report) => {
            info!(system = report.system, "unarmed colony; bombardment");
            RunReport::Bombardment { report }
        }
        Engagement::NoConflict(outcome) => {
            info!(termination = ?outcome.termination, "nobody can fight");
            RunReport::NoConflict { outcome }
        }
    })
}

fn cmd_batch(scenario: &Scenario, config: &CombatConfig, first: u64, count: u64) -> Result<BatchSummary> {
    let seeds: Vec<u64> = (0..count).map(|i| first.wrapping_add(i)).collect();
    info!(count, first_seed = first, "running batch");
    run_batch(scenario, config, &seeds).context("batch failed")
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read scenario {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid scenario {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<CombatConfig> {
    let Some(path) = path else {
        return Ok(CombatConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let config: CombatConfig =
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("rejected config {}", path.display()))?;
    Ok(config)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("cannot serialize result")?;
    println!("{json}");
    Ok(())
}
