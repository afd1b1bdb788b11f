//! Rideflow scenario runner.
//!
//! Drives the rider or driver flows through a complete scripted journey on
//! the real clock, against in-memory collaborators that fail at random.
//!
//! # Usage
//!
//! ```bash
//! # Request a trip with seat selection, 30% of trip service calls failing
//! rideflow-sim rider --failure-rate 0.3 --seat-selection
//!
//! # Drive a two-stop plan, reproducibly
//! rideflow-sim driver --seed 7 --latency-ms 20
//! ```

mod scenario;

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::scenario::{ScenarioConfig, SimError};

/// Journey to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Select locations, confirm and request a trip, then edit the dropoff.
    Rider,
    /// Drive to a pickup, load the rider, then go offline.
    Driver,
}

/// Rideflow trip orchestration simulator
#[derive(Parser, Debug)]
#[command(name = "rideflow-sim")]
#[command(about = "Run rider and driver flows against chaotic collaborators")]
#[command(version)]
struct Args {
    /// Journey to simulate
    #[arg(value_enum)]
    scenario: Scenario,

    /// Probability that a collaborator call fails (0.0 to 1.0)
    #[arg(short, long, default_value = "0.2")]
    failure_rate: f64,

    /// Seed for injected failures
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Retries after a failed trip creation before rolling back
    #[arg(long, default_value = "3")]
    retries: u32,

    /// Ask for a seat count before creating the trip
    #[arg(long)]
    seat_selection: bool,

    /// Latency of every collaborator call, in milliseconds
    #[arg(long, default_value = "50")]
    latency_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if !(0.0..=1.0).contains(&args.failure_rate) {
        return Err(SimError::InvalidFailureRate(args.failure_rate).into());
    }

    let config = ScenarioConfig {
        failure_rate: args.failure_rate,
        seed: args.seed,
        creation_retries: args.retries,
        seat_selection: args.seat_selection,
        latency: Duration::from_millis(args.latency_ms),
    };

    tracing::info!(scenario = ?args.scenario, seed = args.seed, "Rideflow simulation starting");

    let report = match args.scenario {
        Scenario::Rider => scenario::rider(&config).await?,
        Scenario::Driver => scenario::driver(&config).await?,
    };

    tracing::info!(report = %serde_json::to_string(&report)?, "simulation finished");

    Ok(())
}
