//! Simulation binary for the MICT hierarchical cycle engine.
//!
//! Loads configuration, builds the demo organism, and drives it with the
//! orchestrator until a tick limit, a real-time limit, or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (path from the first argument, else
//!    `mict-config.yaml`; defaults when the file is absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulation clock
//! 4. Build the organism tree and its registry
//! 5. Create operator state from simulation bounds
//! 6. Install the Ctrl-C handler
//! 7. Run the simulation loop
//! 8. Log the result

mod error;
mod snapshot_callback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mict_core::clock::SimulationClock;
use mict_core::config::{LogFormat, LoggingConfig, SimulationConfig};
use mict_core::operator::Operator;
use mict_core::registry::Registry;
use mict_core::runner::{self, Orchestrator};
use mict_models::{OrganismLayout, build_organism};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::snapshot_callback::SnapshotLogCallback;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "mict-config.yaml";

/// Application entry point.
///
/// The tree is single-threaded, so the runtime is too.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("mict-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        steps_per_second = config.simulation.steps_per_second,
        max_ticks = config.simulation.max_ticks,
        max_real_time_seconds = config.simulation.max_real_time_seconds,
        pace = config.simulation.pace,
        organism = %config.organism.id,
        "Simulation bounds"
    );

    // 3. Create the simulation clock.
    let clock = SimulationClock::from_config(&config.simulation).map_err(EngineError::from)?;
    info!(seconds_per_step = clock.seconds_per_step(), "Simulation clock initialized");

    // 4. Build the organism.
    let registry = Registry::new();
    let layout = OrganismLayout::from_config(&config.organism).map_err(EngineError::from)?;
    info!(
        neurons = layout.neurons.len(),
        muscles = layout.muscles.len(),
        seed = config.organism.seed,
        weights = ?layout.synapse_weights(),
        "Organism layout generated"
    );
    let root = build_organism(&layout, &registry).map_err(EngineError::from)?;

    // 5. Create operator state.
    let operator = Arc::new(Operator::from_config(&config.simulation));
    info!(
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        step_budget_us = u64::try_from(operator.step_budget().as_micros()).unwrap_or(u64::MAX),
        "Operator state initialized"
    );

    // 6. Stop cooperatively on Ctrl-C.
    {
        let operator = Arc::clone(&operator);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after the current tick");
                    operator.request_stop();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    }

    // 7. Run the simulation.
    let mut orchestrator = Orchestrator::new(root, registry, clock, operator);
    let mut callback = SnapshotLogCallback::new(config.logging.snapshot_interval_ticks);
    let result = orchestrator
        .run_simulation(&mut callback)
        .await
        .map_err(EngineError::from)?;

    // 8. Log results.
    runner::log_simulation_end(&result);
    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        snapshots_logged = callback.logged(),
        "mict-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `path`, or defaults if the file does not exist.
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}
