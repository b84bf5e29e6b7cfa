//! Headless driver binary for the lanesim queueing simulation.
//!
//! This is the repository's stand-in for the presentation layer: it
//! supplies the Motion capability (the deterministic virtual-time
//! scheduler), assembles the topology, generates a reproducible workload,
//! observes lifecycle notifications for statistics, and logs a run
//! summary. It loads configuration, wires everything together, and runs
//! the event loop to quiescence.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `lanesim-config.yaml`
//! 3. Build the simulation over virtual motion and the stats observer
//! 4. Register the initial lanes and the two clients
//! 5. Build the seeded workload plan
//! 6. Replay the plan against the virtual clock, then drain
//! 7. Log the run report (and write it as JSON if requested)

mod error;
mod stats;
mod workload;

use std::path::Path;

use lanesim_core::{SimConfig, Simulation, VirtualMotion};
use lanesim_types::{ClientId, Priority};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::stats::StatsObserver;
use crate::workload::PlannedSend;

/// Environment variable naming a path for the JSON run report.
const REPORT_PATH_VAR: &str = "LANESIM_REPORT";

/// Application entry point for the driver.
///
/// # Errors
///
/// Returns an error if configuration loading, the simulation itself, or
/// report writing fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("lanesim-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        lanes = config.topology.initial_lanes,
        capacity = config.queue.capacity,
        speed = config.motion.speed,
        requests = config.workload.request_count,
        interval_ms = config.workload.interval_millis,
        seed = config.workload.seed,
        "Configuration loaded"
    );

    // 3. Build the simulation over virtual motion and the stats observer.
    let mut sim = Simulation::new(&config, VirtualMotion::new(), StatsObserver::new());

    // 4. Register the initial topology and the clients.
    for _ in 0..config.topology.initial_lanes {
        sim.add_lane()?;
    }
    let normal_client = sim.add_client(Priority::Normal);
    let high_client = sim.add_client(Priority::High);
    info!(lanes = sim.lane_count(), "Topology assembled");

    // 5. Build the workload plan.
    let plan = workload::build_plan(&config.workload);
    info!(sends = plan.len(), "Workload plan built");

    // 6. Replay the plan, then drain the schedule.
    let sent = run_plan(&mut sim, &plan, normal_client, high_client)?;
    sim.run_until_idle()?;

    // 7. Report.
    let ran_for = sim.now();
    let report = sim.observer().report(sent, ran_for);
    info!(
        sent = report.sent,
        completed = report.completed,
        dropped = report.dropped,
        drop_rate_per_sec = %report.drop_rate_display(),
        virtual_ms = report.virtual_duration_micros.checked_div(1_000).unwrap_or(0),
        "Run finished"
    );
    for (reason, count) in &report.dropped_by_reason {
        info!(%reason, count, "drops by reason");
    }

    if let Ok(path) = std::env::var(REPORT_PATH_VAR) {
        write_report(&report, Path::new(&path))?;
        info!(path = %path, "Run report written");
    }

    info!("lanesim-engine shutdown complete");
    Ok(())
}

/// Replay the workload plan: advance virtual time to each send instant
/// (firing everything due on the way) and issue the routing call.
fn run_plan(
    sim: &mut Simulation<VirtualMotion, StatsObserver>,
    plan: &[PlannedSend],
    normal_client: ClientId,
    high_client: ClientId,
) -> Result<u64, EngineError> {
    let mut sent: u64 = 0;
    for send in plan {
        sim.run_until(send.at)?;
        let client = match send.priority {
            Priority::High => high_client,
            Priority::Normal => normal_client,
        };
        sim.send_request(client)?;
        sent = sent.saturating_add(1);
    }
    Ok(sent)
}

/// Load the simulation configuration from `lanesim-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<SimConfig, EngineError> {
    let config_path = Path::new("lanesim-config.yaml");
    if config_path.exists() {
        let config = SimConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimConfig::default())
    }
}

/// Write the run report as pretty-printed JSON.
fn write_report(report: &stats::RunReport, path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(report).map_err(|e| EngineError::Report {
        message: format!("failed to serialize report: {e}"),
    })?;
    std::fs::write(path, json).map_err(|e| EngineError::Report {
        message: format!("failed to write {}: {e}", path.display()),
    })
}
