//! SatMesh demo - headless entry point
//!
//! Generates a Walker shell, runs the engine for a configured number of
//! frames with simulated time, and logs positions, graph size and the route
//! between two ground points as they update.
//!
//! Usage: `satmesh-rs [config.toml]` (default: the platform config path)

use anyhow::Context;
use chrono::{Duration, Utc};
use satmesh_rs::{
    config::{default_config_path, AppConfig},
    logging, ChordMetric, CircularOrbitPropagator, ConstellationEngine,
};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .or_else(default_config_path);

    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path),
        None => AppConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    let _log_guard = logging::init(&config.logging).context("failed to initialise logging")?;

    tracing::info!("Starting SatMesh demo");
    if let Some(path) = &config_path {
        tracing::debug!("Config path: {:?}", path);
    }

    let start = Utc::now();
    let entities = config.demo.shell.entities(0, start);
    tracing::info!(
        "Generated {} satellites in {} planes at {} km",
        entities.len(),
        config.demo.shell.planes,
        config.demo.shell.altitude_km
    );

    let mut engine = ConstellationEngine::new(
        &config.engine,
        &config.path,
        CircularOrbitPropagator::default(),
        ChordMetric::default(),
    )
    .context("failed to start engine")?;
    engine.load(entities);
    engine.request_route(config.demo.route_start, config.demo.route_goal);

    let step_ms = (config.demo.seconds_per_frame * 1000.0) as i64;
    let sleep = std::time::Duration::from_millis(config.demo.frame_sleep_ms);

    for frame in 0..config.demo.frames {
        let time = start + Duration::milliseconds(step_ms * i64::from(frame));
        let report = engine.tick(time)?;

        if report.graph_published {
            let graph = engine.graph();
            tracing::info!(
                "Frame {}: graph {} with {} nodes, {} links",
                frame,
                graph.build(),
                graph.len(),
                graph.undirected_links().len()
            );
        }

        if report.route_recomputed {
            match engine.route() {
                Some(route) => tracing::info!(
                    "Frame {}: route {} -> {} over {} hops, {:.0} km",
                    frame,
                    route.start,
                    route.goal,
                    route.len(),
                    route.cost
                ),
                None => tracing::info!("Frame {}: no route", frame),
            }
        }

        std::thread::sleep(sleep);
    }

    if let Some(route) = engine.route() {
        println!("{}", route.to_json()?);
    }

    let stats = engine.stats();
    tracing::info!(
        "Done: {} frames, {} position rounds, {} graphs, {} route searches, {} desync faults",
        stats.frames,
        stats.position_rounds_applied,
        stats.graphs_published,
        stats.routes_computed,
        stats.positions.desync_faults + stats.graph.desync_faults
    );

    Ok(())
}
