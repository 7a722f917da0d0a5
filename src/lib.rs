//! # SatMesh-RS: satellite constellation connectivity engine
//!
//! Keeps a large set of moving entities (satellites) positioned, maintains a
//! proximity graph over them, and answers shortest-route queries on that
//! graph, all driven from a frame loop that must never block.
//!
//! ## Architecture
//!
//! - **Coordinator**: epoch-tagged fan-out/fan-in over a fixed pool of
//!   compute units, polled once per frame
//! - **Positions**: bulk propagation of every entity into flat result buffers
//! - **Graph**: double-buffered proximity graph, published atomically as `Arc<Graph>`
//! - **Pathfinder**: A* over the published graph with per-search scratch state
//! - **Engine**: frame-driven facade tying the three together
//! - **Communication**: Crossbeam channels between the frame loop and the units
//!
//! ## Collaborators
//!
//! Orbit propagation and distance are plugged in through the
//! [`Propagator`](orbit::Propagator) and [`Metric`](geo::Metric) traits. A
//! circular two-body propagator and a chord metric ship with the crate.
//!
//! ## Example
//!
//! ```ignore
//! use satmesh_rs::{
//!     config::AppConfig, geo::ChordMetric, orbit::CircularOrbitPropagator,
//!     ConstellationEngine,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load_or_default("satmesh.toml");
//!     let mut engine = ConstellationEngine::new(
//!         &config.engine,
//!         &config.path,
//!         CircularOrbitPropagator::default(),
//!         ChordMetric::default(),
//!     )?;
//!     engine.load(config.demo.shell.entities(0, chrono::Utc::now()));
//!
//!     loop {
//!         let report = engine.tick(chrono::Utc::now())?;
//!         // draw entities, links and route...
//!     }
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod geo;
pub mod graph;
pub mod logging;
pub mod orbit;
pub mod pathfinder;
pub mod positions;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, EngineConfig, PathConfig};
pub use coordinator::{PartitionTask, RoundStats, WorkCoordinator};
pub use engine::{ConstellationEngine, EngineStats, FrameReport};
pub use error::{Result, SatMeshError};
pub use geo::{ChordMetric, Metric};
pub use graph::{Graph, GraphNode, Link, ProximityGraphBuilder};
pub use orbit::{CircularOrbit, CircularOrbitPropagator, Propagator, WalkerShell};
pub use pathfinder::{PathFinder, Route, RouteHop};
pub use positions::BulkPositionUpdater;
pub use types::{Entity, EntityId, GeoCoords, PropagatedState, Tracked, Velocity};
