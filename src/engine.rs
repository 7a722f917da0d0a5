//! Frame-driven constellation engine
//!
//! [`ConstellationEngine`] owns the entity list and the three background
//! subsystems, and advances them from the caller's frame loop:
//!
//! 1. finish the position round in flight (copying positions back onto the
//!    entities) and start the next one,
//! 2. every `graph_rebuild_interval_frames` frames, finish the proximity
//!    build in flight and start the next one from the latest positions,
//! 3. when a new graph was published and a route is requested, search it.
//!
//! No step blocks: a frame in which no background work has finished costs
//! two channel polls.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = ConstellationEngine::new(
//!     &config.engine,
//!     &config.path,
//!     CircularOrbitPropagator::default(),
//!     ChordMetric::default(),
//! )?;
//! engine.load(shell.entities(0, Utc::now()));
//! engine.request_route(start, goal);
//!
//! loop {
//!     let report = engine.tick(Utc::now())?;
//!     if report.route_recomputed {
//!         draw_route(engine.route());
//!     }
//! }
//! ```

use crate::config::{EngineConfig, PathConfig};
use crate::coordinator::RoundStats;
use crate::error::{Result, ResultExt};
use crate::geo::Metric;
use crate::graph::{Graph, ProximityGraphBuilder};
use crate::orbit::Propagator;
use crate::pathfinder::{PathFinder, Route};
use crate::positions::BulkPositionUpdater;
use crate::types::{Entity, GeoCoords};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What changed during one [`ConstellationEngine::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// A position round was copied onto the entities
    pub positions_updated: bool,
    /// A new graph was published
    pub graph_published: bool,
    /// The requested route was searched on the new graph
    pub route_recomputed: bool,
}

/// Engine-wide statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// Frames ticked
    pub frames: u64,
    /// Position coordinator counters
    pub positions: RoundStats,
    /// Proximity coordinator counters
    pub graph: RoundStats,
    /// Position rounds copied back
    pub position_rounds_applied: u64,
    /// Graphs published
    pub graphs_published: u64,
    /// Route searches run
    pub routes_computed: u64,
    /// Cost of the most recent successful route in km
    pub last_route_cost: Option<f64>,
}

/// An active route request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub start: GeoCoords,
    pub goal: GeoCoords,
}

/// Entities plus the position, graph and route subsystems
pub struct ConstellationEngine<P: Propagator, M: Metric + Clone> {
    entities: Vec<Entity<P::Elements>>,
    positions: BulkPositionUpdater<P>,
    graph: ProximityGraphBuilder<M>,
    finder: PathFinder<M>,
    rebuild_interval: u64,
    request: Option<RouteRequest>,
    route: Option<Route>,
    frames: u64,
    routes_computed: u64,
    last_route_cost: Option<f64>,
}

impl<P, M> ConstellationEngine<P, M>
where
    P: Propagator,
    P::Elements: Clone,
    M: Metric + Clone,
{
    /// Create an engine; spawns `engine.worker_count` units per subsystem
    pub fn new(engine: &EngineConfig, path: &PathConfig, propagator: P, metric: M) -> Result<Self> {
        let positions = BulkPositionUpdater::new(engine.worker_count, propagator)
            .context("Failed to start position units")?;
        let graph = ProximityGraphBuilder::new(
            engine.worker_count,
            engine.proximity_threshold_km,
            metric.clone(),
        )
        .context("Failed to start proximity units")?;

        tracing::info!(
            "Engine started: {} units per subsystem, {} km link threshold",
            engine.worker_count,
            engine.proximity_threshold_km
        );

        Ok(Self {
            entities: Vec::new(),
            positions,
            graph,
            finder: PathFinder::from_config(metric, path),
            rebuild_interval: u64::from(engine.graph_rebuild_interval_frames.max(1)),
            request: None,
            route: None,
            frames: 0,
            routes_computed: 0,
            last_route_cost: None,
        })
    }

    /// Replace the entity set
    ///
    /// Rounds in flight for the old set are abandoned. The published graph
    /// and route stay visible until the first build over the new set completes.
    pub fn load(&mut self, entities: Vec<Entity<P::Elements>>) {
        self.positions.load(&entities);
        self.graph.cancel();
        self.entities = entities;
    }

    /// Current entities
    pub fn entities(&self) -> &[Entity<P::Elements>] {
        &self.entities
    }

    /// Latest published graph
    pub fn graph(&self) -> Arc<Graph> {
        self.graph.published()
    }

    /// Flat position buffer of the last applied round
    pub fn position_buffer(&self) -> &[f64] {
        self.positions.positions()
    }

    /// Speed buffer of the last applied round
    pub fn speed_buffer(&self) -> &[f64] {
        self.positions.speeds()
    }

    /// Latest route for the active request
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    /// Active route request
    pub fn route_request(&self) -> Option<RouteRequest> {
        self.request
    }

    /// Request a route; it is searched now and again on every new graph
    pub fn request_route(&mut self, start: GeoCoords, goal: GeoCoords) -> Option<&Route> {
        self.request = Some(RouteRequest { start, goal });
        self.recompute_route();
        self.route.as_ref()
    }

    /// Drop the route request and its result
    pub fn clear_route(&mut self) {
        self.request = None;
        self.route = None;
    }

    /// One-off search on the latest published graph
    pub fn find_path(&self, start: &GeoCoords, goal: &GeoCoords) -> Option<Route> {
        self.finder.find_path(&self.graph.published(), start, goal)
    }

    /// Advance one frame
    pub fn tick(&mut self, time: DateTime<Utc>) -> Result<FrameReport> {
        self.frames += 1;
        let mut report = FrameReport {
            positions_updated: self.positions.try_finish_round(&mut self.entities, time)?,
            ..FrameReport::default()
        };

        if self.frames % self.rebuild_interval == 0 {
            report.graph_published = self.graph.try_finish_build(&self.entities)?;
        }

        if report.graph_published && self.request.is_some() {
            self.recompute_route();
            report.route_recomputed = true;
        }

        Ok(report)
    }

    fn recompute_route(&mut self) {
        let Some(request) = self.request else {
            return;
        };

        let graph = self.graph.published();
        self.route = self.finder.find_path(&graph, &request.start, &request.goal);
        self.routes_computed += 1;

        match &self.route {
            Some(route) => {
                self.last_route_cost = Some(route.cost);
                tracing::debug!(
                    "Route {} -> {}: {} hops, {:.1} km",
                    route.start,
                    route.goal,
                    route.len(),
                    route.cost
                );
            }
            None => tracing::debug!("No route on graph {}", graph.build()),
        }
    }

    /// Engine statistics
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frames: self.frames,
            positions: self.positions.stats().clone(),
            graph: self.graph.stats().clone(),
            position_rounds_applied: self.positions.rounds_applied(),
            graphs_published: self.graph.builds_published(),
            routes_computed: self.routes_computed,
            last_route_cost: self.last_route_cost,
        }
    }
}
