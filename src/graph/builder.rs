//! Double-buffered proximity graph construction
//!
//! The builder keeps two graphs: the published snapshot, which readers see,
//! and a pending one that is only swapped in once every compute unit has
//! reported its adjacency rows. A reader therefore never observes a graph
//! with some nodes linked and others still empty.

use super::Graph;
use crate::coordinator::{PartitionTask, RoundStats, WorkCoordinator};
use crate::error::Result;
use crate::geo::Metric;
use crate::types::{GeoCoords, Tracked};
use std::sync::Arc;

/// Computes one node's adjacency row against the whole position batch
pub(crate) struct ProximityTask<M> {
    metric: M,
    threshold_km: f64,
}

impl<M: Metric> PartitionTask for ProximityTask<M> {
    type Item = GeoCoords;
    type Params = ();
    type Output = Vec<usize>;

    fn process(&self, positions: &[GeoCoords], index: usize, _: &()) -> Vec<usize> {
        let origin = &positions[index];
        positions
            .iter()
            .enumerate()
            .filter(|&(j, p)| j != index && self.metric.distance(origin, p) < self.threshold_km)
            .map(|(j, _)| j)
            .collect()
    }
}

/// Graph whose adjacency is still being computed
struct PendingBuild {
    graph: Graph,
}

/// Rebuilds the proximity graph in the background and publishes it atomically
pub struct ProximityGraphBuilder<M: Metric> {
    coordinator: WorkCoordinator<ProximityTask<M>>,
    published: Arc<Graph>,
    pending: Option<PendingBuild>,
    threshold_km: f64,
    builds_started: u64,
    builds_published: u64,
}

impl<M: Metric> ProximityGraphBuilder<M> {
    /// Create a builder with `worker_count` units linking nodes closer than `threshold_km`
    pub fn new(worker_count: usize, threshold_km: f64, metric: M) -> Result<Self> {
        let task = ProximityTask {
            metric,
            threshold_km,
        };
        Ok(Self {
            coordinator: WorkCoordinator::new("proximity", worker_count, task)?,
            published: Arc::new(Graph::empty()),
            pending: None,
            threshold_km,
            builds_started: 0,
            builds_published: 0,
        })
    }

    /// Latest complete graph
    pub fn published(&self) -> Arc<Graph> {
        Arc::clone(&self.published)
    }

    /// Link threshold in km
    pub fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Whether a build is in flight
    pub fn is_building(&self) -> bool {
        self.pending.is_some() && self.coordinator.is_in_flight()
    }

    /// Number of graphs published since creation
    pub fn builds_published(&self) -> u64 {
        self.builds_published
    }

    /// Statistics of the underlying coordinator
    pub fn stats(&self) -> &RoundStats {
        self.coordinator.stats()
    }

    /// Start building a graph over the entities' current positions
    ///
    /// Returns `Ok(false)` without doing anything if a build is already in
    /// flight; entities that moved since will be picked up by the next build.
    pub fn begin_build<T: Tracked>(&mut self, entities: &[T]) -> Result<bool> {
        if self.is_building() {
            return Ok(false);
        }

        self.builds_started += 1;
        let graph = Graph::with_nodes(entities, self.builds_started);
        let positions: Vec<GeoCoords> = entities.iter().map(|e| e.position()).collect();

        self.coordinator.dispatch(positions, ())?;
        self.pending = Some(PendingBuild { graph });

        tracing::trace!(
            "Proximity build {} started over {} entities",
            self.builds_started,
            entities.len()
        );
        Ok(true)
    }

    /// Check the build in flight; publish it and start the next one when done
    ///
    /// Returns `Ok(true)` on the call that published a new graph. If the
    /// previous build was abandoned (a unit fault) or never started, a fresh
    /// build is started from `entities`.
    pub fn try_finish_build<T: Tracked>(&mut self, entities: &[T]) -> Result<bool> {
        if self.coordinator.poll() {
            let adjacency = self.coordinator.take_completed().unwrap_or_default();
            match self.pending.take() {
                Some(PendingBuild { mut graph }) => {
                    graph.set_adjacency(adjacency);
                    tracing::debug!(
                        "Published proximity graph {} ({} nodes, {} edges)",
                        graph.build(),
                        graph.len(),
                        graph.edge_count()
                    );
                    self.published = Arc::new(graph);
                    self.builds_published += 1;
                }
                None => {
                    tracing::warn!("Proximity round completed without a pending graph");
                }
            }
            self.begin_build(entities)?;
            return Ok(true);
        }

        if !self.coordinator.is_in_flight() {
            if self.pending.take().is_some() {
                tracing::debug!("Restarting abandoned proximity build");
            }
            self.begin_build(entities)?;
        }
        Ok(false)
    }

    /// Abandon the build in flight (e.g. the entity set changed)
    ///
    /// The published graph is kept until the next build completes.
    pub fn cancel(&mut self) {
        self.coordinator.reset();
        self.pending = None;
    }
}
