//! Bulk position updates
//!
//! [`BulkPositionUpdater`] propagates every loaded entity once per round on
//! the compute units and collects the results into two flat buffers:
//! `positions` holds `lat, lng, alt` for entity `i` at `3*i..3*i+3`, and
//! `speeds` holds its scalar speed at `i`. The buffers are only written when
//! every unit has reported, and only then copied back onto the entities.
//!
//! A propagation failure (no data, a non-finite result, or a panic inside
//! the propagator) leaves that entity's row zeroed. Rows with `lat == 0 &&
//! lng == 0` are treated as "not written" on copy-back, so such entities keep
//! their previous position instead of jumping to the null point.

use crate::coordinator::{PartitionTask, RoundStats, WorkCoordinator};
use crate::error::{Result, SatMeshError};
use crate::orbit::Propagator;
use crate::types::{Entity, EntityId, GeoCoords, PropagatedState};
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Propagates one entity per index
pub(crate) struct PropagationTask<P> {
    propagator: P,
}

impl<P: Propagator> PartitionTask for PropagationTask<P> {
    type Item = P::Elements;
    type Params = DateTime<Utc>;
    type Output = Option<PropagatedState>;

    fn process(
        &self,
        elements: &[P::Elements],
        index: usize,
        time: &DateTime<Utc>,
    ) -> Option<PropagatedState> {
        let element = &elements[index];
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| self.propagator.propagate(element, *time)));
        match result {
            Ok(state) => state.filter(|s| {
                s.position.lat.is_finite() && s.position.lng.is_finite() && s.position.alt.is_finite()
            }),
            Err(_) => {
                tracing::debug!("Propagator panicked for entity index {}", index);
                None
            }
        }
    }
}

/// Recomputes all entity positions each round on a pool of compute units
pub struct BulkPositionUpdater<P: Propagator> {
    coordinator: WorkCoordinator<PropagationTask<P>>,
    elements: Arc<[P::Elements]>,
    ids: Vec<EntityId>,
    positions: Vec<f64>,
    speeds: Vec<f64>,
    round_time: Option<DateTime<Utc>>,
    rounds_applied: u64,
    last_failures: usize,
}

impl<P> BulkPositionUpdater<P>
where
    P: Propagator,
    P::Elements: Clone,
{
    /// Create an updater with `worker_count` compute units
    pub fn new(worker_count: usize, propagator: P) -> Result<Self> {
        let task = PropagationTask { propagator };
        Ok(Self {
            coordinator: WorkCoordinator::new("positions", worker_count, task)?,
            elements: Arc::from(Vec::new()),
            ids: Vec::new(),
            positions: Vec::new(),
            speeds: Vec::new(),
            round_time: None,
            rounds_applied: 0,
            last_failures: 0,
        })
    }

    /// Replace the entity set
    ///
    /// Any round in flight is abandoned; its results are discarded when they
    /// arrive. The entity order given here is the order results are reported in.
    pub fn load(&mut self, entities: &[Entity<P::Elements>]) {
        self.coordinator.reset();
        self.elements = entities.iter().map(|e| e.elements.clone()).collect();
        self.ids = entities.iter().map(|e| e.id).collect();
        self.positions = vec![0.0; entities.len() * 3];
        self.speeds = vec![0.0; entities.len()];
        self.round_time = None;

        tracing::info!("Position updater loaded {} entities", entities.len());
    }

    /// Number of loaded entities
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no entities are loaded
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether a round is in flight
    pub fn is_running(&self) -> bool {
        self.coordinator.is_in_flight()
    }

    /// Flat `lat, lng, alt` buffer from the last completed round
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Speed buffer (km/s) from the last completed round
    pub fn speeds(&self) -> &[f64] {
        &self.speeds
    }

    /// Position row for entity `index` from the last completed round
    pub fn position(&self, index: usize) -> Option<GeoCoords> {
        let row = self.positions.get(index * 3..index * 3 + 3)?;
        Some(GeoCoords::new(row[0], row[1], row[2]))
    }

    /// Entities the propagator had no result for in the last completed round
    pub fn last_failures(&self) -> usize {
        self.last_failures
    }

    /// Rounds whose results were copied back
    pub fn rounds_applied(&self) -> u64 {
        self.rounds_applied
    }

    /// Time of the round in flight, if any
    pub fn round_time(&self) -> Option<DateTime<Utc>> {
        self.round_time
    }

    /// Statistics of the underlying coordinator
    pub fn stats(&self) -> &RoundStats {
        self.coordinator.stats()
    }

    /// Start propagating all loaded entities to `time`
    ///
    /// Returns `Ok(false)` if a round is already in flight.
    pub fn start_round(&mut self, time: DateTime<Utc>) -> Result<bool> {
        if self.coordinator.is_in_flight() {
            return Ok(false);
        }

        self.coordinator.dispatch(Arc::clone(&self.elements), time)?;
        self.round_time = Some(time);
        Ok(true)
    }

    /// Check the round in flight; on completion copy results onto `entities`
    /// and start the next round at `time`
    ///
    /// `entities` must be the list passed to [`load`](Self::load) (same
    /// length and order). Rows whose id no longer matches are skipped.
    /// Returns `Ok(true)` on the call that applied a round.
    pub fn try_finish_round(
        &mut self,
        entities: &mut [Entity<P::Elements>],
        time: DateTime<Utc>,
    ) -> Result<bool> {
        if entities.len() != self.ids.len() {
            return Err(SatMeshError::EntitySetMismatch {
                expected: self.ids.len(),
                actual: entities.len(),
            });
        }

        if self.coordinator.poll() {
            let outputs = self.coordinator.take_completed().unwrap_or_default();
            self.write_buffers(&outputs);
            self.copy_back(entities);
            self.rounds_applied += 1;
            self.start_round(time)?;
            return Ok(true);
        }

        if !self.coordinator.is_in_flight() {
            self.start_round(time)?;
        }
        Ok(false)
    }

    fn write_buffers(&mut self, outputs: &[Option<PropagatedState>]) {
        self.positions.iter_mut().for_each(|v| *v = 0.0);
        self.speeds.iter_mut().for_each(|v| *v = 0.0);

        let mut failures = 0;
        for (i, output) in outputs.iter().enumerate().take(self.speeds.len()) {
            match output {
                Some(state) => {
                    let row = &mut self.positions[i * 3..i * 3 + 3];
                    row[0] = state.position.lat;
                    row[1] = state.position.lng;
                    row[2] = state.position.alt;
                    self.speeds[i] = state.speed();
                }
                None => failures += 1,
            }
        }

        if failures > 0 {
            tracing::debug!("{} of {} entities had no propagation result", failures, outputs.len());
        }
        self.last_failures = failures;
    }

    fn copy_back(&self, entities: &mut [Entity<P::Elements>]) {
        let mut mismatched = 0;
        for (i, entity) in entities.iter_mut().enumerate() {
            if entity.id != self.ids[i] {
                mismatched += 1;
                continue;
            }
            let row = &self.positions[i * 3..i * 3 + 3];
            let position = GeoCoords::new(row[0], row[1], row[2]);
            if position.is_unset() {
                continue;
            }
            entity.position = position;
            entity.speed = self.speeds[i];
        }

        if mismatched > 0 {
            tracing::warn!(
                "Skipped {} entities whose id differs from the loaded order",
                mismatched
            );
        }
    }
}
