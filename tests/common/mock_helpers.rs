//! Mock collaborators for driving the engine deterministically

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use satmesh_rs::{GeoCoords, PropagatedState, Propagator, Velocity};

/// Elements for [`MarkerPropagator`]: the latitude every round reports
pub type Marker = f64;

/// Reports `lat = marker`, `lng = minutes since epoch`, `alt = 550`
///
/// When gated, every propagation first waits for one token on the gate, so
/// a test can hold a round in flight for as long as it needs.
pub struct MarkerPropagator {
    epoch: DateTime<Utc>,
    gate: Option<Receiver<()>>,
}

impl MarkerPropagator {
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self { epoch, gate: None }
    }

    /// Propagator that blocks until released, plus its release handle
    pub fn gated(epoch: DateTime<Utc>) -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        (
            Self {
                epoch,
                gate: Some(rx),
            },
            tx,
        )
    }

    /// Position this propagator reports for `marker` at `time`
    pub fn expected(&self, marker: Marker, time: DateTime<Utc>) -> GeoCoords {
        let minutes = (time - self.epoch).num_seconds() as f64 / 60.0;
        GeoCoords::new(marker, 1.0 + minutes, 550.0)
    }
}

impl Propagator for MarkerPropagator {
    type Elements = Marker;

    fn propagate(&self, marker: &Marker, time: DateTime<Utc>) -> Option<PropagatedState> {
        if let Some(gate) = &self.gate {
            gate.recv_timeout(std::time::Duration::from_secs(5)).ok()?;
        }
        Some(PropagatedState {
            position: self.expected(*marker, time),
            velocity: Velocity::new(0.0, 7.5, 0.0),
        })
    }
}

/// Release `count` gated propagations
pub fn release(gate: &Sender<()>, count: usize) {
    for _ in 0..count {
        let _ = gate.send(());
    }
}
