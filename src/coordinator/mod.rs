//! Epoch-tagged fan-out/fan-in over a fixed pool of compute units
//!
//! [`WorkCoordinator`] owns `W` worker threads. A round splits a batch of `N`
//! items into `W` contiguous partitions (see [`partition`]), sends one to each
//! unit tagged with the current epoch, and collects one report per unit.
//!
//! # Frame-driven polling
//!
//! Nothing here blocks the caller. [`WorkCoordinator::dispatch`] returns as
//! soon as the commands are queued, and the caller checks for completion
//! once per frame with [`WorkCoordinator::poll`], which drains whatever reports
//! have arrived with `try_recv`.
//!
//! # Staleness
//!
//! [`WorkCoordinator::reset`] bumps the epoch and forgets the round in flight.
//! Units cannot be preempted, so each may still finish the abandoned
//! partition; its report carries the old epoch and is dropped on arrival.
//!
//! # Faults
//!
//! A report with the wrong length, an unassigned range, an epoch that was
//! never issued, or a panic inside the task is a protocol fault. It is logged,
//! counted in [`RoundStats`], and the round is abandoned through the same
//! path as `reset`, so the next dispatch starts clean.
//!
//! # Example
//!
//! ```ignore
//! let mut coordinator = WorkCoordinator::new("squares", 4, SquareTask)?;
//! coordinator.dispatch(vec![1u64, 2, 3], ())?;
//! loop {
//!     if coordinator.poll() {
//!         let squares = coordinator.take_completed().unwrap_or_default();
//!         break;
//!     }
//!     // render a frame...
//! }
//! ```

pub mod partition;
mod unit;

pub use partition::{partition_range, partition_ranges};

use crate::error::{Result, SatMeshError};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::ops::Range;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use unit::{Assignment, ComputeUnit, UnitCommand, UnitOutcome, UnitReport};

/// Per-item work executed inside a compute unit
///
/// A unit calls [`PartitionTask::process`] once for every index it owns. The
/// task sees the whole batch, so neighbourhood-style work (all pairs against
/// the unit's own range) needs no extra plumbing.
pub trait PartitionTask: Send + Sync + 'static {
    /// Element type of the dispatched batch
    type Item: Send + Sync + 'static;
    /// Round-wide parameters shared by all units (e.g. a timestamp)
    type Params: Send + Sync + 'static;
    /// Result produced for one index
    type Output: Send + 'static;

    /// Compute the result for `items[index]`
    fn process(&self, items: &[Self::Item], index: usize, params: &Self::Params) -> Self::Output;
}

/// Counters describing the coordinator's history
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundStats {
    /// Rounds handed to the units (including empty rounds)
    pub rounds_dispatched: u64,
    /// Rounds whose results were all collected
    pub rounds_completed: u64,
    /// Rounds abandoned by a reset or a fault
    pub rounds_abandoned: u64,
    /// Reports dropped because their epoch had been superseded
    pub stale_reports: u64,
    /// Reports dropped because the unit had already reported this epoch
    pub duplicate_reports: u64,
    /// Malformed reports and unit panics
    pub desync_faults: u64,
    /// Wall time of the most recently completed round
    pub last_round_duration: Option<Duration>,
}

struct UnitHandle<T: PartitionTask> {
    command_tx: Sender<UnitCommand<T>>,
    thread: Option<JoinHandle<()>>,
}

struct Round<O> {
    expected: usize,
    received: usize,
    ranges: Vec<Range<usize>>,
    slots: Vec<Option<Vec<O>>>,
    started: Instant,
}

/// Generic fan-out/fan-in coordinator with staleness protection
pub struct WorkCoordinator<T: PartitionTask> {
    name: String,
    units: Vec<UnitHandle<T>>,
    report_rx: Receiver<UnitReport<T::Output>>,
    epoch: u64,
    round: Option<Round<T::Output>>,
    completed: Option<Vec<T::Output>>,
    stats: RoundStats,
}

impl<T: PartitionTask> WorkCoordinator<T> {
    /// Spawn `worker_count` compute units running `task`
    pub fn new(name: impl Into<String>, worker_count: usize, task: T) -> Result<Self> {
        if worker_count == 0 {
            return Err(SatMeshError::InvalidWorkerCount(worker_count));
        }

        let name = name.into();
        let task = Arc::new(task);
        let (report_tx, report_rx) = unbounded();
        let mut units = Vec::with_capacity(worker_count);

        for index in 0..worker_count {
            let (command_tx, command_rx) = unbounded();
            let unit = ComputeUnit::new(index, Arc::clone(&task), command_rx, report_tx.clone());
            let thread = std::thread::Builder::new()
                .name(format!("{}-unit-{}", name, index))
                .spawn(move || unit.run())
                .map_err(SatMeshError::WorkerSpawn)?;
            units.push(UnitHandle {
                command_tx,
                thread: Some(thread),
            });
        }

        tracing::debug!("Coordinator '{}' started {} compute units", name, worker_count);

        Ok(Self {
            name,
            units,
            report_rx,
            epoch: 0,
            round: None,
            completed: None,
            stats: RoundStats::default(),
        })
    }

    /// Name used for thread names and log lines
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of compute units (`W`)
    pub fn worker_count(&self) -> usize {
        self.units.len()
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether a round is dispatched and not yet complete
    pub fn is_in_flight(&self) -> bool {
        self.round.is_some()
    }

    /// Coordinator statistics
    pub fn stats(&self) -> &RoundStats {
        &self.stats
    }

    /// Start a new epoch, abandoning any round in flight
    ///
    /// Units are told about the new epoch so they can skip queued work from
    /// the old one. Work already running completes and is discarded on arrival.
    pub fn reset(&mut self) {
        self.epoch += 1;
        if self.round.take().is_some() {
            self.stats.rounds_abandoned += 1;
        }
        self.completed = None;

        for (index, unit) in self.units.iter().enumerate() {
            if unit
                .command_tx
                .send(UnitCommand::Reset { epoch: self.epoch })
                .is_err()
            {
                tracing::debug!("Coordinator '{}': unit {} gone during reset", self.name, index);
            }
        }

        tracing::debug!("Coordinator '{}' reset to epoch {}", self.name, self.epoch);
    }

    /// Partition `items` across the units and start a round
    ///
    /// An empty batch contacts no units and completes on the next poll.
    /// Calling this while the current epoch still has results outstanding is
    /// an error; call [`reset`](Self::reset) first to abandon that round.
    pub fn dispatch(&mut self, items: impl Into<Arc<[T::Item]>>, params: T::Params) -> Result<()> {
        if self.round.is_some() {
            return Err(SatMeshError::RoundInFlight { epoch: self.epoch });
        }

        let items: Arc<[T::Item]> = items.into();
        let params = Arc::new(params);
        let len = items.len();
        let worker_count = self.units.len();
        self.completed = None;
        self.stats.rounds_dispatched += 1;

        if len == 0 {
            self.round = Some(Round {
                expected: 0,
                received: 0,
                ranges: Vec::new(),
                slots: Vec::new(),
                started: Instant::now(),
            });
            tracing::trace!("Coordinator '{}' dispatched empty round", self.name);
            return Ok(());
        }

        let ranges: Vec<_> = partition_ranges(len, worker_count).collect();
        for (index, range) in ranges.iter().enumerate() {
            let assignment = Assignment {
                epoch: self.epoch,
                range: range.clone(),
                items: Arc::clone(&items),
                params: Arc::clone(&params),
            };
            if self.units[index]
                .command_tx
                .send(UnitCommand::Assign(assignment))
                .is_err()
            {
                // Units that did receive work must not complete this round.
                self.stats.rounds_dispatched -= 1;
                self.reset();
                return Err(SatMeshError::WorkerDisconnected { unit: index });
            }
        }

        self.round = Some(Round {
            expected: worker_count,
            received: 0,
            ranges,
            slots: (0..worker_count).map(|_| None).collect(),
            started: Instant::now(),
        });

        tracing::trace!(
            "Coordinator '{}' dispatched {} items to {} units (epoch {})",
            self.name,
            len,
            worker_count,
            self.epoch
        );
        Ok(())
    }

    /// Collect arrived reports; true exactly once per completed round
    ///
    /// On completion the round's outputs are concatenated in partition order
    /// (so output `i` belongs to item `i`) and held for
    /// [`take_completed`](Self::take_completed). The coordinator is then idle
    /// and a new dispatch may proceed.
    pub fn poll(&mut self) -> bool {
        loop {
            match self.report_rx.try_recv() {
                Ok(report) => self.handle_report(report),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!("Coordinator '{}': all compute units have exited", self.name);
                    break;
                }
            }
        }

        let finished = self
            .round
            .as_ref()
            .is_some_and(|round| round.received == round.expected);
        if !finished {
            return false;
        }

        let Some(round) = self.round.take() else {
            return false;
        };
        let duration = round.started.elapsed();
        let outputs: Vec<T::Output> = round.slots.into_iter().flatten().flatten().collect();

        self.stats.rounds_completed += 1;
        self.stats.last_round_duration = Some(duration);
        tracing::trace!(
            "Coordinator '{}' completed epoch {} ({} outputs in {:?})",
            self.name,
            self.epoch,
            outputs.len(),
            duration
        );

        self.completed = Some(outputs);
        true
    }

    /// Outputs of the most recently completed round, if not yet taken
    pub fn take_completed(&mut self) -> Option<Vec<T::Output>> {
        self.completed.take()
    }

    fn handle_report(&mut self, report: UnitReport<T::Output>) {
        if report.epoch < self.epoch {
            self.stats.stale_reports += 1;
            tracing::trace!(
                "Coordinator '{}': dropped stale report from unit {} (epoch {} < {})",
                self.name,
                report.unit,
                report.epoch,
                self.epoch
            );
            return;
        }

        if report.epoch > self.epoch {
            self.fault(format!(
                "unit {} reported epoch {} which was never issued (current {})",
                report.unit, report.epoch, self.epoch
            ));
            return;
        }

        let Some(round) = self.round.as_mut() else {
            // Current epoch but nothing in flight: the round already completed.
            self.stats.duplicate_reports += 1;
            return;
        };

        let Some(assigned) = round.ranges.get(report.unit).cloned() else {
            self.fault(format!("report from unknown unit {}", report.unit));
            return;
        };

        if round.slots[report.unit].is_some() {
            self.stats.duplicate_reports += 1;
            tracing::trace!(
                "Coordinator '{}': duplicate report from unit {}",
                self.name,
                report.unit
            );
            return;
        }

        let outputs = match report.outcome {
            UnitOutcome::Completed(outputs) => outputs,
            UnitOutcome::Faulted(message) => {
                self.fault(format!("unit {} panicked: {}", report.unit, message));
                return;
            }
        };

        if report.range != assigned || outputs.len() != assigned.len() {
            self.fault(format!(
                "unit {} returned {} results for range {:?}, assigned {:?}",
                report.unit,
                outputs.len(),
                report.range,
                assigned
            ));
            return;
        }

        round.slots[report.unit] = Some(outputs);
        round.received += 1;
    }

    fn fault(&mut self, message: String) {
        self.stats.desync_faults += 1;
        tracing::warn!(
            "Coordinator '{}' protocol fault at epoch {}: {}; abandoning round",
            self.name,
            self.epoch,
            message
        );
        self.reset();
    }
}

impl<T: PartitionTask> Drop for WorkCoordinator<T> {
    fn drop(&mut self) {
        for unit in &self.units {
            let _ = unit.command_tx.send(UnitCommand::Shutdown);
        }
        for unit in &mut self.units {
            if let Some(thread) = unit.thread.take() {
                if thread.join().is_err() {
                    tracing::error!("Coordinator '{}': compute unit panicked on exit", self.name);
                }
            }
        }
    }
}
