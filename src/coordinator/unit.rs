//! Compute unit thread
//!
//! A unit is a pure function of its current assignment. It holds no state
//! across epochs apart from the newest epoch it has been told about. Before
//! starting an assignment it drains its queue, so work superseded while still
//! queued is never started: each unit wastes at most the one partition it was
//! already running when the epoch moved on.
//!
//! Units never talk to each other; everything arrives through the command
//! channel and leaves through the shared report channel.

use super::PartitionTask;
use crossbeam_channel::{Receiver, Sender};
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// One partition of work for one unit
pub(crate) struct Assignment<T: PartitionTask> {
    /// Epoch the work belongs to
    pub epoch: u64,
    /// Index range this unit owns
    pub range: Range<usize>,
    /// The whole batch (units may read outside their range)
    pub items: Arc<[T::Item]>,
    /// Round-wide parameters
    pub params: Arc<T::Params>,
}

/// Commands sent from the coordinator to a unit
pub(crate) enum UnitCommand<T: PartitionTask> {
    /// Process a partition and report back
    Assign(Assignment<T>),
    /// A new epoch has started; anything older is abandoned
    Reset { epoch: u64 },
    /// Exit the thread
    Shutdown,
}

/// Outcome of processing one partition
#[derive(Debug)]
pub(crate) enum UnitOutcome<O> {
    /// One output per index in the assigned range, in index order
    Completed(Vec<O>),
    /// The task panicked; the message is the panic payload if it was a string
    Faulted(String),
}

/// Report sent from a unit to the coordinator
#[derive(Debug)]
pub(crate) struct UnitReport<O> {
    /// Reporting unit
    pub unit: usize,
    /// Epoch the work was assigned under
    pub epoch: u64,
    /// Range the unit processed
    pub range: Range<usize>,
    /// Results or fault
    pub outcome: UnitOutcome<O>,
}

/// Worker side of one compute unit
pub(crate) struct ComputeUnit<T: PartitionTask> {
    index: usize,
    task: Arc<T>,
    command_rx: Receiver<UnitCommand<T>>,
    report_tx: Sender<UnitReport<T::Output>>,
    /// Newest epoch announced by a Reset or Assign
    latest_epoch: u64,
}

impl<T: PartitionTask> ComputeUnit<T> {
    pub(crate) fn new(
        index: usize,
        task: Arc<T>,
        command_rx: Receiver<UnitCommand<T>>,
        report_tx: Sender<UnitReport<T::Output>>,
    ) -> Self {
        Self {
            index,
            task,
            command_rx,
            report_tx,
            latest_epoch: 0,
        }
    }

    /// Run until shut down or the coordinator goes away
    pub(crate) fn run(mut self) {
        tracing::trace!("Compute unit {} started", self.index);

        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                UnitCommand::Assign(assignment) => {
                    let (assignment, shutdown) = self.newest_queued(assignment);
                    if shutdown {
                        break;
                    }
                    if assignment.epoch < self.latest_epoch {
                        tracing::trace!(
                            "Unit {} skipping queued assignment for epoch {} (now {})",
                            self.index,
                            assignment.epoch,
                            self.latest_epoch
                        );
                        continue;
                    }
                    self.latest_epoch = assignment.epoch;

                    let report = self.process(assignment);
                    if self.report_tx.send(report).is_err() {
                        break;
                    }
                }
                UnitCommand::Reset { epoch } => {
                    self.latest_epoch = self.latest_epoch.max(epoch);
                }
                UnitCommand::Shutdown => break,
            }
        }

        tracing::trace!("Compute unit {} stopped", self.index);
    }

    /// Drain commands queued behind `assignment` without blocking
    ///
    /// Resets raise `latest_epoch` and a later assignment replaces an earlier
    /// one, so only the newest queued work is ever started. Returns true as the
    /// second element when a shutdown was queued.
    fn newest_queued(&mut self, mut assignment: Assignment<T>) -> (Assignment<T>, bool) {
        loop {
            match self.command_rx.try_recv() {
                Ok(UnitCommand::Assign(next)) => {
                    tracing::trace!(
                        "Unit {} dropping queued assignment for epoch {} in favour of epoch {}",
                        self.index,
                        assignment.epoch,
                        next.epoch
                    );
                    assignment = next;
                }
                Ok(UnitCommand::Reset { epoch }) => {
                    self.latest_epoch = self.latest_epoch.max(epoch);
                }
                Ok(UnitCommand::Shutdown) => return (assignment, true),
                Err(_) => return (assignment, false),
            }
        }
    }

    fn process(&self, assignment: Assignment<T>) -> UnitReport<T::Output> {
        let Assignment {
            epoch,
            range,
            items,
            params,
        } = assignment;

        let task = &self.task;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            range
                .clone()
                .map(|index| task.process(&items, index, &params))
                .collect::<Vec<_>>()
        }));

        let outcome = match result {
            Ok(outputs) => UnitOutcome::Completed(outputs),
            Err(payload) => UnitOutcome::Faulted(panic_message(payload.as_ref())),
        };

        UnitReport {
            unit: self.index,
            epoch,
            range,
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        calls: AtomicUsize,
    }

    impl PartitionTask for CountingTask {
        type Item = u64;
        type Params = ();
        type Output = u64;

        fn process(&self, items: &[u64], index: usize, _: &()) -> u64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            items[index]
        }
    }

    fn assign(epoch: u64, items: &Arc<[u64]>) -> UnitCommand<CountingTask> {
        UnitCommand::Assign(Assignment {
            epoch,
            range: 0..items.len(),
            items: Arc::clone(items),
            params: Arc::new(()),
        })
    }

    #[test]
    fn test_only_newest_queued_assignment_runs() {
        let task = Arc::new(CountingTask {
            calls: AtomicUsize::new(0),
        });
        let (command_tx, command_rx) = unbounded();
        let (report_tx, report_rx) = unbounded();
        let items: Arc<[u64]> = vec![1u64, 2, 3, 4].into();

        // Same order the coordinator produces for dispatch, reset, dispatch, reset, dispatch
        command_tx.send(assign(0, &items)).unwrap();
        command_tx.send(UnitCommand::Reset { epoch: 1 }).unwrap();
        command_tx.send(assign(1, &items)).unwrap();
        command_tx.send(UnitCommand::Reset { epoch: 2 }).unwrap();
        command_tx.send(assign(2, &items)).unwrap();
        drop(command_tx);

        ComputeUnit::new(0, Arc::clone(&task), command_rx, report_tx).run();

        let reports: Vec<_> = report_rx.try_iter().collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].epoch, 2);
        assert_eq!(task.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_reset_after_queued_assignment_skips_it() {
        let task = Arc::new(CountingTask {
            calls: AtomicUsize::new(0),
        });
        let (command_tx, command_rx) = unbounded();
        let (report_tx, report_rx) = unbounded();
        let items: Arc<[u64]> = vec![7u64, 8].into();

        command_tx.send(assign(0, &items)).unwrap();
        command_tx.send(UnitCommand::Reset { epoch: 1 }).unwrap();
        drop(command_tx);

        ComputeUnit::new(0, Arc::clone(&task), command_rx, report_tx).run();

        assert_eq!(report_rx.try_iter().count(), 0);
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_queued_shutdown_exits_without_work() {
        let task = Arc::new(CountingTask {
            calls: AtomicUsize::new(0),
        });
        let (command_tx, command_rx) = unbounded();
        let (report_tx, report_rx) = unbounded();
        let items: Arc<[u64]> = vec![1u64].into();

        command_tx.send(assign(0, &items)).unwrap();
        command_tx.send(UnitCommand::Shutdown).unwrap();
        command_tx.send(assign(0, &items)).unwrap();

        ComputeUnit::new(0, Arc::clone(&task), command_rx, report_tx).run();

        assert_eq!(report_rx.try_iter().count(), 0);
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
    }
}
