//! Run observers.

use crate::report::RunReport;
use lecommande::{CommandStatus, ProgressSink, ProgressUpdate};
use tracing::debug;

/// Receives run events. Every method defaults to doing nothing.
///
/// `index` is the 0-based position of the command among the executable
/// commands of the script and `total` their count.
pub trait ProcessorListener: Send {
    /// A command is about to run.
    fn command_started(&mut self, _index: usize, _total: usize, _command: &str) {}

    /// A command finished (or was skipped); `status` holds all its phases.
    fn command_completed(&mut self, _index: usize, _total: usize, _status: &CommandStatus) {}

    /// A running command reported progress.
    fn command_progress(&mut self, _update: &ProgressUpdate) {}

    /// The run is over.
    fn run_completed(&mut self, _report: &RunReport) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoListener;

impl ProcessorListener for NoListener {}

/// Listener that forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ProcessorListener for TracingListener {
    fn command_started(&mut self, index: usize, total: usize, command: &str) {
        debug!(command, position = index + 1, total, "Command started");
    }

    fn command_completed(&mut self, index: usize, total: usize, status: &CommandStatus) {
        debug!(
            position = index + 1,
            total,
            severity = %status.severity(),
            "Command completed"
        );
    }

    fn command_progress(&mut self, update: &ProgressUpdate) {
        debug!(
            index = update.index,
            fraction = update.fraction(),
            message = %update.message,
            "Command progress"
        );
    }
}

/// Adapts a listener into the [`ProgressSink`] handed to commands.
pub(crate) struct ListenerProgress<'a> {
    listener: &'a mut dyn ProcessorListener,
}

impl<'a> ListenerProgress<'a> {
    pub(crate) fn new(listener: &'a mut dyn ProcessorListener) -> Self {
        Self { listener }
    }
}

impl ProgressSink for ListenerProgress<'_> {
    fn progress(&mut self, update: ProgressUpdate) {
        self.listener.command_progress(&update);
    }
}
