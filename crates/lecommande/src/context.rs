//! Run context threaded through [`Command::run`](crate::Command::run).
//!
//! Holds everything a running command may touch: the request broker, the
//! cancellation token, a progress sink, and the command's own RUN records.

use crate::request::RequestBroker;
use lestatut::LogRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a run and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag before starting another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Intra-command progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Index of the reporting command in the script.
    pub index: usize,
    /// Work done so far.
    pub current: f64,
    /// Total work.
    pub total: f64,
    /// Short description.
    pub message: String,
}

impl ProgressUpdate {
    /// Completed fraction clamped to `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total <= 0.0 {
            return 1.0;
        }
        (self.current / self.total).clamp(0.0, 1.0)
    }
}

/// Receiver for [`ProgressUpdate`]s.
pub trait ProgressSink {
    /// Called whenever a command reports progress.
    fn progress(&mut self, update: ProgressUpdate);
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&mut self, _update: ProgressUpdate) {}
}

/// Everything a command may use while running.
pub struct RunContext<'a> {
    index: usize,
    broker: &'a mut dyn RequestBroker,
    cancel: CancellationToken,
    progress: &'a mut dyn ProgressSink,
    records: Vec<LogRecord>,
    exit_requested: bool,
}

impl<'a> RunContext<'a> {
    /// Create a context for the command at `index`.
    pub fn new(
        index: usize,
        broker: &'a mut dyn RequestBroker,
        cancel: CancellationToken,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            index,
            broker,
            cancel,
            progress,
            records: Vec::new(),
            exit_requested: false,
        }
    }

    /// Index of the running command.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The request broker.
    pub fn broker(&mut self) -> &mut dyn RequestBroker {
        &mut *self.broker
    }

    /// Cancellation token of the current run.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Has the run been cancelled?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record a WARNING for this command.
    pub fn warn(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.records.push(LogRecord::warning(message, recommendation));
    }

    /// Record a SUCCESS-level informational message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.records.push(LogRecord::info(message));
    }

    /// Report progress.
    pub fn progress(&mut self, current: f64, total: f64, message: impl Into<String>) {
        self.progress.progress(ProgressUpdate {
            index: self.index,
            current,
            total,
            message: message.into(),
        });
    }

    /// Ask the engine to stop after this command.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    /// Was an exit requested?
    #[must_use]
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Records gathered so far.
    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Consume the context, returning the records and the exit flag.
    #[must_use]
    pub fn into_records(self) -> (Vec<LogRecord>, bool) {
        (self.records, self.exit_requested)
    }
}
