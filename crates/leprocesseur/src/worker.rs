//! Background execution.
//!
//! [`spawn_run`] moves an orchestrator and its script onto a worker thread.
//! The caller keeps a [`RunHandle`] to cancel the run, watch the shared
//! state, and collect the report.

use crate::engine::Orchestrator;
use crate::error::{ProcessorError, Result};
use crate::listener::ProcessorListener;
use crate::report::RunReport;
use crate::state::SharedState;
use lecommande::{CancellationToken, Script};
use std::thread::{self, JoinHandle};

/// Everything handed back when a background run finishes.
#[derive(Debug)]
pub struct FinishedRun {
    /// The report.
    pub report: RunReport,
    /// The orchestrator, ready for another run.
    pub orchestrator: Orchestrator,
    /// The script with per-phase statuses filled in.
    pub script: Script,
}

type WorkerOutput = (Result<RunReport>, Orchestrator, Script);

/// Handle to a run executing on a worker thread.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancellationToken,
    state: SharedState,
    handle: JoinHandle<WorkerOutput>,
}

impl RunHandle {
    /// Request cancellation; the run stops at the next command boundary
    /// (or sooner, for commands that poll the token).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Shared processor state for read snapshots while the run progresses.
    #[must_use]
    pub fn state(&self) -> SharedState {
        SharedState::clone(&self.state)
    }

    /// Has the worker finished?
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run and return its report.
    pub fn join(self) -> Result<RunReport> {
        self.join_all().map(|finished| finished.report)
    }

    /// Wait for the run and return the report, orchestrator, and script.
    pub fn join_all(self) -> Result<FinishedRun> {
        let (report, orchestrator, script) =
            self.handle.join().map_err(|_| ProcessorError::WorkerPanicked)?;
        Ok(FinishedRun {
            report: report?,
            orchestrator,
            script,
        })
    }
}

/// Run `script` on a new thread.
///
/// # Returns
///
/// `Result<RunHandle>` - The handle, or an error if the thread could not start
pub fn spawn_run(
    mut orchestrator: Orchestrator,
    mut script: Script,
    mut listener: Box<dyn ProcessorListener>,
) -> Result<RunHandle> {
    let cancel = orchestrator.cancellation_token();
    let state = orchestrator.state();
    let handle = thread::Builder::new()
        .name("leserie-run".to_string())
        .spawn(move || {
            let report = orchestrator.run_with_listener(&mut script, listener.as_mut());
            (report, orchestrator, script)
        })
        .map_err(ProcessorError::Spawn)?;

    Ok(RunHandle {
        cancel,
        state,
        handle,
    })
}
