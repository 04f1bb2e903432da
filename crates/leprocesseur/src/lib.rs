// leprocesseur - Script Processor
//
// *Le Processeur* (The Processor) - Shared processor state, the request broker, and the phased orchestrator

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Processor errors and the crate `Result` alias.
pub mod error;

/// Processor-owned state: named results, properties, output window.
pub mod state;

/// Request broker over the shared processor state.
pub mod broker;

/// DISCOVERY / INITIALIZATION / RUN orchestration.
pub mod engine;

/// Run listeners and the progress adapter.
pub mod listener;

/// Run report model.
pub mod report;

/// Background execution with cancellation.
pub mod worker;

pub use broker::{system_clock, Clock, HandlerTable, ProcessorBroker, RequestHandler};
pub use engine::{Orchestrator, RunConfig, RunState};
pub use error::{ProcessorError, Result};
pub use listener::{NoListener, ProcessorListener, TracingListener};
pub use report::{CommandReport, ReportRecord, RunReport};
pub use state::{ProcessorState, ResultSummary, SharedState, StateSnapshot};
pub use worker::{spawn_run, FinishedRun, RunHandle};
