// lecommande - Command Contract & Script Parser
//
// *La Commande* (The Command) - Parameter sets, the command contract, and script text

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Ordered parameter sets with provenance tagging.
pub mod parameters;

/// Named result types (time series, tables, ensembles).
pub mod result;

/// Typed request/response envelopes and the broker contract.
pub mod request;

/// Error taxonomy for parsing, validation, requests, and execution.
pub mod error;

/// Run-time context handed to commands (broker, cancellation, progress).
pub mod context;

/// The polymorphic command contract.
pub mod command;

/// Date/time expressions (literals, markers, offsets).
pub mod datetime;

/// Declarative parameter validation helpers.
pub mod validate;

/// Name-keyed command factories.
pub mod registry;

/// Script line grammar and canonical serialization.
pub mod parser;

/// Parsed scripts: ordered entries with their status.
pub mod script;

pub use command::{Command, DiscoveredResult, Invocation};
pub use context::{CancellationToken, NoProgress, ProgressSink, ProgressUpdate, RunContext};
pub use datetime::{DateBase, DateMarker, DateResolveError, DateTimeExpression};
pub use error::{CommandExecutionError, InvalidParameterError, ParseError, RequestError};
pub use parameters::{ParameterSet, Provenance};
pub use parser::{
    parse_line, parse_script, parse_statement, split_parameters, to_script_text, ParsedLine,
    Statement,
};
pub use registry::{CommandFactory, CommandRegistry};
pub use request::{
    Request, RequestBroker, RequestBrokerExt, Response, ResultSelector, SelectedResults,
};
pub use result::{
    DataPoint, Ensemble, NamedResult, ResultHandle, ResultKind, Table, TimeInterval, TimeSeries,
};
pub use script::{EntryKind, Script, ScriptEntry};
pub use validate::ParameterCheck;

/// Re-exported status model so command crates need a single import.
pub use lestatut::{CommandPhase, CommandStatus, LogRecord, Severity};
