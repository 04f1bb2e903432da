// lestatut - Status & Log Model
//
// *Le Statut* (The Status) - Severity levels and phase-scoped command diagnostics

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Ordered severity levels and worst-so-far aggregation.
pub mod severity;

/// Processing phases applied uniformly across all commands.
pub mod phase;

/// Individual log records (severity, message, recommendation).
pub mod record;

/// Per-command, per-phase status tracking.
pub mod status;

pub use phase::CommandPhase;
pub use record::LogRecord;
pub use severity::{ParseSeverityError, Severity};
pub use status::{CommandStatus, PhaseStatus};
