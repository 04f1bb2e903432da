//! Per-command status across phases.
//!
//! Each command owns one [`CommandStatus`]. The orchestrator clears a phase
//! before re-executing it so repeated runs never accumulate stale records.

use crate::phase::CommandPhase;
use crate::record::LogRecord;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};

/// Records and worst severity for one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatus {
    /// Worst severity seen in this phase.
    pub severity: Severity,
    /// Records in the order they were added.
    pub records: Vec<LogRecord>,
    /// Set by [`CommandStatus::complete`]; reset by [`CommandStatus::clear`].
    #[serde(default)]
    pub completed: bool,
}

impl PhaseStatus {
    fn add(&mut self, record: LogRecord) {
        self.severity = self.severity.worst(record.severity);
        self.records.push(record);
    }
}

/// Status of a single command over all phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    phases: [PhaseStatus; 3],
}

impl CommandStatus {
    /// Create an empty status (every phase `Unknown`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all records of a phase and reset its severity to `Unknown`.
    pub fn clear(&mut self, phase: CommandPhase) {
        self.phases[phase.index()] = PhaseStatus::default();
    }

    /// Drop everything.
    pub fn clear_all(&mut self) {
        for phase in CommandPhase::ALL {
            self.clear(phase);
        }
    }

    /// Append a record to a phase, raising its severity if needed.
    pub fn add(&mut self, phase: CommandPhase, record: LogRecord) {
        self.phases[phase.index()].add(record);
    }

    /// Append several records to a phase.
    pub fn extend<I: IntoIterator<Item = LogRecord>>(&mut self, phase: CommandPhase, records: I) {
        for record in records {
            self.add(phase, record);
        }
    }

    /// Mark a phase as finished; `Unknown` becomes `Success`.
    pub fn complete(&mut self, phase: CommandPhase) {
        let status = &mut self.phases[phase.index()];
        status.severity = status.severity.worst(Severity::Success);
        status.completed = true;
    }

    /// Worst severity of one phase.
    #[must_use]
    pub fn phase_severity(&self, phase: CommandPhase) -> Severity {
        self.phases[phase.index()].severity
    }

    /// Worst severity over all phases.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::worst_of(self.phases.iter().map(|p| p.severity))
    }

    /// Records of one phase.
    #[must_use]
    pub fn records(&self, phase: CommandPhase) -> &[LogRecord] {
        &self.phases[phase.index()].records
    }

    /// Phase status of one phase.
    #[must_use]
    pub fn phase(&self, phase: CommandPhase) -> &PhaseStatus {
        &self.phases[phase.index()]
    }

    /// All records tagged with their phase, in phase order.
    pub fn all_records(&self) -> impl Iterator<Item = (CommandPhase, &LogRecord)> {
        CommandPhase::ALL
            .into_iter()
            .flat_map(move |phase| self.records(phase).iter().map(move |r| (phase, r)))
    }

    /// True once a phase has been completed since it was last cleared.
    ///
    /// Records added without completing the phase (such as a note that the
    /// phase was skipped) do not count.
    #[must_use]
    pub fn has_run(&self, phase: CommandPhase) -> bool {
        self.phases[phase.index()].completed
    }
}
