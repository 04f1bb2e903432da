//! Run reports.

use crate::engine::RunState;
use chrono::{DateTime, Utc};
use lecommande::{CommandPhase, Script, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One log record with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Entry index in the script.
    pub index: usize,
    /// 1-based source line.
    pub line: usize,
    /// Phase that produced the record.
    pub phase: CommandPhase,
    /// Record severity.
    pub severity: Severity,
    /// Message.
    pub message: String,
    /// Recommendation.
    pub recommendation: String,
}

/// Outcome of one command or unparsed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReport {
    /// Entry index in the script.
    pub index: usize,
    /// 1-based source line.
    pub line: usize,
    /// Command name (empty for lines that did not parse).
    pub command: String,
    /// Line text.
    pub text: String,
    /// Worst severity over all phases.
    pub severity: Severity,
    /// DISCOVERY severity.
    pub discovery: Severity,
    /// INITIALIZATION severity.
    pub initialization: Severity,
    /// RUN severity.
    pub run: Severity,
    /// Was `run` actually called?
    pub ran: bool,
}

/// Bookkeeping gathered by the engine while executing.
#[derive(Debug, Default)]
pub(crate) struct RunTally {
    pub(crate) ran: Vec<usize>,
    pub(crate) aborted_at: Option<usize>,
    pub(crate) exit_at: Option<usize>,
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Terminal state (`Done` or `Cancelled`).
    pub status: RunState,
    /// Worst severity over every command and phase.
    pub severity: Severity,
    /// Per-command outcomes in script order.
    pub commands: Vec<CommandReport>,
    /// Every record in script order, phase order within a command.
    pub records: Vec<ReportRecord>,
    /// Number of commands whose `run` was called.
    pub commands_run: usize,
    /// Index of the command after which a strict run stopped.
    pub aborted_at: Option<usize>,
    /// Index of the command that requested exit.
    pub exit_at: Option<usize>,
    /// blake3 hash of the script text.
    pub script_hash: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub elapsed_ms: u64,
}

impl RunReport {
    pub(crate) fn build(
        script: &Script,
        status: RunState,
        tally: &RunTally,
        script_hash: String,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
    ) -> Self {
        let mut commands = Vec::new();
        let mut records = Vec::new();

        for (index, entry) in script.entries().iter().enumerate() {
            if !entry.is_reportable() {
                continue;
            }
            commands.push(CommandReport {
                index,
                line: entry.line,
                command: entry.command_name().to_string(),
                text: entry.text.clone(),
                severity: entry.severity(),
                discovery: entry.status.phase_severity(CommandPhase::Discovery),
                initialization: entry.status.phase_severity(CommandPhase::Initialization),
                run: entry.status.phase_severity(CommandPhase::Run),
                ran: tally.ran.contains(&index),
            });
            records.extend(entry.status.all_records().map(|(phase, record)| ReportRecord {
                index,
                line: entry.line,
                phase,
                severity: record.severity,
                message: record.message.clone(),
                recommendation: record.recommendation.clone(),
            }));
        }

        Self {
            status,
            severity: Severity::worst_of(commands.iter().map(|c| c.severity)),
            commands,
            records,
            commands_run: tally.ran.len(),
            aborted_at: tally.aborted_at,
            exit_at: tally.exit_at,
            script_hash,
            started_at,
            elapsed_ms,
        }
    }

    /// Finished normally with nothing worse than SUCCESS.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunState::Done && self.severity <= Severity::Success
    }

    /// Number of records at exactly `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.records.iter().filter(|r| r.severity == severity).count()
    }

    /// Report for the command at entry `index`.
    #[must_use]
    pub fn command(&self, index: usize) -> Option<&CommandReport> {
        self.commands.iter().find(|c| c.index == index)
    }

    /// Human-readable multi-line summary: a header, then each problem record.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} command(s), {} run, {} warning(s), {} failure(s), severity {} in {} ms",
            self.status,
            self.commands.len(),
            self.commands_run,
            self.count(Severity::Warning),
            self.count(Severity::Failure),
            self.severity,
            self.elapsed_ms
        );
        for record in self.records.iter().filter(|r| r.severity.is_problem()) {
            let _ = write!(
                out,
                "\n  line {} [{}] {}: {}",
                record.line, record.phase, record.severity, record.message
            );
            if !record.recommendation.is_empty() {
                let _ = write!(out, " ({})", record.recommendation);
            }
        }
        out
    }
}
