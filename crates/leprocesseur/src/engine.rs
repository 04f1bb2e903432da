//! Phased script orchestration.
//!
//! A run moves through `Idle → Discovering → Validating → Running → Done`,
//! or ends in `Cancelled`. Each phase clears its own records on every entry
//! before executing, so running the same [`Script`] twice never mixes
//! records from different runs.

use crate::broker::{system_clock, Clock, HandlerTable, ProcessorBroker, RequestHandler};
use crate::error::{ProcessorError, Result};
use crate::listener::{ListenerProgress, NoListener, ProcessorListener};
use crate::report::{RunReport, RunTally};
use crate::state::{ProcessorState, SharedState, StateSnapshot};
use chrono::{NaiveDateTime, Utc};
use indexmap::IndexMap;
use lecommande::{
    CancellationToken, CommandExecutionError, CommandPhase, EntryKind, Invocation, LogRecord,
    RunContext, Script, ScriptEntry, Severity,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// No run in progress.
    Idle,
    /// Collecting names commands will produce.
    Discovering,
    /// Validating parameters.
    Validating,
    /// Executing commands.
    Running,
    /// Finished (successfully or not).
    Done,
    /// Stopped by cancellation.
    Cancelled,
}

impl RunState {
    /// States reachable from this one.
    #[must_use]
    pub const fn allowed_transitions(self) -> &'static [RunState] {
        match self {
            Self::Idle => &[Self::Discovering],
            Self::Discovering => &[Self::Validating, Self::Cancelled],
            Self::Validating => &[Self::Running, Self::Done, Self::Cancelled],
            Self::Running => &[Self::Done, Self::Cancelled],
            Self::Done | Self::Cancelled => &[Self::Idle],
        }
    }

    /// Is `self -> to` a legal transition?
    #[must_use]
    pub fn can_transition(self, to: RunState) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// `Done` or `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Discovering => "DISCOVERING",
            Self::Validating => "VALIDATING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop after the first command that fails at run time.
    pub strict: bool,
    /// Severity recorded for lines that could not be parsed.
    pub unparsed_severity: Severity,
    /// Keep results and properties from the previous run.
    pub keep_state: bool,
    /// Initial working directory.
    pub working_dir: PathBuf,
    /// Initial output window start.
    pub output_start: Option<NaiveDateTime>,
    /// Initial output window end.
    pub output_end: Option<NaiveDateTime>,
    /// Properties set before the first command runs.
    pub properties: IndexMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strict: false,
            unparsed_severity: Severity::Failure,
            keep_state: false,
            working_dir: PathBuf::from("."),
            output_start: None,
            output_end: None,
            properties: IndexMap::new(),
        }
    }
}

/// Drives scripts through discovery, validation, and execution.
pub struct Orchestrator {
    config: RunConfig,
    state: SharedState,
    handlers: Arc<HandlerTable>,
    clock: Clock,
    cancel: CancellationToken,
    run_state: RunState,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("run_state", &self.run_state)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(RunConfig::default())
    }
}

impl Orchestrator {
    /// Create an orchestrator with fresh state.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let state = ProcessorState::new(config.working_dir.clone()).into_shared();
        Self {
            config,
            state,
            handlers: Arc::new(HandlerTable::new()),
            clock: system_clock,
            cancel: CancellationToken::new(),
            run_state: RunState::Idle,
        }
    }

    /// Replace the clock used for `CurrentTo*` markers.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register a handler for generic requests named `name`.
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        handler: impl RequestHandler + 'static,
    ) -> &mut Self {
        Arc::make_mut(&mut self.handlers).insert(name.into(), Arc::new(handler));
        self
    }

    /// Run policy.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Mutable run policy; takes effect on the next run.
    pub fn config_mut(&mut self) -> &mut RunConfig {
        &mut self.config
    }

    /// Shared state handle for observers.
    #[must_use]
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Serializable view of the current state.
    pub fn snapshot(&self) -> Result<StateSnapshot> {
        self.state
            .read()
            .map(|state| state.snapshot())
            .map_err(|e| ProcessorError::StateUnavailable(e.to_string()))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Token that cancels the current (or next) run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation; observed between commands.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run a script without a listener.
    pub fn run(&mut self, script: &mut Script) -> Result<RunReport> {
        self.run_with_listener(script, &mut NoListener)
    }

    /// Run every phase of a script, reporting events to `listener`.
    pub fn run_with_listener(
        &mut self,
        script: &mut Script,
        listener: &mut dyn ProcessorListener,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let script_hash = blake3::hash(script.source_text().as_bytes())
            .to_hex()
            .to_string();

        info!(
            commands = script.command_count(),
            strict = self.config.strict,
            script_hash = %script_hash,
            "Starting run"
        );

        let runnable = self.prepare(script)?;
        let mut tally = RunTally::default();

        let outcome = if self.cancel.is_cancelled() {
            RunState::Cancelled
        } else {
            self.transition(RunState::Running)?;
            if self.execute(script, &runnable, listener, &mut tally) {
                RunState::Cancelled
            } else {
                RunState::Done
            }
        };
        self.transition(outcome)?;
        self.cancel.reset();

        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = RunReport::build(script, outcome, &tally, script_hash, started_at, elapsed_ms);
        info!(
            status = %report.status,
            severity = %report.severity,
            commands_run = report.commands_run,
            elapsed_ms,
            "Run finished"
        );
        listener.run_completed(&report);
        Ok(report)
    }

    /// Run discovery and validation only; nothing is executed.
    pub fn validate_only(&mut self, script: &mut Script) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let script_hash = blake3::hash(script.source_text().as_bytes())
            .to_hex()
            .to_string();

        self.prepare(script)?;
        for entry in script.entries_mut() {
            entry.status.clear(CommandPhase::Run);
        }
        self.transition(RunState::Done)?;

        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(RunReport::build(
            script,
            RunState::Done,
            &RunTally::default(),
            script_hash,
            started_at,
            elapsed_ms,
        ))
    }

    fn transition(&mut self, to: RunState) -> Result<()> {
        if !self.run_state.can_transition(to) {
            return Err(ProcessorError::InvalidTransition {
                from: self.run_state,
                to,
            });
        }
        debug!(from = %self.run_state, to = %to, "Run state transition");
        self.run_state = to;
        Ok(())
    }

    fn lock_state(&self) -> Result<RwLockWriteGuard<'_, ProcessorState>> {
        self.state
            .write()
            .map_err(|e| ProcessorError::StateUnavailable(e.to_string()))
    }

    /// Reset state, then run discovery and validation. Returns which entries may run.
    fn prepare(&mut self, script: &mut Script) -> Result<Vec<bool>> {
        if self.run_state.is_terminal() {
            self.transition(RunState::Idle)?;
        } else if self.run_state != RunState::Idle {
            warn!(state = %self.run_state, "Previous run did not finish; resetting");
            self.run_state = RunState::Idle;
        }
        {
            let mut state = self.lock_state()?;
            if !self.config.keep_state {
                *state = ProcessorState::new(self.config.working_dir.clone());
            }
            state.clear_discovered();
            state.set_output_period(self.config.output_start, self.config.output_end);
            for (name, value) in &self.config.properties {
                if let Err(err) = state.set_property(name, value) {
                    warn!(property = %name, error = %err, "Ignoring initial property");
                }
            }
        }

        self.transition(RunState::Discovering)?;
        self.discover(script)?;
        self.transition(RunState::Validating)?;
        Ok(self.validate(script))
    }

    fn discover(&self, script: &mut Script) -> Result<()> {
        let mut state = self.lock_state()?;
        for entry in script.entries_mut() {
            entry.status.clear(CommandPhase::Discovery);
            if let EntryKind::Command(command) = &entry.kind {
                for found in command.discover(entry.alias.as_deref(), &entry.parameters) {
                    debug!(
                        command = command.name(),
                        line = entry.line,
                        name = %found.name,
                        kind = %found.kind,
                        "Discovered result"
                    );
                    state.discover(found.name, found.kind);
                }
                entry.status.complete(CommandPhase::Discovery);
            }
        }
        Ok(())
    }

    fn validate(&self, script: &mut Script) -> Vec<bool> {
        let phase = CommandPhase::Initialization;
        let mut runnable = vec![false; script.len()];

        for (index, entry) in script.entries_mut().iter_mut().enumerate() {
            entry.status.clear(phase);
            match &entry.kind {
                EntryKind::Command(command) => {
                    match command.validate(&entry.parameters) {
                        Ok(records) => entry.status.extend(phase, records),
                        Err(err) => {
                            warn!(
                                command = command.name(),
                                line = entry.line,
                                error = %err,
                                "Validation failed"
                            );
                            let has_failure =
                                err.records.iter().any(|r| r.severity.is_failure());
                            let message = err.to_string();
                            entry.status.extend(phase, err.records);
                            if !has_failure {
                                entry.status.add(
                                    phase,
                                    LogRecord::failure(message, "Correct the command parameters."),
                                );
                            }
                        }
                    }
                    entry.status.complete(phase);
                    runnable[index] = !entry.status.phase_severity(phase).is_failure();
                }
                EntryKind::Unparsed(err) => {
                    warn!(line = entry.line, error = %err, "Unparsed script line");
                    entry.status.add(
                        phase,
                        LogRecord::new(self.config.unparsed_severity, err.to_string(), err.suggestion()),
                    );
                    entry.status.complete(phase);
                }
                EntryKind::Comment | EntryKind::Blank => {}
            }
        }
        runnable
    }

    /// Execute runnable commands in order. Returns `true` if cancelled.
    fn execute(
        &self,
        script: &mut Script,
        runnable: &[bool],
        listener: &mut dyn ProcessorListener,
        tally: &mut RunTally,
    ) -> bool {
        let phase = CommandPhase::Run;
        let total = script.command_count();
        let mut broker =
            ProcessorBroker::with_handlers(Arc::clone(&self.state), Arc::clone(&self.handlers), self.clock);

        for entry in script.entries_mut() {
            entry.status.clear(phase);
        }

        let mut position = 0;
        for (index, entry) in script.entries_mut().iter_mut().enumerate() {
            let ScriptEntry {
                kind,
                alias,
                parameters,
                status,
                line,
                ..
            } = entry;
            let command = match kind {
                EntryKind::Command(command) => command,
                EntryKind::Unparsed(_) if self.config.strict && status.severity().is_failure() => {
                    warn!(line = *line, "Strict mode: stopping at a line that did not parse");
                    tally.aborted_at = Some(index);
                    break;
                }
                _ => continue,
            };
            let ordinal = position;
            position += 1;

            if self.cancel.is_cancelled() {
                info!(line = *line, "Run cancelled");
                return true;
            }

            let name = command.name();
            if !runnable.get(index).copied().unwrap_or(false) {
                status.add(
                    phase,
                    LogRecord::warning(
                        format!("{name} not run because of validation errors"),
                        "Fix the problems reported during initialization.",
                    ),
                );
                listener.command_completed(ordinal, total, status);
                if self.config.strict {
                    warn!(
                        command = name,
                        line = *line,
                        "Strict mode: stopping at a command that failed validation"
                    );
                    tally.aborted_at = Some(index);
                    break;
                }
                continue;
            }

            listener.command_started(ordinal, total, name);
            debug!(command = name, index, line = *line, "Running command");

            let mut sink = ListenerProgress::new(&mut *listener);
            let mut ctx = RunContext::new(index, &mut broker, self.cancel.clone(), &mut sink);
            let outcome = command.run(
                Invocation {
                    index,
                    line: *line,
                    alias: alias.as_deref(),
                    parameters: &*parameters,
                },
                &mut ctx,
            );
            let (records, exit) = ctx.into_records();
            status.extend(phase, records);
            tally.ran.push(index);

            let mut cancelled = false;
            let mut abort = false;
            match outcome {
                Ok(()) => {}
                Err(CommandExecutionError::Cancelled) => {
                    status.add(phase, LogRecord::warning(format!("{name} was cancelled"), ""));
                    cancelled = true;
                }
                Err(err) => {
                    warn!(
                        command = name,
                        line = *line,
                        error = %err,
                        defect = err.is_defect(),
                        "Command failed"
                    );
                    status.add(phase, err.to_record(Severity::Failure));
                    if self.config.strict {
                        tally.aborted_at = Some(index);
                        abort = true;
                    }
                }
            }
            status.complete(phase);
            listener.command_completed(ordinal, total, status);

            if cancelled {
                info!(line = *line, "Run cancelled during command");
                return true;
            }
            if exit {
                info!(command = name, line = *line, "Exit requested");
                tally.exit_at = Some(index);
                break;
            }
            if abort {
                warn!(line = *line, "Strict mode: stopping after failure");
                break;
            }
        }
        false
    }
}
