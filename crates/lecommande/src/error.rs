//! Error taxonomy.
//!
//! - [`ParseError`]: a script line could not be turned into a command.
//! - [`InvalidParameterError`]: validation found FAILURE-level problems.
//! - [`RequestError`]: a broker request could not be answered.
//! - [`CommandExecutionError`]: a command could not finish its run.

use lestatut::{LogRecord, Severity};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while parsing one script line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line does not follow the command grammar.
    #[error("Syntax error on line {line}: {message}: {text}")]
    Syntax {
        /// 1-based line number (0 when parsed standalone).
        line: usize,
        /// The offending line.
        text: String,
        /// What is wrong.
        message: String,
    },

    /// The command name is not registered.
    #[error("Unknown command on line {line}: {name}")]
    UnknownCommand {
        /// 1-based line number (0 when parsed standalone).
        line: usize,
        /// The unrecognized name.
        name: String,
        /// Registered name differing only in case, if any.
        suggestion: Option<String>,
    },
}

impl ParseError {
    /// Create a syntax error.
    pub fn syntax(line: usize, text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            text: text.into(),
            message: message.into(),
        }
    }

    /// Line number the error refers to.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. } | Self::UnknownCommand { line, .. } => *line,
        }
    }

    /// Return the same error attributed to another line.
    #[must_use]
    pub fn at_line(mut self, new_line: usize) -> Self {
        match &mut self {
            Self::Syntax { line, .. } | Self::UnknownCommand { line, .. } => *line = new_line,
        }
        self
    }

    /// User-facing recovery hint.
    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::Syntax { .. } => {
                "Use the form Command(Param=Value,...) and quote values containing commas or parentheses."
                    .to_string()
            }
            Self::UnknownCommand {
                suggestion: Some(name),
                ..
            } => format!("Did you mean {name}?"),
            Self::UnknownCommand { .. } => {
                "Check the command name or remove the line.".to_string()
            }
        }
    }
}

/// Validation failed with at least one FAILURE record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid parameters for {command}: {}", summary(.records))]
pub struct InvalidParameterError {
    /// Command name.
    pub command: String,
    /// All records produced by validation, including warnings.
    pub records: Vec<LogRecord>,
}

fn summary(records: &[LogRecord]) -> String {
    records
        .iter()
        .filter(|r| r.severity == Severity::Failure)
        .map(|r| r.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors answering a broker request.
///
/// All variants are recoverable from the engine's point of view; a command
/// decides whether the condition is fatal to its own run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No handler is registered for the request name. This is a contract
    /// mismatch between a command and the engine, not a user data problem.
    #[error("Unknown request: {name}")]
    UnknownRequest {
        /// The request name.
        name: String,
    },

    /// The handler ran but a required piece of the response is missing.
    #[error("Request {request} did not provide {property}")]
    MissingResponse {
        /// The request name.
        request: String,
        /// What is missing.
        property: String,
    },

    /// The handler answered with a response of the wrong shape.
    #[error("Request {request} returned an unexpected response")]
    UnexpectedResponse {
        /// The request name.
        request: String,
    },

    /// The request parameters could not be interpreted.
    #[error("Invalid {request} request: {message}")]
    InvalidRequest {
        /// The request name.
        request: String,
        /// What is wrong.
        message: String,
    },

    /// Processor state could not be accessed.
    #[error("Processor state unavailable: {0}")]
    StateUnavailable(String),
}

impl RequestError {
    /// Create an invalid-request error.
    pub fn invalid(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            request: request.into(),
            message: message.into(),
        }
    }
}

/// Run-time failure of a command.
#[derive(Debug, Error)]
pub enum CommandExecutionError {
    /// The command could not finish because of user data or environment.
    #[error("{message}")]
    Failed {
        /// What happened.
        message: String,
        /// What the user can do about it.
        recommendation: String,
    },

    /// A broker request failed and the command cannot continue.
    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    /// I/O error with context.
    #[error("I/O error: {context} (path: {path:?})")]
    Io {
        /// What was being done.
        context: String,
        /// Path involved, if any.
        path: Option<PathBuf>,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An external process exceeded its time budget and was terminated.
    #[error("{program} timed out after {elapsed_ms} ms")]
    TimedOut {
        /// Program that was running.
        program: String,
        /// Elapsed wall-clock time before termination.
        elapsed_ms: u64,
    },

    /// The run was cancelled while the command was in progress.
    #[error("Cancelled")]
    Cancelled,
}

impl CommandExecutionError {
    /// Create a `Failed` error.
    pub fn failed(message: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }

    /// Create an `Io` error.
    pub fn io(context: impl Into<String>, path: Option<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path,
            source,
        }
    }

    /// True for engine/command contract violations (unknown requests).
    #[must_use]
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Request(RequestError::UnknownRequest { .. }))
    }

    /// User-facing recommendation.
    #[must_use]
    pub fn recommendation(&self) -> String {
        match self {
            Self::Failed { recommendation, .. } => recommendation.clone(),
            Self::Request(RequestError::UnknownRequest { .. }) => {
                "This is a software defect; report the command and script to support.".to_string()
            }
            Self::Request(_) => "Check the command parameters and earlier commands.".to_string(),
            Self::Io { .. } => "Check that the file exists and is accessible.".to_string(),
            Self::TimedOut { .. } => {
                "Increase the Timeout parameter or check why the program does not finish."
                    .to_string()
            }
            Self::Cancelled => String::new(),
        }
    }

    /// Convert into a log record at the given severity.
    #[must_use]
    pub fn to_record(&self, severity: Severity) -> LogRecord {
        let message = if self.is_defect() {
            format!("Internal error: {self}")
        } else {
            self.to_string()
        };
        LogRecord::new(severity, message, self.recommendation())
    }
}
