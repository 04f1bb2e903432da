//! Log records produced by commands.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One diagnostic produced while processing a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity of the problem (or `Success` for informational records).
    pub severity: Severity,
    /// What happened.
    pub message: String,
    /// What the user can do about it.
    pub recommendation: String,
}

impl LogRecord {
    /// Create a record with an explicit severity.
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }

    /// Create a `Failure` record.
    pub fn failure(message: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self::new(Severity::Failure, message, recommendation)
    }

    /// Create a `Warning` record.
    pub fn warning(message: impl Into<String>, recommendation: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message, recommendation)
    }

    /// Create a `Success` (informational) record.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message, "")
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if !self.recommendation.is_empty() {
            write!(f, " ({})", self.recommendation)?;
        }
        Ok(())
    }
}
