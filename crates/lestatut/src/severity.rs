//! Ordered severity levels.
//!
//! Severity is totally ordered `Unknown < Success < Warning < Failure` and is
//! aggregated by taking the maximum, so folding more severities in can never
//! lower the result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status level attached to a log record or aggregated across a run.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Nothing is known yet (phase not executed).
    #[default]
    Unknown,
    /// Completed without problems.
    Success,
    /// Completed, but something may need attention.
    Warning,
    /// Did not complete.
    Failure,
}

/// Error returned when a severity name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized severity: {0} (expected UNKNOWN, SUCCESS, WARNING or FAILURE)")]
pub struct ParseSeverityError(pub String);

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Unknown,
        Severity::Success,
        Severity::Warning,
        Severity::Failure,
    ];

    /// Return the worse of two severities.
    #[must_use]
    pub fn worst(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// Fold an iterator of severities into the worst one.
    ///
    /// An empty iterator yields `Unknown`.
    pub fn worst_of<I: IntoIterator<Item = Severity>>(iter: I) -> Severity {
        iter.into_iter().fold(Severity::Unknown, Severity::worst)
    }

    /// True for `Warning` and `Failure`.
    #[must_use]
    pub const fn is_problem(self) -> bool {
        matches!(self, Severity::Warning | Severity::Failure)
    }

    /// True for `Failure`.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Severity::Failure)
    }

    /// Upper-case name used in scripts and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNKNOWN" => Ok(Severity::Unknown),
            "SUCCESS" => Ok(Severity::Success),
            "WARNING" => Ok(Severity::Warning),
            "FAILURE" => Ok(Severity::Failure),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn ordering_is_total_and_ascending() {
        assert!(Severity::Unknown < Severity::Success);
        assert!(Severity::Success < Severity::Warning);
        assert!(Severity::Warning < Severity::Failure);
    }

    #[test]
    fn worst_never_decreases() {
        let mut acc = Severity::Unknown;
        for next in [
            Severity::Warning,
            Severity::Success,
            Severity::Unknown,
            Severity::Failure,
            Severity::Success,
        ] {
            let before = acc;
            acc = acc.worst(next);
            assert!(acc >= before);
        }
        assert_eq!(acc, Severity::Failure);
    }

    #[test]
    fn worst_of_empty_is_unknown() {
        assert_eq!(Severity::worst_of(Vec::new()), Severity::Unknown);
        assert_eq!(
            Severity::worst_of([Severity::Success, Severity::Warning]),
            Severity::Warning
        );
    }

    #[rstest]
    #[case("SUCCESS", Severity::Success)]
    #[case("warning", Severity::Warning)]
    #[case(" Failure ", Severity::Failure)]
    #[case("unknown", Severity::Unknown)]
    fn parses_names_case_insensitively(#[case] input: &str, #[case] expected: Severity) {
        assert_eq!(input.parse::<Severity>().expect("valid severity"), expected);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "FATAL".parse::<Severity>().expect_err("must fail");
        assert!(err.to_string().contains("FATAL"));
    }

    #[test]
    fn serializes_as_upper_case() {
        let json = serde_json::to_string(&Severity::Warning).expect("serialize");
        assert_eq!(json, "\"WARNING\"");
    }
}
