//! Declarative parameter checks shared by command implementations.

use crate::datetime::DateTimeExpression;
use crate::error::InvalidParameterError;
use crate::parameters::ParameterSet;
use lestatut::{LogRecord, Severity};

/// Accumulates validation records for one command.
///
/// ```
/// use lecommande::{ParameterCheck, ParameterSet};
///
/// let params = ParameterSet::new().with("WaitTime", "2");
/// let records = ParameterCheck::new("Wait", &params, &["WaitTime", "ProgressIncrement"])
///     .required("WaitTime")
///     .non_negative_number("WaitTime")
///     .non_negative_number("ProgressIncrement")
///     .finish()
///     .unwrap();
/// assert!(records.is_empty());
/// ```
#[derive(Debug)]
pub struct ParameterCheck<'a> {
    command: &'a str,
    parameters: &'a ParameterSet,
    records: Vec<LogRecord>,
}

impl<'a> ParameterCheck<'a> {
    /// Start checking; unrecognized names are reported as warnings right away.
    pub fn new(command: &'a str, parameters: &'a ParameterSet, recognized: &[&str]) -> Self {
        let records = parameters
            .unrecognized(recognized)
            .into_iter()
            .map(|name| {
                LogRecord::warning(
                    format!("Unrecognized parameter \"{name}\" for {command}"),
                    format!("Valid parameters are: {}", recognized.join(", ")),
                )
            })
            .collect();
        Self {
            command,
            parameters,
            records,
        }
    }

    fn fail(&mut self, message: String, recommendation: String) {
        self.records.push(LogRecord::failure(message, recommendation));
    }

    fn value(&self, name: &str) -> Option<&'a str> {
        self.parameters.get_non_empty(name).map(str::trim)
    }

    /// The parameter must be present and non-empty.
    #[must_use]
    pub fn required(mut self, name: &str) -> Self {
        if self.value(name).is_none() {
            self.fail(
                format!("Parameter \"{name}\" is required"),
                format!("Specify {name}."),
            );
        }
        self
    }

    /// At least one of the names must be present.
    #[must_use]
    pub fn any_of(mut self, names: &[&str]) -> Self {
        if names.iter().all(|name| self.value(name).is_none()) {
            self.fail(
                format!("One of {} must be specified", names.join(", ")),
                format!("Specify at least one of {}.", names.join(", ")),
            );
        }
        self
    }

    /// Accept any value; documents intent at the call site.
    #[must_use]
    pub fn optional(self, _name: &str) -> Self {
        self
    }

    /// When present, the value must be an integer greater than zero.
    #[must_use]
    pub fn positive_integer(mut self, name: &str) -> Self {
        if let Some(value) = self.value(name) {
            if !value.parse::<u64>().is_ok_and(|n| n > 0) {
                self.fail(
                    format!("{name} value \"{value}\" is not a positive integer"),
                    format!("Specify {name} as an integer > 0."),
                );
            }
        }
        self
    }

    /// When present, the value must be a finite number `>= 0`.
    #[must_use]
    pub fn non_negative_number(mut self, name: &str) -> Self {
        if let Some(value) = self.value(name) {
            if !value
                .parse::<f64>()
                .is_ok_and(|n| n.is_finite() && n >= 0.0)
            {
                self.fail(
                    format!("{name} value \"{value}\" is not a non-negative number"),
                    format!("Specify {name} as a number >= 0."),
                );
            }
        }
        self
    }

    /// When present, the value must be a finite number.
    #[must_use]
    pub fn number(mut self, name: &str) -> Self {
        if let Some(value) = self.value(name) {
            if !value.parse::<f64>().is_ok_and(f64::is_finite) {
                self.fail(
                    format!("{name} value \"{value}\" is not a number"),
                    format!("Specify {name} as a number."),
                );
            }
        }
        self
    }

    /// When present, the value must be one of `choices` (case-insensitive).
    #[must_use]
    pub fn one_of(mut self, name: &str, choices: &[&str]) -> Self {
        if let Some(value) = self.value(name) {
            if !choices.iter().any(|c| c.eq_ignore_ascii_case(value)) {
                self.fail(
                    format!("{name} value \"{value}\" is not valid"),
                    format!("Specify {name} as one of: {}.", choices.join(", ")),
                );
            }
        }
        self
    }

    /// When present, the value must be `True` or `False`.
    #[must_use]
    pub fn boolean(self, name: &str) -> Self {
        self.one_of(name, &["True", "False"])
    }

    /// When present, the value must be a date/time expression.
    ///
    /// Values containing `${...}` are accepted as-is since properties are
    /// only known at run time.
    #[must_use]
    pub fn date_time_expression(mut self, name: &str) -> Self {
        if let Some(value) = self.value(name) {
            if !value.contains("${") {
                if let Err(message) = DateTimeExpression::parse(value) {
                    self.fail(
                        format!("{name}: {message}"),
                        format!(
                            "Specify {name} as YYYY[-MM[-DD[ hh[:mm[:ss]]]]], a marker such as OutputStart or CurrentToDay, or *."
                        ),
                    );
                }
            }
        }
        self
    }

    /// Arbitrary predicate on a present value.
    #[must_use]
    pub fn check(
        mut self,
        name: &str,
        predicate: impl FnOnce(&str) -> bool,
        recommendation: &str,
    ) -> Self {
        if let Some(value) = self.value(name) {
            if !predicate(value) {
                self.fail(
                    format!("{name} value \"{value}\" is not valid"),
                    recommendation.to_string(),
                );
            }
        }
        self
    }

    /// Records gathered so far.
    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Finish: warnings only → `Ok(records)`, any FAILURE → `Err`.
    pub fn finish(self) -> Result<Vec<LogRecord>, InvalidParameterError> {
        if self.records.iter().any(|r| r.severity == Severity::Failure) {
            Err(InvalidParameterError {
                command: self.command.to_string(),
                records: self.records,
            })
        } else {
            Ok(self.records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RECOGNIZED: &[&str] = &["InputFile", "Timeout", "Format", "InputStart"];

    #[test]
    fn missing_required_names_the_parameter() {
        let params = ParameterSet::new();
        let err = ParameterCheck::new("ReadFile", &params, RECOGNIZED)
            .required("InputFile")
            .finish()
            .expect_err("missing");
        assert_eq!(err.records.len(), 1);
        assert!(err.records[0].message.contains("InputFile"));
    }

    #[test]
    fn unknown_parameters_only_warn() {
        let params = ParameterSet::new().with("InputFile", "a.dv").with("Bogus", "1");
        let records = ParameterCheck::new("ReadFile", &params, RECOGNIZED)
            .required("InputFile")
            .finish()
            .expect("warnings only");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Warning);
        assert!(records[0].message.contains("Bogus"));
    }

    #[test]
    fn error_keeps_warnings_alongside_failures() {
        let params = ParameterSet::new().with("Bogus", "1").with("Timeout", "-3");
        let err = ParameterCheck::new("RunProgram", &params, RECOGNIZED)
            .positive_integer("Timeout")
            .finish()
            .expect_err("bad timeout");
        let severities: Vec<_> = err.records.iter().map(|r| r.severity).collect();
        assert_eq!(severities, vec![Severity::Warning, Severity::Failure]);
    }

    #[rstest]
    #[case("Format", "DateValue", true)]
    #[case("Format", "datevalue", true)]
    #[case("Format", "Excel", false)]
    fn one_of_is_case_insensitive(#[case] name: &str, #[case] value: &str, #[case] ok: bool) {
        let params = ParameterSet::new().with(name, value);
        let result = ParameterCheck::new("ReadFile", &params, RECOGNIZED)
            .one_of(name, &["DateValue"])
            .finish();
        assert_eq!(result.is_ok(), ok);
    }

    #[rstest]
    #[case("2024-01-01", true)]
    #[case("OutputStart - 2 Day", true)]
    #[case("${Start}", true)]
    #[case("*", true)]
    #[case("soon", false)]
    fn date_expressions(#[case] value: &str, #[case] ok: bool) {
        let params = ParameterSet::new().with("InputStart", value);
        let result = ParameterCheck::new("ReadFile", &params, RECOGNIZED)
            .date_time_expression("InputStart")
            .finish();
        assert_eq!(result.is_ok(), ok);
    }

    #[test]
    fn validation_is_repeatable() {
        let params = ParameterSet::new().with("Timeout", "x").with("Other", "1");
        let run = || {
            ParameterCheck::new("RunProgram", &params, RECOGNIZED)
                .positive_integer("Timeout")
                .finish()
        };
        assert_eq!(run(), run());
    }
}
