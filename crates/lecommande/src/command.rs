//! The command contract.
//!
//! Every script statement is backed by one [`Command`] implementation,
//! created through the [`CommandRegistry`](crate::CommandRegistry). The
//! engine drives it through three phases: `discover` (declare result names
//! ahead of execution), `validate` (pure parameter checks), and `run`.

use crate::context::RunContext;
use crate::error::{CommandExecutionError, InvalidParameterError};
use crate::parameters::ParameterSet;
use crate::parser::to_script_text;
use crate::result::ResultKind;
use lestatut::LogRecord;
use serde::{Deserialize, Serialize};

/// A result name a command will produce, declared during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredResult {
    /// Name the result will be bound under.
    pub name: String,
    /// Kind of the result.
    pub kind: ResultKind,
}

impl DiscoveredResult {
    /// Create a discovered result.
    pub fn new(name: impl Into<String>, kind: ResultKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// What `run` receives for one script entry.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// 0-based index of the entry in the script.
    pub index: usize,
    /// 1-based script line of the entry.
    pub line: usize,
    /// Alias from a binding line (`TS alias = ...`).
    pub alias: Option<&'a str>,
    /// Parameters as validated.
    pub parameters: &'a ParameterSet,
}

impl<'a> Invocation<'a> {
    /// Alias if present, otherwise the value of `fallback_parameter`.
    #[must_use]
    pub fn alias_or(&self, fallback_parameter: &str) -> Option<&'a str> {
        self.alias
            .or_else(|| self.parameters.get_non_empty(fallback_parameter))
    }
}

/// Behaviour of one command kind.
pub trait Command: Send {
    /// Command name as written in scripts.
    fn name(&self) -> &'static str;

    /// Parameter names this command understands, in canonical order.
    fn recognized_parameters(&self) -> &'static [&'static str];

    /// Check parameters without side effects.
    ///
    /// Returns the non-fatal records (warnings) on success; any FAILURE
    /// produces an [`InvalidParameterError`] carrying every record.
    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError>;

    /// Names this command will bind when it runs.
    fn discover(&self, _alias: Option<&str>, _parameters: &ParameterSet) -> Vec<DiscoveredResult> {
        Vec::new()
    }

    /// Execute the command.
    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError>;

    /// Canonical script text for this command.
    fn serialize(&self, alias: Option<&str>, parameters: &ParameterSet) -> String {
        to_script_text(self.name(), alias, parameters, self.recognized_parameters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_falls_back_to_parameter() {
        let params = ParameterSet::new().with("NewTSID", "Flow.Day");
        let with_alias = Invocation {
            index: 0,
            line: 1,
            alias: Some("Flow"),
            parameters: &params,
        };
        let without = Invocation {
            alias: None,
            ..with_alias
        };
        assert_eq!(with_alias.alias_or("NewTSID"), Some("Flow"));
        assert_eq!(without.alias_or("NewTSID"), Some("Flow.Day"));
        assert_eq!(without.alias_or("Missing"), None);
    }
}
