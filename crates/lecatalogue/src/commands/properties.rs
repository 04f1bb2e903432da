//! Property, working-directory, and output-window commands.

use super::expand;
use lecommande::{
    Command, CommandExecutionError, Invocation, InvalidParameterError, LogRecord,
    ParameterCheck, ParameterSet, RequestBrokerExt, RunContext,
};

/// Set a processor property.
#[derive(Debug, Default)]
pub struct SetProperty;

impl Command for SetProperty {
    fn name(&self) -> &'static str {
        "SetProperty"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["PropertyName", "PropertyValue"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("PropertyName")
            .required("PropertyValue")
            .check(
                "PropertyName",
                |v| !v.chars().any(|c| c.is_whitespace() || "${}".contains(c)),
                "Property names must not contain spaces, $, {, or }.",
            )
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let name = params.get_or("PropertyName", "").trim();
        let value = expand(ctx, params.get_or("PropertyValue", ""))?;
        ctx.broker().set_property(name, &value)?;
        tracing::debug!(%name, %value, "property set");
        Ok(())
    }
}

/// Change the working directory.
#[derive(Debug, Default)]
pub struct SetWorkingDir;

impl Command for SetWorkingDir {
    fn name(&self) -> &'static str {
        "SetWorkingDir"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["WorkingDir"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("WorkingDir")
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let dir = expand(ctx, invocation.parameters.get_or("WorkingDir", ""))?;
        ctx.broker().set_property("WorkingDir", &dir)?;
        let resolved = ctx.broker().resolve_path(".")?;
        if !resolved.is_dir() {
            ctx.warn(
                format!("Working directory {} does not exist", resolved.display()),
                "Create the directory or correct WorkingDir.",
            );
        }
        Ok(())
    }
}

/// Set the global output window.
#[derive(Debug, Default)]
pub struct SetOutputPeriod;

impl Command for SetOutputPeriod {
    fn name(&self) -> &'static str {
        "SetOutputPeriod"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["OutputStart", "OutputEnd"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .any_of(&["OutputStart", "OutputEnd"])
            .date_time_expression("OutputStart")
            .date_time_expression("OutputEnd")
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let start = match params.get_non_empty("OutputStart") {
            Some(text) => ctx.broker().resolve_date_time(text)?,
            None => None,
        };
        let end = match params.get_non_empty("OutputEnd") {
            Some(text) => ctx.broker().resolve_date_time(text)?,
            None => None,
        };
        ctx.broker().set_output_period(start, end)?;
        Ok(())
    }
}
