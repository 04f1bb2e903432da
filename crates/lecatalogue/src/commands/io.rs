//! ReadFile and WriteFile.

use super::{resolve_date, resolve_path};
use crate::convert::{ConversionError, DateValueCodec, Period, ResultReader, ResultWriter};
use lecommande::{
    Command, CommandExecutionError, DiscoveredResult, Invocation, InvalidParameterError,
    LogRecord, ParameterCheck, ParameterSet, RequestBrokerExt, ResultKind, ResultSelector,
    RunContext,
};

fn check_format(value: &str) -> bool {
    DateValueCodec::for_format(Some(value)).is_ok()
}

fn conversion_failure(err: ConversionError) -> CommandExecutionError {
    let recommendation = match &err {
        ConversionError::Io { .. } => "Check that the file exists and is accessible.",
        ConversionError::Parse { .. } => "Check the file contents against the DateValue format.",
        ConversionError::NotFound { .. } => "Check the TSID against the identifiers in the file.",
        ConversionError::UnsupportedFormat(_) => "Use Format=DateValue.",
    };
    CommandExecutionError::failed(err.to_string(), recommendation)
}

/// Read one time series from a file.
#[derive(Debug, Default)]
pub struct ReadFile;

impl Command for ReadFile {
    fn name(&self) -> &'static str {
        "ReadFile"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["InputFile", "TSID", "InputStart", "InputEnd", "Format"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("InputFile")
            .optional("TSID")
            .date_time_expression("InputStart")
            .date_time_expression("InputEnd")
            .check("Format", check_format, "Use Format=DateValue.")
            .finish()
    }

    fn discover(&self, alias: Option<&str>, parameters: &ParameterSet) -> Vec<DiscoveredResult> {
        alias
            .or_else(|| parameters.get_non_empty("TSID"))
            .map(|name| vec![DiscoveredResult::new(name, ResultKind::TimeSeries)])
            .unwrap_or_default()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let codec =
            DateValueCodec::for_format(params.get("Format")).map_err(conversion_failure)?;
        let path = resolve_path(ctx, params.get_or("InputFile", ""))?;
        let period = Period::new(
            resolve_date(ctx, params, "InputStart", "*")?,
            resolve_date(ctx, params, "InputEnd", "*")?,
        );

        let result = codec
            .read(&path, params.get_non_empty("TSID"), period)
            .map_err(conversion_failure)?;

        if let Some(ts) = result.as_time_series() {
            if ts.points.is_empty() {
                ctx.warn(
                    format!("{} has no values in the requested period", ts.identifier),
                    "Check InputStart and InputEnd.",
                );
            }
        }

        let name = invocation
            .alias
            .map_or_else(|| result.identifier().to_string(), str::to_string);
        tracing::debug!(file = %path.display(), %name, "read time series");
        ctx.broker().set_result(&name, result)?;
        Ok(())
    }
}

/// Write selected time series to a file.
#[derive(Debug, Default)]
pub struct WriteFile;

impl Command for WriteFile {
    fn name(&self) -> &'static str {
        "WriteFile"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["TSID", "OutputFile", "OutputStart", "OutputEnd", "Format"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .optional("TSID")
            .required("OutputFile")
            .date_time_expression("OutputStart")
            .date_time_expression("OutputEnd")
            .check("Format", check_format, "Use Format=DateValue.")
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let codec =
            DateValueCodec::for_format(params.get("Format")).map_err(conversion_failure)?;
        let pattern = params.get_or("TSID", "*");
        let selected = ctx
            .broker()
            .select_results(ResultSelector::new(pattern).of_kind(ResultKind::TimeSeries))?;

        if selected.count == 0 {
            ctx.warn(
                format!("No time series match \"{pattern}\"; nothing written"),
                "Check the TSID pattern and the commands that create the series.",
            );
            return Ok(());
        }

        let path = resolve_path(ctx, params.get_or("OutputFile", ""))?;
        let period = Period::new(
            resolve_date(ctx, params, "OutputStart", "OutputStart")?,
            resolve_date(ctx, params, "OutputEnd", "OutputEnd")?,
        );
        let series: Vec<_> = selected
            .matches
            .iter()
            .filter_map(|(_, handle)| handle.as_time_series())
            .collect();

        codec
            .write(&path, &series, period)
            .map_err(conversion_failure)?;
        ctx.info(format!("Wrote {} time series to {}", series.len(), path.display()));
        Ok(())
    }
}
