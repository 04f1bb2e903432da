//! Commands that create or remove named results.

use super::{expand, resolve_date};
use lecommande::{
    Command, CommandExecutionError, DataPoint, DiscoveredResult, Ensemble, Invocation,
    InvalidParameterError, LogRecord, NamedResult, ParameterCheck, ParameterSet,
    RequestBrokerExt, ResultKind, ResultSelector, RunContext, Table, TimeInterval, TimeSeries,
};

/// Upper bound on generated values.
const MAX_POINTS: usize = 10_000_000;

fn discovered(
    alias: Option<&str>,
    parameters: &ParameterSet,
    name_parameter: &str,
    kind: ResultKind,
) -> Vec<DiscoveredResult> {
    alias
        .or_else(|| parameters.get_non_empty(name_parameter))
        .map(|name| vec![DiscoveredResult::new(name, kind)])
        .unwrap_or_default()
}

/// Create a regular time series filled with one value.
#[derive(Debug, Default)]
pub struct NewTimeSeries;

impl Command for NewTimeSeries {
    fn name(&self) -> &'static str {
        "NewTimeSeries"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &[
            "NewTSID",
            "Interval",
            "SetStart",
            "SetEnd",
            "InitialValue",
            "Units",
            "Description",
        ]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("NewTSID")
            .one_of("Interval", &["Minute", "Hour", "Day"])
            .date_time_expression("SetStart")
            .date_time_expression("SetEnd")
            .number("InitialValue")
            .optional("Units")
            .optional("Description")
            .finish()
    }

    fn discover(&self, alias: Option<&str>, parameters: &ParameterSet) -> Vec<DiscoveredResult> {
        discovered(alias, parameters, "NewTSID", ResultKind::TimeSeries)
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let interval: TimeInterval = params
            .get_or("Interval", "Day")
            .parse()
            .map_err(|e: String| CommandExecutionError::failed(e, "Use Minute, Hour, or Day."))?;
        let start = resolve_date(ctx, params, "SetStart", "OutputStart")?;
        let end = resolve_date(ctx, params, "SetEnd", "OutputEnd")?;
        let (Some(start), Some(end)) = (start, end) else {
            return Err(CommandExecutionError::failed(
                "Period of the new time series is not known",
                "Specify SetStart and SetEnd, or run SetOutputPeriod first.",
            ));
        };
        if end < start {
            return Err(CommandExecutionError::failed(
                format!("SetEnd {end} is before SetStart {start}"),
                "Swap SetStart and SetEnd.",
            ));
        }

        let value = params
            .get_non_empty("InitialValue")
            .and_then(|v| v.trim().parse::<f64>().ok());
        let mut points = Vec::new();
        let mut date = start;
        while date <= end {
            if points.len() >= MAX_POINTS {
                return Err(CommandExecutionError::failed(
                    format!("More than {MAX_POINTS} values between {start} and {end}"),
                    "Use a shorter period or a longer Interval.",
                ));
            }
            points.push(DataPoint { date, value });
            match date.checked_add_signed(interval.step()) {
                Some(next) => date = next,
                None => break,
            }
        }

        let identifier = params.get_or("NewTSID", "").trim().to_string();
        let mut series = TimeSeries::new(identifier.clone());
        series.interval = Some(interval);
        series.units = params.get_or("Units", "").to_string();
        series.description = expand(ctx, params.get_or("Description", ""))?;
        series.points = points;

        let name = invocation.alias.unwrap_or(&identifier).to_string();
        ctx.broker().set_result(&name, NamedResult::TimeSeries(series))?;
        Ok(())
    }
}

/// Group matching time series into an ensemble.
#[derive(Debug, Default)]
pub struct NewEnsemble;

impl Command for NewEnsemble {
    fn name(&self) -> &'static str {
        "NewEnsemble"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["EnsembleID", "TSID", "EnsembleName"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("EnsembleID")
            .optional("TSID")
            .optional("EnsembleName")
            .finish()
    }

    fn discover(&self, alias: Option<&str>, parameters: &ParameterSet) -> Vec<DiscoveredResult> {
        discovered(alias, parameters, "EnsembleID", ResultKind::Ensemble)
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let pattern = params.get_or("TSID", "*");
        let selected = ctx
            .broker()
            .select_results(ResultSelector::new(pattern).of_kind(ResultKind::TimeSeries))?;
        if selected.count == 0 {
            ctx.warn(
                format!("No time series match \"{pattern}\"; the ensemble is empty"),
                "Check the TSID pattern.",
            );
        }

        let identifier = params.get_or("EnsembleID", "").trim().to_string();
        let ensemble = Ensemble {
            name: params.get_or("EnsembleName", &identifier).to_string(),
            members: selected.matches.into_iter().map(|(name, _)| name).collect(),
            identifier: identifier.clone(),
        };
        let name = invocation.alias.unwrap_or(&identifier).to_string();
        ctx.broker().set_result(&name, NamedResult::Ensemble(ensemble))?;
        Ok(())
    }
}

/// Create an empty table.
#[derive(Debug, Default)]
pub struct NewTable;

impl Command for NewTable {
    fn name(&self) -> &'static str {
        "NewTable"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["TableID", "Columns"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("TableID")
            .required("Columns")
            .check(
                "Columns",
                |v| v.split(',').all(|c| !c.trim().is_empty()),
                "Separate column names with commas and do not leave names empty.",
            )
            .finish()
    }

    fn discover(&self, alias: Option<&str>, parameters: &ParameterSet) -> Vec<DiscoveredResult> {
        discovered(alias, parameters, "TableID", ResultKind::Table)
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let identifier = params.get_or("TableID", "").trim().to_string();
        let table = Table {
            identifier: identifier.clone(),
            columns: params
                .get_or("Columns", "")
                .split(',')
                .map(|c| c.trim().to_string())
                .collect(),
            rows: Vec::new(),
        };
        let name = invocation.alias.unwrap_or(&identifier).to_string();
        ctx.broker().set_result(&name, NamedResult::Table(table))?;
        Ok(())
    }
}

/// Remove matching results.
#[derive(Debug, Default)]
pub struct Free;

impl Command for Free {
    fn name(&self) -> &'static str {
        "Free"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["TSID"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("TSID")
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let pattern = invocation.parameters.get_or("TSID", "");
        let selected = ctx.broker().select_results(ResultSelector::new(pattern))?;
        if selected.count == 0 {
            ctx.warn(
                format!("No results match \"{pattern}\"; nothing freed"),
                "Check the TSID pattern.",
            );
            return Ok(());
        }
        let names = selected.matches.into_iter().map(|(name, _)| name).collect();
        let removed = ctx.broker().remove_results(names)?;
        ctx.info(format!("Freed {} result(s)", removed.len()));
        Ok(())
    }
}
