//! Built-in command implementations.

mod control;
mod create;
mod io;
mod program;
mod properties;

pub use control::{Exit, Message, Wait};
pub use create::{Free, NewEnsemble, NewTable, NewTimeSeries};
pub use io::{ReadFile, WriteFile};
pub use program::{RunProgram, DEFAULT_PROGRAM_TIMEOUT_SECS, PROGRAM_TIMEOUT_PROPERTY};
pub use properties::{SetOutputPeriod, SetProperty, SetWorkingDir};

use chrono::NaiveDateTime;
use lecommande::{
    CommandExecutionError, CommandRegistry, ParameterSet, RequestBrokerExt,
    RequestError, RunContext,
};
use std::path::PathBuf;
use std::time::Duration;

/// Register every built-in command.
pub fn register_all(registry: &mut CommandRegistry) {
    registry
        .register(|| Box::new(ReadFile))
        .register(|| Box::new(WriteFile))
        .register(|| Box::new(NewTimeSeries))
        .register(|| Box::new(NewEnsemble))
        .register(|| Box::new(NewTable))
        .register(|| Box::new(Free))
        .register(|| Box::new(SetProperty))
        .register(|| Box::new(SetWorkingDir))
        .register(|| Box::new(SetOutputPeriod))
        .register(|| Box::new(Message))
        .register(|| Box::new(Wait))
        .register(|| Box::new(RunProgram))
        .register(|| Box::new(Exit));
}

/// Expand `${Property}` references, warning about names that stay unresolved.
pub(crate) fn expand(ctx: &mut RunContext<'_>, text: &str) -> Result<String, CommandExecutionError> {
    let (expanded, unresolved) = ctx.broker().expand_properties(text)?;
    if !unresolved.is_empty() {
        ctx.warn(
            format!("Unknown properties in \"{text}\": {}", unresolved.join(", ")),
            "Define the properties with SetProperty before this command.",
        );
    }
    Ok(expanded)
}

/// Expand and resolve a path parameter against the working directory.
pub(crate) fn resolve_path(
    ctx: &mut RunContext<'_>,
    text: &str,
) -> Result<PathBuf, CommandExecutionError> {
    let expanded = expand(ctx, text)?;
    Ok(ctx.broker().resolve_path(&expanded)?)
}

/// Resolve an optional date parameter; absent or `*` falls back to the output window.
pub(crate) fn resolve_date(
    ctx: &mut RunContext<'_>,
    parameters: &ParameterSet,
    name: &str,
    fallback_marker: &str,
) -> Result<Option<NaiveDateTime>, CommandExecutionError> {
    if let Some(value) = parameters.get_non_empty(name) {
        if let Some(date) = ctx.broker().resolve_date_time(value)? {
            return Ok(Some(date));
        }
    }
    match ctx.broker().resolve_date_time(fallback_marker) {
        Ok(date) => Ok(date),
        Err(RequestError::MissingResponse { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// `True`/`False` parameter, case-insensitive.
pub(crate) fn flag(parameters: &ParameterSet, name: &str, default: bool) -> bool {
    parameters
        .get_non_empty(name)
        .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
}

/// Parse a seconds value into a [`Duration`].
pub(crate) fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

/// Validation predicate for seconds parameters: any value
/// `non_negative_number` accepts must also fit in a [`Duration`].
pub(crate) fn fits_duration(value: &str) -> bool {
    match value.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => parse_seconds(value).is_some(),
        _ => true,
    }
}

/// Optional non-negative seconds parameter; a present but unusable value fails.
pub(crate) fn seconds(
    parameters: &ParameterSet,
    name: &str,
) -> Result<Option<Duration>, CommandExecutionError> {
    let Some(value) = parameters.get_non_empty(name) else {
        return Ok(None);
    };
    parse_seconds(value).map(Some).ok_or_else(|| {
        CommandExecutionError::failed(
            format!("{name} value \"{value}\" is not a usable number of seconds"),
            format!("Specify {name} as a number of seconds >= 0."),
        )
    })
}
