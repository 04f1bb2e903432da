//! Message, Wait, and Exit.

use super::{expand, fits_duration, seconds};
use lecommande::{
    Command, CommandExecutionError, Invocation, InvalidParameterError, LogRecord,
    ParameterCheck, ParameterSet, RunContext, Severity,
};
use std::time::{Duration, Instant};

/// Longest sleep between cancellation checks.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Log a message at a chosen severity.
#[derive(Debug, Default)]
pub struct Message;

impl Command for Message {
    fn name(&self) -> &'static str {
        "Message"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["Message", "CommandStatus"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("Message")
            .one_of("CommandStatus", &["SUCCESS", "WARNING", "FAILURE"])
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let message = expand(ctx, params.get_or("Message", ""))?;
        let severity = params
            .get_or("CommandStatus", "SUCCESS")
            .parse()
            .unwrap_or(Severity::Success);
        tracing::info!(line = invocation.line, index = invocation.index, %severity, "{message}");

        match severity {
            Severity::Failure => Err(CommandExecutionError::failed(message, "")),
            Severity::Warning => {
                ctx.warn(message, "");
                Ok(())
            }
            _ => {
                ctx.info(message);
                Ok(())
            }
        }
    }
}

/// Pause the run.
#[derive(Debug, Default)]
pub struct Wait;

impl Command for Wait {
    fn name(&self) -> &'static str {
        "Wait"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["WaitTime", "ProgressIncrement"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("WaitTime")
            .non_negative_number("WaitTime")
            .check("WaitTime", fits_duration, "Specify a shorter WaitTime.")
            .non_negative_number("ProgressIncrement")
            .check(
                "ProgressIncrement",
                fits_duration,
                "Specify a shorter ProgressIncrement.",
            )
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let total = seconds(invocation.parameters, "WaitTime")?.unwrap_or_default();
        let increment = seconds(invocation.parameters, "ProgressIncrement")?
            .filter(|d| !d.is_zero())
            .unwrap_or(total);

        let start = Instant::now();
        let mut next_report = increment;
        ctx.progress(0.0, total.as_secs_f64(), "Waiting");

        loop {
            if ctx.is_cancelled() {
                return Err(CommandExecutionError::Cancelled);
            }
            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }
            if elapsed >= next_report {
                ctx.progress(
                    elapsed.as_secs_f64(),
                    total.as_secs_f64(),
                    format!("Waited {:.1} of {:.1} s", elapsed.as_secs_f64(), total.as_secs_f64()),
                );
                next_report += increment;
            }
            let until_report = next_report.saturating_sub(elapsed);
            let remaining = total - elapsed;
            std::thread::sleep(POLL_SLICE.min(remaining).min(until_report.max(Duration::from_millis(1))));
        }

        ctx.progress(total.as_secs_f64(), total.as_secs_f64(), "Wait complete");
        Ok(())
    }
}

/// Stop processing after this command.
#[derive(Debug, Default)]
pub struct Exit;

impl Command for Exit {
    fn name(&self) -> &'static str {
        "Exit"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters()).finish()
    }

    fn run(
        &mut self,
        _invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        ctx.info("Exit requested; remaining commands are skipped");
        ctx.request_exit();
        Ok(())
    }
}
