//! RunProgram: external processes with a wall-clock timeout.
//!
//! The child runs on a single-threaded tokio runtime owned by the command.
//! The wait loop wakes at least every [`POLL_SLICE`] to check the deadline
//! and the run's cancellation token. On expiry or cancellation the child is
//! killed, and whatever it printed so far is kept in the command's records.

use super::{expand, fits_duration, flag, parse_seconds, seconds};
use lecommande::{
    CancellationToken, Command, CommandExecutionError, Invocation, InvalidParameterError,
    LogRecord, ParameterCheck, ParameterSet, RequestBrokerExt, RunContext,
};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// Property consulted when `Timeout` is not given.
pub const PROGRAM_TIMEOUT_PROPERTY: &str = "ProgramTimeout";

/// Timeout used when neither `Timeout` nor the property is set.
pub const DEFAULT_PROGRAM_TIMEOUT_SECS: u64 = 300;

/// Maximum bytes captured per stream.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Longest interval between deadline and cancellation checks.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// How long to wait for output pipes to drain after a kill.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Lines of output copied into each log record.
const OUTPUT_TAIL_LINES: usize = 20;

type Captured = Arc<Mutex<Vec<u8>>>;

enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

struct ProgramOutput {
    outcome: Outcome,
    stdout: String,
    stderr: String,
    elapsed: Duration,
}

/// Run an external program.
#[derive(Debug, Default)]
pub struct RunProgram;

impl Command for RunProgram {
    fn name(&self) -> &'static str {
        "RunProgram"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["CommandLine", "UseCommandShell", "Timeout", "ExitCodeOk"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("CommandLine")
            .boolean("UseCommandShell")
            .non_negative_number("Timeout")
            .check("Timeout", fits_duration, "Specify a shorter Timeout, or 0 for none.")
            .check(
                "ExitCodeOk",
                |v| v.split(',').all(|c| c.trim().parse::<i32>().is_ok()),
                "Specify ExitCodeOk as a comma-separated list of integers.",
            )
            .finish()
    }

    fn run(
        &mut self,
        invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        let params = invocation.parameters;
        let command_line = expand(ctx, params.get_or("CommandLine", ""))?;
        let use_shell = flag(params, "UseCommandShell", false);
        let ok_codes: Vec<i32> = params
            .get_or("ExitCodeOk", "0")
            .split(',')
            .filter_map(|c| c.trim().parse().ok())
            .collect();
        let timeout = match seconds(params, "Timeout")? {
            Some(t) => t,
            None => default_timeout(ctx)?,
        };
        let working_dir = ctx.broker().resolve_path(".")?;

        let argv = if use_shell {
            vec!["sh".to_string(), "-c".to_string(), command_line.clone()]
        } else {
            split_command_line(&command_line)
        };
        let Some(program) = argv.first().cloned() else {
            return Err(CommandExecutionError::failed(
                "CommandLine is empty after property expansion",
                "Check the properties used in CommandLine.",
            ));
        };

        tracing::info!(%program, ?timeout, dir = %working_dir.display(), "starting program");
        let output = execute(
            &argv,
            &working_dir,
            (!timeout.is_zero()).then_some(timeout),
            ctx.cancellation().clone(),
        )?;
        let elapsed_ms = u64::try_from(output.elapsed.as_millis()).unwrap_or(u64::MAX);

        keep_output(ctx, "stdout", &output.stdout);
        keep_output(ctx, "stderr", &output.stderr);

        match output.outcome {
            Outcome::TimedOut => Err(CommandExecutionError::TimedOut {
                program,
                elapsed_ms,
            }),
            Outcome::Cancelled => Err(CommandExecutionError::Cancelled),
            Outcome::Exited(status) => {
                let code = status.code();
                if code.is_some_and(|c| ok_codes.contains(&c)) {
                    ctx.info(format!("{program} finished in {elapsed_ms} ms"));
                    Ok(())
                } else {
                    Err(CommandExecutionError::failed(
                        match code {
                            Some(c) => format!("{program} exited with code {c}"),
                            None => format!("{program} was terminated by a signal"),
                        },
                        "Check the program output in the log, or list accepted codes in ExitCodeOk.",
                    ))
                }
            }
        }
    }
}

fn default_timeout(ctx: &mut RunContext<'_>) -> Result<Duration, CommandExecutionError> {
    let fallback = Duration::from_secs(DEFAULT_PROGRAM_TIMEOUT_SECS);
    let Some(value) = ctx.broker().get_property(PROGRAM_TIMEOUT_PROPERTY)? else {
        return Ok(fallback);
    };
    match parse_seconds(&value) {
        Some(timeout) => Ok(timeout),
        None => {
            ctx.warn(
                format!(
                    "{PROGRAM_TIMEOUT_PROPERTY} value \"{value}\" is not usable; using {DEFAULT_PROGRAM_TIMEOUT_SECS} s"
                ),
                format!("Set {PROGRAM_TIMEOUT_PROPERTY} to a number of seconds >= 0."),
            );
            Ok(fallback)
        }
    }
}

fn keep_output(ctx: &mut RunContext<'_>, stream: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        return;
    }
    let lines: Vec<&str> = text.lines().collect();
    let tail = &lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..];
    let header = if tail.len() < lines.len() {
        format!("Program {stream} (last {} of {} lines)", tail.len(), lines.len())
    } else {
        format!("Program {stream}")
    };
    let message = format!("{header}:\n{}", tail.join("\n"));
    ctx.info(message);
}

/// Split a command line on whitespace, honoring double quotes.
fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

fn execute(
    argv: &[String],
    working_dir: &Path,
    timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<ProgramOutput, CommandExecutionError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CommandExecutionError::io("starting process runtime", None, e))?;

    runtime.block_on(async move {
        let mut command = tokio::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|e| {
            CommandExecutionError::io(format!("starting {}", argv[0]), Some(working_dir.to_path_buf()), e)
        })?;

        let stdout = Captured::default();
        let stderr = Captured::default();
        let stdout_task = capture(child.stdout.take(), Arc::clone(&stdout));
        let stderr_task = capture(child.stderr.take(), Arc::clone(&stderr));
        let deadline = timeout.map(|t| start + t);

        let outcome = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(|e| {
                        CommandExecutionError::io(format!("waiting for {}", argv[0]), None, e)
                    })?;
                    break Outcome::Exited(status);
                }
                () = tokio::time::sleep(POLL_SLICE) => {
                    if cancel.is_cancelled() {
                        break Outcome::Cancelled;
                    }
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        break Outcome::TimedOut;
                    }
                }
            }
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            if let Err(e) = child.kill().await {
                tracing::warn!(program = %argv[0], error = %e, "failed to kill program");
            }
        }
        let elapsed = start.elapsed();

        // Grandchildren may hold the pipes open after a kill.
        for task in [stdout_task, stderr_task] {
            if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
                tracing::debug!(program = %argv[0], "output still open after grace period");
            }
        }

        Ok::<_, CommandExecutionError>(ProgramOutput {
            outcome,
            stdout: drain(&stdout),
            stderr: drain(&stderr),
            elapsed,
        })
    })
}

/// Copy a stream into `sink` until EOF or [`MAX_OUTPUT_BYTES`].
fn capture<R>(handle: Option<R>, sink: Captured) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = handle else {
            return;
        };
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let Ok(mut out) = sink.lock() else {
                        break;
                    };
                    let room = MAX_OUTPUT_BYTES.saturating_sub(out.len());
                    out.extend_from_slice(&buf[..n.min(room)]);
                }
            }
        }
    })
}

fn drain(captured: &Captured) -> String {
    captured
        .lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("prog a b", &["prog", "a", "b"])]
    #[case("  prog   \"two words\" x ", &["prog", "two words", "x"])]
    #[case("prog \"\"", &["prog", ""])]
    #[case("", &[])]
    fn command_lines_split_on_unquoted_whitespace(#[case] line: &str, #[case] expected: &[&str]) {
        assert_eq!(split_command_line(line), expected);
    }

    #[cfg(unix)]
    #[test]
    fn output_survives_timeout() {
        let argv: Vec<String> = ["sh", "-c", "echo started; sleep 5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let dir = std::env::temp_dir();
        let output = execute(
            &argv,
            &dir,
            Some(Duration::from_millis(300)),
            CancellationToken::new(),
        )
        .expect("spawn");

        assert!(matches!(output.outcome, Outcome::TimedOut));
        assert!(output.stdout.contains("started"));
        assert!(output.elapsed < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_the_program() {
        let argv: Vec<String> = ["sleep", "5"].iter().map(|s| s.to_string()).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let output = execute(&argv, &std::env::temp_dir(), None, cancel).expect("spawn");
        assert!(matches!(output.outcome, Outcome::Cancelled));
        assert!(output.elapsed < Duration::from_secs(2));
    }
}
