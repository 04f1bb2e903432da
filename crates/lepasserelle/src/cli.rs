// CLI Interface
//
// This module provides the command-line interface for LeSerie.

use crate::config::ProjectConfig;
use crate::errors::{PasserelleError, Result};
use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use lecatalogue::standard_registry;
use lecommande::{CommandRegistry, Script, Severity};
use leprocesseur::{spawn_run, Orchestrator, RunReport, RunState, TracingListener};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// LeSerie - Time-Series Batch Script Processor
#[derive(Parser, Debug)]
#[command(name = "leserie")]
#[command(author = "LeSerie Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run, check, and format time-series command scripts", long_about = None)]
pub struct Cli {
    /// Configuration file (default: .leserie/config.toml next to the script)
    #[arg(global = true, long = "config", short = 'c')]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(global = true, long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script
    Run {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Stop after the first command that fails
        #[arg(long = "strict")]
        strict: bool,

        /// Print the report as JSON
        #[arg(long = "json")]
        json: bool,

        /// Initial working directory (default: the script directory)
        #[arg(long = "working-dir", value_name = "DIR")]
        working_dir: Option<PathBuf>,
    },

    /// Parse and validate a script without running it
    Check {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Print the report as JSON
        #[arg(long = "json")]
        json: bool,
    },

    /// Print a script in canonical form
    Format {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Rewrite the file in place
        #[arg(long = "write")]
        write: bool,
    },

    /// List available commands and their parameters
    Commands,
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Everything succeeded
    Success,
    /// At least one WARNING
    Warnings,
    /// At least one FAILURE
    Failures,
    /// The run was cancelled
    Cancelled,
    /// Bad arguments, configuration, or I/O
    Usage,
}

impl ExitStatus {
    /// Numeric exit code
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Warnings => 1,
            ExitStatus::Failures => 2,
            ExitStatus::Cancelled => 3,
            ExitStatus::Usage => 4,
        }
    }

    /// Status for a finished run or check
    pub fn from_report(report: &RunReport) -> Self {
        if report.status == RunState::Cancelled {
            return ExitStatus::Cancelled;
        }
        match report.severity {
            Severity::Failure => ExitStatus::Failures,
            Severity::Warning => ExitStatus::Warnings,
            _ => ExitStatus::Success,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// Options for a run that override the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Force strict mode
    pub strict: bool,
    /// Working directory override
    pub working_dir: Option<PathBuf>,
}

impl Cli {
    /// Run the CLI
    pub async fn run(self) -> AnyhowResult<ExitStatus> {
        match self.command {
            Commands::Run {
                script,
                strict,
                json,
                working_dir,
            } => {
                let config = load_config(self.config.as_deref(), &script)?;
                init_logging_impl(self.verbose, &config.logging.level);
                let options = RunOptions {
                    strict,
                    working_dir,
                };
                cmd_run_impl(script, config, options, json).await
            }
            Commands::Check { script, json } => {
                let config = load_config(self.config.as_deref(), &script)?;
                init_logging_impl(self.verbose, &config.logging.level);
                cmd_check_impl(&script, &config, json)
            }
            Commands::Format { script, write } => {
                init_logging_impl(self.verbose, "info");
                cmd_format_impl(&script, write)
            }
            Commands::Commands => {
                init_logging_impl(self.verbose, "info");
                cmd_commands_impl()
            }
        }
    }
}

/// Initialize logging implementation
fn init_logging_impl(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("LESERIE_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(level))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Directory holding the script, used for config lookup and as working directory
fn script_dir(script: &Path) -> PathBuf {
    match script.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load the explicit config file or the one next to the script
pub fn load_config(explicit: Option<&Path>, script: &Path) -> Result<ProjectConfig> {
    let loaded = match explicit {
        Some(path) => ProjectConfig::load_file(path),
        None => ProjectConfig::load(script_dir(script)),
    };
    loaded.map_err(|e| {
        PasserelleError::config_error(
            format!("{e:#}"),
            Some("Fix the configuration file or pass another with --config.".to_string()),
        )
    })
}

/// Read and parse a script file
pub fn read_script(path: &Path, registry: &CommandRegistry) -> Result<Script> {
    let text = fs::read_to_string(path)
        .map_err(|e| PasserelleError::io_error("reading script", Some(path.to_path_buf()), e))?;
    let script = Script::parse(&text, registry);
    for err in script.parse_errors() {
        warn!(line = err.line(), error = %err, "Line not parsed");
    }
    Ok(script)
}

/// Build an orchestrator for `script_path` from config and overrides
pub fn prepare_orchestrator(
    script_path: &Path,
    config: &ProjectConfig,
    options: &RunOptions,
) -> Result<Orchestrator> {
    let working_dir = options
        .working_dir
        .clone()
        .unwrap_or_else(|| script_dir(script_path));
    let mut run_config = config.to_run_config(working_dir).map_err(|e| {
        PasserelleError::config_error(format!("{e:#}"), None)
    })?;
    run_config.strict |= options.strict;
    Ok(Orchestrator::new(run_config))
}

/// Run a script on the calling thread
pub fn run_script(
    script_path: &Path,
    config: &ProjectConfig,
    options: &RunOptions,
) -> Result<RunReport> {
    let registry = standard_registry();
    let mut script = read_script(script_path, &registry)?;
    let mut orchestrator = prepare_orchestrator(script_path, config, options)?;
    Ok(orchestrator.run_with_listener(&mut script, &mut TracingListener)?)
}

/// Validate a script without running it
pub fn check_script(script_path: &Path, config: &ProjectConfig) -> Result<RunReport> {
    let registry = standard_registry();
    let mut script = read_script(script_path, &registry)?;
    let mut orchestrator = prepare_orchestrator(script_path, config, &RunOptions::default())?;
    Ok(orchestrator.validate_only(&mut script)?)
}

/// Canonical text for a script file and the number of lines that did not parse
pub fn format_script(script_path: &Path) -> Result<(String, usize)> {
    let registry = standard_registry();
    let script = read_script(script_path, &registry)?;
    Ok((script.to_text(), script.parse_errors().count()))
}

fn print_report(report: &RunReport, json: bool) -> AnyhowResult<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{text}");
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}

/// Run command implementation
async fn cmd_run_impl(
    script_path: PathBuf,
    config: ProjectConfig,
    options: RunOptions,
    json: bool,
) -> AnyhowResult<ExitStatus> {
    let registry = standard_registry();
    let script = read_script(&script_path, &registry)?;
    let orchestrator = prepare_orchestrator(&script_path, &config, &options)?;

    info!(
        script = %script_path.display(),
        commands = script.command_count(),
        strict = orchestrator.config().strict,
        "Running script"
    );

    // The run owns its own thread so RunProgram can start a runtime of its own.
    let handle = spawn_run(orchestrator, script, Box::new(TracingListener))
        .map_err(PasserelleError::from)?;
    let cancel = handle.cancellation_token();
    let join = tokio::task::spawn_blocking(move || handle.join());
    tokio::pin!(join);

    let joined = tokio::select! {
        joined = &mut join => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupted; cancelling the run");
            cancel.cancel();
            join.await
        }
    };
    let report = joined
        .context("Run task failed")?
        .map_err(PasserelleError::from)?;

    print_report(&report, json)?;
    Ok(ExitStatus::from_report(&report))
}

/// Check command implementation
fn cmd_check_impl(script_path: &Path, config: &ProjectConfig, json: bool) -> AnyhowResult<ExitStatus> {
    let report = check_script(script_path, config)?;
    print_report(&report, json)?;
    Ok(ExitStatus::from_report(&report))
}

/// Format command implementation
fn cmd_format_impl(script_path: &Path, write: bool) -> AnyhowResult<ExitStatus> {
    let (text, unparsed) = format_script(script_path)?;

    if !write {
        print!("{text}");
    } else if unparsed > 0 {
        return Err(PasserelleError::script_error(
            script_path,
            format!("{unparsed} line(s) did not parse; not rewriting the file"),
        )
        .into());
    } else {
        fs::write(script_path, &text).map_err(|e| {
            PasserelleError::io_error("writing script", Some(script_path.to_path_buf()), e)
        })?;
        info!(script = %script_path.display(), "Script rewritten");
    }

    Ok(if unparsed > 0 {
        ExitStatus::Failures
    } else {
        ExitStatus::Success
    })
}

/// Commands command implementation
fn cmd_commands_impl() -> AnyhowResult<ExitStatus> {
    let registry = standard_registry();
    for (name, parameters) in registry.describe() {
        println!("{name}({})", parameters.join(", "));
    }
    Ok(ExitStatus::Success)
}
