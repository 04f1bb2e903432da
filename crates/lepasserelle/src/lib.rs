// lepasserelle - Command-Line Front End
//
// *La Passerelle* (The Bridge) - Configuration, error reporting, and the `leserie` CLI

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Command-line interface and subcommand implementations
pub mod cli;

/// `.leserie/config.toml` loading and saving
pub mod config;

/// CLI error types with user-facing suggestions
pub mod errors;

pub use cli::{Cli, Commands, ExitStatus, RunOptions};
pub use config::ProjectConfig;
pub use errors::{format_error, PasserelleError};
