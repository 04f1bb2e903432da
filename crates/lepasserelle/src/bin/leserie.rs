// leserie - command-line entry point

use clap::Parser;
use lepasserelle::{format_error, Cli, ExitStatus, PasserelleError};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitStatus::Usage.into()
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match cli.run().await {
        Ok(status) => status.into(),
        Err(err) => {
            match err.downcast_ref::<PasserelleError>() {
                Some(e) => eprintln!("{}", format_error(e)),
                None => eprintln!("Error: {err:#}"),
            }
            ExitStatus::Usage.into()
        }
    }
}
