//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use kumihimo::{cli::Cli, diagnostics, runner};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fmt()
        .with_max_level(max_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            tracing::error!("{}", diagnostics::render(&err));
            ExitCode::FAILURE
        }
    }
}
