//! Skillradar command-line entry point.

use clap::Parser;
use skillradar::cli::{self, Cli};
use skillradar::config::init_tracing;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Cli::parse();
    let config = args.config();
    init_tracing(&config.log_filter);

    match cli::run(args.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
