//! apply-waivers - rewrite a suite's result file with its waivers applied

#![forbid(unsafe_code)]

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use waivers::cli::Cli;
use waivers::{ApplyOptions, ApplyOutcome, apply_waivers};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let options = ApplyOptions::from_cli(cli).context("invalid arguments")?;
    let outcome = apply_waivers(&options)
        .with_context(|| format!("applying waivers to {}", options.result_file.display()))?;

    match outcome {
        ApplyOutcome::NoWaivers => {
            println!(
                "No waivers found for suite '{}'; '{}' was not modified.",
                options.suite_name,
                options.result_file.display()
            );
        }
        ApplyOutcome::Applied(report) => {
            println!(
                "Waivers successfully applied and '{}' has been updated.",
                options.result_file.display()
            );
            tracing::debug!(
                visited = report.entities_visited,
                waived = report.waived_total(),
                "apply report"
            );
        }
    }
    Ok(())
}
