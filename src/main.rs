mod cli;
mod command_handlers;
mod config;
mod error;
mod fetch;
mod installer;
mod locator;
mod metadata;
mod platform;
mod resolver;
mod self_update;
mod suggest;

use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsStr;

use crate::cli::Cli;
use crate::resolver::Stack;
use crate::self_update::{UpdatePlan, APPLY_UPDATE_ARG};

fn main() {
    // The detached updater re-enters here with its own argument set.
    if std::env::args_os().nth(1).as_deref() == Some(OsStr::new(APPLY_UPDATE_ARG)) {
        std::process::exit(run_background_update());
    }

    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("warning: {e:#}");
    }
    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let cwd = std::env::current_dir().context("reading the current directory")?;
    let stack = Stack::discover(&cwd)?;
    tracing::debug!(
        installations = stack.installations.len(),
        commands = stack.table.len(),
        "resolved command stack"
    );
    command_handlers::dispatch::dispatch(&stack, &cli.argv, cli.verbose > 0)
}

fn run_background_update() -> i32 {
    let plan = UpdatePlan::parse_from(std::env::args_os().skip(1));
    let _ = init_logging(1);
    match self_update::apply_update(&plan) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "update aborted");
            1
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("DX_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
