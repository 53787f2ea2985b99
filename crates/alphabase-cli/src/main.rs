//! AlphaBase CLI - command-line access to a single-file JSON key-value store
//!
//! The CLI is a thin layer over `alphabase-core`: it resolves the store path
//! and options, runs one command, and translates error kinds into exit codes.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{validate_args, AppContext};
use crate::cli::Cli;
use crate::constants::env;
use crate::errors::exit_code_for;

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    validate_args(cli)?;
    let ctx = AppContext::new(cli)?;
    let store = ctx.open_store()?;
    commands::dispatch(&ctx, &store, &cli.command)?;
    store.close()?;
    Ok(())
}

/// Diagnostics go to stderr, filtered by ALPHABASE_LOG (default `warn`).
fn init_logging() {
    let env_filter =
        EnvFilter::try_from_env(env::LOG).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
