//! buildchain CLI - generate ninja build files for GCC cross-toolchains

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use buildchain::core::ConfigError;
use buildchain::ops::MissingTools;
use buildchain::util::diagnostic;
use buildchain::util::shell::{ColorChoice, Shell};

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        report(&e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("buildchain=debug")
    } else {
        EnvFilter::new("buildchain=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let shell = Shell::from_flags(cli.quiet, cli.verbose, color);

    match cli.command {
        Commands::Configure(args) => commands::configure::execute(args, &shell),
        Commands::Plan(args) => commands::plan::execute(args, &shell),
        Commands::Doctor(args) => commands::doctor::execute(args, cli.verbose),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print configuration errors with their suggestions, anything else as a
/// plain error chain.
fn report(err: &anyhow::Error) {
    let color = std::io::stderr().is_terminal();

    if let Some(config) = err.downcast_ref::<ConfigError>() {
        diagnostic::emit(&config.to_diagnostic(), color);
    } else if let Some(missing) = err.downcast_ref::<MissingTools>() {
        diagnostic::emit(&missing.to_diagnostic(), color);
    } else {
        eprintln!("error: {:#}", err);
    }
}
