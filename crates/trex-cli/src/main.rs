//! # trex CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use trex_cli::deploy::{run_deploy, DeployArgs};
use trex_cli::validate::{run_validate, ValidateArgs};

/// T-REX suite tooling.
///
/// Validates suite files against the suite factory limits and dry-runs
/// deployments on an in-memory runtime.
#[derive(Parser, Debug)]
#[command(name = "trex", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a suite file against the factory limits.
    Validate(ValidateArgs),

    /// Deploy a suite file on an in-memory runtime and print its record.
    Deploy(DeployArgs),
}

fn filter_for(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Deploy(args) => run_deploy(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
