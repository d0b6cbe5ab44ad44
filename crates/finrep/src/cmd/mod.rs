//! Command-line entry points.

pub mod close;
pub mod render;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling integration
    Json,
}

/// Render financial reports and run tax closings over JSON ledger
/// snapshots.
#[derive(Parser, Debug)]
#[command(name = "finrep", author, version, about, long_about = None)]
pub struct Cli {
    /// Show verbose output, honoring `RUST_LOG` when set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// The available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a report as a text table or JSON lines
    Render(render::Args),
    /// Validate a tax return and post its closing entries
    Close(close::Args),
}

/// Main entry point for the finrep binary.
pub fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    let result = match &cli.command {
        Command::Render(args) => render::run(args),
        Command::Close(args) => close::run(args),
    };
    match result {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
