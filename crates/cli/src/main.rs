//! Sitegate CLI - Main Entry Point
//!
//! Runs quality gate suites against a URL and prints the outcome. The process
//! exits 0 when the suite passes and 1 on any failure or error.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

use commands::{check, config, report, run};

/// Sitegate - headless-browser quality gates for rendered web pages
#[derive(Parser)]
#[command(name = "sitegate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suite configuration file (TOML, YAML or JSON)
    #[arg(short, long, default_value = "sitegate.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled checker against a URL
    Run(run::RunArgs),

    /// Run a single checker against a URL
    Check(check::CheckArgs),

    /// Print a saved test-results.json
    Report(report::ReportArgs),

    /// Inspect or create suite configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let passed = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config, cli.format, cli.verbose).await?,
        Commands::Check(args) => check::execute(args, &cli.config, cli.format, cli.verbose).await?,
        Commands::Report(args) => {
            logging::init_console(cli.verbose);
            report::execute(args, cli.format)?
        }
        Commands::Config(cmd) => {
            logging::init_console(cli.verbose);
            config::execute(cmd, &cli.config, cli.format)?;
            true
        }
        Commands::Version => {
            println!("sitegate v{}", sitegate_common::VERSION);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
