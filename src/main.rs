//! Web app template smoke tests
//!
//! Provisions a site per template, scaffolds and publishes the template,
//! then checks the deployed landing page.

use std::path::PathBuf;

use clap::Parser;
use webapp_smoke::{cli, commands, common::logging};
use commands::Commands;

#[derive(Parser)]
#[command(name = "webapp-smoke", about = "Scaffold, publish and verify web app templates")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Stream test logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let global = cli::GlobalOptions {
        config: cli.config,
        verbose: cli.verbose,
    };

    if let Err(e) = cli::dispatch(cli.command, global).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
