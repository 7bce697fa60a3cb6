mod abort;
mod cli_config;
mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lucky", about = "Lucky-imaging star detection, tracking and integration")]
#[command(version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect stars on the template frame only; nothing is written to disk.
    Preview(commands::preview::PreviewArgs),
    /// Detect and track stars across every selected frame, writing the
    /// star-detection handoff XML.
    Align(commands::align::AlignArgs),
    /// Calibrate, register and integrate (or write per-frame registered
    /// output), reading star positions from a prior `align` run.
    Integrate(commands::integrate::IntegrateArgs),
    /// List the frames a pipeline run would pick up, in discovery order.
    Info(commands::info::InfoArgs),
    /// Print a full default pipeline configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Preview(args) => commands::preview::run(args),
        Commands::Align(args) => commands::align::run(args),
        Commands::Integrate(args) => commands::integrate::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config => commands::config::run(),
    }
}
