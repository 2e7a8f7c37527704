mod env_meta;
mod output;
mod progress;
mod run;
mod store;
mod synthetic;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Framemark - frame timing benchmark harness
///
/// Sweeps instanced scene complexity across windowed and immersive
/// surfaces and emits one NDJSON record per trial.
#[derive(Parser)]
#[command(name = "framemark")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark suite on the synthetic backend
    Run(run::RunArgs),
    /// Validate an NDJSON record stream
    Validate(validate::ValidateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run::run(&args),
        Commands::Validate(args) => validate::run(&args),
    }
}
