// crates/btune-cli/src/main.rs

use clap::{Parser, Subcommand};

mod cmd;
mod io;
mod pipeline;

#[derive(Parser)]
#[command(name = "btune-cli")]
#[command(about = "Adaptive compression-parameter tuning over a reference pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream a file through the tuner and report the winning parameters
    Tune(cmd::tune::TuneArgs),

    /// Entropy-probe estimate of a file's compressibility
    Probe(cmd::probe::ProbeArgs),

    /// Analyze a file as raw bytes (histogram, entropy, top bytes)
    Analyze(cmd::analyze::AnalyzeArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Tune(args) => cmd::tune::run(args),
        Commands::Probe(args) => cmd::probe::run(args),
        Commands::Analyze(args) => cmd::analyze::run(args),
    }
}
