//! Veritas CLI - run hallucination detections from the terminal
//!
//! # Usage
//!
//! ```bash
//! # Judge one statement with the built-in demo judges
//! veritas detect "The Eiffel Tower is in London" --context "The Eiffel Tower is in Paris"
//!
//! # Use your own judges and a cascade
//! veritas detect "..." --judges judges.json --strategy cascading --max-cost 0.01
//!
//! # Run a short workload and show what the engine learned
//! veritas stats --requests 50
//!
//! # Show version and configuration
//! veritas info
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

use commands::{detect, info, stats};

/// Veritas - multi-model hallucination consensus
///
/// Routes each statement to a budget-aware panel of judges and combines
/// their votes into one explainable verdict.
#[derive(Parser)]
#[command(
    name = "veritas",
    version,
    about = "Veritas CLI - Multi-Model Hallucination Consensus",
    long_about = "Veritas asks several independent judges whether a statement is a\n\
                  hallucination and combines their votes with a voting strategy.\n\n\
                  Judges are picked per request from their track record, the\n\
                  difficulty of the statement and the caller's budget."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge a statement
    #[command(name = "detect")]
    Detect(detect::DetectArgs),

    /// Run a demo workload and show per-judge statistics
    #[command(name = "stats")]
    Stats(stats::StatsArgs),

    /// Show version and configuration
    #[command(name = "info")]
    Info(info::InfoArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Detect(args) => detect::run(args).await,
        Commands::Stats(args) => stats::run(args).await,
        Commands::Info(args) => info::run(args),
    }
}

/// Setup logging based on verbosity level; `RUST_LOG` wins when set
fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}
