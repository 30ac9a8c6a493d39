//! Roentgen CLI - multi-label chest radiograph classification.
//!
//! Roentgen loads a trained classifier checkpoint once, then runs each
//! given radiograph through the inference pipeline and prints the findings
//! that clear the confidence threshold.
//!
//! # Usage
//!
//! ```bash
//! # Classify a single radiograph
//! roentgen analyze chest.png
//!
//! # Several files, JSON output, custom threshold
//! roentgen analyze scans/*.png --json --threshold 0.1
//!
//! # View configuration
//! roentgen config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Roentgen - multi-label chest radiograph classification.
#[derive(Parser, Debug)]
#[command(name = "roentgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify radiograph images and print findings
    Analyze(cli::analyze::AnalyzeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match roentgen_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `roentgen config path`."
            );
            roentgen_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Roentgen v{}", roentgen_core::VERSION);

    match cli.command {
        Commands::Analyze(args) => cli::analyze::execute(args, config),
        Commands::Config(args) => cli::config::execute(args),
    }
}
