// SPDX-License-Identifier: GPL-3.0-only

use camera_pipeline::PipelineConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-pipeline")]
#[command(about = "Live camera capture and effect rendering pipeline")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: <config dir>/camera-pipeline/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live pipeline on the synthetic camera
    Run {
        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        seconds: Option<u64>,

        /// Effect index to select
        #[arg(short, long, default_value = "0")]
        effect: usize,

        /// Keep the effect ribbon expanded
        #[arg(short, long)]
        ribbon: bool,

        /// Print the full diagnostics dump as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cycle every effect with the ribbon collapsed and expanded
    PerfTest,

    /// Take a full-resolution snapshot
    Snapshot {
        /// Output file path (format from extension)
        #[arg(short, long)]
        output: PathBuf,

        /// Effect index to apply
        #[arg(short, long, default_value = "0")]
        effect: usize,
    },

    /// Take a photo (or burst) and save it as PNG
    Photo {
        /// Output directory (default: <pictures dir>/camera-pipeline)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Effect index to apply
        #[arg(short, long, default_value = "0")]
        effect: usize,

        /// Count down before shooting
        #[arg(short, long)]
        timer: bool,

        /// Take a burst instead of a single photo
        #[arg(short, long)]
        burst: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_pipeline=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            seconds,
            effect,
            ribbon,
            json,
        } => cli::run(config, seconds, effect, ribbon, json),
        Commands::PerfTest => cli::perf_test(config),
        Commands::Snapshot { output, effect } => cli::snapshot(config, output, effect),
        Commands::Photo {
            output_dir,
            effect,
            timer,
            burst,
        } => cli::photo(config, output_dir, effect, timer, burst),
        Commands::Config => cli::print_config(&config),
    }
}
