// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use shutter::BackendKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "shutter")]
#[command(about = "One-shot camera capture session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Run a capture session and save one photo
    Capture {
        /// Output file path (default: ~/Pictures/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Camera index to use (from 'shutter list')
        #[arg(short, long, default_value = "0")]
        device: usize,

        /// Capture backend: v4l2 or virtual
        #[arg(long, default_value = "v4l2")]
        backend: BackendKind,

        /// Overlay image ghosted over the preview
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Overlay opacity in percent (0-100)
        #[arg(long)]
        overlay_alpha: Option<u32>,

        /// Simulated orientation reading in degrees
        #[arg(long)]
        orientation: Option<i32>,

        /// Bound on the wait for the capture result, in seconds
        #[arg(long, default_value = "5")]
        timeout_secs: u64,

        /// Print the session result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=shutter=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_devices(),
        Commands::Capture {
            output,
            device,
            backend,
            overlay,
            overlay_alpha,
            orientation,
            timeout_secs,
            json,
        } => {
            let code = cli::run_capture(cli::CaptureArgs {
                output,
                device,
                backend,
                overlay,
                overlay_alpha,
                orientation,
                timeout_secs,
                json,
            })?;
            std::process::exit(code);
        }
    }
}
