//! # actrec CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use actrec_cli::device::{run_device, DeviceArgs};
use actrec_cli::generate::{run_generate, GenerateArgs};
use actrec_cli::inspect::{run_inspect, InspectArgs};
use actrec_cli::load_config;
use actrec_cli::verify::{run_verify, VerifyArgs};

/// Activation record synthesizer.
///
/// Builds a throwaway PKI for a device described by a request property
/// list and emits a signed activation record. Also inspects and verifies
/// records and maintains a device registry.
#[derive(Parser, Debug)]
#[command(name = "actrec", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize an activation record from a request.
    Generate(GenerateArgs),

    /// Print the fields and certificates of a record.
    Inspect(InspectArgs),

    /// Check a record's token signature, ticket and certificate chain.
    Verify(VerifyArgs),

    /// List, lock, unlock or forget registered devices.
    Device(DeviceArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("actrec CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Generate(args) => {
            load_config(cli.config.as_deref()).and_then(|config| run_generate(&args, &config))
        }
        Commands::Inspect(args) => run_inspect(&args),
        Commands::Verify(args) => run_verify(&args),
        Commands::Device(args) => run_device(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
