//! # Generate Subcommand
//!
//! Reads a request property list, consults the optional device registry,
//! runs one synthesis session, and writes the record.
//!
//! A device the registry marks as locked is refused before any key is
//! generated (exit code 2). A successful run is recorded in the registry.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use actrec_core::{SynthesisConfig, SystemClock};
use actrec_record::{decode_attributes, generate_from_attributes};

use crate::registry::{DeviceRegistry, JsonFileRegistry};

/// Arguments for `actrec generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Request property list (XML or binary).
    #[arg(long, short)]
    pub request: PathBuf,

    /// Where to write the record. Standard output when omitted.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Write a binary property list instead of XML.
    #[arg(long)]
    pub binary: bool,

    /// JSON device registry to consult and update.
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// 64 hex characters seeding key generation, for reproducible output.
    #[arg(long)]
    pub seed: Option<String>,
}

/// Execute the generate subcommand.
pub fn run_generate(args: &GenerateArgs, config: &SynthesisConfig) -> Result<u8> {
    let mut config = config.clone();
    if let Some(seed) = &args.seed {
        config.rng_seed = Some(crate::parse_seed(seed)?);
    }
    let mut registry = args.registry.as_deref().map(JsonFileRegistry::new);
    cmd_generate(args, &config, registry.as_mut().map(|r| r as &mut dyn DeviceRegistry))
}

fn cmd_generate(
    args: &GenerateArgs,
    config: &SynthesisConfig,
    registry: Option<&mut dyn DeviceRegistry>,
) -> Result<u8> {
    let request = std::fs::read(&args.request)
        .with_context(|| format!("failed to read request: {}", args.request.display()))?;
    let attributes = decode_attributes(&request, &config.fallback)
        .with_context(|| format!("failed to decode request: {}", args.request.display()))?;
    let udid = attributes.unique_device_id();

    if let Some(registry) = registry {
        registry.open().context("failed to open device registry")?;
        if registry.is_locked(&udid)? {
            registry.close()?;
            println!("LOCKED: device {udid} is locked; no record generated");
            return Ok(2);
        }
        let artifacts = generate_from_attributes(&attributes, config, &SystemClock)?;
        write_record(args, &artifacts.record)?;
        let entry = registry.record_activation(&attributes, artifacts.issued_at)?;
        registry.close().context("failed to write device registry")?;
        tracing::info!(
            activations = entry.activation_count,
            "device registry updated"
        );
    } else {
        let artifacts = generate_from_attributes(&attributes, config, &SystemClock)?;
        write_record(args, &artifacts.record)?;
    }
    Ok(0)
}

fn write_record(args: &GenerateArgs, record: &actrec_record::ActivationRecord) -> Result<()> {
    let bytes = if args.binary {
        record.to_binary()?
    } else {
        record.to_xml()?
    };
    match &args.output {
        Some(path) => write_file(path, &bytes),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write record: {}", path.display()))?;
    eprintln!("OK: wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
