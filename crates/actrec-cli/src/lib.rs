//! # actrec-cli: Activation Record Tool
//!
//! Provides the `actrec` command-line interface over `actrec-record`.
//!
//! ## Subcommands
//!
//! - `actrec generate`: synthesize a record from a request property list.
//! - `actrec inspect`: print the fields and certificates of a record.
//! - `actrec verify`: check a record's token signature, ticket and chain.
//! - `actrec device`: list, lock, unlock or forget registry entries.
//!
//! ```bash
//! actrec generate --request request.plist --output record.plist
//! actrec -v verify record.plist
//! actrec device --registry devices.json lock 0000000000000000000000000000000000000000
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in `main.rs`; handlers here return an exit code.
//! - Handlers delegate to the library crates; no synthesis logic here.

#![deny(missing_docs)]

pub mod device;
pub mod generate;
pub mod inspect;
pub mod registry;
pub mod verify;

use std::path::Path;

use anyhow::{bail, Context, Result};

use actrec_core::SynthesisConfig;

/// Load configuration from `path`, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<SynthesisConfig> {
    match path {
        Some(path) => SynthesisConfig::load(path)
            .with_context(|| format!("failed to load configuration: {}", path.display())),
        None => Ok(SynthesisConfig::default()),
    }
}

/// Parse a 64-character hex RNG seed.
pub fn parse_seed(hex: &str) -> Result<[u8; 32]> {
    let hex = hex.trim();
    if hex.len() != 64 {
        bail!("seed must be 64 hex characters, got {}", hex.len());
    }
    let mut seed = [0u8; 32];
    for (i, byte) in seed.iter_mut().enumerate() {
        let pair = hex
            .get(2 * i..2 * i + 2)
            .with_context(|| format!("invalid hex at position {}", 2 * i))?;
        *byte = u8::from_str_radix(pair, 16)
            .with_context(|| format!("invalid hex at position {}", 2 * i))?;
    }
    Ok(seed)
}
