//! # Device Subcommand
//!
//! Registry maintenance: list known devices, lock or unlock one, or forget
//! it entirely.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::registry::{DeviceRegistry, JsonFileRegistry};

/// Arguments for `actrec device`.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// JSON device registry.
    #[arg(long)]
    pub registry: PathBuf,

    /// Registry operation.
    #[command(subcommand)]
    pub command: DeviceCommand,
}

/// Device subcommands.
#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// List registered devices.
    List,
    /// Refuse future activations of a device.
    Lock {
        /// Unique device identifier.
        udid: String,
    },
    /// Allow activations of a device again.
    Unlock {
        /// Unique device identifier.
        udid: String,
    },
    /// Remove a device from the registry.
    Forget {
        /// Unique device identifier.
        udid: String,
    },
}

/// Execute the device subcommand.
pub fn run_device(args: &DeviceArgs) -> Result<u8> {
    let mut registry = JsonFileRegistry::new(&args.registry);
    cmd_device(&args.command, &mut registry)
}

fn cmd_device(command: &DeviceCommand, registry: &mut dyn DeviceRegistry) -> Result<u8> {
    registry.open().context("failed to open device registry")?;
    let code = match command {
        DeviceCommand::List => {
            let entries = registry.list()?;
            if entries.is_empty() {
                println!("No devices registered.");
            } else {
                println!("Devices ({}):", entries.len());
                for entry in &entries {
                    let state = if entry.locked { "LOCKED" } else { "active" };
                    let last = entry
                        .last_activated
                        .map_or_else(|| "never".to_string(), |t| t.to_iso8601());
                    println!(
                        "  {}: {state}, {} activation(s), last {last}",
                        entry.unique_device_id, entry.activation_count
                    );
                    if let (Some(serial), Some(product)) = (&entry.serial_number, &entry.product_type)
                    {
                        println!("    {serial} ({product})");
                    }
                }
            }
            0
        }
        DeviceCommand::Lock { udid } => {
            registry.set_locked(udid, true)?;
            println!("OK: device {udid} locked");
            0
        }
        DeviceCommand::Unlock { udid } => {
            registry.set_locked(udid, false)?;
            println!("OK: device {udid} unlocked");
            0
        }
        DeviceCommand::Forget { udid } => {
            if registry.remove(udid)? {
                println!("OK: device {udid} forgotten");
                0
            } else {
                println!("NOT FOUND: device {udid}");
                1
            }
        }
    };
    registry.close().context("failed to write device registry")?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(path: &std::path::Path, command: DeviceCommand) -> DeviceArgs {
        DeviceArgs {
            registry: path.to_path_buf(),
            command,
        }
    }

    #[test]
    fn lock_then_unlock_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        let lock = args(&path, DeviceCommand::Lock { udid: "d1".into() });
        assert_eq!(run_device(&lock).unwrap(), 0);
        let mut reg = JsonFileRegistry::new(&path);
        reg.open().unwrap();
        assert!(reg.is_locked("d1").unwrap());

        let unlock = args(&path, DeviceCommand::Unlock { udid: "d1".into() });
        assert_eq!(run_device(&unlock).unwrap(), 0);
        let mut reg = JsonFileRegistry::new(&path);
        reg.open().unwrap();
        assert!(!reg.is_locked("d1").unwrap());
    }

    #[test]
    fn forget_unknown_device_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        let forget = args(&path, DeviceCommand::Forget { udid: "ghost".into() });
        assert_eq!(run_device(&forget).unwrap(), 1);
    }

    #[test]
    fn forget_known_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        run_device(&args(&path, DeviceCommand::Lock { udid: "d2".into() })).unwrap();
        let forget = args(&path, DeviceCommand::Forget { udid: "d2".into() });
        assert_eq!(run_device(&forget).unwrap(), 0);
        assert_eq!(run_device(&args(&path, DeviceCommand::List)).unwrap(), 0);

        let mut reg = JsonFileRegistry::new(&path);
        reg.open().unwrap();
        assert!(reg.list().unwrap().is_empty());
    }

    #[test]
    fn malformed_registry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, "{").unwrap();
        assert!(run_device(&args(&path, DeviceCommand::List)).is_err());
    }
}
