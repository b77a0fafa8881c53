//! # Device Registry
//!
//! The storage collaborator of the `generate` command: remembers which
//! devices have been activated and whether a device is locked. A locked
//! device is refused before any key is generated.
//!
//! Registries have an explicit `open`/`close` lifecycle. Every other
//! operation fails with [`RegistryError::NotOpen`] outside it.
//! [`JsonFileRegistry`] loads its file on `open` and writes it back on
//! `close`; [`MemoryRegistry`] keeps everything in process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use actrec_core::{DeviceAttributes, Timestamp};

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Operation attempted before `open` or after `close`.
    #[error("registry is not open")]
    NotOpen,

    /// The backing file could not be read or written.
    #[error("registry I/O error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The backing file is not a valid registry document.
    #[error("registry file {} is malformed: {source}", path.display())]
    Malformed {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// What the registry knows about one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Unique device identifier (the registry key).
    pub unique_device_id: String,
    /// Serial number from the last activation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Product type from the last activation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    /// Whether activation is refused.
    #[serde(default)]
    pub locked: bool,
    /// Successful activations so far.
    #[serde(default)]
    pub activation_count: u64,
    /// Time of the last successful activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activated: Option<Timestamp>,
}

impl DeviceEntry {
    fn new(unique_device_id: &str) -> Self {
        Self {
            unique_device_id: unique_device_id.to_string(),
            serial_number: None,
            product_type: None,
            locked: false,
            activation_count: 0,
            last_activated: None,
        }
    }
}

/// Device storage with an explicit lifecycle.
pub trait DeviceRegistry {
    /// Acquire the backing store.
    fn open(&mut self) -> Result<(), RegistryError>;

    /// Flush and release the backing store.
    fn close(&mut self) -> Result<(), RegistryError>;

    /// Entry for `unique_device_id`.
    fn lookup(&self, unique_device_id: &str) -> Result<Option<DeviceEntry>, RegistryError>;

    /// Record a successful activation of the device in `attrs`.
    fn record_activation(
        &mut self,
        attrs: &DeviceAttributes,
        at: Timestamp,
    ) -> Result<DeviceEntry, RegistryError>;

    /// Lock or unlock a device, creating its entry if needed.
    fn set_locked(
        &mut self,
        unique_device_id: &str,
        locked: bool,
    ) -> Result<DeviceEntry, RegistryError>;

    /// Forget a device. Returns whether it was known.
    fn remove(&mut self, unique_device_id: &str) -> Result<bool, RegistryError>;

    /// Every entry, sorted by device identifier.
    fn list(&self) -> Result<Vec<DeviceEntry>, RegistryError>;

    /// Whether the device is known and locked.
    fn is_locked(&self, unique_device_id: &str) -> Result<bool, RegistryError> {
        Ok(self
            .lookup(unique_device_id)?
            .is_some_and(|entry| entry.locked))
    }
}

/// In-process registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Option<BTreeMap<String, DeviceEntry>>,
}

impl MemoryRegistry {
    /// An empty, unopened registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<&BTreeMap<String, DeviceEntry>, RegistryError> {
        self.entries.as_ref().ok_or(RegistryError::NotOpen)
    }

    fn entries_mut(&mut self) -> Result<&mut BTreeMap<String, DeviceEntry>, RegistryError> {
        self.entries.as_mut().ok_or(RegistryError::NotOpen)
    }
}

impl DeviceRegistry for MemoryRegistry {
    fn open(&mut self) -> Result<(), RegistryError> {
        self.entries.get_or_insert_with(BTreeMap::new);
        Ok(())
    }

    fn close(&mut self) -> Result<(), RegistryError> {
        self.entries = None;
        Ok(())
    }

    fn lookup(&self, unique_device_id: &str) -> Result<Option<DeviceEntry>, RegistryError> {
        Ok(self.entries()?.get(unique_device_id).cloned())
    }

    fn record_activation(
        &mut self,
        attrs: &DeviceAttributes,
        at: Timestamp,
    ) -> Result<DeviceEntry, RegistryError> {
        let udid = attrs.unique_device_id();
        let entry = self
            .entries_mut()?
            .entry(udid.clone())
            .or_insert_with(|| DeviceEntry::new(&udid));
        entry.serial_number = Some(attrs.serial_number());
        entry.product_type = Some(attrs.product_type());
        entry.activation_count += 1;
        entry.last_activated = Some(at);
        Ok(entry.clone())
    }

    fn set_locked(
        &mut self,
        unique_device_id: &str,
        locked: bool,
    ) -> Result<DeviceEntry, RegistryError> {
        let entry = self
            .entries_mut()?
            .entry(unique_device_id.to_string())
            .or_insert_with(|| DeviceEntry::new(unique_device_id));
        entry.locked = locked;
        Ok(entry.clone())
    }

    fn remove(&mut self, unique_device_id: &str) -> Result<bool, RegistryError> {
        Ok(self.entries_mut()?.remove(unique_device_id).is_some())
    }

    fn list(&self) -> Result<Vec<DeviceEntry>, RegistryError> {
        Ok(self.entries()?.values().cloned().collect())
    }
}

/// Registry persisted as a JSON object keyed by device identifier.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    inner: MemoryRegistry,
}

impl JsonFileRegistry {
    /// A registry stored at `path`. Nothing is read until `open`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: MemoryRegistry::new(),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceRegistry for JsonFileRegistry {
    fn open(&mut self) -> Result<(), RegistryError> {
        let entries = if self.path.exists() {
            let text = std::fs::read_to_string(&self.path).map_err(|source| RegistryError::Io {
                path: self.path.clone(),
                source,
            })?;
            if text.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&text).map_err(|source| RegistryError::Malformed {
                    path: self.path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };
        self.inner.entries = Some(entries);
        tracing::debug!(path = %self.path.display(), "device registry opened");
        Ok(())
    }

    fn close(&mut self) -> Result<(), RegistryError> {
        let io = |source| RegistryError::Io {
            path: self.path.clone(),
            source,
        };
        let entries = self.inner.entries()?;
        let json = serde_json::to_string_pretty(entries).map_err(|source| {
            RegistryError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(&self.path, json + "\n").map_err(io)?;
        self.inner.close()?;
        tracing::debug!(path = %self.path.display(), "device registry written");
        Ok(())
    }

    fn lookup(&self, unique_device_id: &str) -> Result<Option<DeviceEntry>, RegistryError> {
        self.inner.lookup(unique_device_id)
    }

    fn record_activation(
        &mut self,
        attrs: &DeviceAttributes,
        at: Timestamp,
    ) -> Result<DeviceEntry, RegistryError> {
        self.inner.record_activation(attrs, at)
    }

    fn set_locked(
        &mut self,
        unique_device_id: &str,
        locked: bool,
    ) -> Result<DeviceEntry, RegistryError> {
        self.inner.set_locked(unique_device_id, locked)
    }

    fn remove(&mut self, unique_device_id: &str) -> Result<bool, RegistryError> {
        self.inner.remove(unique_device_id)
    }

    fn list(&self) -> Result<Vec<DeviceEntry>, RegistryError> {
        self.inner.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actrec_core::{keys, FallbackTable};

    fn attrs(udid: &str) -> DeviceAttributes {
        DeviceAttributes::from_pairs(
            [
                (keys::SERIAL_NUMBER, "C00000000000"),
                (keys::PRODUCT_TYPE, "iPhone0,0"),
                (keys::UNIQUE_DEVICE_ID, udid),
            ],
            &FallbackTable::default(),
        )
        .unwrap()
    }

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-15T12:00:00Z").unwrap()
    }

    #[test]
    fn operations_require_open() {
        let mut reg = MemoryRegistry::new();
        assert!(matches!(reg.lookup("x"), Err(RegistryError::NotOpen)));
        assert!(matches!(reg.set_locked("x", true), Err(RegistryError::NotOpen)));
        reg.open().unwrap();
        assert_eq!(reg.lookup("x").unwrap(), None);
        reg.close().unwrap();
        assert!(matches!(reg.list(), Err(RegistryError::NotOpen)));
    }

    #[test]
    fn activation_is_recorded() {
        let mut reg = MemoryRegistry::new();
        reg.open().unwrap();
        reg.record_activation(&attrs("u1"), at()).unwrap();
        let entry = reg.record_activation(&attrs("u1"), at()).unwrap();
        assert_eq!(entry.activation_count, 2);
        assert_eq!(entry.serial_number.as_deref(), Some("C00000000000"));
        assert_eq!(entry.last_activated, Some(at()));
        assert!(!reg.is_locked("u1").unwrap());
    }

    #[test]
    fn lock_unlock_and_forget() {
        let mut reg = MemoryRegistry::new();
        reg.open().unwrap();
        reg.set_locked("u2", true).unwrap();
        assert!(reg.is_locked("u2").unwrap());
        reg.set_locked("u2", false).unwrap();
        assert!(!reg.is_locked("u2").unwrap());
        assert!(reg.remove("u2").unwrap());
        assert!(!reg.remove("u2").unwrap());
        assert!(!reg.is_locked("unknown").unwrap());
    }

    #[test]
    fn json_file_persists_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("devices.json");

        let mut reg = JsonFileRegistry::new(&path);
        reg.open().unwrap();
        reg.record_activation(&attrs("u3"), at()).unwrap();
        reg.set_locked("u4", true).unwrap();
        reg.close().unwrap();
        assert!(path.exists());

        let mut reopened = JsonFileRegistry::new(&path);
        reopened.open().unwrap();
        let list = reopened.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].unique_device_id, "u3");
        assert_eq!(list[0].activation_count, 1);
        assert!(list[1].locked);
    }

    #[test]
    fn json_file_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = JsonFileRegistry::new(dir.path().join("none.json"));
        reg.open().unwrap();
        assert!(reg.list().unwrap().is_empty());
    }

    #[test]
    fn json_file_malformed_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[not a registry").unwrap();
        let mut reg = JsonFileRegistry::new(&path);
        assert!(matches!(reg.open(), Err(RegistryError::Malformed { .. })));
    }
}
