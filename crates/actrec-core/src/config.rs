//! # Synthesis Configuration
//!
//! Read-only settings shared by every session: key size, certificate
//! validity windows, the activation service hostname and URLs embedded in
//! the account token, the fixed regulatory and FairPlay blobs, and the
//! fallback identifier table.
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no
//! file) is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attributes::FallbackTable;
use crate::error::ConfigError;

/// Smallest RSA modulus accepted from configuration.
pub const MIN_KEY_BITS: usize = 1024;

/// Validity windows, in days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityDays {
    /// Root CA, 10 years.
    pub root_ca: i64,
    /// Device CA, about 5.5 years.
    pub device_ca: i64,
    /// Activation server certificate, 1 year.
    pub server: i64,
    /// Device certificate, 10 years.
    pub device: i64,
}

impl Default for ValidityDays {
    fn default() -> Self {
        Self {
            root_ca: 3650,
            device_ca: 2008,
            server: 365,
            device: 3650,
        }
    }
}

/// Session-independent synthesis settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// RSA modulus size for every generated key.
    pub key_bits: usize,
    /// Common name of the activation server certificate.
    pub service_host: String,
    /// `PhoneNumberNotificationURL` in the account token.
    pub notification_url: String,
    /// `ActivityURL` in the account token.
    pub activity_url: String,
    /// Bytes stored verbatim under `RegulatoryInfo`.
    pub regulatory_info: String,
    /// Bytes stored verbatim under `FairPlayKeyData`.
    pub fairplay_key_data: String,
    /// Value of the `unbrick` flag.
    pub unbrick: bool,
    /// Certificate validity windows.
    pub validity: ValidityDays,
    /// Placeholders for defaultable identifiers.
    pub fallback: FallbackTable,
    /// Seed for key generation. `None` draws keys from the OS RNG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<[u8; 32]>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            key_bits: 2048,
            service_host: "albert.apple.com".to_string(),
            notification_url: "https://albert.apple.com/deviceservices/phoneHome".to_string(),
            activity_url: "https://albert.apple.com/deviceservices/activity".to_string(),
            regulatory_info: r#"{"elabel":{"bis":{"regulatory":"R-41094897"}}}"#.to_string(),
            fairplay_key_data: "-----BEGIN CONTAINER-----\n-----END CONTAINER-----\n".to_string(),
            unbrick: true,
            validity: ValidityDays::default(),
            fallback: FallbackTable::default(),
            rng_seed: None,
        }
    }
}

impl SynthesisConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Invalid {
                field: "key_bits",
                reason: format!("must be at least {MIN_KEY_BITS}, got {}", self.key_bits),
            });
        }
        if self.service_host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "service_host",
                reason: "must not be empty".to_string(),
            });
        }
        let windows = [
            ("validity.root_ca", self.validity.root_ca),
            ("validity.device_ca", self.validity.device_ca),
            ("validity.server", self.validity.server),
            ("validity.device", self.validity.device),
        ];
        for (field, days) in windows {
            if days <= 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {days}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SynthesisConfig::default();
        config.validate().unwrap();
        assert_eq!(config.key_bits, 2048);
        assert_eq!(config.validity.root_ca, 3650);
        assert_eq!(config.validity.server, 365);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(SynthesisConfig::from_yaml("").unwrap(), SynthesisConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = SynthesisConfig::from_yaml("key_bits: 1024\nunbrick: false\n").unwrap();
        assert_eq!(config.key_bits, 1024);
        assert!(!config.unbrick);
        assert_eq!(config.service_host, "albert.apple.com");
    }

    #[test]
    fn nested_validity_override() {
        let config = SynthesisConfig::from_yaml("validity:\n  server: 30\n").unwrap();
        assert_eq!(config.validity.server, 30);
        assert_eq!(config.validity.device, 3650);
    }

    #[test]
    fn small_key_rejected() {
        let err = SynthesisConfig::from_yaml("key_bits: 512\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "key_bits", .. }));
    }

    #[test]
    fn empty_host_rejected() {
        let err = SynthesisConfig::from_yaml("service_host: ''\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "service_host", .. }));
    }

    #[test]
    fn non_positive_validity_rejected() {
        let err = SynthesisConfig::from_yaml("validity:\n  device: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "validity.device", .. }));
    }

    #[test]
    fn malformed_yaml_rejected() {
        assert!(matches!(
            SynthesisConfig::from_yaml("key_bits: [unterminated"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actrec.yaml");
        std::fs::write(&path, "service_host: activation.test\n").unwrap();
        let config = SynthesisConfig::load(&path).unwrap();
        assert_eq!(config.service_host, "activation.test");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SynthesisConfig::load(&dir.path().join("absent.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
