//! # Error Types: Session Failure Taxonomy
//!
//! Defines the errors a generation session can surface. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - `MissingIdentifier` is the only recoverable class: the caller can
//!   re-request with complete data.
//! - Key generation, issuance, and signing failures are fatal for the
//!   session and are never retried inside it.
//! - No variant ever carries private key material. Cryptographic failures
//!   are reported as library messages only.

use thiserror::Error;

/// Top-level error type for activation record synthesis.
#[derive(Error, Debug)]
pub enum ActivationError {
    /// A required identifier was absent after decoding.
    #[error("missing required identifier: {field}")]
    MissingIdentifier {
        /// The attribute key that was absent.
        field: &'static str,
    },

    /// An input document could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Asymmetric key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A certificate could not be issued.
    #[error("certificate issuance failed: {0}")]
    CertificateIssuance(String),

    /// A signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The output document could not be produced.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ActivationError {
    /// Whether the caller may retry with corrected input.
    ///
    /// Only a missing identifier is recoverable; everything else is a hard
    /// failure of the cryptographic or serialization subsystem.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MissingIdentifier { .. })
    }
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values have no stable canonical encoding.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

impl From<CanonicalizationError> for ActivationError {
    fn from(err: CanonicalizationError) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error loading or validating a synthesis configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field holds a value outside its permitted range.
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
