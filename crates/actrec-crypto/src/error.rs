//! # Cryptographic Error Types
//!
//! Structured errors for key generation, issuance, signing and
//! verification. Messages come from the underlying RustCrypto libraries and
//! never include key bytes.

use actrec_core::ActivationError;
use thiserror::Error;

/// Errors from PKI operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// RSA key generation failed.
    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    /// Building or signing a certificate failed.
    #[error("certificate issuance failed: {0}")]
    CertificateIssuance(String),

    /// Producing a signature or signed envelope failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature, envelope or chain link did not verify.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// DER/PEM encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<der::Error> for CryptoError {
    fn from(err: der::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<CryptoError> for ActivationError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyGeneration(m) => Self::KeyGeneration(m),
            CryptoError::CertificateIssuance(m) => Self::CertificateIssuance(m),
            CryptoError::Signing(m) | CryptoError::VerificationFailed(m) => Self::Signing(m),
            CryptoError::Encoding(m) => Self::Serialization(m),
        }
    }
}
