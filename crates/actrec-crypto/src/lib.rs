//! # actrec-crypto: Session PKI
//!
//! Everything the synthesizer signs is produced here:
//!
//! - **Key custody**: ephemeral RSA key pairs, one per role per session
//!   ([`RsaKeyPair`]).
//! - **Trust chain**: self-signed Root CA and the Device CA it signs
//!   ([`TrustChain`]).
//! - **Issuance**: activation server and device certificates ([`Issuer`]).
//! - **Envelope**: CMS `SignedData` around canonical ticket bytes
//!   ([`sign_envelope`]).
//! - **Signatures**: PKCS#1 v1.5 with SHA-256 over raw bytes, and the
//!   verification used by tooling ([`sign_pkcs1_sha256`], [`verify_chain`]).
//!
//! ## Crate Policy
//!
//! - Depends only on `actrec-core` internally.
//! - Private key bytes never leave this crate; raw signing is
//!   crate-private and reachable only through the functions above.
//! - No mocking of cryptographic operations in tests. Tests use real RSA
//!   keys (1024-bit for speed) and real X.509/CMS encodings.

pub mod certificate;
pub mod chain;
pub mod envelope;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod name;
pub mod pem;
pub mod pkcs1;
pub mod serial;

pub use certificate::{decode_certificate, CertificateSummary, CertifiedKey};
pub use chain::TrustChain;
pub use envelope::{open_envelope, sign_envelope, verify_envelope, OpenedEnvelope};
pub use error::CryptoError;
pub use issuer::Issuer;
pub use keys::{session_rng, RsaKeyPair};
pub use name::{common_name, DistinguishedName};
pub use pem::{encode_pem_bundle, parse_pem_bundle};
pub use pkcs1::{
    public_key_from_certificate, sign_pkcs1_sha256, verify_chain, verify_issued_by,
    verify_pkcs1_sha256,
};
pub use serial::SerialAllocator;

/// Re-exported so downstream crates name certificates without depending
/// on `x509-cert` directly.
pub use x509_cert::Certificate;
